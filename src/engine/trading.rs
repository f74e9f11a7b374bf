use crate::core::account::AccountId;
use crate::core::error::PoolError;
use crate::core::fixed_point::{Fp96, MathError};
use crate::core::params::MarginlyParams;
use crate::core::position::PositionType;
use crate::core::token::Token;
use crate::engine::call::CallReceipt;
use crate::engine::pool::MarginlyPool;
use crate::engine::state::leverage_exceeded;
use crate::venue::Venue;
use log::{info, warn};

fn add(a: u128, b: u128) -> Result<u128, PoolError> {
    Ok(a.checked_add(b).ok_or(MathError::Overflow)?)
}

impl MarginlyPool {
    fn check_limit(&self, token: Token, extra: u128) -> Result<(), PoolError> {
        let limit = match token {
            Token::Base => self.params.base_limit,
            Token::Quote => self.params.quote_limit,
        };
        let requested = add(self.state.ledger.real_collateral(token)?, extra)?;
        if requested > limit {
            return Err(PoolError::LimitExceeded {
                token,
                requested,
                limit,
            });
        }
        Ok(())
    }

    fn check_open_amount(&self, amount: u128) -> Result<(), PoolError> {
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }
        if amount < self.params.position_min_amount {
            return Err(PoolError::MinAmountViolation {
                amount,
                min: self.params.position_min_amount,
            });
        }
        Ok(())
    }

    /// Credits `amount` of `token` to the beneficiary (the caller by default).
    ///
    /// A deposit of the token a position owes repays that debt first; a
    /// full repayment turns the position into Lend and the remainder
    /// becomes collateral. Only the part booked as collateral counts toward
    /// the pool limit. A non-zero `open_amount` then opens or extends a
    /// Long (base deposit) or Short (quote deposit) on the caller's own
    /// position.
    ///
    /// The open leg is checked before any tokens move. If its swap still
    /// fails, the deposited tokens are returned to the caller.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn deposit<V: Venue>(
        &mut self,
        venue: &mut V,
        price: Fp96,
        caller: &AccountId,
        token: Token,
        amount: u128,
        open_amount: u128,
        wrap_native: bool,
        beneficiary: Option<AccountId>,
    ) -> Result<(), PoolError> {
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }
        let owner = beneficiary.unwrap_or_else(|| caller.clone());
        if open_amount > 0 && owner != *caller {
            return Err(PoolError::Unauthorized(caller.clone()));
        }

        let owes_token = self
            .state
            .position(&owner)
            .map(|p| p.is_debt(token))
            .unwrap_or(false);
        let mut credited = amount;
        if owes_token {
            let debt = self.state.real_debt_of(&owner, token)?;
            if amount < debt {
                self.state.repay_debt(&owner, token, amount)?;
                credited = 0;
            } else {
                self.state.repay_debt(&owner, token, debt)?;
                self.state.set_position_type(&owner, PositionType::Lend)?;
                credited = amount - debt;
            }
        }
        if credited > 0 {
            self.check_limit(token, credited)?;
            self.state.credit_collateral(&owner, token, credited)?;
        }
        self.state.refresh_heap(&owner, self.initial_price)?;
        self.state.registry.prune(&owner);

        let bound = match (open_amount, token) {
            (0, _) => None,
            (_, Token::Base) => Some(self.plan_long(price, caller, open_amount)?),
            (_, Token::Quote) => Some(self.plan_short(price, caller, open_amount)?),
        };

        venue.transfer_in(caller, token, amount, wrap_native)?;
        info!("{} deposited {} {} for {}", caller, amount, token, owner);

        if let Some(bound) = bound {
            let opened = match token {
                Token::Base => self.settle_long(venue, caller, open_amount, bound),
                Token::Quote => self.settle_short(venue, caller, open_amount, bound),
            };
            if let Err(e) = opened {
                warn!("{} open leg failed ({}); refunding {} {}", caller, e, amount, token);
                venue.transfer_out(caller, token, amount, wrap_native)?;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Pays out `amount` of the caller's `token` collateral.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn withdraw<V: Venue>(
        &mut self,
        venue: &mut V,
        price: Fp96,
        caller: &AccountId,
        token: Token,
        amount: u128,
        unwrap_native: bool,
        receipt: &mut CallReceipt,
    ) -> Result<(), PoolError> {
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }
        let position = self.state.require_position(caller)?;
        if position.is_debt(token) {
            return Err(PoolError::WrongPositionType);
        }
        let available = self.state.ledger.position_collateral(&position, token)?;
        if amount > available {
            return Err(PoolError::InsufficientBalance {
                requested: amount,
                available,
            });
        }
        let ledger = &self.state.ledger;
        let free = ledger.real_collateral(token)?.saturating_sub(ledger.real_debt(token)?);
        if amount > free {
            return Err(PoolError::InsufficientLiquidity { token });
        }

        self.state.debit_collateral(caller, token, amount)?;
        if position.is_leveraged() {
            let updated = self.state.require_position(caller)?;
            let (collateral, debt) = self.state.position_values(&updated, price)?;
            if leverage_exceeded(collateral, debt, self.params.max_leverage) {
                return Err(PoolError::BadLeverage);
            }
        }
        if self.state.registry.prune(caller) {
            info!("{} withdrew everything; position closed", caller);
        }
        self.state.refresh_heap(caller, self.initial_price)?;
        Self::pay(venue, receipt, caller, token, amount, unwrap_native)?;
        info!("{} withdrew {} {}", caller, amount, token);
        Ok(())
    }

    /// Borrows `amount` base and sells it for quote collateral.
    pub(crate) fn open_short<V: Venue>(
        &mut self,
        venue: &mut V,
        price: Fp96,
        caller: &AccountId,
        amount: u128,
    ) -> Result<(), PoolError> {
        let min_out = self.plan_short(price, caller, amount)?;
        self.settle_short(venue, caller, amount, min_out)
    }

    /// Checks a short of `amount` base against the pool and the caller's
    /// position without touching the venue. Returns the minimum quote the
    /// swap must yield.
    fn plan_short(&self, price: Fp96, caller: &AccountId, amount: u128) -> Result<u128, PoolError> {
        self.check_open_amount(amount)?;
        let position = self.state.require_position(caller)?;
        match position.position_type {
            PositionType::Short => {}
            PositionType::Lend if position.discounted_base_amount == 0 => {}
            _ => return Err(PoolError::WrongPositionType),
        }

        let ledger = &self.state.ledger;
        if add(ledger.real_debt(Token::Base)?, amount)? > ledger.real_collateral(Token::Base)? {
            return Err(PoolError::InsufficientLiquidity { token: Token::Base });
        }
        let quote_estimate = price.mul_int(amount)?;
        let min_out = MarginlyParams::discount(quote_estimate, self.params.position_slippage)?;
        self.check_limit(Token::Quote, MarginlyParams::discount(quote_estimate, self.params.swap_fee)?)?;

        let worst_collateral = add(
            ledger.position_collateral(&position, Token::Quote)?,
            MarginlyParams::discount(min_out, self.params.swap_fee)?,
        )?;
        let debt_value = price.mul_int(add(ledger.position_debt(&position, Token::Base)?, amount)?)?;
        if leverage_exceeded(worst_collateral, debt_value, self.params.max_leverage) {
            return Err(PoolError::BadLeverage);
        }
        Ok(min_out)
    }

    fn settle_short<V: Venue>(
        &mut self,
        venue: &mut V,
        caller: &AccountId,
        amount: u128,
        min_out: u128,
    ) -> Result<(), PoolError> {
        let out = venue.swap_exact_input(Token::Base, Token::Quote, amount, min_out)?;
        if out < min_out {
            return Err(PoolError::SlippageExceeded {
                actual: out,
                bound: min_out,
            });
        }
        let credited = MarginlyParams::discount(out, self.params.swap_fee)?;

        self.state.set_position_type(caller, PositionType::Short)?;
        self.state.add_debt(caller, Token::Base, amount)?;
        self.state.credit_collateral(caller, Token::Quote, credited)?;
        self.state.refresh_heap(caller, self.initial_price)?;
        info!("{} shorted {} base for {} quote", caller, amount, credited);
        Ok(())
    }

    /// Buys `amount` base with borrowed quote.
    pub(crate) fn open_long<V: Venue>(
        &mut self,
        venue: &mut V,
        price: Fp96,
        caller: &AccountId,
        amount: u128,
    ) -> Result<(), PoolError> {
        let max_in = self.plan_long(price, caller, amount)?;
        self.settle_long(venue, caller, amount, max_in)
    }

    /// Venue-free checks of a long of `amount` base. Returns the most quote
    /// the swap may spend.
    fn plan_long(&self, price: Fp96, caller: &AccountId, amount: u128) -> Result<u128, PoolError> {
        self.check_open_amount(amount)?;
        let position = self.state.require_position(caller)?;
        match position.position_type {
            PositionType::Long => {}
            PositionType::Lend if position.discounted_quote_amount == 0 => {}
            _ => return Err(PoolError::WrongPositionType),
        }

        self.check_limit(Token::Base, amount)?;
        let ledger = &self.state.ledger;
        let max_in = MarginlyParams::markup(price.mul_int(amount)?, self.params.position_slippage)?;
        let worst_debt = MarginlyParams::markup(max_in, self.params.swap_fee)?;
        if add(ledger.real_debt(Token::Quote)?, worst_debt)? > ledger.real_collateral(Token::Quote)? {
            return Err(PoolError::InsufficientLiquidity { token: Token::Quote });
        }

        let collateral_value = price.mul_int(add(ledger.position_collateral(&position, Token::Base)?, amount)?)?;
        let debt_value = add(ledger.position_debt(&position, Token::Quote)?, worst_debt)?;
        if leverage_exceeded(collateral_value, debt_value, self.params.max_leverage) {
            return Err(PoolError::BadLeverage);
        }
        Ok(max_in)
    }

    fn settle_long<V: Venue>(
        &mut self,
        venue: &mut V,
        caller: &AccountId,
        amount: u128,
        max_in: u128,
    ) -> Result<(), PoolError> {
        let spent = venue.swap_exact_output(Token::Quote, Token::Base, max_in, amount)?;
        if spent > max_in {
            return Err(PoolError::SlippageExceeded {
                actual: spent,
                bound: max_in,
            });
        }
        let debt = MarginlyParams::markup(spent, self.params.swap_fee)?;

        self.state.set_position_type(caller, PositionType::Long)?;
        self.state.credit_collateral(caller, Token::Base, amount)?;
        self.state.add_debt(caller, Token::Quote, debt)?;
        self.state.refresh_heap(caller, self.initial_price)?;
        info!("{} went long {} base for {} quote of debt", caller, amount, debt);
        Ok(())
    }

    /// Buys back the whole debt of a Short or Long with its collateral.
    pub(crate) fn close_position<V: Venue>(
        &mut self,
        venue: &mut V,
        price: Fp96,
        caller: &AccountId,
    ) -> Result<(), PoolError> {
        let position = self.state.require_position(caller)?;
        let debt_token = position.debt_token().ok_or(PoolError::WrongPositionType)?;
        let collateral_token = debt_token.other();
        let ledger = &self.state.ledger;
        let debt = ledger.position_debt(&position, debt_token)?;
        let collateral = ledger.position_collateral(&position, collateral_token)?;

        let fair_in = match debt_token {
            Token::Base => price.mul_int(debt)?,
            Token::Quote => price.recip_mul_int(debt)?,
        };
        let max_in = MarginlyParams::markup(fair_in, self.params.position_slippage)?.min(collateral);
        let spent = venue.swap_exact_output(collateral_token, debt_token, max_in, debt)?;
        if spent > max_in {
            return Err(PoolError::SlippageExceeded {
                actual: spent,
                bound: max_in,
            });
        }

        self.state.repay_debt(caller, debt_token, debt)?;
        self.state.set_position_type(caller, PositionType::Lend)?;
        self.state.debit_collateral(caller, collateral_token, spent)?;
        self.state.registry.prune(caller);
        info!(
            "{} closed position: repaid {} {} for {} {}",
            caller, debt, debt_token, spent, collateral_token
        );
        Ok(())
    }
}
