use crate::core::account::AccountId;
use crate::core::error::PoolError;
use crate::core::fixed_point::{Fp96, SECONDS_IN_YEAR, WHOLE_ONE};
use crate::core::params::MarginlyParams;
use crate::core::position::PositionType;
use crate::core::token::Token;
use crate::engine::state::PoolState;
use log::{debug, info};

/// Inputs of one accrual step.
#[derive(Debug, Clone, Copy)]
pub struct AccrualContext<'a> {
    pub params: &'a MarginlyParams,
    /// Reference price used for system leverage.
    pub price: Fp96,
    /// Price frozen at pool creation, used for sort keys.
    pub initial_price: Fp96,
    pub now: u64,
    /// Receives the protocol share of accrued interest.
    pub fee_holder: &'a AccountId,
}

impl PoolState {
    /// Advances the coefficients to `ctx.now` and deleverages any side left
    /// above `max_leverage`.
    ///
    /// Debt coefficients grow by `(1 + leverage · rate / year)^dt`, with the
    /// side's current system leverage. Lenders of the same token receive
    /// the accrued interest minus the protocol `fee` share, which is
    /// credited to the fee holder, so collateral and debt of a token grow
    /// by the same real amount. A call with no elapsed time changes
    /// nothing. Returns the accounts deleveraged.
    pub fn reinit(&mut self, ctx: &AccrualContext<'_>) -> Result<Vec<AccountId>, PoolError> {
        let seconds_passed = ctx.now.saturating_sub(self.ledger.last_reinit_timestamp);
        if seconds_passed == 0 {
            return Ok(Vec::new());
        }

        let leverage = self.ledger.compute_system_leverage(ctx.price)?;
        let rate_per_second = Fp96::from_ratio(
            ctx.params.interest_rate as u128,
            WHOLE_ONE as u128 * SECONDS_IN_YEAR as u128,
        )?;
        self.accrue(Token::Base, leverage.short_x96, rate_per_second, seconds_passed, ctx)?;
        self.accrue(Token::Quote, leverage.long_x96, rate_per_second, seconds_passed, ctx)?;
        self.ledger.last_reinit_timestamp = ctx.now;

        let deleveraged = self.deleverage(ctx.params, ctx.price, ctx.initial_price)?;
        self.ledger.system_leverage = self.ledger.compute_system_leverage(ctx.price)?;

        debug!(
            "reinit: dt={}s base_debt_coeff={} quote_debt_coeff={} short_lev={} long_lev={}",
            seconds_passed,
            self.ledger.base.debt_coeff,
            self.ledger.quote.debt_coeff,
            self.ledger.system_leverage.short_x96,
            self.ledger.system_leverage.long_x96
        );
        Ok(deleveraged)
    }

    fn accrue(
        &mut self,
        token: Token,
        leverage: Fp96,
        rate_per_second: Fp96,
        seconds: u64,
        ctx: &AccrualContext<'_>,
    ) -> Result<(), PoolError> {
        if self.ledger.book(token).discounted_debt == 0 || rate_per_second.is_zero() {
            return Ok(());
        }
        let factor = Fp96::ONE.checked_add(leverage.checked_mul(rate_per_second)?)?;
        let growth = factor.pow_taylor(seconds)?;

        let debt_before = self.ledger.real_debt(token)?;
        let book = self.ledger.book_mut(token);
        book.debt_coeff = book.debt_coeff.checked_mul(growth)?;
        let accrued = self.ledger.real_debt(token)?.saturating_sub(debt_before);
        if accrued == 0 {
            return Ok(());
        }

        let book = self.ledger.book_mut(token);
        let mut fee = MarginlyParams::share(accrued, ctx.params.fee)?;
        if book.discounted_collateral == 0 {
            fee = accrued;
        } else {
            let increment = Fp96::from_ratio(accrued - fee, book.discounted_collateral)?;
            book.collateral_coeff = book.collateral_coeff.checked_add(increment)?;
        }
        if fee > 0 {
            self.credit_fee(ctx.fee_holder, token, fee, ctx.initial_price)?;
        }
        info!("accrued {} {} interest over {}s, protocol fee {}", accrued, token, seconds, fee);
        Ok(())
    }

    fn credit_fee(
        &mut self,
        holder: &AccountId,
        token: Token,
        amount: u128,
        initial_price: Fp96,
    ) -> Result<(), PoolError> {
        let owes_token = self
            .registry
            .get(holder)
            .map(|p| p.is_debt(token))
            .unwrap_or(false);
        let mut credited = amount;
        if owes_token {
            let debt = self.real_debt_of(holder, token)?;
            if amount < debt {
                self.repay_debt(holder, token, amount)?;
                credited = 0;
            } else {
                self.repay_debt(holder, token, debt)?;
                self.set_position_type(holder, PositionType::Lend)?;
                credited = amount - debt;
            }
        }
        if credited > 0 {
            self.credit_collateral(holder, token, credited)?;
        }
        self.refresh_heap(holder, initial_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (PoolState, MarginlyParams, AccountId) {
        let mut state = PoolState::new(0);
        let lender = AccountId::new("lender");
        let shorter = AccountId::new("shorter");
        state.credit_collateral(&lender, Token::Base, 10_000_000).unwrap();
        state.credit_collateral(&shorter, Token::Quote, 10_000_000).unwrap();
        state.set_position_type(&shorter, PositionType::Short).unwrap();
        state.add_debt(&shorter, Token::Base, 1_000_000).unwrap();
        state.refresh_heap(&shorter, Fp96::ONE).unwrap();
        (state, MarginlyParams::default(), AccountId::new("treasury"))
    }

    fn ctx<'a>(params: &'a MarginlyParams, holder: &'a AccountId, now: u64) -> AccrualContext<'a> {
        AccrualContext {
            params,
            price: Fp96::ONE,
            initial_price: Fp96::ONE,
            now,
            fee_holder: holder,
        }
    }

    #[test]
    fn test_zero_elapsed_is_noop() {
        let (mut state, params, holder) = setup();
        let before = state.ledger.clone();
        assert!(state.reinit(&ctx(&params, &holder, 0)).unwrap().is_empty());
        assert_eq!(state.ledger, before);
    }

    #[test]
    fn test_debt_coeff_matches_formula() {
        let (mut state, params, holder) = setup();
        let leverage = state.ledger.compute_system_leverage(Fp96::ONE).unwrap();
        let dt = 86_400;
        state.reinit(&ctx(&params, &holder, dt)).unwrap();

        let rate = Fp96::from_ratio(
            params.interest_rate as u128,
            WHOLE_ONE as u128 * SECONDS_IN_YEAR as u128,
        )
        .unwrap();
        let expected = Fp96::ONE
            .checked_add(leverage.short_x96.checked_mul(rate).unwrap())
            .unwrap()
            .pow_taylor(dt)
            .unwrap();
        assert_eq!(state.ledger.base.debt_coeff, expected);
        assert_eq!(state.ledger.quote.debt_coeff, Fp96::ONE);
        assert_eq!(state.ledger.last_reinit_timestamp, dt);
    }

    #[test]
    fn test_interest_is_conserved() {
        let (mut state, params, holder) = setup();
        let gap_before = state.ledger.real_collateral(Token::Base).unwrap()
            - state.ledger.real_debt(Token::Base).unwrap();
        state.reinit(&ctx(&params, &holder, SECONDS_IN_YEAR)).unwrap();
        let collateral = state.ledger.real_collateral(Token::Base).unwrap();
        let debt = state.ledger.real_debt(Token::Base).unwrap();
        assert!(debt > 1_000_000);
        let gap_after = collateral - debt;
        assert!(gap_before.abs_diff(gap_after) <= 4, "gap moved by {}", gap_before.abs_diff(gap_after));
        assert!(state.real_collateral_of(&holder, Token::Base).unwrap() > 0);
    }

    #[test]
    fn test_coefficients_monotonic_over_repeated_calls() {
        let (mut state, params, holder) = setup();
        let mut previous = state.ledger.base.debt_coeff;
        for step in 1..=10 {
            state.reinit(&ctx(&params, &holder, step * 3_600)).unwrap();
            assert!(state.ledger.base.debt_coeff >= previous);
            previous = state.ledger.base.debt_coeff;
        }
    }

    fn admin_short(state: &mut PoolState, admin: &AccountId, quote: u128, base_debt: u128) {
        state.credit_collateral(admin, Token::Quote, quote).unwrap();
        state.set_position_type(admin, PositionType::Short).unwrap();
        state.add_debt(admin, Token::Base, base_debt).unwrap();
        state.refresh_heap(admin, Fp96::ONE).unwrap();
    }

    fn base_gap(state: &PoolState) -> u128 {
        state.ledger.real_collateral(Token::Base).unwrap() - state.ledger.real_debt(Token::Base).unwrap()
    }

    #[test]
    fn test_fee_clears_small_holder_debt_and_credits_remainder() {
        let (mut state, _, holder) = setup();
        let params = MarginlyParams {
            fee: WHOLE_ONE,
            ..MarginlyParams::default()
        };
        admin_short(&mut state, &holder, 1_000, 1);
        assert_eq!(state.short_heap.len(), 2);
        let gap_before = base_gap(&state);

        state.reinit(&ctx(&params, &holder, SECONDS_IN_YEAR)).unwrap();

        let gap_after = base_gap(&state);
        assert!(gap_before.abs_diff(gap_after) <= 4, "gap moved by {}", gap_before.abs_diff(gap_after));
        let admin = state.position(&holder).unwrap();
        assert_eq!(admin.position_type, PositionType::Lend);
        assert_eq!(admin.heap_slot, None);
        assert_eq!(state.short_heap.len(), 1);
        assert!(state.short_heap.is_valid());
        assert_eq!(state.real_debt_of(&holder, Token::Base).unwrap(), 0);
        assert!(state.real_collateral_of(&holder, Token::Base).unwrap() > 50_000);
    }

    #[test]
    fn test_fee_partially_repays_large_holder_debt() {
        let (mut state, params, holder) = setup();
        admin_short(&mut state, &holder, 1_000_000, 500_000);
        let gap_before = base_gap(&state);

        state.reinit(&ctx(&params, &holder, SECONDS_IN_YEAR)).unwrap();

        let gap_after = base_gap(&state);
        assert!(gap_before.abs_diff(gap_after) <= 4, "gap moved by {}", gap_before.abs_diff(gap_after));
        let admin = state.position(&holder).unwrap();
        assert_eq!(admin.position_type, PositionType::Short);
        assert!(admin.heap_slot.is_some());
        assert_eq!(state.real_collateral_of(&holder, Token::Base).unwrap(), 0);
        assert!(state.real_debt_of(&holder, Token::Base).unwrap() > 500_000);
    }
}
