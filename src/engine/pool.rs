use crate::core::account::AccountId;
use crate::core::error::PoolError;
use crate::core::fixed_point::Fp96;
use crate::core::ledger::{Ledger, SystemLeverage};
use crate::core::params::MarginlyParams;
use crate::core::position::{Position, PositionType};
use crate::core::token::Token;
use crate::engine::accrual::AccrualContext;
use crate::engine::call::{Call, CallReceipt, Payout};
use crate::engine::state::PoolState;
use crate::heap::leverage_heap::LeverageHeap;
use crate::venue::Venue;
use log::{debug, info};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A two-token margin lending pool.
///
/// [`MarginlyPool::execute`] is the only way to change the pool. Every call
/// accrues interest first, then runs its handler; if anything fails the
/// pool is restored to its state before the call.
///
/// # Examples
///
/// ```
/// use margin_engine::prelude::*;
///
/// let admin = AccountId::new("admin");
/// let lender = AccountId::new("lender");
/// let mut venue = SimulatedVenue::new(Fp96::ONE, 0);
/// venue.mint(&lender, Token::Base, 1_000);
///
/// let mut pool = MarginlyPool::new(admin, MarginlyParams::default(), Fp96::ONE, 0).unwrap();
/// venue.execute(&mut pool, &lender, Call::deposit_base(1_000)).unwrap();
///
/// let position = pool.position(&lender).unwrap();
/// assert_eq!(position.position_type, PositionType::Lend);
/// assert_eq!(position.discounted_base_amount, 1_000);
/// ```
#[derive(Debug, Clone)]
pub struct MarginlyPool {
    pub(crate) admin: AccountId,
    pub(crate) params: MarginlyParams,
    pub(crate) initial_price: Fp96,
    pub(crate) state: PoolState,
    locked: bool,
}

impl MarginlyPool {
    /// Creates an empty pool. `initial_price` is frozen for sort keys.
    pub fn new(
        admin: AccountId,
        params: MarginlyParams,
        initial_price: Fp96,
        created_at: u64,
    ) -> Result<Self, PoolError> {
        params.validate()?;
        if initial_price.is_zero() {
            return Err(PoolError::InvalidParameters(
                "initial price must be positive".to_string(),
            ));
        }
        info!("pool created by {} at price {}", admin, initial_price);
        Ok(Self {
            admin,
            params,
            initial_price,
            state: PoolState::new(created_at),
            locked: false,
        })
    }

    /// Runs one call atomically.
    pub fn execute<V: Venue>(
        &mut self,
        venue: &mut V,
        caller: &AccountId,
        call: Call,
    ) -> Result<CallReceipt, PoolError> {
        if self.locked {
            return Err(PoolError::Locked);
        }
        self.locked = true;
        let saved_state = self.state.clone();
        let saved_params = self.params.clone();
        let name = call.name();

        let result = self.dispatch(venue, caller, call);
        match &result {
            Ok(receipt) => debug!("{} by {} ok: {:?}", name, caller, receipt),
            Err(e) => {
                debug!("{} by {} rejected: {}", name, caller, e);
                self.state = saved_state;
                self.params = saved_params;
            }
        }
        self.locked = false;
        result
    }

    fn dispatch<V: Venue>(
        &mut self,
        venue: &mut V,
        caller: &AccountId,
        call: Call,
    ) -> Result<CallReceipt, PoolError> {
        let price = venue.base_price(self.params.price_observation_window)?;
        let now = venue.now();
        let mut receipt = CallReceipt::default();

        let ctx = AccrualContext {
            params: &self.params,
            price,
            initial_price: self.initial_price,
            now,
            fee_holder: &self.admin,
        };
        receipt.deleveraged = self.state.reinit(&ctx)?;

        match call {
            Call::DepositBase {
                amount,
                long_amount,
                wrap_native,
                beneficiary,
            } => self.deposit(
                venue,
                price,
                caller,
                Token::Base,
                amount,
                long_amount,
                wrap_native,
                beneficiary,
            )?,
            Call::DepositQuote {
                amount,
                short_amount,
                wrap_native,
                beneficiary,
            } => self.deposit(
                venue,
                price,
                caller,
                Token::Quote,
                amount,
                short_amount,
                wrap_native,
                beneficiary,
            )?,
            Call::WithdrawBase {
                amount,
                unwrap_native,
            } => self.withdraw(venue, price, caller, Token::Base, amount, unwrap_native, &mut receipt)?,
            Call::WithdrawQuote {
                amount,
                unwrap_native,
            } => self.withdraw(venue, price, caller, Token::Quote, amount, unwrap_native, &mut receipt)?,
            Call::Short { amount } => self.open_short(venue, price, caller, amount)?,
            Call::Long { amount } => self.open_long(venue, price, caller, amount)?,
            Call::ClosePosition => self.close_position(venue, price, caller)?,
            Call::Reinit => {}
            Call::Liquidate { target } => self.liquidate(venue, price, caller, &target, &mut receipt)?,
            Call::Sweep => self.sweep(venue, caller, &mut receipt)?,
            Call::SetParameters { params } => self.set_parameters(caller, params)?,
        }

        self.state.ledger.system_leverage = self.state.ledger.compute_system_leverage(price)?;
        Ok(receipt)
    }

    pub(crate) fn pay<V: Venue>(
        venue: &mut V,
        receipt: &mut CallReceipt,
        to: &AccountId,
        token: Token,
        amount: u128,
        unwrap_native: bool,
    ) -> Result<(), PoolError> {
        venue.transfer_out(to, token, amount, unwrap_native)?;
        receipt.payouts.push(Payout {
            to: to.clone(),
            token,
            amount,
        });
        Ok(())
    }

    pub fn admin(&self) -> &AccountId {
        &self.admin
    }

    pub fn params(&self) -> &MarginlyParams {
        &self.params
    }

    pub fn initial_price(&self) -> Fp96 {
        self.initial_price
    }

    pub fn ledger(&self) -> &Ledger {
        &self.state.ledger
    }

    pub fn state(&self) -> &PoolState {
        &self.state
    }

    pub fn position(&self, account: &AccountId) -> Option<&Position> {
        self.state.position(account)
    }

    pub fn position_type(&self, account: &AccountId) -> PositionType {
        self.state.registry.position_type(account)
    }

    pub fn short_heap(&self) -> &LeverageHeap {
        &self.state.short_heap
    }

    pub fn long_heap(&self) -> &LeverageHeap {
        &self.state.long_heap
    }

    /// Leverage cached at the end of the last call.
    pub fn system_leverage(&self) -> SystemLeverage {
        self.state.ledger.system_leverage
    }

    pub fn real_collateral_of(&self, account: &AccountId, token: Token) -> Result<u128, PoolError> {
        self.state.real_collateral_of(account, token)
    }

    pub fn real_debt_of(&self, account: &AccountId, token: Token) -> Result<u128, PoolError> {
        self.state.real_debt_of(account, token)
    }

    pub fn snapshot(&self) -> Result<PoolSnapshot, PoolError> {
        let ledger = &self.state.ledger;
        let book = |token: Token| -> Result<BookSnapshot, PoolError> {
            let b = ledger.book(token);
            Ok(BookSnapshot {
                collateral_coeff: b.collateral_coeff.to_decimal()?,
                debt_coeff: b.debt_coeff.to_decimal()?,
                delev_coeff: b.delev_coeff.to_decimal()?,
                discounted_collateral: b.discounted_collateral,
                discounted_debt: b.discounted_debt,
                real_collateral: ledger.real_collateral(token)?,
                real_debt: ledger.real_debt(token)?,
            })
        };
        let mut positions = Vec::new();
        for (account, position) in self.state.registry.iter() {
            positions.push(PositionSnapshot {
                account: account.clone(),
                position_type: position.position_type,
                discounted_base_amount: position.discounted_base_amount,
                discounted_quote_amount: position.discounted_quote_amount,
                base_collateral: ledger.position_collateral(position, Token::Base)?,
                base_debt: ledger.position_debt(position, Token::Base)?,
                quote_collateral: ledger.position_collateral(position, Token::Quote)?,
                quote_debt: ledger.position_debt(position, Token::Quote)?,
                heap_slot: position.heap_slot,
            });
        }
        Ok(PoolSnapshot {
            last_reinit_timestamp: ledger.last_reinit_timestamp,
            base: book(Token::Base)?,
            quote: book(Token::Quote)?,
            short_leverage: ledger.system_leverage.short_x96.to_decimal()?,
            long_leverage: ledger.system_leverage.long_x96.to_decimal()?,
            positions,
        })
    }
}

/// Human-readable view of one token book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub collateral_coeff: Decimal,
    pub debt_coeff: Decimal,
    pub delev_coeff: Decimal,
    pub discounted_collateral: u128,
    pub discounted_debt: u128,
    pub real_collateral: u128,
    pub real_debt: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub account: AccountId,
    pub position_type: PositionType,
    pub discounted_base_amount: u128,
    pub discounted_quote_amount: u128,
    pub base_collateral: u128,
    pub base_debt: u128,
    pub quote_collateral: u128,
    pub quote_debt: u128,
    pub heap_slot: Option<usize>,
}

/// Report of the whole pool, used by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub last_reinit_timestamp: u64,
    pub base: BookSnapshot,
    pub quote: BookSnapshot,
    pub short_leverage: Decimal,
    pub long_leverage: Decimal,
    pub positions: Vec<PositionSnapshot>,
}

impl fmt::Display for PoolSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Pool at t={} ===", self.last_reinit_timestamp)?;
        for (name, book) in [("base", &self.base), ("quote", &self.quote)] {
            writeln!(
                f,
                "{:<6} collateral {:>20} (coeff {})  debt {:>20} (coeff {})  delev {}",
                name,
                book.real_collateral,
                book.collateral_coeff.round_dp(12),
                book.real_debt,
                book.debt_coeff.round_dp(12),
                book.delev_coeff.round_dp(12)
            )?;
        }
        writeln!(
            f,
            "Leverage: short {}  long {}",
            self.short_leverage.round_dp(6),
            self.long_leverage.round_dp(6)
        )?;
        writeln!(f, "Positions ({}):", self.positions.len())?;
        for p in &self.positions {
            writeln!(
                f,
                "  {:<16} {:<8} base +{} -{}  quote +{} -{}",
                p.account.as_str(),
                p.position_type.to_string(),
                p.base_collateral,
                p.base_debt,
                p.quote_collateral,
                p.quote_debt
            )?;
        }
        Ok(())
    }
}
