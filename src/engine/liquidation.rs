use crate::core::account::AccountId;
use crate::core::error::PoolError;
use crate::core::fixed_point::{Fp96, MathError, WHOLE_ONE};
use crate::core::params::MarginlyParams;
use crate::core::position::PositionType;
use crate::engine::call::CallReceipt;
use crate::engine::pool::MarginlyPool;
use crate::engine::state::leverage_exceeded;
use crate::venue::Venue;
use log::info;

impl MarginlyPool {
    /// Margin call on `target` by `caller`.
    ///
    /// The position is liquidatable when it exceeds `max_leverage` with its
    /// base leg priced `mc_slippage` against it: the debt of a Short at
    /// `P·(1 + mc)`, the collateral of a Long at `P·(1 − mc)`. If its
    /// collateral covers buying back the debt at that price plus the
    /// liquidation incentive, the debt is bought back, the caller receives
    /// the incentive in the collateral token and the owner keeps the rest
    /// as a Lend position. Otherwise the position is handed to the
    /// opposite side as in deleveraging.
    pub(crate) fn liquidate<V: Venue>(
        &mut self,
        venue: &mut V,
        price: Fp96,
        caller: &AccountId,
        target: &AccountId,
        receipt: &mut CallReceipt,
    ) -> Result<(), PoolError> {
        let position = self.state.require_position(target)?;
        let Some(debt_token) = position.debt_token() else {
            return Err(PoolError::NotLiquidatable(target.clone()));
        };
        let collateral_token = debt_token.other();
        let collateral = self.state.ledger.position_collateral(&position, collateral_token)?;
        let debt = self.state.ledger.position_debt(&position, debt_token)?;

        let mc = self.params.mc_slippage;
        let (collateral_value, debt_value, max_in) = match position.position_type {
            PositionType::Short => {
                let stressed = price.checked_mul(Fp96::from_ppm(WHOLE_ONE + mc))?;
                let value = stressed.mul_int(debt)?;
                (collateral, value, value)
            }
            _ => {
                let stressed = price.checked_mul(Fp96::from_ppm(WHOLE_ONE - mc))?;
                let max_in = if stressed.is_zero() {
                    u128::MAX
                } else {
                    stressed.recip_mul_int_ceil(debt)?
                };
                (stressed.mul_int(collateral)?, debt, max_in)
            }
        };
        if !leverage_exceeded(collateral_value, debt_value, self.params.max_leverage) {
            return Err(PoolError::NotLiquidatable(target.clone()));
        }

        let incentive_cap = MarginlyParams::share(max_in, self.params.liquidation_incentive)?;
        let covered = max_in
            .checked_add(incentive_cap)
            .map(|needed| collateral >= needed)
            .unwrap_or(false);
        if !covered {
            if self.state.transfer_to_counterparty(target, self.initial_price)?.is_none() {
                return Err(PoolError::NoCounterparty);
            }
            info!("{} liquidated underwater position of {} by deleveraging", caller, target);
            receipt.deleveraged.push(target.clone());
            return Ok(());
        }

        let spent = venue.swap_exact_output(collateral_token, debt_token, max_in, debt)?;
        if spent > max_in {
            return Err(PoolError::SlippageExceeded {
                actual: spent,
                bound: max_in,
            });
        }
        let reward = MarginlyParams::share(spent, self.params.liquidation_incentive)?;

        self.state.repay_debt(target, debt_token, debt)?;
        self.state.set_position_type(target, PositionType::Lend)?;
        let taken = spent.checked_add(reward).ok_or(MathError::Overflow)?;
        self.state.debit_collateral(target, collateral_token, taken)?;
        self.state.registry.prune(target);
        if reward > 0 {
            Self::pay(venue, receipt, caller, collateral_token, reward, false)?;
        }
        info!(
            "{} liquidated {}: repaid {} {} using {} {}, incentive {}",
            caller, target, debt, debt_token, spent, collateral_token, reward
        );
        Ok(())
    }
}
