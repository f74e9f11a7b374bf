use crate::core::error::PoolError;
use crate::core::fixed_point::{mul_div, Fp96, MathError, WHOLE_ONE};
use serde::{Deserialize, Serialize};

/// Risk and fee parameters of a pool.
///
/// Every ratio is expressed in parts per million of [`WHOLE_ONE`]; token
/// amounts are in the smallest unit of their token. Missing fields in a
/// JSON configuration fall back to the defaults below.
///
/// # Examples
///
/// ```
/// use margin_engine::core::params::MarginlyParams;
///
/// let params: MarginlyParams = serde_json::from_str(r#"{ "max_leverage": 10 }"#).unwrap();
/// assert_eq!(params.max_leverage, 10);
/// assert_eq!(params.swap_fee, MarginlyParams::default().swap_fee);
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarginlyParams {
    /// Annual interest rate paid by debtors at system leverage 1.
    pub interest_rate: u32,
    /// Share of accrued interest kept by the protocol.
    pub fee: u32,
    /// Highest leverage a position or a pool side may reach.
    pub max_leverage: u32,
    /// Fee charged on top of leveraged swaps.
    pub swap_fee: u32,
    /// Averaging window of the reference price, in seconds.
    pub price_observation_window: u32,
    /// Smallest base amount accepted by `Short` and `Long`.
    pub position_min_amount: u128,
    /// Slippage tolerated on position swaps.
    pub position_slippage: u32,
    /// Slippage tolerated on margin-call swaps.
    pub mc_slippage: u32,
    /// Cap on total real base collateral.
    pub base_limit: u128,
    /// Cap on total real quote collateral.
    pub quote_limit: u128,
    /// Reward paid to a liquidator, as a share of the collateral swapped.
    pub liquidation_incentive: u32,
}

impl Default for MarginlyParams {
    fn default() -> Self {
        Self {
            interest_rate: 54_000,
            fee: 20_000,
            max_leverage: 20,
            swap_fee: 1_000,
            price_observation_window: 900,
            position_min_amount: 1_000,
            position_slippage: 20_000,
            mc_slippage: 50_000,
            base_limit: 1_000_000_000_000_000_000_000_000,
            quote_limit: 1_000_000_000_000_000_000,
            liquidation_incentive: 10_000,
        }
    }
}

impl MarginlyParams {
    pub fn validate(&self) -> Result<(), PoolError> {
        let ppm_fields = [
            ("interest_rate", self.interest_rate),
            ("fee", self.fee),
            ("swap_fee", self.swap_fee),
            ("position_slippage", self.position_slippage),
            ("mc_slippage", self.mc_slippage),
            ("liquidation_incentive", self.liquidation_incentive),
        ];
        for (name, value) in ppm_fields {
            if value > WHOLE_ONE {
                return Err(PoolError::InvalidParameters(format!(
                    "{} must not exceed {}, got {}",
                    name, WHOLE_ONE, value
                )));
            }
        }
        if self.max_leverage < 1 {
            return Err(PoolError::InvalidParameters(
                "max_leverage must be at least 1".to_string(),
            ));
        }
        if self.price_observation_window == 0 {
            return Err(PoolError::InvalidParameters(
                "price_observation_window must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn max_leverage_x96(&self) -> Fp96 {
        Fp96::from_int(self.max_leverage as u128)
    }

    /// `amount · ppm / WHOLE_ONE`, floored.
    pub(crate) fn share(amount: u128, ppm: u32) -> Result<u128, PoolError> {
        Ok(mul_div(amount, ppm as u128, WHOLE_ONE as u128)?)
    }

    /// `amount` minus its floored `ppm` share.
    pub(crate) fn discount(amount: u128, ppm: u32) -> Result<u128, PoolError> {
        Ok(amount - Self::share(amount, ppm.min(WHOLE_ONE))?)
    }

    /// `amount · (1 + ppm)`, floored.
    pub(crate) fn markup(amount: u128, ppm: u32) -> Result<u128, PoolError> {
        amount
            .checked_add(Self::share(amount, ppm)?)
            .ok_or(PoolError::Math(MathError::Overflow))
    }
}
