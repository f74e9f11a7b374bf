use crate::core::account::AccountId;
use crate::core::params::MarginlyParams;
use crate::core::token::Token;
use serde::{Deserialize, Serialize};

/// A state-changing request to a pool.
///
/// Amounts are real token units. Serialized externally tagged, e.g.
/// `{ "short": { "amount": 100 } }` or `"close_position"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Call {
    DepositBase {
        amount: u128,
        /// Base amount to go long right after the deposit.
        #[serde(default)]
        long_amount: u128,
        #[serde(default)]
        wrap_native: bool,
        /// Account credited instead of the caller.
        #[serde(default)]
        beneficiary: Option<AccountId>,
    },
    DepositQuote {
        amount: u128,
        /// Base amount to short right after the deposit.
        #[serde(default)]
        short_amount: u128,
        #[serde(default)]
        wrap_native: bool,
        #[serde(default)]
        beneficiary: Option<AccountId>,
    },
    WithdrawBase {
        amount: u128,
        #[serde(default)]
        unwrap_native: bool,
    },
    WithdrawQuote {
        amount: u128,
        #[serde(default)]
        unwrap_native: bool,
    },
    Short {
        amount: u128,
    },
    Long {
        amount: u128,
    },
    ClosePosition,
    Reinit,
    Liquidate {
        target: AccountId,
    },
    Sweep,
    SetParameters {
        params: MarginlyParams,
    },
}

impl Call {
    pub fn deposit_base(amount: u128) -> Self {
        Call::DepositBase {
            amount,
            long_amount: 0,
            wrap_native: false,
            beneficiary: None,
        }
    }

    pub fn deposit_quote(amount: u128) -> Self {
        Call::DepositQuote {
            amount,
            short_amount: 0,
            wrap_native: false,
            beneficiary: None,
        }
    }

    pub fn withdraw_base(amount: u128) -> Self {
        Call::WithdrawBase {
            amount,
            unwrap_native: false,
        }
    }

    pub fn withdraw_quote(amount: u128) -> Self {
        Call::WithdrawQuote {
            amount,
            unwrap_native: false,
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Call::DepositBase { .. } => "deposit_base",
            Call::DepositQuote { .. } => "deposit_quote",
            Call::WithdrawBase { .. } => "withdraw_base",
            Call::WithdrawQuote { .. } => "withdraw_quote",
            Call::Short { .. } => "short",
            Call::Long { .. } => "long",
            Call::ClosePosition => "close_position",
            Call::Reinit => "reinit",
            Call::Liquidate { .. } => "liquidate",
            Call::Sweep => "sweep",
            Call::SetParameters { .. } => "set_parameters",
        }
    }
}

/// A transfer the pool made out of custody during a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub to: AccountId,
    pub token: Token,
    pub amount: u128,
}

/// Outcome of a successful call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallReceipt {
    /// Positions unwound by deleveraging, during accrual or liquidation.
    pub deleveraged: Vec<AccountId>,
    pub payouts: Vec<Payout>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_json_shape() {
        let call: Call = serde_json::from_str(r#"{ "deposit_quote": { "amount": 1000, "short_amount": 100 } }"#).unwrap();
        assert_eq!(
            call,
            Call::DepositQuote {
                amount: 1_000,
                short_amount: 100,
                wrap_native: false,
                beneficiary: None,
            }
        );
        let close: Call = serde_json::from_str(r#""close_position""#).unwrap();
        assert_eq!(close, Call::ClosePosition);
    }

    #[test]
    fn test_liquidate_target() {
        let call: Call = serde_json::from_str(r#"{ "liquidate": { "target": "bob" } }"#).unwrap();
        assert_eq!(call.name(), "liquidate");
        assert_eq!(call, Call::Liquidate { target: AccountId::new("bob") });
    }
}
