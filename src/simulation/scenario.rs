//! Timed call sequences replayed against a [`SimulatedVenue`].
//!
//! A scenario is plain JSON: pool parameters, the initial price, starting
//! balances and a list of steps, each with a timestamp, an optional new
//! market price, a caller and a call.

use crate::core::account::AccountId;
use crate::core::error::PoolError;
use crate::core::fixed_point::Fp96;
use crate::core::params::MarginlyParams;
use crate::core::token::Token;
use crate::engine::call::{Call, CallReceipt};
use crate::engine::pool::{MarginlyPool, PoolSnapshot};
use crate::simulation::venue::SimulatedVenue;
use chrono::{DateTime, Utc};
use log::{info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub account: AccountId,
    pub token: Token,
    pub amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub at: DateTime<Utc>,
    /// New oracle and swap price, applied before the call.
    #[serde(default)]
    pub price: Option<Decimal>,
    pub caller: AccountId,
    pub call: Call,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub params: MarginlyParams,
    #[serde(default = "default_admin")]
    pub admin: AccountId,
    pub initial_price: Decimal,
    pub start: DateTime<Utc>,
    /// Fee kept by the simulated swap venue, in parts per million.
    #[serde(default)]
    pub venue_fee: u32,
    #[serde(default)]
    pub native_token: Option<Token>,
    #[serde(default)]
    pub balances: Vec<Balance>,
    pub steps: Vec<Step>,
}

fn default_admin() -> AccountId {
    AccountId::new("admin")
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub index: usize,
    pub at: DateTime<Utc>,
    pub caller: AccountId,
    pub call: String,
    pub receipt: Option<CallReceipt>,
    pub error: Option<String>,
}

impl StepOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub outcomes: Vec<StepOutcome>,
    pub final_state: PoolSnapshot,
}

impl ScenarioReport {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_ok()).count()
    }
}

fn unix_seconds(at: &DateTime<Utc>) -> u64 {
    at.timestamp().max(0) as u64
}

impl Scenario {
    /// Builds the pool and venue described by the scenario header.
    pub fn setup(&self) -> Result<(MarginlyPool, SimulatedVenue), PoolError> {
        let price = Fp96::from_decimal(self.initial_price)?;
        let start = unix_seconds(&self.start);
        let pool = MarginlyPool::new(self.admin.clone(), self.params.clone(), price, start)?;
        let mut venue = SimulatedVenue::new(price, start).with_swap_fee(self.venue_fee);
        if let Some(token) = self.native_token {
            venue = venue.with_native(token);
        }
        for b in &self.balances {
            venue.mint(&b.account, b.token, b.amount);
        }
        Ok((pool, venue))
    }

    /// Replays every step. A rejected call is recorded and the replay
    /// continues; only an invalid header aborts.
    pub fn run(&self) -> Result<ScenarioReport, PoolError> {
        let (mut pool, mut venue) = self.setup()?;
        let mut outcomes = Vec::with_capacity(self.steps.len());

        for (index, step) in self.steps.iter().enumerate() {
            venue.set_time(unix_seconds(&step.at));
            if let Some(price) = step.price {
                venue.set_price(Fp96::from_decimal(price)?);
            }
            let name = step.call.name().to_string();
            let outcome = match venue.execute(&mut pool, &step.caller, step.call.clone()) {
                Ok(receipt) => {
                    info!("step {}: {} by {} ok", index, name, step.caller);
                    StepOutcome {
                        index,
                        at: step.at,
                        caller: step.caller.clone(),
                        call: name,
                        receipt: Some(receipt),
                        error: None,
                    }
                }
                Err(e) => {
                    warn!("step {}: {} by {} failed: {}", index, name, step.caller, e);
                    StepOutcome {
                        index,
                        at: step.at,
                        caller: step.caller.clone(),
                        call: name,
                        receipt: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        Ok(ScenarioReport {
            outcomes,
            final_state: pool.snapshot()?,
        })
    }
}
