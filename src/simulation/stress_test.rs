//! Random scenario generation for stress testing a pool.
//!
//! Accounts get funded, seed the pool with deposits and then trade under a
//! random-walk price. Generated scenarios are valid JSON inputs for the CLI
//! `run` command.

use crate::core::account::AccountId;
use crate::core::params::MarginlyParams;
use crate::core::token::Token;
use crate::engine::call::Call;
use crate::simulation::scenario::{Balance, Scenario, Step};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::Rng;
use rust_decimal::Decimal;

/// Configuration for generating a random scenario.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub account_count: usize,
    /// Number of trading steps after the initial deposits.
    pub step_count: usize,
    pub initial_price: Decimal,
    /// Largest relative price move per step, e.g. 0.02 for 2%.
    pub price_volatility: f64,
    /// Seconds between steps.
    pub step_seconds: i64,
    /// Starting balance of each token per account.
    pub funding: u128,
    pub params: MarginlyParams,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            account_count: 10,
            step_count: 100,
            initial_price: Decimal::from(2),
            price_volatility: 0.02,
            step_seconds: 3_600,
            funding: 1_000_000,
            params: MarginlyParams::default(),
        }
    }
}

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

fn random_call<R: Rng>(rng: &mut R, config: &ScenarioConfig, accounts: &[AccountId]) -> Call {
    let size = config.funding / 20;
    let amount = rng.gen_range(config.params.position_min_amount.max(1)..=size.max(2));
    match rng.gen_range(0..10) {
        0 => Call::deposit_base(amount),
        1 => Call::deposit_quote(amount),
        2 => Call::withdraw_base(amount / 2),
        3 => Call::withdraw_quote(amount / 2),
        4 | 5 => Call::Short { amount },
        6 | 7 => Call::Long { amount },
        8 => Call::ClosePosition,
        _ => {
            if rng.gen_bool(0.5) {
                Call::Liquidate {
                    target: accounts[rng.gen_range(0..accounts.len())].clone(),
                }
            } else {
                Call::Reinit
            }
        }
    }
}

/// Generate a random scenario. Many trading steps are expected to be
/// rejected (bad leverage, wrong position type); those still exercise the
/// rollback path.
pub fn generate_random_scenario(config: &ScenarioConfig) -> Scenario {
    let mut rng = rand::thread_rng();
    let start = start_time();

    let accounts: Vec<AccountId> = (0..config.account_count.max(1))
        .map(|i| AccountId::new(format!("ACCOUNT-{:03}", i)))
        .collect();

    let mut balances = Vec::new();
    for account in &accounts {
        for token in Token::ALL {
            balances.push(Balance {
                account: account.clone(),
                token,
                amount: config.funding,
            });
        }
    }

    let mut steps = Vec::new();
    for (i, account) in accounts.iter().enumerate() {
        let call = if i % 2 == 0 {
            Call::deposit_base(config.funding / 2)
        } else {
            Call::deposit_quote(config.funding / 2)
        };
        steps.push(Step {
            at: start,
            price: None,
            caller: account.clone(),
            call,
        });
    }

    let mut price = config.initial_price;
    for n in 1..=config.step_count {
        let shock = rng.gen_range(-config.price_volatility..=config.price_volatility);
        let factor = Decimal::from_f64_retain(1.0 + shock).unwrap_or(Decimal::ONE);
        price = (price * factor).round_dp(8).max(Decimal::new(1, 8));

        let caller = accounts[rng.gen_range(0..accounts.len())].clone();
        steps.push(Step {
            at: start + Duration::seconds(config.step_seconds * n as i64),
            price: Some(price),
            caller,
            call: random_call(&mut rng, config, &accounts),
        });
    }

    Scenario {
        params: config.params.clone(),
        admin: AccountId::new("admin"),
        initial_price: config.initial_price,
        start,
        venue_fee: 0,
        native_token: None,
        balances,
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_scenario_generation() {
        let config = ScenarioConfig {
            account_count: 4,
            step_count: 25,
            ..Default::default()
        };

        let scenario = generate_random_scenario(&config);
        assert_eq!(scenario.balances.len(), 8);
        assert_eq!(scenario.steps.len(), 29);
        assert!(scenario.steps.windows(2).all(|w| w[0].at <= w[1].at));
    }

    #[test]
    fn test_random_scenario_keeps_pool_solvent() {
        let config = ScenarioConfig {
            account_count: 8,
            step_count: 200,
            ..Default::default()
        };

        let scenario = generate_random_scenario(&config);
        let (mut pool, mut venue) = scenario.setup().unwrap();
        for step in &scenario.steps {
            venue.set_time(step.at.timestamp() as u64);
            if let Some(price) = step.price {
                venue.set_price(crate::core::fixed_point::Fp96::from_decimal(price).unwrap());
            }
            let _ = venue.execute(&mut pool, &step.caller, step.call.clone());
            assert!(pool.ledger().is_solvent(16).unwrap());
            assert!(pool.short_heap().is_valid());
            assert!(pool.long_heap().is_valid());
        }
    }
}
