//! margin-engine CLI
//!
//! Replays pool scenarios and produces random ones.
//!
//! ```bash
//! margin-engine run scenario.json
//! margin-engine run scenario.json --json
//! margin-engine generate --accounts 10 --steps 200 --output stress.json
//! ```

use margin_engine::simulation::scenario::{Scenario, ScenarioReport};
use margin_engine::simulation::stress_test::{generate_random_scenario, ScenarioConfig};
use std::collections::BTreeMap;
use std::fs;
use std::process;

const USAGE: &str = r#"Replays calls against a margin lending pool.

usage:
    margin-engine run <SCENARIO.json> [--json]
    margin-engine generate [--accounts N] [--steps N] [--output FILE]
    margin-engine help

run prints one line per step followed by the final pool state; --json
emits the whole report instead. generate writes a random scenario that
run accepts. RUST_LOG=info logs every call and accrual."#;

/// Flags given as `--name value` or bare `--name`, plus positional args.
#[derive(Debug, Default)]
struct Flags {
    values: BTreeMap<String, String>,
    switches: Vec<String>,
    positional: Vec<String>,
}

impl Flags {
    fn parse(args: &[String], with_value: &[&str], switches: &[&str]) -> Result<Self, String> {
        let mut flags = Flags::default();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let Some(name) = arg.strip_prefix("--") else {
                flags.positional.push(arg.clone());
                continue;
            };
            if switches.contains(&name) {
                flags.switches.push(name.to_string());
            } else if with_value.contains(&name) {
                let value = iter.next().ok_or_else(|| format!("--{} needs a value", name))?;
                flags.values.insert(name.to_string(), value.clone());
            } else {
                return Err(format!("unrecognised flag --{}", name));
            }
        }
        Ok(flags)
    }

    fn number(&self, name: &str, default: usize) -> Result<usize, String> {
        match self.values.get(name) {
            Some(raw) => raw
                .parse()
                .map_err(|_| format!("--{} expects a whole number, got '{}'", name, raw)),
            None => Ok(default),
        }
    }

    fn has(&self, switch: &str) -> bool {
        self.switches.iter().any(|s| s == switch)
    }
}

fn print_report(report: &ScenarioReport) {
    for outcome in &report.outcomes {
        let status = match &outcome.error {
            None => "ok".to_string(),
            Some(e) => format!("rejected: {}", e),
        };
        println!(
            "#{:<4} {} {:<16} {:<14} {}",
            outcome.index,
            outcome.at.format("%Y-%m-%d %H:%M:%S"),
            outcome.caller.as_str(),
            outcome.call,
            status
        );
        if let Some(receipt) = &outcome.receipt {
            for account in &receipt.deleveraged {
                println!("      deleveraged {}", account);
            }
            for payout in &receipt.payouts {
                println!("      paid {} {} to {}", payout.amount, payout.token, payout.to);
            }
        }
    }
    println!(
        "\n{} steps, {} rejected\n",
        report.outcomes.len(),
        report.failures()
    );
    println!("{}", report.final_state);
}

fn cmd_run(args: &[String]) -> Result<(), String> {
    let flags = Flags::parse(args, &[], &["json"])?;
    let path = match flags.positional.as_slice() {
        [path] => path,
        [] => return Err("run needs a scenario file".to_string()),
        _ => return Err("run takes a single scenario file".to_string()),
    };

    let content = fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path, e))?;
    let scenario: Scenario =
        serde_json::from_str(&content).map_err(|e| format!("{} is not a valid scenario: {}", path, e))?;
    let report = scenario.run().map_err(|e| format!("pool setup failed: {}", e))?;

    if flags.has("json") {
        let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
        println!("{}", json);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn cmd_generate(args: &[String]) -> Result<(), String> {
    let flags = Flags::parse(args, &["accounts", "steps", "output"], &[])?;
    if let Some(extra) = flags.positional.first() {
        return Err(format!("unexpected argument '{}'", extra));
    }
    let defaults = ScenarioConfig::default();
    let config = ScenarioConfig {
        account_count: flags.number("accounts", defaults.account_count)?,
        step_count: flags.number("steps", defaults.step_count)?,
        ..defaults
    };

    let scenario = generate_random_scenario(&config);
    let json = serde_json::to_string_pretty(&scenario).map_err(|e| e.to_string())?;
    match flags.values.get("output") {
        Some(path) => {
            fs::write(path, &json).map_err(|e| format!("cannot write {}: {}", path, e))?;
            eprintln!(
                "wrote {} steps for {} accounts to {}",
                scenario.steps.len(),
                config.account_count,
                path
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().skip(1).collect();

    let result = match args.first().map(String::as_str) {
        Some("run") => cmd_run(&args[1..]),
        Some("generate") => cmd_generate(&args[1..]),
        Some("help" | "--help" | "-h") => {
            println!("{}", USAGE);
            Ok(())
        }
        Some(other) => Err(format!("unknown command '{}'\n\n{}", other, USAGE)),
        None => Err(USAGE.to_string()),
    };

    if let Err(message) = result {
        eprintln!("margin-engine: {}", message);
        process::exit(2);
    }
}
