//! Foundational types: fixed-point math, tokens, accounts, positions,
//! the discounted ledger and the error taxonomy.

pub mod account;
pub mod error;
pub mod fixed_point;
pub mod ledger;
pub mod params;
pub mod position;
pub mod registry;
pub mod token;
