//! # margin-engine
//!
//! Margin lending pool over a base/quote token pair.
//!
//! Lenders deposit either token; traders borrow one token against the
//! other to hold leveraged Short or Long positions. Balances are stored in
//! discounted units so that interest accrual touches a handful of pool
//! coefficients instead of every position.
//!
//! ## Architecture
//!
//! - **core** — Fixed-point math, tokens, positions, the discounted ledger, errors
//! - **heap** — Leverage max-heaps with position back-references
//! - **venue** — Oracle, swap router, token custody and clock interfaces
//! - **engine** — The pool: accrual, deleveraging, trading, liquidation, governance
//! - **simulation** — In-memory venue, scenario replay and random stress scenarios

pub mod core;
pub mod engine;
pub mod heap;
pub mod simulation;
pub mod venue;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::core::account::AccountId;
    pub use crate::core::error::PoolError;
    pub use crate::core::fixed_point::{Fp96, SortKey};
    pub use crate::core::ledger::Ledger;
    pub use crate::core::params::MarginlyParams;
    pub use crate::core::position::{Position, PositionType};
    pub use crate::core::token::Token;
    pub use crate::engine::call::{Call, CallReceipt};
    pub use crate::engine::pool::MarginlyPool;
    pub use crate::heap::leverage_heap::LeverageHeap;
    pub use crate::simulation::scenario::Scenario;
    pub use crate::simulation::venue::SimulatedVenue;
    pub use crate::venue::{Clock, PriceOracle, SwapRouter, TokenCustody};
}
