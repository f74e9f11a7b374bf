//! Leverage-ordered max-heaps used to pick deleveraging and liquidation
//! candidates.

pub mod leverage_heap;
