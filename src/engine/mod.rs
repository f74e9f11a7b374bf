//! The pool: call orchestration, interest accrual, deleveraging and the
//! position handlers.

pub mod accrual;
pub mod call;
pub mod deleverage;
mod governance;
mod liquidation;
pub mod pool;
pub mod state;
mod trading;
