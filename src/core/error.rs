use crate::core::account::AccountId;
use crate::core::fixed_point::MathError;
use crate::core::token::Token;
use crate::heap::leverage_heap::HeapError;
use crate::venue::VenueError;
use thiserror::Error;

/// Reasons a pool call is rejected.
///
/// Any error aborts the whole call: the pool state observed afterwards is
/// the state before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("amount must be non-zero")]
    ZeroAmount,
    #[error("{token} collateral limit exceeded: {requested} > {limit}")]
    LimitExceeded {
        token: Token,
        requested: u128,
        limit: u128,
    },
    #[error("operation not allowed for the current position type")]
    WrongPositionType,
    #[error("account {0} has no position")]
    UninitializedPosition(AccountId),
    #[error("amount {amount} below position minimum {min}")]
    MinAmountViolation { amount: u128, min: u128 },
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: u128, available: u128 },
    #[error("insufficient {token} liquidity in the pool")]
    InsufficientLiquidity { token: Token },
    #[error("position leverage would exceed the configured maximum")]
    BadLeverage,
    #[error("position of {0} is within leverage bounds")]
    NotLiquidatable(AccountId),
    #[error("swap result {actual} violates bound {bound}")]
    SlippageExceeded { actual: u128, bound: u128 },
    #[error("caller {0} is not authorized")]
    Unauthorized(AccountId),
    #[error("pool is locked by a call in progress")]
    Locked,
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("no counterparty debt to absorb the position")]
    NoCounterparty,
    #[error(transparent)]
    Math(#[from] MathError),
    #[error(transparent)]
    Heap(#[from] HeapError),
    #[error(transparent)]
    Venue(#[from] VenueError),
}
