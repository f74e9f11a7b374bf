//! Interfaces of the collaborators a pool depends on: a reference price
//! oracle, a swap router, token custody and a clock.
//!
//! Each call on these traits is expected to be atomic on its own: a call
//! that returns an error has no effect. The pool orders its calls after
//! all of its own validation.

use crate::core::account::AccountId;
use crate::core::fixed_point::Fp96;
use crate::core::token::Token;
use thiserror::Error;

/// Errors reported by a venue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VenueError {
    #[error("no price available")]
    PriceUnavailable,
    #[error("swap output {actual} below minimum {minimum}")]
    OutputTooLow { actual: u128, minimum: u128 },
    #[error("swap input {actual} above maximum {maximum}")]
    InputTooHigh { actual: u128, maximum: u128 },
    #[error("{holder} holds {available} {token}, needs {requested}")]
    InsufficientFunds {
        holder: String,
        token: Token,
        requested: u128,
        available: u128,
    },
    #[error("{0} is not the native token")]
    NotNative(Token),
    #[error("swap between identical tokens")]
    SameToken,
    #[error("venue arithmetic overflow")]
    Overflow,
}

/// Time-windowed reference price of base in quote units.
pub trait PriceOracle {
    fn base_price(&self, window_seconds: u32) -> Result<Fp96, VenueError>;
}

/// Exact-input and exact-output swaps executed from pool custody.
pub trait SwapRouter {
    /// Sells exactly `amount_in`; fails unless at least `min_amount_out` is received.
    fn swap_exact_input(
        &mut self,
        token_in: Token,
        token_out: Token,
        amount_in: u128,
        min_amount_out: u128,
    ) -> Result<u128, VenueError>;

    /// Buys exactly `amount_out`; fails unless at most `max_amount_in` is spent.
    fn swap_exact_output(
        &mut self,
        token_in: Token,
        token_out: Token,
        max_amount_in: u128,
        amount_out: u128,
    ) -> Result<u128, VenueError>;
}

/// Moves tokens between accounts and pool custody.
pub trait TokenCustody {
    fn transfer_in(
        &mut self,
        from: &AccountId,
        token: Token,
        amount: u128,
        wrap_native: bool,
    ) -> Result<(), VenueError>;

    fn transfer_out(
        &mut self,
        to: &AccountId,
        token: Token,
        amount: u128,
        unwrap_native: bool,
    ) -> Result<(), VenueError>;

    /// Pool balance of `token`.
    fn balance_of(&self, token: Token) -> u128;
}

pub trait Clock {
    /// Current time in seconds.
    fn now(&self) -> u64;
}

/// Everything a pool needs from the outside world.
pub trait Venue: PriceOracle + SwapRouter + TokenCustody + Clock {}

impl<T: PriceOracle + SwapRouter + TokenCustody + Clock> Venue for T {}
