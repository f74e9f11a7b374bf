use crate::core::account::AccountId;
use crate::core::error::PoolError;
use crate::core::fixed_point::{mul_div, Fp96, WHOLE_ONE};
use crate::core::token::Token;
use crate::engine::call::{Call, CallReceipt};
use crate::engine::pool::MarginlyPool;
use crate::venue::{Clock, PriceOracle, SwapRouter, TokenCustody, VenueError};
use std::collections::BTreeMap;

/// Deterministic in-memory venue: a fixed-price swap with unlimited
/// depth, token balances and a manual clock.
///
/// The oracle and swap prices can be set apart to simulate a market that
/// moves away from the reference price.
///
/// # Examples
///
/// ```
/// use margin_engine::prelude::*;
/// use margin_engine::venue::SwapRouter;
///
/// let mut venue = SimulatedVenue::new(Fp96::from_int(2), 0);
/// venue.donate(Token::Base, 10);
/// let out = venue.swap_exact_input(Token::Base, Token::Quote, 10, 20).unwrap();
/// assert_eq!(out, 20);
/// assert_eq!(venue.pool_balance(Token::Quote), 20);
/// ```
#[derive(Debug, Clone)]
pub struct SimulatedVenue {
    oracle_price: Fp96,
    swap_price: Fp96,
    swap_fee: u32,
    native: Option<Token>,
    now: u64,
    pool: BTreeMap<Token, u128>,
    balances: BTreeMap<(AccountId, Token), u128>,
    native_balances: BTreeMap<AccountId, u128>,
}

impl SimulatedVenue {
    pub fn new(price: Fp96, now: u64) -> Self {
        Self {
            oracle_price: price,
            swap_price: price,
            swap_fee: 0,
            native: None,
            now,
            pool: BTreeMap::new(),
            balances: BTreeMap::new(),
            native_balances: BTreeMap::new(),
        }
    }

    /// Marks `token` as the wrapped form of the native asset.
    pub fn with_native(mut self, token: Token) -> Self {
        self.native = Some(token);
        self
    }

    /// Fee kept by the swap venue, in parts per million.
    pub fn with_swap_fee(mut self, ppm: u32) -> Self {
        self.swap_fee = ppm;
        self
    }

    /// Moves both the oracle and the swap price.
    pub fn set_price(&mut self, price: Fp96) {
        self.oracle_price = price;
        self.swap_price = price;
    }

    pub fn set_oracle_price(&mut self, price: Fp96) {
        self.oracle_price = price;
    }

    pub fn set_swap_price(&mut self, price: Fp96) {
        self.swap_price = price;
    }

    pub fn advance(&mut self, seconds: u64) {
        self.now += seconds;
    }

    /// Moves the clock forward to `timestamp`; earlier timestamps are ignored.
    pub fn set_time(&mut self, timestamp: u64) {
        self.now = self.now.max(timestamp);
    }

    pub fn mint(&mut self, account: &AccountId, token: Token, amount: u128) {
        *self.balances.entry((account.clone(), token)).or_default() += amount;
    }

    pub fn mint_native(&mut self, account: &AccountId, amount: u128) {
        *self.native_balances.entry(account.clone()).or_default() += amount;
    }

    /// Sends tokens straight to the pool, outside of any call.
    pub fn donate(&mut self, token: Token, amount: u128) {
        *self.pool.entry(token).or_default() += amount;
    }

    pub fn balance(&self, account: &AccountId, token: Token) -> u128 {
        self.balances
            .get(&(account.clone(), token))
            .copied()
            .unwrap_or(0)
    }

    pub fn native_balance(&self, account: &AccountId) -> u128 {
        self.native_balances.get(account).copied().unwrap_or(0)
    }

    pub fn pool_balance(&self, token: Token) -> u128 {
        self.pool.get(&token).copied().unwrap_or(0)
    }

    /// Runs `call` on `pool` so that a failure leaves both the pool and
    /// this venue untouched.
    pub fn execute(
        &mut self,
        pool: &mut MarginlyPool,
        caller: &AccountId,
        call: Call,
    ) -> Result<CallReceipt, PoolError> {
        let saved = self.clone();
        let result = pool.execute(self, caller, call);
        if result.is_err() {
            *self = saved;
        }
        result
    }

    fn take_from_pool(&mut self, token: Token, amount: u128) -> Result<(), VenueError> {
        let available = self.pool_balance(token);
        if available < amount {
            return Err(VenueError::InsufficientFunds {
                holder: "pool".to_string(),
                token,
                requested: amount,
                available,
            });
        }
        self.pool.insert(token, available - amount);
        Ok(())
    }

    fn convert(&self, token_in: Token, amount_in: u128) -> Result<u128, VenueError> {
        let converted = match token_in {
            Token::Base => self.swap_price.mul_int(amount_in),
            Token::Quote => self.swap_price.recip_mul_int(amount_in),
        };
        converted.map_err(|_| VenueError::Overflow)
    }
}

impl PriceOracle for SimulatedVenue {
    fn base_price(&self, _window_seconds: u32) -> Result<Fp96, VenueError> {
        if self.oracle_price.is_zero() {
            return Err(VenueError::PriceUnavailable);
        }
        Ok(self.oracle_price)
    }
}

impl SwapRouter for SimulatedVenue {
    fn swap_exact_input(
        &mut self,
        token_in: Token,
        token_out: Token,
        amount_in: u128,
        min_amount_out: u128,
    ) -> Result<u128, VenueError> {
        if token_in == token_out {
            return Err(VenueError::SameToken);
        }
        let gross = self.convert(token_in, amount_in)?;
        let fee = mul_div(gross, self.swap_fee as u128, WHOLE_ONE as u128).map_err(|_| VenueError::Overflow)?;
        let amount_out = gross - fee;
        if amount_out < min_amount_out {
            return Err(VenueError::OutputTooLow {
                actual: amount_out,
                minimum: min_amount_out,
            });
        }
        self.take_from_pool(token_in, amount_in)?;
        self.donate(token_out, amount_out);
        Ok(amount_out)
    }

    fn swap_exact_output(
        &mut self,
        token_in: Token,
        token_out: Token,
        max_amount_in: u128,
        amount_out: u128,
    ) -> Result<u128, VenueError> {
        if token_in == token_out {
            return Err(VenueError::SameToken);
        }
        let net_in = match token_in {
            Token::Quote => self.swap_price.mul_int(amount_out),
            Token::Base => self.swap_price.recip_mul_int_ceil(amount_out),
        }
        .map_err(|_| VenueError::Overflow)?;
        let fee = mul_div(net_in, self.swap_fee as u128, WHOLE_ONE as u128).map_err(|_| VenueError::Overflow)?;
        let amount_in = net_in + fee;
        if amount_in > max_amount_in {
            return Err(VenueError::InputTooHigh {
                actual: amount_in,
                maximum: max_amount_in,
            });
        }
        self.take_from_pool(token_in, amount_in)?;
        self.donate(token_out, amount_out);
        Ok(amount_in)
    }
}

impl TokenCustody for SimulatedVenue {
    fn transfer_in(
        &mut self,
        from: &AccountId,
        token: Token,
        amount: u128,
        wrap_native: bool,
    ) -> Result<(), VenueError> {
        let (holder_balance, available) = if wrap_native {
            if self.native != Some(token) {
                return Err(VenueError::NotNative(token));
            }
            let available = self.native_balance(from);
            (self.native_balances.entry(from.clone()).or_default(), available)
        } else {
            let available = self.balance(from, token);
            (self.balances.entry((from.clone(), token)).or_default(), available)
        };
        if available < amount {
            return Err(VenueError::InsufficientFunds {
                holder: from.to_string(),
                token,
                requested: amount,
                available,
            });
        }
        *holder_balance -= amount;
        self.donate(token, amount);
        Ok(())
    }

    fn transfer_out(
        &mut self,
        to: &AccountId,
        token: Token,
        amount: u128,
        unwrap_native: bool,
    ) -> Result<(), VenueError> {
        if unwrap_native && self.native != Some(token) {
            return Err(VenueError::NotNative(token));
        }
        self.take_from_pool(token, amount)?;
        if unwrap_native {
            self.mint_native(to, amount);
        } else {
            self.mint(to, token, amount);
        }
        Ok(())
    }

    fn balance_of(&self, token: Token) -> u128 {
        self.pool_balance(token)
    }
}

impl Clock for SimulatedVenue {
    fn now(&self) -> u64 {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_output_respects_max_in() {
        let mut venue = SimulatedVenue::new(Fp96::from_int(2), 0);
        venue.donate(Token::Quote, 1_000);
        let err = venue
            .swap_exact_output(Token::Quote, Token::Base, 10, 10)
            .unwrap_err();
        assert_eq!(err, VenueError::InputTooHigh { actual: 20, maximum: 10 });
        let spent = venue.swap_exact_output(Token::Quote, Token::Base, 20, 10).unwrap();
        assert_eq!(spent, 20);
        assert_eq!(venue.pool_balance(Token::Base), 10);
        assert_eq!(venue.pool_balance(Token::Quote), 980);
    }

    #[test]
    fn test_swap_fee_reduces_output() {
        let mut venue = SimulatedVenue::new(Fp96::ONE, 0).with_swap_fee(10_000);
        venue.donate(Token::Base, 1_000);
        let out = venue.swap_exact_input(Token::Base, Token::Quote, 1_000, 0).unwrap();
        assert_eq!(out, 990);
    }

    #[test]
    fn test_wrap_requires_native_token() {
        let alice = AccountId::new("alice");
        let mut venue = SimulatedVenue::new(Fp96::ONE, 0).with_native(Token::Base);
        venue.mint_native(&alice, 50);
        assert_eq!(
            venue.transfer_in(&alice, Token::Quote, 10, true),
            Err(VenueError::NotNative(Token::Quote))
        );
        venue.transfer_in(&alice, Token::Base, 50, true).unwrap();
        assert_eq!(venue.native_balance(&alice), 0);
        assert_eq!(venue.pool_balance(Token::Base), 50);

        venue.transfer_out(&alice, Token::Base, 20, true).unwrap();
        assert_eq!(venue.native_balance(&alice), 20);
    }

    #[test]
    fn test_transfer_in_checks_balance() {
        let bob = AccountId::new("bob");
        let mut venue = SimulatedVenue::new(Fp96::ONE, 0);
        venue.mint(&bob, Token::Quote, 5);
        assert!(matches!(
            venue.transfer_in(&bob, Token::Quote, 6, false),
            Err(VenueError::InsufficientFunds { available: 5, .. })
        ));
    }

    #[test]
    fn test_clock_never_goes_back() {
        let mut venue = SimulatedVenue::new(Fp96::ONE, 100);
        venue.set_time(50);
        assert_eq!(venue.now(), 100);
        venue.advance(10);
        assert_eq!(venue.now(), 110);
    }
}
