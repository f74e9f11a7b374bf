use crate::core::fixed_point::{Fp96, MathError};
use crate::core::position::{Position, PositionType};
use crate::core::token::Token;
use serde::{Deserialize, Serialize};

/// Leverage reported for a pool side whose debt meets or exceeds its collateral.
pub const MAX_SYSTEM_LEVERAGE: u128 = 1_000;

/// Coefficients and discounted aggregates of one token.
///
/// Real collateral of the token is
/// `collateral_coeff · discounted_collateral − delev_coeff · D`, where `D`
/// is the discounted debt of the *other* token: the positions that borrow
/// the other token are the ones holding this token as collateral, and
/// deleveraging haircuts them in proportion to their debt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBook {
    pub collateral_coeff: Fp96,
    pub debt_coeff: Fp96,
    pub delev_coeff: Fp96,
    pub discounted_collateral: u128,
    pub discounted_debt: u128,
}

impl Default for TokenBook {
    fn default() -> Self {
        Self {
            collateral_coeff: Fp96::ONE,
            debt_coeff: Fp96::ONE,
            delev_coeff: Fp96::ZERO,
            discounted_collateral: 0,
            discounted_debt: 0,
        }
    }
}

/// Aggregate leverage of each pool side, `collateral / (collateral − debt)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemLeverage {
    pub short_x96: Fp96,
    pub long_x96: Fp96,
}

impl Default for SystemLeverage {
    fn default() -> Self {
        Self {
            short_x96: Fp96::ONE,
            long_x96: Fp96::ONE,
        }
    }
}

/// Pool-wide accounting state.
///
/// Every position amount is stored discounted; this struct holds the
/// multipliers that turn discounted amounts into real token amounts, so
/// accrual touches a handful of fields regardless of the number of
/// positions. All conversions read the current coefficients: a real
/// amount computed before a coefficient change is stale afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub base: TokenBook,
    pub quote: TokenBook,
    pub last_reinit_timestamp: u64,
    pub system_leverage: SystemLeverage,
}

impl Ledger {
    pub fn new(created_at: u64) -> Self {
        Self {
            base: TokenBook::default(),
            quote: TokenBook::default(),
            last_reinit_timestamp: created_at,
            system_leverage: SystemLeverage::default(),
        }
    }

    pub fn book(&self, token: Token) -> &TokenBook {
        match token {
            Token::Base => &self.base,
            Token::Quote => &self.quote,
        }
    }

    pub fn book_mut(&mut self, token: Token) -> &mut TokenBook {
        match token {
            Token::Base => &mut self.base,
            Token::Quote => &mut self.quote,
        }
    }

    /// Total real collateral of `token` owed to depositors.
    pub fn real_collateral(&self, token: Token) -> Result<u128, MathError> {
        let book = self.book(token);
        let gross = book.collateral_coeff.mul_int(book.discounted_collateral)?;
        let haircut = book
            .delev_coeff
            .mul_int(self.book(token.other()).discounted_debt)?;
        Ok(gross.saturating_sub(haircut))
    }

    /// Total real debt of `token` owed by borrowers.
    pub fn real_debt(&self, token: Token) -> Result<u128, MathError> {
        let book = self.book(token);
        book.debt_coeff.mul_int(book.discounted_debt)
    }

    /// Real collateral of one position in `token`; zero on its debt side.
    pub fn position_collateral(&self, position: &Position, token: Token) -> Result<u128, MathError> {
        let book = self.book(token);
        match position.position_type {
            PositionType::Uninitialized => Ok(0),
            PositionType::Lend => book.collateral_coeff.mul_int(position.amount(token)),
            PositionType::Short | PositionType::Long => {
                if position.is_debt(token) {
                    return Ok(0);
                }
                let gross = book.collateral_coeff.mul_int(position.amount(token))?;
                let haircut = book.delev_coeff.mul_int(position.amount(token.other()))?;
                Ok(gross.saturating_sub(haircut))
            }
        }
    }

    /// Real debt of one position in `token`; zero on its collateral side.
    pub fn position_debt(&self, position: &Position, token: Token) -> Result<u128, MathError> {
        if position.is_debt(token) {
            self.book(token).debt_coeff.mul_int(position.amount(token))
        } else {
            Ok(0)
        }
    }

    /// Books `real` of new collateral and returns its discounted amount.
    pub fn deposit_collateral(&mut self, token: Token, real: u128) -> Result<u128, MathError> {
        let book = self.book_mut(token);
        let discounted = book.collateral_coeff.recip_mul_int(real)?;
        book.discounted_collateral = checked_add(book.discounted_collateral, discounted)?;
        Ok(discounted)
    }

    /// Removes `real` of collateral from a holder of `available`
    /// discounted units. Rounds against the holder.
    pub fn withdraw_collateral(
        &mut self,
        token: Token,
        real: u128,
        available: u128,
    ) -> Result<u128, MathError> {
        let book = self.book_mut(token);
        let discounted = book.collateral_coeff.recip_mul_int_ceil(real)?.min(available);
        book.discounted_collateral = book.discounted_collateral.saturating_sub(discounted);
        Ok(discounted)
    }

    /// Books `real` of new debt and returns its discounted amount.
    /// Rounds against the borrower.
    pub fn borrow(&mut self, token: Token, real: u128) -> Result<u128, MathError> {
        let book = self.book_mut(token);
        let discounted = book.debt_coeff.recip_mul_int_ceil(real)?;
        book.discounted_debt = checked_add(book.discounted_debt, discounted)?;
        Ok(discounted)
    }

    /// Repays up to `real` of a debt of `owed` discounted units and returns
    /// the discounted amount cleared. Paying at least the real debt clears
    /// it entirely.
    pub fn repay(&mut self, token: Token, real: u128, owed: u128) -> Result<u128, MathError> {
        let book = self.book_mut(token);
        let discounted = if real >= book.debt_coeff.mul_int(owed)? {
            owed
        } else {
            book.debt_coeff.recip_mul_int(real)?.min(owed)
        };
        book.discounted_debt = book.discounted_debt.saturating_sub(discounted);
        Ok(discounted)
    }

    /// Discounted collateral that keeps a debtor's real collateral unchanged
    /// when its discounted debt of `debt_token` moves by `debt_delta`.
    pub fn delev_compensation(&self, debt_token: Token, debt_delta: u128) -> Result<u128, MathError> {
        let book = self.book(debt_token.other());
        if book.delev_coeff.is_zero() || debt_delta == 0 {
            return Ok(0);
        }
        book.collateral_coeff
            .recip_mul_int(book.delev_coeff.mul_int(debt_delta)?)
    }

    /// Leverage of both sides at `price`.
    ///
    /// A side without debt has leverage one; a side whose debt value meets
    /// its collateral reports [`MAX_SYSTEM_LEVERAGE`].
    pub fn compute_system_leverage(&self, price: Fp96) -> Result<SystemLeverage, MathError> {
        let real_quote_collateral = self.real_collateral(Token::Quote)?;
        let real_base_debt = self.real_debt(Token::Base)?;
        let short_x96 = side_leverage(real_quote_collateral, price.mul_int(real_base_debt)?, real_base_debt == 0)?;

        let real_quote_debt = self.real_debt(Token::Quote)?;
        let base_collateral_value = price.mul_int(self.real_collateral(Token::Base)?)?;
        let long_x96 = side_leverage(base_collateral_value, real_quote_debt, real_quote_debt == 0)?;

        Ok(SystemLeverage { short_x96, long_x96 })
    }

    /// `real collateral ≥ real debt` for both tokens, allowing `tolerance`
    /// units of rounding.
    pub fn is_solvent(&self, tolerance: u128) -> Result<bool, MathError> {
        for token in Token::ALL {
            if self.real_collateral(token)?.saturating_add(tolerance) < self.real_debt(token)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn side_leverage(collateral: u128, debt: u128, no_debt: bool) -> Result<Fp96, MathError> {
    let cap = Fp96::from_int(MAX_SYSTEM_LEVERAGE);
    if no_debt {
        return Ok(Fp96::ONE);
    }
    if collateral <= debt {
        return Ok(cap);
    }
    Ok(Fp96::from_ratio(collateral, collateral - debt)?.min(cap))
}

fn checked_add(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short(base_debt: u128, quote_collateral: u128) -> Position {
        Position {
            position_type: PositionType::Short,
            discounted_base_amount: base_debt,
            discounted_quote_amount: quote_collateral,
            heap_slot: None,
        }
    }

    #[test]
    fn test_first_deposit_is_one_to_one() {
        let mut ledger = Ledger::new(0);
        let discounted = ledger.deposit_collateral(Token::Base, 1_000).unwrap();
        assert_eq!(discounted, 1_000);
        assert_eq!(ledger.base.discounted_collateral, 1_000);
        assert_eq!(ledger.real_collateral(Token::Base).unwrap(), 1_000);
    }

    #[test]
    fn test_coefficient_scales_real_amounts() {
        let mut ledger = Ledger::new(0);
        ledger.deposit_collateral(Token::Quote, 1_000).unwrap();
        ledger.quote.collateral_coeff = Fp96::from_ratio(5, 4).unwrap();
        assert_eq!(ledger.real_collateral(Token::Quote).unwrap(), 1_250);
        // New deposits buy fewer discounted units.
        assert_eq!(ledger.deposit_collateral(Token::Quote, 1_250).unwrap(), 1_000);
    }

    #[test]
    fn test_withdraw_rounds_against_holder() {
        let mut ledger = Ledger::new(0);
        ledger.deposit_collateral(Token::Base, 1_000).unwrap();
        ledger.base.collateral_coeff = Fp96::from_int(3);
        let removed = ledger.withdraw_collateral(Token::Base, 10, 1_000).unwrap();
        assert_eq!(removed, 4);
        assert_eq!(ledger.base.discounted_collateral, 996);
    }

    #[test]
    fn test_repay_full_clears_dust() {
        let mut ledger = Ledger::new(0);
        ledger.base.debt_coeff = Fp96::from_ratio(7, 3).unwrap();
        let owed = ledger.borrow(Token::Base, 100).unwrap();
        let real = ledger.real_debt(Token::Base).unwrap();
        let cleared = ledger.repay(Token::Base, real, owed).unwrap();
        assert_eq!(cleared, owed);
        assert_eq!(ledger.base.discounted_debt, 0);
    }

    #[test]
    fn test_position_haircut() {
        let mut ledger = Ledger::new(0);
        ledger.quote.delev_coeff = Fp96::from_int(2);
        let pos = short(10, 100);
        assert_eq!(ledger.position_collateral(&pos, Token::Quote).unwrap(), 80);
        assert_eq!(ledger.position_collateral(&pos, Token::Base).unwrap(), 0);
        assert_eq!(ledger.position_debt(&pos, Token::Base).unwrap(), 10);
        assert_eq!(ledger.delev_compensation(Token::Base, 5).unwrap(), 10);
    }

    #[test]
    fn test_system_leverage() {
        let mut ledger = Ledger::new(0);
        let price = Fp96::from_int(2);
        assert_eq!(ledger.compute_system_leverage(price).unwrap(), SystemLeverage::default());

        ledger.deposit_collateral(Token::Quote, 1_000).unwrap();
        ledger.deposit_collateral(Token::Base, 1_000).unwrap();
        ledger.borrow(Token::Base, 250).unwrap();
        // 1000 / (1000 - 500) = 2
        let lev = ledger.compute_system_leverage(price).unwrap();
        assert_eq!(lev.short_x96, Fp96::from_int(2));
        assert_eq!(lev.long_x96, Fp96::ONE);

        ledger.borrow(Token::Base, 250).unwrap();
        let lev = ledger.compute_system_leverage(price).unwrap();
        assert_eq!(lev.short_x96, Fp96::from_int(MAX_SYSTEM_LEVERAGE));
    }

    #[test]
    fn test_solvency_check() {
        let mut ledger = Ledger::new(0);
        ledger.deposit_collateral(Token::Base, 100).unwrap();
        ledger.borrow(Token::Base, 100).unwrap();
        assert!(ledger.is_solvent(0).unwrap());
        ledger.base.debt_coeff = Fp96::from_int(2);
        assert!(!ledger.is_solvent(1).unwrap());
    }
}
