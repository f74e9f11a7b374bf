use primitive_types::{U256, U512};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Denominator of every parts-per-million parameter (rates, fees, slippage).
pub const WHOLE_ONE: u32 = 1_000_000;

/// Seconds in a Julian year (365.25 days), the period of `interest_rate`.
pub const SECONDS_IN_YEAR: u64 = 31_557_600;

/// Number of terms beyond the leading `1` kept by [`Fp96::pow_taylor`].
pub const TAYLOR_TERMS: u64 = 3;

const Q96: usize = 96;
const Q48: usize = 48;

/// Errors arising from fixed-point arithmetic.
///
/// Arithmetic failures are never saturated: they abort the operation
/// that triggered them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("fixed-point overflow")]
    Overflow,
    #[error("fixed-point underflow")]
    Underflow,
    #[error("division by zero")]
    DivisionByZero,
    #[error("taylor expansion requires a base in [1, 2)")]
    TaylorDomain,
}

fn narrow(wide: U512) -> Result<U256, MathError> {
    let U512(words) = wide;
    if words[4..].iter().any(|w| *w != 0) {
        return Err(MathError::Overflow);
    }
    Ok(U256([words[0], words[1], words[2], words[3]]))
}

fn to_u128(value: U256) -> Result<u128, MathError> {
    if value.bits() > 128 {
        Err(MathError::Overflow)
    } else {
        Ok(value.low_u128())
    }
}

/// `floor(a * b / den)` without intermediate overflow.
pub fn mul_div(a: u128, b: u128, den: u128) -> Result<u128, MathError> {
    if den == 0 {
        return Err(MathError::DivisionByZero);
    }
    to_u128(U256::from(a) * U256::from(b) / U256::from(den))
}

/// Unsigned binary fixed-point number with 96 fractional bits.
///
/// Coefficients, prices and leverage values are all `Fp96`. Token
/// amounts stay plain `u128` integers and are scaled with
/// [`Fp96::mul_int`] / [`Fp96::recip_mul_int`]. Products and quotients
/// are computed in 512 bits and narrowed back with an overflow check.
///
/// # Examples
///
/// ```
/// use margin_engine::core::fixed_point::Fp96;
///
/// let price = Fp96::from_ratio(3, 2).unwrap();
/// assert_eq!(price.mul_int(1_000).unwrap(), 1_500);
/// assert_eq!(price.recip_mul_int(1_500).unwrap(), 1_000);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fp96(U256);

impl Fp96 {
    pub const ZERO: Fp96 = Fp96(U256([0, 0, 0, 0]));
    pub const ONE: Fp96 = Fp96(U256([0, 1 << 32, 0, 0]));

    pub const fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> U256 {
        self.0
    }

    pub fn from_int(value: u128) -> Self {
        Self(U256::from(value) << Q96)
    }

    /// `num / den`, floored.
    pub fn from_ratio(num: u128, den: u128) -> Result<Self, MathError> {
        if den == 0 {
            return Err(MathError::DivisionByZero);
        }
        Ok(Self((U256::from(num) << Q96) / U256::from(den)))
    }

    /// A parts-per-million parameter as a fraction of one.
    pub fn from_ppm(ppm: u32) -> Self {
        Self((U256::from(ppm) << Q96) / U256::from(WHOLE_ONE))
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, MathError> {
        self.0.checked_add(rhs.0).map(Self).ok_or(MathError::Overflow)
    }

    pub fn checked_sub(self, rhs: Self) -> Result<Self, MathError> {
        self.0.checked_sub(rhs.0).map(Self).ok_or(MathError::Underflow)
    }

    /// `self * rhs`, floored.
    pub fn checked_mul(self, rhs: Self) -> Result<Self, MathError> {
        narrow(self.0.full_mul(rhs.0) >> Q96).map(Self)
    }

    /// `self / rhs`, floored.
    pub fn checked_div(self, rhs: Self) -> Result<Self, MathError> {
        if rhs.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        narrow(self.0.full_mul(Self::ONE.0) / U512::from(rhs.0)).map(Self)
    }

    /// Multiply by a plain integer, keeping the fixed-point scale.
    pub fn scale(self, factor: u64) -> Result<Self, MathError> {
        self.0
            .checked_mul(U256::from(factor))
            .map(Self)
            .ok_or(MathError::Overflow)
    }

    /// Divide by a plain integer, floored.
    pub fn div_int(self, divisor: u64) -> Result<Self, MathError> {
        if divisor == 0 {
            return Err(MathError::DivisionByZero);
        }
        Ok(Self(self.0 / U256::from(divisor)))
    }

    pub(crate) fn mul_int_wide(self, amount: u128) -> Result<U256, MathError> {
        narrow(self.0.full_mul(U256::from(amount)) >> Q96)
    }

    /// `floor(self * amount)` as a token amount.
    pub fn mul_int(self, amount: u128) -> Result<u128, MathError> {
        to_u128(self.mul_int_wide(amount)?)
    }

    /// `floor(amount / self)` as a token amount.
    pub fn recip_mul_int(self, amount: u128) -> Result<u128, MathError> {
        if self.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        to_u128((U256::from(amount) << Q96) / self.0)
    }

    /// `ceil(amount / self)` as a token amount.
    pub fn recip_mul_int_ceil(self, amount: u128) -> Result<u128, MathError> {
        if self.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        let (quotient, remainder) = (U256::from(amount) << Q96).div_mod(self.0);
        if remainder.is_zero() {
            to_u128(quotient)
        } else {
            to_u128(quotient + U256::one())
        }
    }

    /// Approximates `self ^ exponent` for a base in `[1, 2)`.
    ///
    /// Evaluates the binomial expansion of `(1 + x)^n` truncated after
    /// [`TAYLOR_TERMS`] terms beyond `1`:
    ///
    /// `1 + n·x + n(n-1)·x²/2 + n(n-1)(n-2)·x³/6`
    ///
    /// The result is exact (up to flooring) for `n <= 3` and otherwise
    /// underestimates the true power by at most the first omitted term,
    /// `C(n,4)·x⁴ <= (n·x)⁴ / 24` in relative terms. For one year of
    /// per-second compounding at an effective 10% annual rate this is
    /// about `4.2e-6`.
    pub fn pow_taylor(self, exponent: u64) -> Result<Self, MathError> {
        if self < Self::ONE || self >= Self::from_int(2) {
            return Err(MathError::TaylorDomain);
        }
        let x = self.checked_sub(Self::ONE)?;
        let mut result = Self::ONE;
        let mut term = Self::ONE;
        for k in 0..TAYLOR_TERMS {
            if exponent <= k {
                break;
            }
            term = term.checked_mul(x)?.scale(exponent - k)?.div_int(k + 1)?;
            result = result.checked_add(term)?;
        }
        Ok(result)
    }

    /// Converts to a `Decimal`, keeping as many fractional digits as fit.
    pub fn to_decimal(self) -> Result<Decimal, MathError> {
        let mut scale = 28u32;
        loop {
            let scaled = narrow(self.0.full_mul(U256::exp10(scale as usize)) >> Q96)?;
            if scaled.bits() <= 96 {
                return Ok(Decimal::from_i128_with_scale(scaled.low_u128() as i128, scale).normalize());
            }
            if scale == 0 {
                return Err(MathError::Overflow);
            }
            scale -= 1;
        }
    }

    pub fn from_decimal(value: Decimal) -> Result<Self, MathError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MathError::Underflow);
        }
        let mantissa = U256::from(value.mantissa().unsigned_abs());
        Ok(Self((mantissa << Q96) / U256::exp10(value.scale() as usize)))
    }

    /// Lossy conversion used for reporting and float comparisons.
    pub fn to_f64(self) -> f64 {
        let int_part = self.0 >> Q96;
        if int_part.bits() > 128 {
            return f64::INFINITY;
        }
        let frac_mask = (U256::one() << Q96) - U256::one();
        let frac = (self.0 & frac_mask).low_u128();
        int_part.low_u128() as f64 + frac as f64 / 2f64.powi(Q96 as i32)
    }
}

impl fmt::Display for Fp96 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_decimal() {
            Ok(d) => write!(f, "{}", d),
            Err(_) => write!(f, "{:#x}/2^96", self.0),
        }
    }
}

/// Leverage proxy with 48 fractional bits used to rank positions in a
/// [`LeverageHeap`](crate::heap::leverage_heap::LeverageHeap).
///
/// Keys are computed from discounted amounts, so a key stays valid while
/// coefficients accrue. A position with no collateral ranks above all
/// others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortKey(U256);

impl SortKey {
    pub const MAX: SortKey = SortKey(U256::MAX);

    pub const fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> U256 {
        self.0
    }

    /// `(P · discounted_base_debt / ONE) · Q48 / discounted_quote_collateral`
    pub fn short(
        price: Fp96,
        discounted_base_debt: u128,
        discounted_quote_collateral: u128,
    ) -> Result<Self, MathError> {
        if discounted_quote_collateral == 0 {
            return Ok(Self::MAX);
        }
        let debt_value = price.mul_int_wide(discounted_base_debt)?;
        narrow((U512::from(debt_value) << Q48) / U512::from(discounted_quote_collateral)).map(Self)
    }

    /// `discounted_quote_debt · Q48 / (P · discounted_base_collateral / ONE)`
    pub fn long(
        price: Fp96,
        discounted_base_collateral: u128,
        discounted_quote_debt: u128,
    ) -> Result<Self, MathError> {
        let collateral_value = price.mul_int_wide(discounted_base_collateral)?;
        if collateral_value.is_zero() {
            return Ok(Self::MAX);
        }
        Ok(Self((U256::from(discounted_quote_debt) << Q48) / collateral_value))
    }

    pub fn to_f64(self) -> f64 {
        let int_part = self.0 >> Q48;
        if int_part.bits() > 128 {
            return f64::INFINITY;
        }
        let frac = (self.0 & ((U256::one() << Q48) - U256::one())).low_u128();
        int_part.low_u128() as f64 + frac as f64 / 2f64.powi(Q48 as i32)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.to_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rust_decimal_macros::dec;

    fn decimal_pow(base: Decimal, mut exponent: u64) -> Decimal {
        let mut result = Decimal::ONE;
        let mut acc = base;
        while exponent > 0 {
            if exponent & 1 == 1 {
                result *= acc;
            }
            acc *= acc;
            exponent >>= 1;
        }
        result
    }

    #[test]
    fn test_one_is_two_pow_96() {
        assert_eq!(Fp96::ONE.raw(), U256::one() << 96);
        assert_eq!(Fp96::from_int(1), Fp96::ONE);
    }

    #[test]
    fn test_mul_and_div_floor() {
        let third = Fp96::from_ratio(1, 3).unwrap();
        let two = Fp96::from_int(2);
        assert!(third.checked_mul(Fp96::from_int(3)).unwrap() < Fp96::ONE);
        assert_eq!(two.checked_div(two).unwrap(), Fp96::ONE);
        assert_eq!(Fp96::from_int(7).mul_int(3).unwrap(), 21);
        assert_eq!(third.mul_int(10).unwrap(), 3);
    }

    #[test]
    fn test_overflow_is_reported() {
        let huge = Fp96::from_raw(U256::MAX);
        assert_eq!(huge.checked_mul(Fp96::from_int(2)), Err(MathError::Overflow));
        assert_eq!(huge.checked_add(Fp96::ONE), Err(MathError::Overflow));
        assert_eq!(Fp96::from_int(u128::MAX).mul_int(2), Err(MathError::Overflow));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(Fp96::ONE.checked_div(Fp96::ZERO), Err(MathError::DivisionByZero));
        assert_eq!(Fp96::ZERO.recip_mul_int(5), Err(MathError::DivisionByZero));
        assert_eq!(Fp96::from_ratio(1, 0), Err(MathError::DivisionByZero));
        assert_eq!(mul_div(1, 2, 0), Err(MathError::DivisionByZero));
    }

    #[test]
    fn test_underflow() {
        assert_eq!(Fp96::ZERO.checked_sub(Fp96::ONE), Err(MathError::Underflow));
    }

    #[test]
    fn test_recip_ceil_rounds_up() {
        let three = Fp96::from_int(3);
        assert_eq!(three.recip_mul_int(10).unwrap(), 3);
        assert_eq!(three.recip_mul_int_ceil(10).unwrap(), 4);
        assert_eq!(three.recip_mul_int_ceil(9).unwrap(), 3);
    }

    #[test]
    fn test_from_ppm() {
        assert_eq!(Fp96::from_ppm(WHOLE_ONE), Fp96::ONE);
        assert_eq!(Fp96::from_ppm(500_000).mul_int(1_000_000).unwrap(), 500_000);
    }

    #[test]
    fn test_pow_taylor_exact_small_exponents() {
        let base = Fp96::from_ratio(11, 10).unwrap();
        assert_eq!(base.pow_taylor(0).unwrap(), Fp96::ONE);
        assert_eq!(base.pow_taylor(1).unwrap(), base);
        let cubed = base.pow_taylor(3).unwrap().to_decimal().unwrap();
        assert!((cubed - dec!(1.331)).abs() < dec!(0.000000000000000001));
    }

    #[test]
    fn test_pow_taylor_domain() {
        assert_eq!(Fp96::from_ratio(1, 2).unwrap().pow_taylor(10), Err(MathError::TaylorDomain));
        assert_eq!(Fp96::from_int(2).pow_taylor(10), Err(MathError::TaylorDomain));
        assert_eq!(Fp96::ONE.pow_taylor(1_000_000).unwrap(), Fp96::ONE);
    }

    #[test]
    fn test_pow_taylor_against_decimal_reference() {
        // 10% nominal over a year, compounded per second.
        let per_second = Fp96::ONE
            .checked_add(Fp96::from_ratio(1, 10 * SECONDS_IN_YEAR as u128).unwrap())
            .unwrap();
        let approx = per_second.pow_taylor(SECONDS_IN_YEAR).unwrap();

        let base_dec = per_second.to_decimal().unwrap();
        let reference = decimal_pow(base_dec, SECONDS_IN_YEAR);

        let approx_f = approx.to_f64();
        let reference_f: f64 = reference.to_string().parse().unwrap();
        assert!(approx_f <= reference_f);
        // Bound: (n·x)^4 / 24 relative.
        assert_relative_eq!(approx_f, reference_f, max_relative = 5e-6);
        assert!(reference_f - approx_f > 1e-7);
    }

    #[test]
    fn test_pow_taylor_short_interval_is_tight() {
        let per_second = Fp96::ONE
            .checked_add(Fp96::from_ratio(54_000, WHOLE_ONE as u128 * SECONDS_IN_YEAR as u128).unwrap())
            .unwrap();
        let approx = per_second.pow_taylor(86_400).unwrap().to_f64();
        let reference: f64 = decimal_pow(per_second.to_decimal().unwrap(), 86_400)
            .to_string()
            .parse()
            .unwrap();
        assert_relative_eq!(approx, reference, max_relative = 1e-12);
    }

    #[test]
    fn test_decimal_conversion() {
        let price = Fp96::from_decimal(dec!(1500.25)).unwrap();
        assert_eq!(price.to_decimal().unwrap(), dec!(1500.25));
        assert_eq!(Fp96::from_ratio(1, 4).unwrap().to_decimal().unwrap(), dec!(0.25));
        assert_eq!(Fp96::from_decimal(dec!(-1)), Err(MathError::Underflow));
        assert_eq!(format!("{}", Fp96::from_int(3)), "3");
    }

    #[test]
    fn test_short_key_grows_with_debt() {
        let price = Fp96::from_int(2);
        let low = SortKey::short(price, 100, 1_000).unwrap();
        let high = SortKey::short(price, 400, 1_000).unwrap();
        assert!(high > low);
        // 2 * 100 / 1000 = 0.2
        assert_relative_eq!(low.to_f64(), 0.2, max_relative = 1e-9);
    }

    #[test]
    fn test_long_key_grows_with_debt() {
        let price = Fp96::from_int(2);
        let low = SortKey::long(price, 100, 50).unwrap();
        let high = SortKey::long(price, 100, 150).unwrap();
        assert!(high > low);
        assert_relative_eq!(high.to_f64(), 0.75, max_relative = 1e-9);
    }

    #[test]
    fn test_key_without_collateral_is_max() {
        assert_eq!(SortKey::short(Fp96::ONE, 10, 0).unwrap(), SortKey::MAX);
        assert_eq!(SortKey::long(Fp96::ONE, 0, 10).unwrap(), SortKey::MAX);
    }
}
