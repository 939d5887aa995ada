//! # Safe Math Operations
//!
//! Overflow-checked arithmetic on token amounts. Products are widened to
//! 256 bits before dividing so `amount * weight / denominator` never
//! overflows on the way to a representable result.

use ethnum::U256;

use crate::constants::BPS_DENOMINATOR;
use crate::errors::{MagicError, MagicResult};

/// Macro to generate safe arithmetic functions
macro_rules! safe_arith {
    // Binary operations with checked methods
    ($fn_name:ident, $type:ty, $checked_method:ident, $error:expr) => {
        /// Safe $fn_name with overflow/underflow check
        pub fn $fn_name(a: $type, b: $type) -> MagicResult<$type> {
            a.$checked_method(b).ok_or($error)
        }
    };
}

safe_arith!(safe_add, u128, checked_add, MagicError::MathOverflow);
safe_arith!(safe_sub, u128, checked_sub, MagicError::MathUnderflow);
safe_arith!(safe_mul, u128, checked_mul, MagicError::MathOverflow);

safe_arith!(safe_add_u64, u64, checked_add, MagicError::MathOverflow);

fn narrow(value: U256) -> MagicResult<u128> {
    let (high, low) = value.into_words();
    if high != 0 {
        return Err(MagicError::MathOverflow);
    }
    Ok(low)
}

/// `floor(a * b / denominator)` with a 256-bit intermediate
pub fn mul_div(a: u128, b: u128, denominator: u128) -> MagicResult<u128> {
    if denominator == 0 {
        return Err(MagicError::DivisionByZero);
    }
    narrow(U256::from(a) * U256::from(b) / U256::from(denominator))
}

/// `ceil(a * b / denominator)` with a 256-bit intermediate
pub fn mul_div_ceil(a: u128, b: u128, denominator: u128) -> MagicResult<u128> {
    if denominator == 0 {
        return Err(MagicError::DivisionByZero);
    }
    let numerator = U256::from(a) * U256::from(b);
    let denominator = U256::from(denominator);
    let quotient = numerator / denominator;
    if numerator % denominator == U256::ZERO {
        narrow(quotient)
    } else {
        narrow(quotient + U256::ONE)
    }
}

/// Pro-rata share `floor(amount * part / whole)`.
///
/// Infallible for `part <= whole` since the result never exceeds `amount`.
/// Returns 0 when `whole` is zero.
pub fn proportion(amount: u128, part: u128, whole: u128) -> u128 {
    if whole == 0 || part > whole {
        return 0;
    }
    let (_, low) = (U256::from(amount) * U256::from(part) / U256::from(whole)).into_words();
    low
}

/// Apply a basis-point rate to an amount, rounding down
pub fn apply_bps(amount: u128, bps: u16) -> MagicResult<u128> {
    mul_div(amount, u128::from(bps), BPS_DENOMINATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_safe_arith() {
        assert_eq!(safe_add(1, 2), Ok(3));
        assert_eq!(safe_add(u128::MAX, 1), Err(MagicError::MathOverflow));
        assert_eq!(safe_sub(1, 2), Err(MagicError::MathUnderflow));
        assert_eq!(safe_mul(u128::MAX, 2), Err(MagicError::MathOverflow));
        assert_eq!(safe_add_u64(u64::MAX, 1), Err(MagicError::MathOverflow));
    }

    #[test]
    fn test_mul_div_wide_intermediate() {
        // u128::MAX * 3 overflows u128 but the quotient fits
        assert_eq!(mul_div(u128::MAX, 3, 3), Ok(u128::MAX));
        assert_eq!(mul_div(u128::MAX, 2, 1), Err(MagicError::MathOverflow));
        assert_eq!(mul_div(10, 1, 0), Err(MagicError::DivisionByZero));
    }

    #[test]
    fn test_mul_div_rounding() {
        assert_eq!(mul_div(10, 1, 3), Ok(3));
        assert_eq!(mul_div_ceil(10, 1, 3), Ok(4));
        assert_eq!(mul_div_ceil(9, 1, 3), Ok(3));
    }

    #[test]
    fn test_proportion_and_bps() {
        assert_eq!(proportion(1000, 750, 2000), 375);
        assert_eq!(proportion(1000, 1, 0), 0);
        assert_eq!(apply_bps(1_000_000, 100), Ok(10_000));
        assert_eq!(apply_bps(99, 100), Ok(0));
    }

    proptest! {
        #[test]
        fn prop_ceil_is_floor_or_floor_plus_one(a in 0u128..u64::MAX as u128, b in 0u128..u64::MAX as u128, d in 1u128..u64::MAX as u128) {
            let floor = mul_div(a, b, d).unwrap();
            let ceil = mul_div_ceil(a, b, d).unwrap();
            prop_assert!(ceil == floor || ceil == floor + 1);
        }
    }
}
