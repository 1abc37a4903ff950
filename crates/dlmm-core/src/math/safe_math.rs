//! # Safe Math Operations
//!
//! Overflow-checked arithmetic mapped onto [`DlmmError`].

use crate::errors::{CoreResult, DlmmError};

/// Macro to generate safe arithmetic functions
macro_rules! safe_arith {
    // Division operations with zero check
    (div, $fn_name:ident, $type:ty) => {
        pub fn $fn_name(a: $type, b: $type) -> CoreResult<$type> {
            if b == 0 {
                return Err(DlmmError::DivisionByZero);
            }
            Ok(a / b)
        }
    };

    // Narrowing casts
    (cast, $fn_name:ident, $from_type:ty, $to_type:ty) => {
        pub fn $fn_name(value: $from_type) -> CoreResult<$to_type> {
            <$to_type>::try_from(value).map_err(|_| DlmmError::ConversionError)
        }
    };

    // Binary operations with checked methods
    ($fn_name:ident, $type:ty, $checked_method:ident, $error:expr) => {
        pub fn $fn_name(a: $type, b: $type) -> CoreResult<$type> {
            a.$checked_method(b).ok_or($error)
        }
    };
}

safe_arith!(safe_add_u64, u64, checked_add, DlmmError::MathOverflow);
safe_arith!(safe_sub_u64, u64, checked_sub, DlmmError::MathOverflow);
safe_arith!(safe_mul_u64, u64, checked_mul, DlmmError::MathOverflow);

safe_arith!(safe_add_u128, u128, checked_add, DlmmError::MathOverflow);
safe_arith!(safe_sub_u128, u128, checked_sub, DlmmError::MathOverflow);
safe_arith!(safe_mul_u128, u128, checked_mul, DlmmError::MathOverflow);
safe_arith!(div, safe_div_u128, u128);

safe_arith!(safe_add_i32, i32, checked_add, DlmmError::MathOverflow);
safe_arith!(safe_sub_i32, i32, checked_sub, DlmmError::MathOverflow);
safe_arith!(safe_mul_i32, i32, checked_mul, DlmmError::MathOverflow);

safe_arith!(cast, safe_cast_u128_to_u64, u128, u64);
safe_arith!(cast, safe_cast_u128_to_u32, u128, u32);
safe_arith!(cast, safe_cast_i64_to_i32, i64, i32);

/// `ceil(numerator / denominator)` for unsigned 128-bit values
pub fn safe_ceil_div_u128(numerator: u128, denominator: u128) -> CoreResult<u128> {
    if denominator == 0 {
        return Err(DlmmError::DivisionByZero);
    }
    let quotient = numerator / denominator;
    if numerator % denominator == 0 {
        Ok(quotient)
    } else {
        safe_add_u128(quotient, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_ops() {
        assert_eq!(safe_add_u64(1, 2).unwrap(), 3);
        assert_eq!(safe_sub_u64(1, 2), Err(DlmmError::MathOverflow));
        assert_eq!(safe_div_u128(1, 0), Err(DlmmError::DivisionByZero));
        assert_eq!(safe_sub_i32(i32::MIN, 1), Err(DlmmError::MathOverflow));
    }

    #[test]
    fn test_casts() {
        assert_eq!(safe_cast_u128_to_u64(u64::MAX as u128).unwrap(), u64::MAX);
        assert_eq!(
            safe_cast_u128_to_u64(u64::MAX as u128 + 1),
            Err(DlmmError::ConversionError)
        );
        assert_eq!(safe_cast_i64_to_i32(-6656).unwrap(), -6656);
    }

    #[test]
    fn test_ceil_div() {
        assert_eq!(safe_ceil_div_u128(10, 5).unwrap(), 2);
        assert_eq!(safe_ceil_div_u128(11, 5).unwrap(), 3);
        assert_eq!(safe_ceil_div_u128(0, 5).unwrap(), 0);
    }
}
