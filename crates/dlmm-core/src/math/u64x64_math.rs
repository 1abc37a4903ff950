//! Q64.64 multiply/shift helpers with a 256-bit intermediate.
//!
//! Amount/price products exceed 128 bits, so both helpers widen to
//! [`ethnum::U256`] before narrowing back.

use ethnum::U256;

#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};

/// Rounding mode for division operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub enum Rounding {
    /// Round down (towards zero)
    Down,
    /// Round up (away from zero)
    Up,
}

/// `(x * y) >> offset`, `None` when the result does not fit in u128
pub fn mul_shr(x: u128, y: u128, offset: u8, rounding: Rounding) -> Option<u128> {
    let product = U256::from(x) * U256::from(y);
    let mut result = product >> u32::from(offset);

    if rounding == Rounding::Up {
        let mask = (U256::ONE << u32::from(offset)) - U256::ONE;
        if product & mask != U256::ZERO {
            result += U256::ONE;
        }
    }

    narrow(result)
}

/// `(x << offset) / y`, `None` on zero divisor or overflow
pub fn shl_div(x: u128, y: u128, offset: u8, rounding: Rounding) -> Option<u128> {
    if y == 0 {
        return None;
    }
    let numerator = U256::from(x) << u32::from(offset);
    let denominator = U256::from(y);
    let mut result = numerator / denominator;

    if rounding == Rounding::Up && numerator % denominator != U256::ZERO {
        result += U256::ONE;
    }

    narrow(result)
}

/// `x * y / denominator` with a 256-bit intermediate
pub fn mul_div(x: u128, y: u128, denominator: u128, rounding: Rounding) -> Option<u128> {
    if denominator == 0 {
        return None;
    }
    let product = U256::from(x) * U256::from(y);
    let denominator = U256::from(denominator);
    let mut result = product / denominator;

    if rounding == Rounding::Up && product % denominator != U256::ZERO {
        result += U256::ONE;
    }

    narrow(result)
}

fn narrow(value: U256) -> Option<u128> {
    if value > U256::from(u128::MAX) {
        None
    } else {
        Some(value.as_u128())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ONE, SCALE_OFFSET};

    #[test]
    fn test_mul_shr_rounding() {
        // 3 * 0.5 = 1.5
        let half = ONE / 2;
        assert_eq!(mul_shr(3, half, SCALE_OFFSET, Rounding::Down), Some(1));
        assert_eq!(mul_shr(3, half, SCALE_OFFSET, Rounding::Up), Some(2));
        assert_eq!(mul_shr(4, half, SCALE_OFFSET, Rounding::Up), Some(2));
    }

    #[test]
    fn test_shl_div_rounding() {
        // 3 / 2.0 = 1.5
        let two = ONE * 2;
        assert_eq!(shl_div(3, two, SCALE_OFFSET, Rounding::Down), Some(1));
        assert_eq!(shl_div(3, two, SCALE_OFFSET, Rounding::Up), Some(2));
        assert_eq!(shl_div(3, 0, SCALE_OFFSET, Rounding::Up), None);
    }

    #[test]
    fn test_wide_products() {
        // u64::MAX * 2^64 >> 64 still fits
        assert_eq!(
            mul_shr(u64::MAX as u128, ONE, SCALE_OFFSET, Rounding::Down),
            Some(u64::MAX as u128)
        );
        // u128::MAX << 64 / 1 does not
        assert_eq!(shl_div(u128::MAX, 1, SCALE_OFFSET, Rounding::Down), None);
        assert_eq!(mul_div(u128::MAX, 4, 8, Rounding::Down), Some(u128::MAX / 2));
        assert_eq!(mul_div(7, 1, 2, Rounding::Up), Some(4));
    }
}
