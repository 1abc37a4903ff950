//! # Price Math
//!
//! Conversions between bin ids and Q64.64 prices. A bin's price is
//! `(1 + bin_step / 10_000) ^ bin_id`, computed with the program's binary
//! exponentiation so that every quote prices a bin exactly as settlement does.

use fixed::types::U64F64;

use crate::constants::{
    BASIS_POINT_MAX, MAX_BIN_ID, MAX_BIN_PER_ARRAY, MAX_EXPONENTIAL, MIN_BIN_ID, ONE,
    SCALE_OFFSET,
};
use crate::errors::{CoreResult, DlmmError};
use crate::math::u64x64_math::Rounding;

/// Pre-inversion magnitudes below `MIN_POW_MAGNITUDE / bin_step` are
/// rejected: there the truncation error of the squarings approaches the
/// spacing between neighbouring bins and prices stop being strictly monotone.
const MIN_POW_MAGNITUDE: u128 = 10_000_000;

/// Raise a Q64.64 `base` to an integer power.
///
/// The base is inverted whenever it is >= 1 so that repeated squaring stays
/// below `u128::MAX`; the inversion is undone at the end.
pub fn pow(base: u128, exp: i32) -> Option<u128> {
    let (magnitude, invert) = pow_magnitude(base, exp)?;
    if invert {
        u128::MAX.checked_div(magnitude)
    } else {
        Some(magnitude)
    }
}

/// Square-and-multiply result before the final inversion, and whether that
/// inversion is still owed
fn pow_magnitude(base: u128, exp: i32) -> Option<(u128, bool)> {
    let mut invert = exp.is_negative();

    if exp == 0 {
        return Some((ONE, false));
    }

    let exp = exp.unsigned_abs();
    if exp >= MAX_EXPONENTIAL {
        return None;
    }

    let mut squared_base = base;
    let mut result = ONE;

    if squared_base >= result {
        squared_base = u128::MAX.checked_div(squared_base)?;
        invert = !invert;
    }

    // 19 bits cover every exponent below MAX_EXPONENTIAL
    for bit in 0..19u32 {
        if exp & (1 << bit) > 0 {
            result = result.checked_mul(squared_base)? >> SCALE_OFFSET;
        }
        if bit < 18 {
            squared_base = squared_base.checked_mul(squared_base)? >> SCALE_OFFSET;
        }
    }

    if result == 0 {
        return None;
    }

    Some((result, invert))
}

/// Q64.64 price of `bin_id` for a pool with `bin_step` basis points per bin.
///
/// Fails with `MathOverflow` outside [`priceable_bin_range`].
pub fn get_price_from_id(bin_id: i32, bin_step: u16) -> CoreResult<u128> {
    if bin_step == 0 {
        return Err(DlmmError::InvalidParameter("bin_step must be positive"));
    }
    let bps = (u128::from(bin_step) << SCALE_OFFSET) / BASIS_POINT_MAX as u128;
    let base = ONE.checked_add(bps).ok_or(DlmmError::MathOverflow)?;

    let (magnitude, invert) = pow_magnitude(base, bin_id).ok_or(DlmmError::MathOverflow)?;
    if magnitude < MIN_POW_MAGNITUDE / u128::from(bin_step) {
        return Err(DlmmError::MathOverflow);
    }
    if invert {
        Ok(u128::MAX / magnitude)
    } else {
        Ok(magnitude)
    }
}

/// Lowest and highest bin ids [`get_price_from_id`] can price at `bin_step`
pub fn priceable_bin_range(bin_step: u16) -> CoreResult<(i32, i32)> {
    get_price_from_id(0, bin_step)?;

    let (mut low, mut high) = (0, MAX_BIN_ID);
    while low < high {
        let mid = low + (high - low + 1) / 2;
        if get_price_from_id(mid, bin_step).is_ok() {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    let upper = low;

    let (mut low, mut high) = (MIN_BIN_ID, 0);
    while low < high {
        let mid = low + (high - low) / 2;
        if get_price_from_id(mid, bin_step).is_ok() {
            high = mid;
        } else {
            low = mid + 1;
        }
    }

    Ok((low, upper))
}

/// Bin id for a Q64.64 price.
///
/// `Rounding::Down` yields the greatest id whose price is `<= price`,
/// `Rounding::Up` the least id whose price is `>= price`. A floating point
/// logarithm only seeds the search; the answer is settled by comparing
/// against [`get_price_from_id`] so it agrees with the program's pricing.
/// Prices past either end of [`priceable_bin_range`] clamp to that end when
/// the rounding direction allows it.
pub fn get_id_from_price(price: u128, bin_step: u16, rounding: Rounding) -> CoreResult<i32> {
    if bin_step == 0 {
        return Err(DlmmError::InvalidParameter("bin_step must be positive"));
    }
    if price == 0 {
        return Err(DlmmError::InvalidParameter("price must be positive"));
    }

    let (min_id, max_id) = priceable_bin_range(bin_step)?;
    if price < get_price_from_id(min_id, bin_step)? {
        return match rounding {
            Rounding::Up => Ok(min_id),
            Rounding::Down => Err(DlmmError::InvalidParameter("price below minimum bin")),
        };
    }
    if price > get_price_from_id(max_id, bin_step)? {
        return match rounding {
            Rounding::Down => Ok(max_id),
            Rounding::Up => Err(DlmmError::InvalidParameter("price above maximum bin")),
        };
    }

    let ratio = price as f64 / ONE as f64;
    let base = 1.0 + f64::from(bin_step) / BASIS_POINT_MAX as f64;
    let estimate = (ratio.ln() / base.ln()).floor();
    let mut id = if estimate.is_finite() {
        (estimate as i64).clamp(i64::from(min_id), i64::from(max_id)) as i32
    } else {
        0
    };

    // Walk to the greatest id with price <= target
    while id > min_id && get_price_from_id(id, bin_step)? > price {
        id -= 1;
    }
    while id < max_id && get_price_from_id(id + 1, bin_step)? <= price {
        id += 1;
    }

    match rounding {
        Rounding::Down => Ok(id),
        Rounding::Up if get_price_from_id(id, bin_step)? == price => Ok(id),
        Rounding::Up => Ok(id + 1),
    }
}

/// Reinterpret a raw Q64.64 price as a fixed-point number
pub fn price_to_fixed(price: u128) -> U64F64 {
    U64F64::from_bits(price)
}

/// Raw Q64.64 bits of a fixed-point price
pub fn fixed_to_price(price: U64F64) -> u128 {
    price.to_bits()
}

/// Human readable price of token X in token Y, adjusted for mint decimals
pub fn ui_price_from_id(bin_id: i32, bin_step: u16, decimals_x: u8, decimals_y: u8) -> CoreResult<f64> {
    let price = price_to_fixed(get_price_from_id(bin_id, bin_step)?).to_num::<f64>();
    Ok(price * 10f64.powi(i32::from(decimals_x) - i32::from(decimals_y)))
}

/// Bin id for a human readable price of token X in token Y
pub fn id_from_ui_price(
    ui_price: f64,
    bin_step: u16,
    decimals_x: u8,
    decimals_y: u8,
    rounding: Rounding,
) -> CoreResult<i32> {
    if !(ui_price.is_finite() && ui_price > 0.0) {
        return Err(DlmmError::InvalidParameter("price must be positive"));
    }
    let per_lamport = ui_price * 10f64.powi(i32::from(decimals_y) - i32::from(decimals_x));
    let price = U64F64::checked_from_num(per_lamport).ok_or(DlmmError::ConversionError)?;
    get_id_from_price(fixed_to_price(price), bin_step, rounding)
}

// ============================================================================
// Bin Array Geometry
// ============================================================================

/// Index of the bin array holding `bin_id` (floor division)
pub fn bin_id_to_bin_array_index(bin_id: i32) -> i32 {
    bin_id.div_euclid(MAX_BIN_PER_ARRAY as i32)
}

/// Lowest and highest bin ids stored in bin array `index`
pub fn bin_array_lower_upper_bin_id(index: i32) -> CoreResult<(i32, i32)> {
    let lower = index
        .checked_mul(MAX_BIN_PER_ARRAY as i32)
        .ok_or(DlmmError::MathOverflow)?;
    let upper = lower
        .checked_add(MAX_BIN_PER_ARRAY as i32 - 1)
        .ok_or(DlmmError::MathOverflow)?;
    Ok((lower, upper))
}

/// Whether `bin_id` falls in bin array `index`
pub fn is_bin_id_within_bin_array(bin_id: i32, index: i32) -> bool {
    bin_id_to_bin_array_index(bin_id) == index
}
