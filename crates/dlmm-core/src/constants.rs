//! # Protocol Constants
//!
//! Fixed parameters of the liquidity-book program whose arithmetic this crate
//! replicates:
//! - Fixed-point scale (Q64.64)
//! - Bin and bin array geometry
//! - Bitmap window sizes
//! - Fee precision and caps

// ============================================================================
// Mathematical Constants
// ============================================================================

/// Number of fractional bits in a Q64.64 price
pub const SCALE_OFFSET: u8 = 64;

/// 1.0 in Q64.64
pub const ONE: u128 = 1u128 << SCALE_OFFSET;

/// Basis points denominator (10,000 = 100%)
pub const BASIS_POINT_MAX: i32 = 10_000;

/// Exponent bound of the binary power routine (19 bits)
pub const MAX_EXPONENTIAL: u32 = 0x80000;

// ============================================================================
// Bin Constants
// ============================================================================

/// Lowest bin id the program accepts
pub const MIN_BIN_ID: i32 = -443_636;

/// Highest bin id the program accepts
pub const MAX_BIN_ID: i32 = 443_636;

/// Bins per bin array account
pub const MAX_BIN_PER_ARRAY: usize = 70;

/// Bins a single position (and therefore a single deposit) may span
pub const MAX_BIN_PER_POSITION: usize = 70;

// ============================================================================
// Bitmap Constants
// ============================================================================

/// Bin array indices covered by each half of the inline bitmap
pub const BIN_ARRAY_BITMAP_SIZE: i32 = 512;

/// Number of 512-bit bitmaps per side of the bitmap extension
pub const EXTENSION_BINARRAY_BITMAP_SIZE: usize = 12;

/// u64 words in the inline bitmap (1024 bits)
pub const DEFAULT_BITMAP_WORDS: usize = 16;

/// u64 words in one 512-bit extension bitmap
pub const EXTENSION_BITMAP_WORDS: usize = 8;

// ============================================================================
// Fee Constants
// ============================================================================

/// Fee rates are expressed in 1e9 units
pub const FEE_PRECISION: u64 = 1_000_000_000;

/// Total fee rate cap (10%)
pub const MAX_FEE_RATE: u64 = 100_000_000;

/// Maximum protocol share of fees (25%)
pub const MAX_PROTOCOL_SHARE: u16 = 2_500;

/// Scale-down divisor of the squared variable fee term (1e20 -> 1e9 units)
pub const VARIABLE_FEE_SCALE: u128 = 100_000_000_000;

// ============================================================================
// Swap Defaults
// ============================================================================

/// Default allowed slippage when deriving a minimum output (1%)
pub const DEFAULT_SLIPPAGE_BPS: u16 = 100;

/// Default number of bin arrays gathered for a swap
pub const DEFAULT_BIN_ARRAYS_PER_SWAP: usize = 4;
