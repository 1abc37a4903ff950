//! # Mathematical Functions
//!
//! Pure integer and fixed-point helpers shared by the fee model, the swap
//! simulator and the distribution calculator.

pub mod bit_math;
pub mod price_math;
pub mod safe_math;
pub mod u64x64_math;

// Re-export commonly used functions
pub use bit_math::*;
pub use price_math::*;
pub use safe_math::*;
pub use u64x64_math::*;
