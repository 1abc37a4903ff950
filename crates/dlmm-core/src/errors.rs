//! # Core Error Types
//!
//! Every fallible operation in the engine returns [`CoreResult`]. Nothing in
//! this crate retries; recovery belongs to the caller.

use thiserror::Error;

/// Errors surfaced by decoding, quoting and distribution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DlmmError {
    // ========================================================================
    // Snapshot Errors
    // ========================================================================
    /// Account bytes do not match the schema (fatal to the call)
    #[error("Failed to decode {account}: {reason}")]
    DecodeError { account: String, reason: String },

    /// Referenced bin is not covered by any loaded bin array
    #[error("Bin {0} is not loaded in the current snapshot")]
    NotLoaded(i32),

    /// Bitmap cannot answer for this bin array index without the extension
    #[error("Liquidity of bin array {0} is indeterminate without the bitmap extension")]
    Indeterminate(i32),

    // ========================================================================
    // Trading Errors
    // ========================================================================
    #[error("Insufficient liquidity")]
    InsufficientLiquidity,

    #[error("Slippage exceeded")]
    SlippageExceeded,

    #[error("Pool is disabled")]
    PoolDisabled,

    // ========================================================================
    // Validation Errors
    // ========================================================================
    #[error("Invalid bin range")]
    InvalidRange,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // Math Errors
    // ========================================================================
    #[error("Math overflow")]
    MathOverflow,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Conversion error")]
    ConversionError,
}

/// Result type using core errors
pub type CoreResult<T> = Result<T, DlmmError>;

impl DlmmError {
    /// Create a decode error for the named account type
    pub fn decode(account: &str, reason: impl Into<String>) -> Self {
        Self::DecodeError {
            account: account.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the caller can resolve this by supplying more account data
    pub fn needs_more_accounts(&self) -> bool {
        matches!(
            self,
            Self::NotLoaded(_) | Self::Indeterminate(_) | Self::InsufficientLiquidity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = DlmmError::decode("BinArray", "expected 10136 bytes, got 12");
        assert_eq!(
            format!("{}", err),
            "Failed to decode BinArray: expected 10136 bytes, got 12"
        );

        let err = DlmmError::NotLoaded(-71);
        assert_eq!(format!("{}", err), "Bin -71 is not loaded in the current snapshot");
    }

    #[test]
    fn test_needs_more_accounts() {
        assert!(DlmmError::Indeterminate(600).needs_more_accounts());
        assert!(DlmmError::InsufficientLiquidity.needs_more_accounts());
        assert!(!DlmmError::SlippageExceeded.needs_more_accounts());
        assert!(!DlmmError::decode("LbPair", "bad discriminator").needs_more_accounts());
    }
}
