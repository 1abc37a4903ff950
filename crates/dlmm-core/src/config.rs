//! # Engine Configuration
//!
//! Tunables for quoting and deposits, loaded from TOML. Every field has a
//! default so a config file only needs the values it overrides.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use solana_program::pubkey::Pubkey;

use crate::constants::{
    BASIS_POINT_MAX, DEFAULT_BIN_ARRAYS_PER_SWAP, DEFAULT_SLIPPAGE_BPS, MAX_BIN_PER_POSITION,
};
use crate::errors::{CoreResult, DlmmError};

/// Default liquidity-book program on mainnet
pub const DEFAULT_PROGRAM_ID: &str = "LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo";

/// Engine configuration loaded from a TOML file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Program owning the pool accounts (base58)
    pub program_id: String,

    /// Slippage tolerance applied to quotes (basis points)
    pub default_slippage_bps: u16,

    /// Bins the active bin may move before a quote is rejected
    pub max_active_bin_slippage: Option<u32>,

    /// Widest bin range a single deposit may span
    pub max_bins_per_deposit: usize,

    /// Bin arrays gathered ahead of a swap
    pub bin_arrays_per_swap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program_id: DEFAULT_PROGRAM_ID.to_string(),
            default_slippage_bps: DEFAULT_SLIPPAGE_BPS,
            max_active_bin_slippage: None,
            max_bins_per_deposit: MAX_BIN_PER_POSITION,
            bin_arrays_per_swap: DEFAULT_BIN_ARRAYS_PER_SWAP,
        }
    }
}

impl EngineConfig {
    /// Load configuration from TOML file
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DlmmError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| DlmmError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| DlmmError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content).map_err(|e| {
            DlmmError::Config(format!("Failed to write config file {}: {}", path.display(), e))
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> CoreResult<()> {
        self.program_id()?;

        if i32::from(self.default_slippage_bps) > BASIS_POINT_MAX {
            return Err(DlmmError::Config(format!(
                "default_slippage_bps {} exceeds 10000",
                self.default_slippage_bps
            )));
        }

        if self.max_bins_per_deposit == 0 || self.max_bins_per_deposit > MAX_BIN_PER_POSITION {
            return Err(DlmmError::Config(format!(
                "max_bins_per_deposit must be within 1..={}",
                MAX_BIN_PER_POSITION
            )));
        }

        if self.bin_arrays_per_swap == 0 {
            return Err(DlmmError::Config(
                "bin_arrays_per_swap must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Parsed program id
    pub fn program_id(&self) -> CoreResult<Pubkey> {
        Pubkey::from_str(&self.program_id)
            .map_err(|e| DlmmError::Config(format!("Invalid program_id {}: {}", self.program_id, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.program_id().unwrap().to_string(), DEFAULT_PROGRAM_ID);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            default_slippage_bps = 50
            max_active_bin_slippage = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.default_slippage_bps, 50);
        assert_eq!(config.max_active_bin_slippage, Some(3));
        assert_eq!(config.max_bins_per_deposit, MAX_BIN_PER_POSITION);
        assert_eq!(config.bin_arrays_per_swap, DEFAULT_BIN_ARRAYS_PER_SWAP);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            EngineConfig::from_toml_str("default_slippage_bps = 10001"),
            Err(DlmmError::Config(_))
        ));
        assert!(EngineConfig::from_toml_str("max_bins_per_deposit = 0").is_err());
        assert!(EngineConfig::from_toml_str("max_bins_per_deposit = 71").is_err());
        assert!(EngineConfig::from_toml_str("program_id = \"not-a-key\"").is_err());
        assert!(EngineConfig::from_toml_str("bin_arrays_per_swap = \"four\"").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("dlmm-core-config-{}.toml", std::process::id()));
        let config = EngineConfig {
            default_slippage_bps: 25,
            bin_arrays_per_swap: 2,
            ..EngineConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
        let _ = fs::remove_file(&path);

        assert!(EngineConfig::load(&path).is_err());
    }
}
