//! # DLMM Core - Liquidity Book Quoting Engine
//!
//! Off-chain model of a bin-based concentrated liquidity pool. Price space is
//! cut into fixed-width logarithmic bins, each holding its own X and Y
//! reserves. This crate reproduces the program's integer arithmetic so quotes
//! match settlement. It provides:
//!
//! - Bin id and Q64.64 price conversion
//! - The base plus variable fee model with its volatility accumulator
//! - Decoders for pool, bin array and bitmap extension accounts
//! - A bitmap index locating bin arrays with liquidity
//! - Exact-in and exact-out swap simulation
//! - Deposit distribution across bin ranges
//!
//! Nothing here performs I/O. Callers fetch account bytes, build a
//! [`PoolSnapshot`] and quote against it.
//!
//! ## Feature Flags
//!
//! - `client`: serde derives on outputs and borsh encoding of deposit weights
//! - `test-utils`: account layout writers for building fixtures

pub mod bitmap;
pub mod config;
pub mod constants;
pub mod distribution;
pub mod errors;
pub mod fee;
pub mod math;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod swap;

// Re-export commonly used items
pub use bitmap::{BinBitmapIndex, Direction};
pub use config::EngineConfig;
pub use constants::*;
pub use distribution::{
    BinAmount, BinLiquidityDistribution, Distribution, DistributionRequest, LiquidityDistributor,
    LiquidityParameterByWeight, StrategyType,
};
pub use errors::{CoreResult, DlmmError};
pub use fee::FeeEngine;
pub use math::{get_id_from_price, get_price_from_id, Rounding};
pub use snapshot::{PoolSnapshot, SwapAccounts};
pub use state::{
    Bin, BinArray, BinArrayBitmapExtension, LbPair, PairStatus, StaticParameters,
    VariableParameters,
};
pub use store::BinArrayStore;
pub use swap::{
    BinSwapStep, ExactOutQuote, Quote, SwapLimits, SwapMode, SwapParams, SwapQuote, SwapSimulator,
};
