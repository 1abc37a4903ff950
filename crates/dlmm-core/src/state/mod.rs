//! # Account State
//!
//! Decoders for the pool, bin array and bitmap extension accounts, built on
//! an explicit versioned byte layout.

pub mod bin_array;
pub mod bitmap_extension;
pub mod layout;
pub mod lb_pair;

pub use bin_array::{Bin, BinArray};
pub use bitmap_extension::{BinArrayBitmapExtension, ExtensionSide};
pub use layout::LAYOUT_VERSION;
pub use lb_pair::{LbPair, PairStatus, ProtocolFee, StaticParameters, VariableParameters};
