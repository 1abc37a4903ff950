//! # Pool Snapshot
//!
//! One logical view of a pool: decoded pool state, its bitmap index and the
//! bin arrays the caller supplied. Quotes always run against a single
//! snapshot; `refresh` decodes a complete replacement before swapping it in,
//! so a failed refresh leaves the previous snapshot untouched.

#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};
use solana_program::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::bitmap::{BinBitmapIndex, Direction};
use crate::config::EngineConfig;
use crate::errors::{CoreResult, DlmmError};
use crate::state::{BinArray, BinArrayBitmapExtension, LbPair};
use crate::store::BinArrayStore;
use crate::swap::{SwapParams, SwapQuote, SwapSimulator};

// ============================================================================
// Program Addresses
// ============================================================================

pub const BIN_ARRAY_SEED: &[u8] = b"bin_array";
pub const BITMAP_EXTENSION_SEED: &[u8] = b"bitmap";

/// Address of bin array `index` of `lb_pair`
pub fn derive_bin_array_pda(lb_pair: &Pubkey, index: i64, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[BIN_ARRAY_SEED, lb_pair.as_ref(), &index.to_le_bytes()],
        program_id,
    )
}

/// Address of the bitmap extension of `lb_pair`
pub fn derive_bin_array_bitmap_extension(lb_pair: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[BITMAP_EXTENSION_SEED, lb_pair.as_ref()], program_id)
}

// ============================================================================
// Swap Accounts
// ============================================================================

/// Accounts a swap instruction needs, derived from pool state
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct SwapAccounts {
    #[cfg_attr(feature = "client", serde(with = "pubkey_serde"))]
    pub lb_pair: Pubkey,
    #[cfg_attr(feature = "client", serde(with = "pubkey_serde"))]
    pub reserve_x: Pubkey,
    #[cfg_attr(feature = "client", serde(with = "pubkey_serde"))]
    pub reserve_y: Pubkey,
    #[cfg_attr(feature = "client", serde(with = "pubkey_serde"))]
    pub token_x_mint: Pubkey,
    #[cfg_attr(feature = "client", serde(with = "pubkey_serde"))]
    pub token_y_mint: Pubkey,
    #[cfg_attr(feature = "client", serde(with = "pubkey_serde"))]
    pub oracle: Pubkey,
    /// Mint the user sells
    #[cfg_attr(feature = "client", serde(with = "pubkey_serde"))]
    pub in_mint: Pubkey,
    /// Mint the user receives
    #[cfg_attr(feature = "client", serde(with = "pubkey_serde"))]
    pub out_mint: Pubkey,
    #[cfg_attr(feature = "client", serde(with = "pubkey_serde::option"))]
    pub bin_array_bitmap_extension: Option<Pubkey>,
    #[cfg_attr(feature = "client", serde(with = "pubkey_serde::vec"))]
    pub bin_arrays: Vec<Pubkey>,
}

impl SwapAccounts {
    /// Accounts taken from pool state alone; bin arrays and the extension are
    /// filled in by [`PoolSnapshot::swap_accounts`]
    pub fn from_pool(lb_pair: Pubkey, pool: &LbPair, swap_for_y: bool) -> Self {
        let (in_mint, out_mint) = if swap_for_y {
            (pool.token_x_mint, pool.token_y_mint)
        } else {
            (pool.token_y_mint, pool.token_x_mint)
        };
        Self {
            lb_pair,
            reserve_x: pool.reserve_x,
            reserve_y: pool.reserve_y,
            token_x_mint: pool.token_x_mint,
            token_y_mint: pool.token_y_mint,
            oracle: pool.oracle,
            in_mint,
            out_mint,
            bin_array_bitmap_extension: None,
            bin_arrays: Vec::new(),
        }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Pool state, bitmap index and bin arrays captured together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    address: Pubkey,
    pool: LbPair,
    bitmap: BinBitmapIndex,
    store: BinArrayStore,
}

impl PoolSnapshot {
    /// Decode a snapshot from raw account bytes
    pub fn from_accounts(
        address: Pubkey,
        pool_data: &[u8],
        extension_data: Option<&[u8]>,
        bin_arrays: &[&[u8]],
    ) -> CoreResult<Self> {
        let pool = LbPair::decode(pool_data)?;
        let extension = extension_data
            .map(BinArrayBitmapExtension::decode)
            .transpose()?;
        let store = BinArrayStore::from_accounts(bin_arrays)?;
        Self::from_parts(address, pool, extension, store)
    }

    /// Assemble a snapshot from decoded parts, checking they belong to
    /// `address`
    pub fn from_parts(
        address: Pubkey,
        pool: LbPair,
        extension: Option<BinArrayBitmapExtension>,
        store: BinArrayStore,
    ) -> CoreResult<Self> {
        if let Some(extension) = &extension {
            if extension.lb_pair != address {
                return Err(DlmmError::decode(
                    "BinArrayBitmapExtension",
                    format!("belongs to {}, expected {}", extension.lb_pair, address),
                ));
            }
        }
        for array in store.iter() {
            check_owner(array, &address)?;
        }

        let bitmap = BinBitmapIndex::new(&pool, extension);
        Ok(Self {
            address,
            pool,
            bitmap,
            store,
        })
    }

    /// Replace pool, bitmap and bin arrays together.
    ///
    /// Everything is decoded before the current snapshot is touched.
    pub fn refresh(
        &mut self,
        pool_data: &[u8],
        extension_data: Option<&[u8]>,
        bin_arrays: &[&[u8]],
    ) -> CoreResult<()> {
        let fresh = Self::from_accounts(self.address, pool_data, extension_data, bin_arrays)
            .map_err(|e| {
                warn!(pool = %self.address, error = %e, "snapshot refresh rejected");
                e
            })?;
        debug!(
            pool = %self.address,
            active_id = fresh.pool.active_id,
            bin_arrays = fresh.store.len(),
            extension = fresh.bitmap.has_extension(),
            "snapshot refreshed"
        );
        *self = fresh;
        Ok(())
    }

    /// Swap in a new set of bin arrays, keeping pool state and bitmap
    pub fn replace_bin_arrays(&mut self, bin_arrays: &[&[u8]]) -> CoreResult<()> {
        let store = BinArrayStore::from_accounts(bin_arrays)?;
        for array in store.iter() {
            check_owner(array, &self.address)?;
        }
        debug!(pool = %self.address, bin_arrays = store.len(), "bin arrays replaced");
        self.store = store;
        Ok(())
    }

    pub fn address(&self) -> &Pubkey {
        &self.address
    }

    pub fn pool(&self) -> &LbPair {
        &self.pool
    }

    pub fn bitmap(&self) -> &BinBitmapIndex {
        &self.bitmap
    }

    pub fn store(&self) -> &BinArrayStore {
        &self.store
    }

    pub fn swap_simulator(&self) -> SwapSimulator<'_> {
        SwapSimulator::new(&self.pool, &self.bitmap, &self.store)
    }

    pub fn quote(&self, params: &SwapParams) -> CoreResult<SwapQuote> {
        self.swap_simulator().quote(params)
    }

    /// Populated bin array indices a swap would walk, in walk order
    pub fn bin_arrays_for_swap(&self, swap_for_y: bool, count: usize) -> CoreResult<Vec<i32>> {
        self.bitmap.bin_arrays_for_swap(
            Direction::from_swap_for_y(swap_for_y),
            self.pool.active_id,
            count,
        )
    }

    /// Indices from [`Self::bin_arrays_for_swap`] absent from the store
    pub fn missing_bin_arrays(&self, swap_for_y: bool, count: usize) -> CoreResult<Vec<i32>> {
        Ok(self
            .bin_arrays_for_swap(swap_for_y, count)?
            .into_iter()
            .filter(|index| !self.store.contains(*index))
            .collect())
    }

    /// Full swap account set under `program_id`
    pub fn swap_accounts(
        &self,
        swap_for_y: bool,
        bin_array_count: usize,
        program_id: &Pubkey,
    ) -> CoreResult<SwapAccounts> {
        let mut accounts = SwapAccounts::from_pool(self.address, &self.pool, swap_for_y);
        accounts.bin_arrays = self
            .bin_arrays_for_swap(swap_for_y, bin_array_count)?
            .into_iter()
            .map(|index| derive_bin_array_pda(&self.address, i64::from(index), program_id).0)
            .collect();
        if self.bitmap.has_extension() {
            accounts.bin_array_bitmap_extension =
                Some(derive_bin_array_bitmap_extension(&self.address, program_id).0);
        }
        Ok(accounts)
    }

    /// [`Self::missing_bin_arrays`] over the configured look-ahead
    pub fn missing_bin_arrays_with_config(
        &self,
        swap_for_y: bool,
        config: &EngineConfig,
    ) -> CoreResult<Vec<i32>> {
        self.missing_bin_arrays(swap_for_y, config.bin_arrays_per_swap)
    }

    /// [`Self::swap_accounts`] under the configured program id and look-ahead
    pub fn swap_accounts_with_config(
        &self,
        swap_for_y: bool,
        config: &EngineConfig,
    ) -> CoreResult<SwapAccounts> {
        self.swap_accounts(swap_for_y, config.bin_arrays_per_swap, &config.program_id()?)
    }
}

fn check_owner(array: &BinArray, address: &Pubkey) -> CoreResult<()> {
    if array.lb_pair != *address {
        return Err(DlmmError::decode(
            "BinArray",
            format!("array {} belongs to {}, expected {}", array.index, array.lb_pair, address),
        ));
    }
    Ok(())
}

/// Base58 string encoding for pubkeys in serialized outputs
#[cfg(feature = "client")]
mod pubkey_serde {
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serializer};
    use solana_program::pubkey::Pubkey;

    pub fn serialize<S>(pubkey: &Pubkey, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&pubkey.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Pubkey, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::*;
        use serde::Serialize;

        pub fn serialize<S>(pubkey: &Option<Pubkey>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            pubkey.map(|key| key.to_string()).serialize(serializer)
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Pubkey>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(deserializer)?
                .map(|s| Pubkey::from_str(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }

    pub mod vec {
        use super::*;
        use serde::Serialize;

        pub fn serialize<S>(pubkeys: &[Pubkey], serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            pubkeys
                .iter()
                .map(|key| key.to_string())
                .collect::<Vec<_>>()
                .serialize(serializer)
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Pubkey>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Vec::<String>::deserialize(deserializer)?
                .iter()
                .map(|s| Pubkey::from_str(s).map_err(serde::de::Error::custom))
                .collect()
        }
    }
}
