//! # Bin Array Store
//!
//! Decoded bin arrays keyed by bin array index. The store never fetches;
//! callers hand it account bytes and it reports what is missing.

use std::collections::BTreeMap;

use tracing::trace;

use crate::errors::{CoreResult, DlmmError};
use crate::math::bin_id_to_bin_array_index;
use crate::state::{Bin, BinArray};

/// Loaded bin arrays of one pool snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinArrayStore {
    arrays: BTreeMap<i32, BinArray>,
}

impl BinArrayStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every account; any failure rejects the whole batch
    pub fn from_accounts(accounts: &[&[u8]]) -> CoreResult<Self> {
        let mut store = Self::new();
        for data in accounts {
            store.insert(BinArray::decode(data)?)?;
        }
        trace!(count = store.len(), "decoded bin arrays");
        Ok(store)
    }

    /// Add or replace the array at its own index
    pub fn insert(&mut self, array: BinArray) -> CoreResult<Option<BinArray>> {
        let index = array.array_index()?;
        Ok(self.arrays.insert(index, array))
    }

    pub fn get(&self, index: i32) -> Option<&BinArray> {
        self.arrays.get(&index)
    }

    pub fn get_mut(&mut self, index: i32) -> Option<&mut BinArray> {
        self.arrays.get_mut(&index)
    }

    pub fn contains(&self, index: i32) -> bool {
        self.arrays.contains_key(&index)
    }

    /// Bin `bin_id`, or `NotLoaded` when its array is absent
    pub fn bin_at(&self, bin_id: i32) -> CoreResult<&Bin> {
        self.get(bin_id_to_bin_array_index(bin_id))
            .ok_or(DlmmError::NotLoaded(bin_id))?
            .bin(bin_id)
    }

    pub fn bin_at_mut(&mut self, bin_id: i32) -> CoreResult<&mut Bin> {
        self.get_mut(bin_id_to_bin_array_index(bin_id))
            .ok_or(DlmmError::NotLoaded(bin_id))?
            .bin_mut(bin_id)
    }

    /// Loaded indices, ascending
    pub fn indices(&self) -> Vec<i32> {
        self.arrays.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BinArray> {
        self.arrays.values()
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    pub fn clear(&mut self) {
        self.arrays.clear();
    }
}
