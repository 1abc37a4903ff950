//! # Bin Array Bitmap Index
//!
//! Two-tier index of which bin arrays hold liquidity:
//! - the pool's inline bitmap covers indices `-512..=511` (bit `index + 512`)
//! - the optional extension covers `-6656..=-513` and `512..=6655`
//!
//! Callers only see `has_liquidity` and `next_with_liquidity`; the split
//! between the two structures stays internal.

#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::constants::{BIN_ARRAY_BITMAP_SIZE, DEFAULT_BITMAP_WORDS};
use crate::errors::{CoreResult, DlmmError};
use crate::math::{bin_id_to_bin_array_index, next_set_bit_down, next_set_bit_up};
use crate::state::bitmap_extension::{EXTENSION_MAX_INDEX, EXTENSION_MIN_INDEX};
use crate::state::{BinArrayBitmapExtension, ExtensionSide, LbPair};

/// Direction of travel through bin ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub enum Direction {
    /// Toward lower ids (selling X for Y)
    Down,
    /// Toward higher ids (selling Y for X)
    Up,
}

impl Direction {
    pub fn from_swap_for_y(swap_for_y: bool) -> Self {
        if swap_for_y {
            Self::Down
        } else {
            Self::Up
        }
    }

    /// Signed unit step along the bin axis
    pub fn step(self) -> i32 {
        match self {
            Self::Down => -1,
            Self::Up => 1,
        }
    }
}

/// Liquidity index over bin arrays of one pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinBitmapIndex {
    bitmap: [u64; DEFAULT_BITMAP_WORDS],
    extension: Option<BinArrayBitmapExtension>,
    min_index: i32,
    max_index: i32,
}

impl BinBitmapIndex {
    /// Index over the pool's inline bitmap and, when loaded, its extension
    pub fn new(pool: &LbPair, extension: Option<BinArrayBitmapExtension>) -> Self {
        Self {
            bitmap: pool.bin_array_bitmap,
            extension,
            min_index: bin_id_to_bin_array_index(pool.parameters.min_bin_id),
            max_index: bin_id_to_bin_array_index(pool.parameters.max_bin_id),
        }
    }

    pub fn extension(&self) -> Option<&BinArrayBitmapExtension> {
        self.extension.as_ref()
    }

    pub fn has_extension(&self) -> bool {
        self.extension.is_some()
    }

    fn in_default_window(index: i32) -> bool {
        (-BIN_ARRAY_BITMAP_SIZE..BIN_ARRAY_BITMAP_SIZE).contains(&index)
    }

    fn default_position(index: i32) -> usize {
        (index + BIN_ARRAY_BITMAP_SIZE) as usize
    }

    /// Whether bin array `index` is flagged as holding liquidity.
    ///
    /// Indices outside the inline window read as empty when no extension is
    /// loaded.
    pub fn has_liquidity(&self, index: i32) -> bool {
        if Self::in_default_window(index) {
            let position = Self::default_position(index);
            return self.bitmap[position / 64] & (1u64 << (position % 64)) != 0;
        }
        self.extension
            .as_ref()
            .and_then(|extension| extension.is_populated(index).ok())
            .unwrap_or(false)
    }

    /// Set or clear the flag of bin array `index`
    pub fn mark_populated(&mut self, index: i32, populated: bool) -> CoreResult<()> {
        if Self::in_default_window(index) {
            let position = Self::default_position(index);
            let mask = 1u64 << (position % 64);
            if populated {
                self.bitmap[position / 64] |= mask;
            } else {
                self.bitmap[position / 64] &= !mask;
            }
            return Ok(());
        }
        match self.extension.as_mut() {
            Some(extension) => extension.set_populated(index, populated),
            None => Err(DlmmError::Indeterminate(index)),
        }
    }

    /// Searchable index range: the ledger's coverage intersected with the
    /// pool's bin id bounds
    fn bounds(&self) -> (i32, i32) {
        let (lower, upper) = if self.extension.is_some() {
            (EXTENSION_MIN_INDEX, EXTENSION_MAX_INDEX)
        } else {
            (-BIN_ARRAY_BITMAP_SIZE, BIN_ARRAY_BITMAP_SIZE - 1)
        };
        (lower.max(self.min_index), upper.min(self.max_index))
    }

    /// Next bin array with liquidity beyond the array holding `from_bin_id`.
    ///
    /// The starting array itself is never returned. `Ok(None)` means the
    /// search ran out of coverage or pool range; `Indeterminate` means the
    /// start lies outside the inline window and the extension is not loaded.
    pub fn next_with_liquidity(
        &self,
        direction: Direction,
        from_bin_id: i32,
    ) -> CoreResult<Option<i32>> {
        self.next_index_with_liquidity(direction, bin_id_to_bin_array_index(from_bin_id))
    }

    /// Like [`Self::next_with_liquidity`] but returns the starting array when
    /// it holds liquidity
    pub fn next_with_liquidity_inclusive(
        &self,
        direction: Direction,
        from_bin_id: i32,
    ) -> CoreResult<Option<i32>> {
        let start = bin_id_to_bin_array_index(from_bin_id);
        let (lower, upper) = self.bounds();
        if (lower..=upper).contains(&start) && self.has_liquidity(start) {
            return Ok(Some(start));
        }
        self.next_index_with_liquidity(direction, start)
    }

    /// Exclusive search keyed by bin array index
    pub fn next_index_with_liquidity(
        &self,
        direction: Direction,
        start_index: i32,
    ) -> CoreResult<Option<i32>> {
        if !Self::in_default_window(start_index) && self.extension.is_none() {
            return Err(DlmmError::Indeterminate(start_index));
        }
        let found = self.scan_from(direction, start_index + direction.step());
        trace!(?direction, start_index, ?found, "bin array bitmap scan");
        Ok(found)
    }

    /// First populated index at or beyond `index` in `direction`
    fn scan_from(&self, direction: Direction, mut index: i32) -> Option<i32> {
        let (lower, upper) = self.bounds();
        loop {
            if index < lower || index > upper {
                return None;
            }

            if Self::in_default_window(index) {
                let from = Self::default_position(index);
                let word_at = |word: usize| self.bitmap[word];
                let hit = match direction {
                    Direction::Up => next_set_bit_up(word_at, DEFAULT_BITMAP_WORDS, from),
                    Direction::Down => next_set_bit_down(word_at, DEFAULT_BITMAP_WORDS, from),
                };
                match hit {
                    Some(position) => {
                        let found = position as i32 - BIN_ARRAY_BITMAP_SIZE;
                        return (lower..=upper).contains(&found).then_some(found);
                    }
                    // Inline window exhausted, continue into the extension
                    None => {
                        index = match direction {
                            Direction::Up => BIN_ARRAY_BITMAP_SIZE,
                            Direction::Down => -BIN_ARRAY_BITMAP_SIZE - 1,
                        };
                        continue;
                    }
                }
            }

            let extension = self.extension.as_ref()?;
            let (side, position) = BinArrayBitmapExtension::locate(index).ok()?;
            let outward = matches!(
                (side, direction),
                (ExtensionSide::Positive, Direction::Up) | (ExtensionSide::Negative, Direction::Down)
            );
            match extension.next_populated_position(side, position, outward) {
                Some(position) => {
                    let found = BinArrayBitmapExtension::index_at(side, position);
                    return (lower..=upper).contains(&found).then_some(found);
                }
                None if outward => return None,
                // Side exhausted toward zero, fall back into the inline window
                None => {
                    index = match side {
                        ExtensionSide::Positive => BIN_ARRAY_BITMAP_SIZE - 1,
                        ExtensionSide::Negative => -BIN_ARRAY_BITMAP_SIZE,
                    };
                }
            }
        }
    }

    /// Populated bin array indices a swap from `active_id` would walk, in
    /// swap order, starting with the active array when it holds liquidity
    pub fn bin_arrays_for_swap(
        &self,
        direction: Direction,
        active_id: i32,
        count: usize,
    ) -> CoreResult<Vec<i32>> {
        let mut indices = Vec::with_capacity(count);
        let mut cursor = bin_id_to_bin_array_index(active_id);
        if count == 0 {
            return Ok(indices);
        }
        if self.has_liquidity(cursor) {
            indices.push(cursor);
        }
        while indices.len() < count {
            match self.next_index_with_liquidity(direction, cursor)? {
                Some(index) => {
                    indices.push(index);
                    cursor = index;
                }
                None => break,
            }
        }
        trace!(?direction, active_id, ?indices, "bin arrays for swap");
        Ok(indices)
    }
}
