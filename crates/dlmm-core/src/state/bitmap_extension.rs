//! # Bin Array Bitmap Extension
//!
//! Optional account extending the pool's inline bitmap. Each side holds
//! twelve 512-bit bitmaps:
//! - positive side: bin array indices `512..=6655`, position `index - 512`
//! - negative side: bin array indices `-6656..=-513`, position `-index - 513`
//!
//! Positions grow away from zero on both sides.

use solana_program::pubkey::Pubkey;

use crate::constants::{BIN_ARRAY_BITMAP_SIZE, EXTENSION_BINARRAY_BITMAP_SIZE, EXTENSION_BITMAP_WORDS};
use crate::errors::{CoreResult, DlmmError};
use crate::math::{next_set_bit_down, next_set_bit_up};
use crate::state::layout::{
    AccountReader, BIN_ARRAY_BITMAP_EXTENSION_ACCOUNT_SIZE, BIN_ARRAY_BITMAP_EXTENSION_DISCRIMINATOR,
};

const ACCOUNT_NAME: &str = "BinArrayBitmapExtension";

/// Bits per side of the extension
const SIDE_BITS: usize = EXTENSION_BINARRAY_BITMAP_SIZE * EXTENSION_BITMAP_WORDS * 64;

/// Twelve 512-bit bitmaps
pub type ExtensionBitmaps = [[u64; EXTENSION_BITMAP_WORDS]; EXTENSION_BINARRAY_BITMAP_SIZE];

/// Lowest bin array index the extension covers
pub const EXTENSION_MIN_INDEX: i32 = -BIN_ARRAY_BITMAP_SIZE - SIDE_BITS as i32;

/// Highest bin array index the extension covers
pub const EXTENSION_MAX_INDEX: i32 = BIN_ARRAY_BITMAP_SIZE + SIDE_BITS as i32 - 1;

/// Half of the extension an index falls in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionSide {
    Positive,
    Negative,
}

/// Decoded bitmap extension account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinArrayBitmapExtension {
    pub lb_pair: Pubkey,
    pub positive_bin_array_bitmap: ExtensionBitmaps,
    pub negative_bin_array_bitmap: ExtensionBitmaps,
}

impl BinArrayBitmapExtension {
    /// Empty extension for an in-memory pool
    pub fn new(lb_pair: Pubkey) -> Self {
        Self {
            lb_pair,
            positive_bin_array_bitmap: [[0; EXTENSION_BITMAP_WORDS]; EXTENSION_BINARRAY_BITMAP_SIZE],
            negative_bin_array_bitmap: [[0; EXTENSION_BITMAP_WORDS]; EXTENSION_BINARRAY_BITMAP_SIZE],
        }
    }

    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let mut reader = AccountReader::new(
            ACCOUNT_NAME,
            data,
            &BIN_ARRAY_BITMAP_EXTENSION_DISCRIMINATOR,
            BIN_ARRAY_BITMAP_EXTENSION_ACCOUNT_SIZE,
        )?;

        let lb_pair = reader.read_pubkey()?;
        let mut extension = Self::new(lb_pair);
        for bitmap in extension.positive_bin_array_bitmap.iter_mut() {
            *bitmap = reader.read_words()?;
        }
        for bitmap in extension.negative_bin_array_bitmap.iter_mut() {
            *bitmap = reader.read_words()?;
        }
        Ok(extension)
    }

    /// Whether the extension covers `index`
    pub fn covers(index: i32) -> bool {
        (EXTENSION_MIN_INDEX..=EXTENSION_MAX_INDEX).contains(&index)
            && !(-BIN_ARRAY_BITMAP_SIZE..BIN_ARRAY_BITMAP_SIZE).contains(&index)
    }

    /// Side and position of a bin array index
    pub fn locate(index: i32) -> CoreResult<(ExtensionSide, usize)> {
        if !Self::covers(index) {
            return Err(DlmmError::InvalidParameter("bin array index outside bitmap extension"));
        }
        if index > 0 {
            Ok((ExtensionSide::Positive, (index - BIN_ARRAY_BITMAP_SIZE) as usize))
        } else {
            Ok((ExtensionSide::Negative, (-index - BIN_ARRAY_BITMAP_SIZE - 1) as usize))
        }
    }

    /// Bin array index of a side position
    pub fn index_at(side: ExtensionSide, position: usize) -> i32 {
        match side {
            ExtensionSide::Positive => BIN_ARRAY_BITMAP_SIZE + position as i32,
            ExtensionSide::Negative => -BIN_ARRAY_BITMAP_SIZE - 1 - position as i32,
        }
    }

    fn side(&self, side: ExtensionSide) -> &ExtensionBitmaps {
        match side {
            ExtensionSide::Positive => &self.positive_bin_array_bitmap,
            ExtensionSide::Negative => &self.negative_bin_array_bitmap,
        }
    }

    fn side_mut(&mut self, side: ExtensionSide) -> &mut ExtensionBitmaps {
        match side {
            ExtensionSide::Positive => &mut self.positive_bin_array_bitmap,
            ExtensionSide::Negative => &mut self.negative_bin_array_bitmap,
        }
    }

    pub fn is_populated(&self, index: i32) -> CoreResult<bool> {
        let (side, position) = Self::locate(index)?;
        let (bitmap, word, bit) = split_position(position);
        Ok(self.side(side)[bitmap][word] & (1u64 << bit) != 0)
    }

    /// Flip the liquidity flag of `index`
    pub fn set_populated(&mut self, index: i32, populated: bool) -> CoreResult<()> {
        let (side, position) = Self::locate(index)?;
        let (bitmap, word, bit) = split_position(position);
        let slot = &mut self.side_mut(side)[bitmap][word];
        if populated {
            *slot |= 1u64 << bit;
        } else {
            *slot &= !(1u64 << bit);
        }
        Ok(())
    }

    /// First populated position on `side` at or beyond `from`, moving away
    /// from zero when `outward`, toward zero otherwise.
    pub fn next_populated_position(
        &self,
        side: ExtensionSide,
        from: usize,
        outward: bool,
    ) -> Option<usize> {
        let bitmaps = self.side(side);
        let word_at =
            |flat: usize| bitmaps[flat / EXTENSION_BITMAP_WORDS][flat % EXTENSION_BITMAP_WORDS];
        let word_count = SIDE_BITS / 64;
        if from >= SIDE_BITS {
            return None;
        }
        if outward {
            next_set_bit_up(word_at, word_count, from)
        } else {
            next_set_bit_down(word_at, word_count, from)
        }
    }

    /// Serialize into the account layout for fixtures
    #[cfg(any(test, feature = "test-utils"))]
    pub fn to_account_bytes(&self) -> Vec<u8> {
        use crate::state::layout::AccountWriter;

        let mut w = AccountWriter::new(
            &BIN_ARRAY_BITMAP_EXTENSION_DISCRIMINATOR,
            BIN_ARRAY_BITMAP_EXTENSION_ACCOUNT_SIZE,
        );
        w.bytes(self.lb_pair.as_ref());
        for word in self
            .positive_bin_array_bitmap
            .iter()
            .chain(self.negative_bin_array_bitmap.iter())
            .flatten()
        {
            w.bytes(&word.to_le_bytes());
        }
        w.finish()
    }
}

/// (bitmap, word, bit) of a side position
fn split_position(position: usize) -> (usize, usize, usize) {
    let bits_per_bitmap = EXTENSION_BITMAP_WORDS * 64;
    let bitmap = position / bits_per_bitmap;
    let within = position % bits_per_bitmap;
    (bitmap, within / 64, within % 64)
}
