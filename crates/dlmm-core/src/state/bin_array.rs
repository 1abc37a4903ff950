//! # Bin Arrays
//!
//! A bin array groups [`MAX_BIN_PER_ARRAY`] consecutive bins. Array `i`
//! holds bins `i * 70 ..= i * 70 + 69`; negative indices follow floor
//! division so bin `-1` lives in array `-1`.

use solana_program::pubkey::Pubkey;

#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_BIN_ID, MAX_BIN_PER_ARRAY, MIN_BIN_ID};
use crate::errors::{CoreResult, DlmmError};
use crate::math::{bin_array_lower_upper_bin_id, bin_id_to_bin_array_index, safe_cast_i64_to_i32};
use crate::state::layout::{
    AccountReader, BIN_ARRAY_ACCOUNT_SIZE, BIN_ARRAY_DISCRIMINATOR, BIN_ARRAY_HEADER_SIZE,
    LAYOUT_VERSION,
};

const ACCOUNT_NAME: &str = "BinArray";

/// Reserves and accounting of a single bin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct Bin {
    pub amount_x: u64,
    pub amount_y: u64,
    /// Q64.64 price recorded by the program
    pub price: u128,
    pub liquidity_supply: u128,
    pub reward_per_token_stored: [u128; 2],
    pub fee_amount_x_per_token_stored: u128,
    pub fee_amount_y_per_token_stored: u128,
    pub amount_x_in: u128,
    pub amount_y_in: u128,
}

impl Bin {
    /// Bin holding only reserves, as used by in-memory pools
    pub fn with_reserves(amount_x: u64, amount_y: u64) -> Self {
        Self {
            amount_x,
            amount_y,
            ..Self::default()
        }
    }

    /// Whether the bin has nothing to give out for this direction
    pub fn is_empty(&self, swap_for_y: bool) -> bool {
        if swap_for_y {
            self.amount_y == 0
        } else {
            self.amount_x == 0
        }
    }

    /// Reserve paid out when swapping in this direction
    pub fn output_reserve(&self, swap_for_y: bool) -> u64 {
        if swap_for_y {
            self.amount_y
        } else {
            self.amount_x
        }
    }

    fn read(reader: &mut AccountReader<'_>) -> CoreResult<Self> {
        Ok(Self {
            amount_x: reader.read_u64()?,
            amount_y: reader.read_u64()?,
            price: reader.read_u128()?,
            liquidity_supply: reader.read_u128()?,
            reward_per_token_stored: [reader.read_u128()?, reader.read_u128()?],
            fee_amount_x_per_token_stored: reader.read_u128()?,
            fee_amount_y_per_token_stored: reader.read_u128()?,
            amount_x_in: reader.read_u128()?,
            amount_y_in: reader.read_u128()?,
        })
    }
}

/// Decoded bin array account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinArray {
    pub index: i64,
    pub version: u8,
    pub lb_pair: Pubkey,
    pub bins: [Bin; MAX_BIN_PER_ARRAY],
}

impl BinArray {
    /// Empty in-memory bin array
    pub fn new(index: i32, lb_pair: Pubkey) -> CoreResult<Self> {
        check_index_in_range(i64::from(index))?;
        Ok(Self {
            index: i64::from(index),
            version: LAYOUT_VERSION,
            lb_pair,
            bins: [Bin::default(); MAX_BIN_PER_ARRAY],
        })
    }

    /// Decode account bytes, checking discriminator, size and index
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let mut reader = AccountReader::new(
            ACCOUNT_NAME,
            data,
            &BIN_ARRAY_DISCRIMINATOR,
            BIN_ARRAY_ACCOUNT_SIZE,
        )?;

        let index = reader.read_i64()?;
        let version = reader.read_u8()?;
        if version > LAYOUT_VERSION {
            return Err(DlmmError::decode(
                ACCOUNT_NAME,
                format!("unsupported layout version {}", version),
            ));
        }
        reader.skip(7)?;
        let lb_pair = reader.read_pubkey()?;
        debug_assert_eq!(reader.offset(), BIN_ARRAY_HEADER_SIZE);

        let mut bins = [Bin::default(); MAX_BIN_PER_ARRAY];
        for bin in bins.iter_mut() {
            *bin = Bin::read(&mut reader)?;
        }

        check_index_in_range(index)?;
        Ok(Self {
            index,
            version,
            lb_pair,
            bins,
        })
    }

    /// Array index narrowed to the bin id domain
    pub fn array_index(&self) -> CoreResult<i32> {
        safe_cast_i64_to_i32(self.index)
    }

    /// Lowest and highest bin ids held by this array
    pub fn bin_range(&self) -> CoreResult<(i32, i32)> {
        bin_array_lower_upper_bin_id(self.array_index()?)
    }

    pub fn contains(&self, bin_id: i32) -> bool {
        i64::from(bin_id_to_bin_array_index(bin_id)) == self.index
    }

    fn offset_of(&self, bin_id: i32) -> CoreResult<usize> {
        if !self.contains(bin_id) {
            return Err(DlmmError::NotLoaded(bin_id));
        }
        let (lower, _) = self.bin_range()?;
        Ok((bin_id - lower) as usize)
    }

    /// Bin `bin_id`, or `NotLoaded` when it belongs to another array
    pub fn bin(&self, bin_id: i32) -> CoreResult<&Bin> {
        let offset = self.offset_of(bin_id)?;
        Ok(&self.bins[offset])
    }

    pub fn bin_mut(&mut self, bin_id: i32) -> CoreResult<&mut Bin> {
        let offset = self.offset_of(bin_id)?;
        Ok(&mut self.bins[offset])
    }

    /// Whether any bin holds reserves
    pub fn has_liquidity(&self) -> bool {
        self.bins.iter().any(|bin| bin.amount_x > 0 || bin.amount_y > 0)
    }

    /// Bins paired with their ids, ascending
    pub fn iter_bins(&self) -> impl Iterator<Item = (i32, &Bin)> + '_ {
        let lower = (self.index as i32).saturating_mul(MAX_BIN_PER_ARRAY as i32);
        self.bins
            .iter()
            .enumerate()
            .map(move |(offset, bin)| (lower + offset as i32, bin))
    }

    /// Serialize into the account layout for fixtures
    #[cfg(any(test, feature = "test-utils"))]
    pub fn to_account_bytes(&self) -> Vec<u8> {
        use crate::state::layout::AccountWriter;

        let mut w = AccountWriter::new(&BIN_ARRAY_DISCRIMINATOR, BIN_ARRAY_ACCOUNT_SIZE);
        w.bytes(&self.index.to_le_bytes())
            .bytes(&[self.version])
            .zeros(7)
            .bytes(self.lb_pair.as_ref());
        for bin in &self.bins {
            w.bytes(&bin.amount_x.to_le_bytes())
                .bytes(&bin.amount_y.to_le_bytes())
                .bytes(&bin.price.to_le_bytes())
                .bytes(&bin.liquidity_supply.to_le_bytes())
                .bytes(&bin.reward_per_token_stored[0].to_le_bytes())
                .bytes(&bin.reward_per_token_stored[1].to_le_bytes())
                .bytes(&bin.fee_amount_x_per_token_stored.to_le_bytes())
                .bytes(&bin.fee_amount_y_per_token_stored.to_le_bytes())
                .bytes(&bin.amount_x_in.to_le_bytes())
                .bytes(&bin.amount_y_in.to_le_bytes());
        }
        w.finish()
    }
}

/// The array must hold at least one bin inside the program's id range
fn check_index_in_range(index: i64) -> CoreResult<()> {
    let min_index = i64::from(bin_id_to_bin_array_index(MIN_BIN_ID));
    let max_index = i64::from(bin_id_to_bin_array_index(MAX_BIN_ID));
    if index < min_index || index > max_index {
        return Err(DlmmError::decode(
            ACCOUNT_NAME,
            format!("index {} inconsistent with bin id range", index),
        ));
    }
    Ok(())
}
