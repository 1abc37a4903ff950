//! # Account Layout
//!
//! Explicit binary schema for the three program accounts the engine reads.
//! Offsets and widths are fixed by the program's zero-copy structs; any change
//! on the program side is a breaking change here and must bump
//! [`LAYOUT_VERSION`].

use solana_program::pubkey::Pubkey;

use crate::errors::{CoreResult, DlmmError};

/// Version of the schema below
pub const LAYOUT_VERSION: u8 = 1;

/// Anchor account discriminator size (8 bytes)
pub const DISCRIMINATOR_SIZE: usize = 8;

/// `sha256("account:LbPair")[..8]`
pub const LB_PAIR_DISCRIMINATOR: [u8; 8] = [0x21, 0x0b, 0x31, 0x62, 0xb5, 0x65, 0xb1, 0x0d];

/// `sha256("account:BinArray")[..8]`
pub const BIN_ARRAY_DISCRIMINATOR: [u8; 8] = [0x5c, 0x8e, 0x5c, 0xdc, 0x05, 0x94, 0x46, 0xb5];

/// `sha256("account:BinArrayBitmapExtension")[..8]`
pub const BIN_ARRAY_BITMAP_EXTENSION_DISCRIMINATOR: [u8; 8] =
    [0x50, 0x6f, 0x7c, 0x71, 0x37, 0xed, 0x12, 0x05];

/// Serialized size of a pair account, discriminator included
pub const LB_PAIR_ACCOUNT_SIZE: usize = 904;

/// Serialized size of one bin
pub const BIN_SIZE: usize = 144;

/// Bytes before the first bin of a bin array account
pub const BIN_ARRAY_HEADER_SIZE: usize = DISCRIMINATOR_SIZE + 8 + 1 + 7 + 32;

/// Serialized size of a bin array account
pub const BIN_ARRAY_ACCOUNT_SIZE: usize =
    BIN_ARRAY_HEADER_SIZE + crate::constants::MAX_BIN_PER_ARRAY * BIN_SIZE;

/// Serialized size of a bitmap extension account
pub const BIN_ARRAY_BITMAP_EXTENSION_ACCOUNT_SIZE: usize = DISCRIMINATOR_SIZE
    + 32
    + 2 * crate::constants::EXTENSION_BINARRAY_BITMAP_SIZE
        * crate::constants::EXTENSION_BITMAP_WORDS
        * 8;

/// Little-endian reader over account bytes.
///
/// Every read is bounds checked; running off the end is a decode error for
/// the named account.
pub struct AccountReader<'a> {
    account: &'static str,
    data: &'a [u8],
    offset: usize,
}

impl<'a> AccountReader<'a> {
    /// Check discriminator and minimum size, positioning after the discriminator
    pub fn new(
        account: &'static str,
        data: &'a [u8],
        discriminator: &[u8; 8],
        expected_size: usize,
    ) -> CoreResult<Self> {
        if data.len() < expected_size {
            return Err(DlmmError::decode(
                account,
                format!("expected {} bytes, got {}", expected_size, data.len()),
            ));
        }
        if &data[..DISCRIMINATOR_SIZE] != discriminator {
            return Err(DlmmError::decode(account, "discriminator mismatch"));
        }
        Ok(Self {
            account,
            data,
            offset: DISCRIMINATOR_SIZE,
        })
    }

    /// Current byte offset
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn skip(&mut self, len: usize) -> CoreResult<()> {
        self.take(len).map(|_| ())
    }

    /// Move to an absolute offset
    pub fn seek(&mut self, offset: usize) -> CoreResult<()> {
        if offset > self.data.len() {
            return Err(DlmmError::decode(self.account, format!("offset {} out of bounds", offset)));
        }
        self.offset = offset;
        Ok(())
    }

    fn take(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                DlmmError::decode(self.account, format!("truncated at offset {}", self.offset))
            })?;
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> CoreResult<[u8; N]> {
        let bytes = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> CoreResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> CoreResult<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn read_u32(&mut self) -> CoreResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn read_i32(&mut self) -> CoreResult<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn read_u64(&mut self) -> CoreResult<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn read_i64(&mut self) -> CoreResult<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub fn read_u128(&mut self) -> CoreResult<u128> {
        Ok(u128::from_le_bytes(self.array()?))
    }

    pub fn read_pubkey(&mut self) -> CoreResult<Pubkey> {
        Ok(Pubkey::new_from_array(self.array()?))
    }

    /// Read `N` consecutive little-endian u64 words
    pub fn read_words<const N: usize>(&mut self) -> CoreResult<[u64; N]> {
        let mut words = [0u64; N];
        for word in words.iter_mut() {
            *word = self.read_u64()?;
        }
        Ok(words)
    }
}

/// Little-endian writer mirroring [`AccountReader`], used to build fixtures
#[cfg(any(test, feature = "test-utils"))]
pub struct AccountWriter {
    data: Vec<u8>,
}

#[cfg(any(test, feature = "test-utils"))]
impl AccountWriter {
    pub fn new(discriminator: &[u8; 8], size: usize) -> Self {
        let mut data = Vec::with_capacity(size);
        data.extend_from_slice(discriminator);
        Self { data }
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn zeros(&mut self, len: usize) -> &mut Self {
        self.data.resize(self.data.len() + len, 0);
        self
    }

    pub fn pad_to(&mut self, offset: usize) -> &mut Self {
        if self.data.len() < offset {
            self.data.resize(offset, 0);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.data
    }
}
