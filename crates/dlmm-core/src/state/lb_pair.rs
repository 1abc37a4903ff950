//! # Pool State
//!
//! Decoded `LbPair` account: fee parameters, the active bin, the inline bin
//! array bitmap and the token/reserve keys a swap needs. A decoded pool is a
//! read-only snapshot; refetch it before anything freshness dependent.

use solana_program::pubkey::Pubkey;

#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BITMAP_WORDS, MAX_BIN_ID, MAX_PROTOCOL_SHARE, MIN_BIN_ID};
use crate::errors::{CoreResult, DlmmError};
use crate::math::get_price_from_id;
use crate::state::layout::{AccountReader, LB_PAIR_ACCOUNT_SIZE, LB_PAIR_DISCRIMINATOR};

const ACCOUNT_NAME: &str = "LbPair";

// Absolute offsets of fields that follow padding or skipped regions
const VARIABLE_PARAMETERS_OFFSET: usize = 40;
const BUMP_OFFSET: usize = 72;
const PROTOCOL_FEE_OFFSET: usize = 216;
const ORACLE_OFFSET: usize = 552;
const LAST_UPDATED_AT_OFFSET: usize = 712;
const ACTIVATION_POINT_OFFSET: usize = 816;
const CREATOR_OFFSET: usize = 848;

/// Fee and range parameters fixed at pool creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct StaticParameters {
    pub base_factor: u16,
    pub filter_period: u16,
    pub decay_period: u16,
    pub reduction_factor: u16,
    pub variable_fee_control: u32,
    pub max_volatility_accumulator: u32,
    pub min_bin_id: i32,
    pub max_bin_id: i32,
    pub protocol_share: u16,
    pub base_fee_power_factor: u8,
}

impl Default for StaticParameters {
    fn default() -> Self {
        Self {
            base_factor: 0,
            filter_period: 0,
            decay_period: 0,
            reduction_factor: 0,
            variable_fee_control: 0,
            max_volatility_accumulator: 0,
            min_bin_id: MIN_BIN_ID,
            max_bin_id: MAX_BIN_ID,
            protocol_share: 0,
            base_fee_power_factor: 0,
        }
    }
}

/// Volatility state carried between swaps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct VariableParameters {
    pub volatility_accumulator: u32,
    pub volatility_reference: u32,
    pub index_reference: i32,
    pub last_update_timestamp: i64,
}

/// Protocol fees accrued but not yet claimed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct ProtocolFee {
    pub amount_x: u64,
    pub amount_y: u64,
}

/// Trading status of a pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub enum PairStatus {
    #[default]
    Enabled,
    Disabled,
}

impl TryFrom<u8> for PairStatus {
    type Error = DlmmError;

    fn try_from(value: u8) -> CoreResult<Self> {
        match value {
            0 => Ok(Self::Enabled),
            1 => Ok(Self::Disabled),
            other => Err(DlmmError::decode(
                ACCOUNT_NAME,
                format!("unknown pair status {}", other),
            )),
        }
    }
}

impl From<PairStatus> for u8 {
    fn from(status: PairStatus) -> Self {
        match status {
            PairStatus::Enabled => 0,
            PairStatus::Disabled => 1,
        }
    }
}

/// Decoded pool account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LbPair {
    pub parameters: StaticParameters,
    pub v_parameters: VariableParameters,
    pub bump_seed: [u8; 1],
    pub bin_step_seed: [u8; 2],
    pub pair_type: u8,
    pub active_id: i32,
    pub bin_step: u16,
    pub status: PairStatus,
    pub activation_type: u8,
    pub token_x_mint: Pubkey,
    pub token_y_mint: Pubkey,
    pub reserve_x: Pubkey,
    pub reserve_y: Pubkey,
    pub protocol_fee: ProtocolFee,
    pub oracle: Pubkey,
    pub bin_array_bitmap: [u64; DEFAULT_BITMAP_WORDS],
    pub last_updated_at: i64,
    pub activation_point: u64,
    pub creator: Pubkey,
}

impl LbPair {
    /// In-memory pool with zeroed keys and an empty bitmap
    pub fn new(bin_step: u16, active_id: i32, parameters: StaticParameters) -> Self {
        Self {
            parameters,
            v_parameters: VariableParameters::default(),
            bump_seed: [0],
            bin_step_seed: bin_step.to_le_bytes(),
            pair_type: 0,
            active_id,
            bin_step,
            status: PairStatus::Enabled,
            activation_type: 0,
            token_x_mint: Pubkey::default(),
            token_y_mint: Pubkey::default(),
            reserve_x: Pubkey::default(),
            reserve_y: Pubkey::default(),
            protocol_fee: ProtocolFee::default(),
            oracle: Pubkey::default(),
            bin_array_bitmap: [0; DEFAULT_BITMAP_WORDS],
            last_updated_at: 0,
            activation_point: 0,
            creator: Pubkey::default(),
        }
    }

    /// Decode account bytes, checking discriminator and size
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let mut reader = AccountReader::new(
            ACCOUNT_NAME,
            data,
            &LB_PAIR_DISCRIMINATOR,
            LB_PAIR_ACCOUNT_SIZE,
        )?;

        let parameters = StaticParameters {
            base_factor: reader.read_u16()?,
            filter_period: reader.read_u16()?,
            decay_period: reader.read_u16()?,
            reduction_factor: reader.read_u16()?,
            variable_fee_control: reader.read_u32()?,
            max_volatility_accumulator: reader.read_u32()?,
            min_bin_id: reader.read_i32()?,
            max_bin_id: reader.read_i32()?,
            protocol_share: reader.read_u16()?,
            base_fee_power_factor: reader.read_u8()?,
        };

        reader.seek(VARIABLE_PARAMETERS_OFFSET)?;
        let volatility_accumulator = reader.read_u32()?;
        let volatility_reference = reader.read_u32()?;
        let index_reference = reader.read_i32()?;
        reader.skip(4)?;
        let v_parameters = VariableParameters {
            volatility_accumulator,
            volatility_reference,
            index_reference,
            last_update_timestamp: reader.read_i64()?,
        };

        reader.seek(BUMP_OFFSET)?;
        let bump_seed = [reader.read_u8()?];
        let bin_step_seed = [reader.read_u8()?, reader.read_u8()?];
        let pair_type = reader.read_u8()?;
        let active_id = reader.read_i32()?;
        let bin_step = reader.read_u16()?;
        let status = PairStatus::try_from(reader.read_u8()?)?;
        // require_base_factor_seed, base_factor_seed
        reader.skip(3)?;
        let activation_type = reader.read_u8()?;
        reader.skip(1)?;

        let token_x_mint = reader.read_pubkey()?;
        let token_y_mint = reader.read_pubkey()?;
        let reserve_x = reader.read_pubkey()?;
        let reserve_y = reader.read_pubkey()?;

        debug_assert_eq!(reader.offset(), PROTOCOL_FEE_OFFSET);
        let protocol_fee = ProtocolFee {
            amount_x: reader.read_u64()?,
            amount_y: reader.read_u64()?,
        };

        // padding1 and reward infos are not used for quoting
        reader.seek(ORACLE_OFFSET)?;
        let oracle = reader.read_pubkey()?;
        let bin_array_bitmap = reader.read_words::<DEFAULT_BITMAP_WORDS>()?;

        debug_assert_eq!(reader.offset(), LAST_UPDATED_AT_OFFSET);
        let last_updated_at = reader.read_i64()?;

        reader.seek(ACTIVATION_POINT_OFFSET)?;
        let activation_point = reader.read_u64()?;

        reader.seek(CREATOR_OFFSET)?;
        let creator = reader.read_pubkey()?;

        let pair = Self {
            parameters,
            v_parameters,
            bump_seed,
            bin_step_seed,
            pair_type,
            active_id,
            bin_step,
            status,
            activation_type,
            token_x_mint,
            token_y_mint,
            reserve_x,
            reserve_y,
            protocol_fee,
            oracle,
            bin_array_bitmap,
            last_updated_at,
            activation_point,
            creator,
        };
        pair.validate()?;
        Ok(pair)
    }

    fn validate(&self) -> CoreResult<()> {
        if self.bin_step == 0 {
            return Err(DlmmError::decode(ACCOUNT_NAME, "bin_step is zero"));
        }
        if self.parameters.min_bin_id > self.parameters.max_bin_id {
            return Err(DlmmError::decode(ACCOUNT_NAME, "min_bin_id above max_bin_id"));
        }
        if !(MIN_BIN_ID..=MAX_BIN_ID).contains(&self.active_id) {
            return Err(DlmmError::decode(
                ACCOUNT_NAME,
                format!("active_id {} out of range", self.active_id),
            ));
        }
        if self.parameters.protocol_share > MAX_PROTOCOL_SHARE {
            return Err(DlmmError::decode(
                ACCOUNT_NAME,
                format!("protocol_share {} above {}", self.parameters.protocol_share, MAX_PROTOCOL_SHARE),
            ));
        }
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.status == PairStatus::Enabled
    }

    /// Q64.64 price of the active bin
    pub fn current_price(&self) -> CoreResult<u128> {
        get_price_from_id(self.active_id, self.bin_step)
    }

    /// Serialize into the account layout for fixtures
    #[cfg(any(test, feature = "test-utils"))]
    pub fn to_account_bytes(&self) -> Vec<u8> {
        use crate::state::layout::AccountWriter;

        let p = &self.parameters;
        let v = &self.v_parameters;
        let mut w = AccountWriter::new(&LB_PAIR_DISCRIMINATOR, LB_PAIR_ACCOUNT_SIZE);
        w.bytes(&p.base_factor.to_le_bytes())
            .bytes(&p.filter_period.to_le_bytes())
            .bytes(&p.decay_period.to_le_bytes())
            .bytes(&p.reduction_factor.to_le_bytes())
            .bytes(&p.variable_fee_control.to_le_bytes())
            .bytes(&p.max_volatility_accumulator.to_le_bytes())
            .bytes(&p.min_bin_id.to_le_bytes())
            .bytes(&p.max_bin_id.to_le_bytes())
            .bytes(&p.protocol_share.to_le_bytes())
            .bytes(&[p.base_fee_power_factor])
            .pad_to(VARIABLE_PARAMETERS_OFFSET)
            .bytes(&v.volatility_accumulator.to_le_bytes())
            .bytes(&v.volatility_reference.to_le_bytes())
            .bytes(&v.index_reference.to_le_bytes())
            .zeros(4)
            .bytes(&v.last_update_timestamp.to_le_bytes())
            .pad_to(BUMP_OFFSET)
            .bytes(&self.bump_seed)
            .bytes(&self.bin_step_seed)
            .bytes(&[self.pair_type])
            .bytes(&self.active_id.to_le_bytes())
            .bytes(&self.bin_step.to_le_bytes())
            .bytes(&[u8::from(self.status)])
            .zeros(3)
            .bytes(&[self.activation_type])
            .zeros(1)
            .bytes(self.token_x_mint.as_ref())
            .bytes(self.token_y_mint.as_ref())
            .bytes(self.reserve_x.as_ref())
            .bytes(self.reserve_y.as_ref())
            .bytes(&self.protocol_fee.amount_x.to_le_bytes())
            .bytes(&self.protocol_fee.amount_y.to_le_bytes())
            .pad_to(ORACLE_OFFSET)
            .bytes(self.oracle.as_ref());
        for word in self.bin_array_bitmap {
            w.bytes(&word.to_le_bytes());
        }
        w.bytes(&self.last_updated_at.to_le_bytes())
            .pad_to(ACTIVATION_POINT_OFFSET)
            .bytes(&self.activation_point.to_le_bytes())
            .pad_to(CREATOR_OFFSET)
            .bytes(self.creator.as_ref())
            .pad_to(LB_PAIR_ACCOUNT_SIZE);
        w.finish()
    }
}
