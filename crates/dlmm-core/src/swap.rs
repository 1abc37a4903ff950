//! # Swap Simulator
//!
//! Walks bins from the active bin in the swap direction, pricing each bin at
//! its fixed price and charging the composite fee, until the requested
//! amount is filled or liquidity runs out.
//!
//! Rounding matches settlement: fees and required inputs round up, outputs
//! round down.

#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bitmap::{BinBitmapIndex, Direction};
use crate::config::EngineConfig;
use crate::constants::{BASIS_POINT_MAX, DEFAULT_SLIPPAGE_BPS, SCALE_OFFSET};
use crate::errors::{CoreResult, DlmmError};
use crate::fee::FeeEngine;
use crate::math::{
    bin_array_lower_upper_bin_id, bin_id_to_bin_array_index, get_price_from_id, mul_div, mul_shr,
    safe_add_u64, safe_cast_u128_to_u64, safe_sub_u64, shl_div, Rounding,
};
use crate::state::{Bin, LbPair};
use crate::store::BinArrayStore;

// ============================================================================
// Parameters
// ============================================================================

/// Which side of the trade is fixed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub enum SwapMode {
    #[default]
    ExactIn,
    ExactOut,
}

/// Caller-imposed bounds on a quote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct SwapLimits {
    /// Maximum number of bins the active bin may move
    pub max_active_bin_slippage: Option<u32>,
    /// Reject exact-in quotes paying out less than this
    pub min_out_amount: Option<u64>,
    /// Tolerance used to derive `min_out_amount` / `max_in_amount` on quotes
    pub slippage_bps: u16,
}

impl Default for SwapLimits {
    fn default() -> Self {
        Self {
            max_active_bin_slippage: None,
            min_out_amount: None,
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct SwapParams {
    /// Input amount for exact-in, output amount for exact-out
    pub amount: u64,
    /// Selling X for Y (walks toward lower bin ids)
    pub swap_for_y: bool,
    pub mode: SwapMode,
    /// Clock used to decay the volatility reference
    pub current_timestamp: i64,
    pub limits: SwapLimits,
}

impl SwapLimits {
    /// Limits carrying the configured slippage tolerance and active-bin cap
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_active_bin_slippage: config.max_active_bin_slippage,
            min_out_amount: None,
            slippage_bps: config.default_slippage_bps,
        }
    }

    pub fn with_min_out_amount(mut self, min_out_amount: u64) -> Self {
        self.min_out_amount = Some(min_out_amount);
        self
    }
}

impl SwapParams {
    pub fn exact_in(amount: u64, swap_for_y: bool, current_timestamp: i64) -> Self {
        Self {
            amount,
            swap_for_y,
            mode: SwapMode::ExactIn,
            current_timestamp,
            limits: SwapLimits::default(),
        }
    }

    pub fn exact_out(amount: u64, swap_for_y: bool, current_timestamp: i64) -> Self {
        Self {
            mode: SwapMode::ExactOut,
            ..Self::exact_in(amount, swap_for_y, current_timestamp)
        }
    }

    pub fn with_limits(mut self, limits: SwapLimits) -> Self {
        self.limits = limits;
        self
    }
}

// ============================================================================
// Results
// ============================================================================

/// Amounts exchanged in a single bin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct BinSwapStep {
    pub bin_id: i32,
    /// Input taken by the bin, fee included
    pub amount_in: u64,
    pub amount_out: u64,
    pub fee: u64,
    pub protocol_fee: u64,
}

/// Exact-in quote
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct Quote {
    pub consumed_in_amount: u64,
    pub out_amount: u64,
    pub fee: u64,
    pub protocol_fee: u64,
    /// `out_amount` less the slippage tolerance
    pub min_out_amount: u64,
    pub price_impact_bps: u64,
    pub end_active_id: i32,
    /// Bin array indices the swap touched, in walk order
    pub bin_arrays: Vec<i32>,
    pub trace: Vec<BinSwapStep>,
}

/// Exact-out quote
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct ExactOutQuote {
    pub in_amount: u64,
    /// `in_amount` plus the slippage tolerance
    pub max_in_amount: u64,
    pub out_amount: u64,
    pub fee: u64,
    pub protocol_fee: u64,
    pub price_impact_bps: u64,
    pub end_active_id: i32,
    pub bin_arrays: Vec<i32>,
    pub trace: Vec<BinSwapStep>,
}

/// Quote of either mode
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub enum SwapQuote {
    ExactIn(Quote),
    ExactOut(ExactOutQuote),
}

// ============================================================================
// Per-bin Pricing
// ============================================================================

/// Output for `amount_in` (fee already removed) at `price`, unnarrowed since
/// hypothetical amounts may exceed what any bin could pay
fn out_for_in_wide(amount_in: u64, price: u128, swap_for_y: bool) -> CoreResult<u128> {
    if swap_for_y {
        mul_shr(u128::from(amount_in), price, SCALE_OFFSET, Rounding::Down)
    } else {
        shl_div(u128::from(amount_in), price, SCALE_OFFSET, Rounding::Down)
    }
    .ok_or(DlmmError::MathOverflow)
}

/// Fee-exclusive input needed for `amount_out` at `price`
fn in_for_out(amount_out: u64, price: u128, swap_for_y: bool) -> CoreResult<u64> {
    safe_cast_u128_to_u64(in_for_out_wide(amount_out, price, swap_for_y)?)
}

fn in_for_out_wide(amount_out: u64, price: u128, swap_for_y: bool) -> CoreResult<u128> {
    if swap_for_y {
        shl_div(u128::from(amount_out), price, SCALE_OFFSET, Rounding::Up)
    } else {
        mul_shr(u128::from(amount_out), price, SCALE_OFFSET, Rounding::Up)
    }
    .ok_or(DlmmError::MathOverflow)
}

/// Exchange up to `amount_in` (fee inclusive) against one bin
pub fn swap_quote_at_bin(
    bin: &Bin,
    bin_id: i32,
    bin_step: u16,
    fees: &FeeEngine,
    amount_in: u64,
    swap_for_y: bool,
) -> CoreResult<BinSwapStep> {
    let price = get_price_from_id(bin_id, bin_step)?;
    let max_amount_out = bin.output_reserve(swap_for_y);
    // None when draining the bin takes more than any u64 input
    let drain = match u64::try_from(in_for_out_wide(max_amount_out, price, swap_for_y)?) {
        Ok(max_amount_in) => {
            let max_fee = fees.compute_fee(max_amount_in)?;
            safe_add_u64(max_amount_in, max_fee)
                .ok()
                .map(|max_amount_in_with_fees| (max_amount_in_with_fees, max_fee))
        }
        Err(_) => None,
    };

    let (amount_in, amount_out, fee) = match drain {
        Some((max_amount_in_with_fees, max_fee)) if amount_in > max_amount_in_with_fees => {
            (max_amount_in_with_fees, max_amount_out, max_fee)
        }
        _ => {
            let fee = fees.compute_fee_from_amount(amount_in)?;
            let amount_in_after_fee = safe_sub_u64(amount_in, fee)?;
            let amount_out = out_for_in_wide(amount_in_after_fee, price, swap_for_y)?
                .min(u128::from(max_amount_out));
            (amount_in, safe_cast_u128_to_u64(amount_out)?, fee)
        }
    };

    Ok(BinSwapStep {
        bin_id,
        amount_in,
        amount_out,
        fee,
        protocol_fee: fees.compute_protocol_fee(fee)?,
    })
}

/// Take up to `amount_out` from one bin, pricing the input it requires
pub fn swap_quote_exact_out_at_bin(
    bin: &Bin,
    bin_id: i32,
    bin_step: u16,
    fees: &FeeEngine,
    amount_out: u64,
    swap_for_y: bool,
) -> CoreResult<BinSwapStep> {
    let price = get_price_from_id(bin_id, bin_step)?;
    let amount_out = amount_out.min(bin.output_reserve(swap_for_y));
    let amount_in = in_for_out(amount_out, price, swap_for_y)?;
    let fee = fees.compute_fee(amount_in)?;

    Ok(BinSwapStep {
        bin_id,
        amount_in: safe_add_u64(amount_in, fee)?,
        amount_out,
        fee,
        protocol_fee: fees.compute_protocol_fee(fee)?,
    })
}

// ============================================================================
// Simulator
// ============================================================================

/// Accumulated state of one walk
struct Walk {
    remaining: u64,
    active_id: i32,
    amount_in: u64,
    amount_out: u64,
    fee: u64,
    protocol_fee: u64,
    bin_arrays: Vec<i32>,
    trace: Vec<BinSwapStep>,
}

impl Walk {
    fn record(&mut self, step: BinSwapStep) -> CoreResult<()> {
        self.amount_in = safe_add_u64(self.amount_in, step.amount_in)?;
        self.amount_out = safe_add_u64(self.amount_out, step.amount_out)?;
        self.fee = safe_add_u64(self.fee, step.fee)?;
        self.protocol_fee = safe_add_u64(self.protocol_fee, step.protocol_fee)?;
        self.trace.push(step);
        Ok(())
    }
}

/// Quotes swaps against one pool snapshot.
///
/// The simulator borrows the snapshot and never mutates it; the volatility
/// accumulator evolves on a private [`FeeEngine`] per call.
#[derive(Debug, Clone, Copy)]
pub struct SwapSimulator<'a> {
    pool: &'a LbPair,
    bitmap: &'a BinBitmapIndex,
    store: &'a BinArrayStore,
}

impl<'a> SwapSimulator<'a> {
    pub fn new(pool: &'a LbPair, bitmap: &'a BinBitmapIndex, store: &'a BinArrayStore) -> Self {
        Self {
            pool,
            bitmap,
            store,
        }
    }

    /// Quote in the mode named by `params`
    pub fn quote(&self, params: &SwapParams) -> CoreResult<SwapQuote> {
        match params.mode {
            SwapMode::ExactIn => self.quote_exact_in(params).map(SwapQuote::ExactIn),
            SwapMode::ExactOut => self.quote_exact_out(params).map(SwapQuote::ExactOut),
        }
    }

    /// Quote selling exactly `params.amount`
    pub fn quote_exact_in(&self, params: &SwapParams) -> CoreResult<Quote> {
        let (walk, start_fees) = self.walk(params, |bin, bin_id, fees, remaining| {
            swap_quote_at_bin(bin, bin_id, self.pool.bin_step, fees, remaining, params.swap_for_y)
        })?;

        if let Some(min_out) = params.limits.min_out_amount {
            if walk.amount_out < min_out {
                debug!(out = walk.amount_out, min_out, "quote below minimum output");
                return Err(DlmmError::SlippageExceeded);
            }
        }

        // Output had the whole input cleared at the starting bin's price
        let ideal_out = {
            let fee = start_fees.compute_fee_from_amount(walk.amount_in)?;
            let price = get_price_from_id(self.pool.active_id, self.pool.bin_step)?;
            out_for_in_wide(safe_sub_u64(walk.amount_in, fee)?, price, params.swap_for_y)?
        };
        let price_impact_bps = shortfall_bps(u128::from(walk.amount_out), ideal_out)?;
        let slippage_bps = u64::from(params.limits.slippage_bps).min(BASIS_POINT_MAX as u64);
        let min_out_amount = scale_bps(
            walk.amount_out,
            BASIS_POINT_MAX as u64 - slippage_bps,
            Rounding::Down,
        )?;

        Ok(Quote {
            consumed_in_amount: walk.amount_in,
            out_amount: walk.amount_out,
            fee: walk.fee,
            protocol_fee: walk.protocol_fee,
            min_out_amount,
            price_impact_bps,
            end_active_id: walk.active_id,
            bin_arrays: walk.bin_arrays,
            trace: walk.trace,
        })
    }

    /// Quote buying exactly `params.amount`
    pub fn quote_exact_out(&self, params: &SwapParams) -> CoreResult<ExactOutQuote> {
        let (walk, start_fees) = self.walk(params, |bin, bin_id, fees, remaining| {
            swap_quote_exact_out_at_bin(bin, bin_id, self.pool.bin_step, fees, remaining, params.swap_for_y)
        })?;

        // Input had the whole output cleared at the starting bin's price
        let ideal_in = {
            let price = get_price_from_id(self.pool.active_id, self.pool.bin_step)?;
            let amount_in = in_for_out_wide(walk.amount_out, price, params.swap_for_y)?;
            match u64::try_from(amount_in) {
                Ok(amount_in) => u128::from(amount_in) + u128::from(start_fees.compute_fee(amount_in)?),
                // No fillable input reaches this, so there is no excess
                Err(_) => amount_in,
            }
        };
        let price_impact_bps = excess_bps(u128::from(walk.amount_in), ideal_in)?;
        let max_in_amount = scale_bps(
            walk.amount_in,
            BASIS_POINT_MAX as u64 + u64::from(params.limits.slippage_bps),
            Rounding::Up,
        )?;

        Ok(ExactOutQuote {
            in_amount: walk.amount_in,
            max_in_amount,
            out_amount: walk.amount_out,
            fee: walk.fee,
            protocol_fee: walk.protocol_fee,
            price_impact_bps,
            end_active_id: walk.active_id,
            bin_arrays: walk.bin_arrays,
            trace: walk.trace,
        })
    }

    /// Shared bin walk. `step` prices one bin against the remaining amount;
    /// for exact-in the remaining amount shrinks by the step's input, for
    /// exact-out by its output.
    fn walk<F>(&self, params: &SwapParams, step: F) -> CoreResult<(Walk, FeeEngine)>
    where
        F: Fn(&Bin, i32, &FeeEngine, u64) -> CoreResult<BinSwapStep>,
    {
        if !self.pool.is_enabled() {
            return Err(DlmmError::PoolDisabled);
        }
        if params.amount == 0 {
            return Err(DlmmError::InvalidParameter("swap amount must be positive"));
        }

        let direction = Direction::from_swap_for_y(params.swap_for_y);
        let start_id = self.pool.active_id;
        let min_bin_id = self.pool.parameters.min_bin_id;
        let max_bin_id = self.pool.parameters.max_bin_id;

        let mut fees = FeeEngine::from_pool(self.pool);
        fees.update_references(start_id, params.current_timestamp)?;
        let mut start_fees = None;

        let mut walk = Walk {
            remaining: params.amount,
            active_id: start_id,
            amount_in: 0,
            amount_out: 0,
            fee: 0,
            protocol_fee: 0,
            bin_arrays: Vec::new(),
            trace: Vec::new(),
        };
        let mut current_array: Option<i32> = None;

        while walk.remaining > 0 {
            if walk.active_id < min_bin_id || walk.active_id > max_bin_id {
                debug!(active_id = walk.active_id, "swap reached pool bin bound");
                return Err(DlmmError::InsufficientLiquidity);
            }
            if let Some(max_slippage) = params.limits.max_active_bin_slippage {
                if start_id.abs_diff(walk.active_id) > max_slippage {
                    debug!(start_id, active_id = walk.active_id, "active bin slippage cap hit");
                    return Err(DlmmError::SlippageExceeded);
                }
            }

            let array_index = bin_id_to_bin_array_index(walk.active_id);
            if current_array != Some(array_index) {
                if !self.bitmap.has_liquidity(array_index) {
                    match self.bitmap.next_with_liquidity(direction, walk.active_id)? {
                        Some(next) => {
                            let (lower, upper) = bin_array_lower_upper_bin_id(next)?;
                            walk.active_id = match direction {
                                Direction::Down => upper,
                                Direction::Up => lower,
                            };
                            continue;
                        }
                        None => {
                            debug!(active_id = walk.active_id, "no bin array with liquidity left");
                            return Err(DlmmError::InsufficientLiquidity);
                        }
                    }
                }
                if !self.store.contains(array_index) {
                    debug!(array_index, "bin array with liquidity not supplied");
                    return Err(DlmmError::InsufficientLiquidity);
                }
                walk.bin_arrays.push(array_index);
                current_array = Some(array_index);
            }

            fees.update_volatility_accumulator(walk.active_id)?;
            if start_fees.is_none() {
                start_fees = Some(fees.clone());
            }

            let bin = self.store.bin_at(walk.active_id)?;
            if !bin.is_empty(params.swap_for_y) {
                let result = step(bin, walk.active_id, &fees, walk.remaining)?;
                let consumed = match params.mode {
                    SwapMode::ExactIn => result.amount_in,
                    SwapMode::ExactOut => result.amount_out,
                };
                walk.remaining = safe_sub_u64(walk.remaining, consumed)?;
                walk.record(result)?;
            }

            if walk.remaining > 0 {
                walk.active_id = walk
                    .active_id
                    .checked_add(direction.step())
                    .ok_or(DlmmError::MathOverflow)?;
            }
        }

        debug!(
            amount_in = walk.amount_in,
            amount_out = walk.amount_out,
            fee = walk.fee,
            end_active_id = walk.active_id,
            bins = walk.trace.len(),
            "swap quote filled"
        );

        let start_fees = start_fees.unwrap_or(fees);
        Ok((walk, start_fees))
    }
}

/// `amount * bps / 10_000`
fn scale_bps(amount: u64, bps: u64, rounding: Rounding) -> CoreResult<u64> {
    let scaled = mul_div(
        u128::from(amount),
        u128::from(bps),
        BASIS_POINT_MAX as u128,
        rounding,
    )
    .ok_or(DlmmError::MathOverflow)?;
    safe_cast_u128_to_u64(scaled)
}

/// How far `actual` falls short of `ideal`, in basis points of `ideal`,
/// capped at 10_000
fn shortfall_bps(actual: u128, ideal: u128) -> CoreResult<u64> {
    if ideal == 0 || actual >= ideal {
        return Ok(0);
    }
    scale_ratio_bps(ideal - actual, ideal)
}

/// How far `actual` exceeds `ideal`, in basis points of `ideal`, capped at
/// 10_000
fn excess_bps(actual: u128, ideal: u128) -> CoreResult<u64> {
    if ideal == 0 || actual <= ideal {
        return Ok(0);
    }
    scale_ratio_bps(actual - ideal, ideal)
}

fn scale_ratio_bps(delta: u128, base: u128) -> CoreResult<u64> {
    let bps = if delta >= base {
        BASIS_POINT_MAX as u128
    } else {
        mul_div(delta, BASIS_POINT_MAX as u128, base, Rounding::Down)
            .ok_or(DlmmError::DivisionByZero)?
    };
    safe_cast_u128_to_u64(bps)
}
