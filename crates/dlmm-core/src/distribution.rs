//! # Liquidity Distribution
//!
//! Splits a two-sided deposit across a bin range according to a shape
//! strategy. X goes to bins above the active bin, Y to bins below; the active
//! bin only takes a side when no bin on that side is in range.
//!
//! Per-bin amounts are floored and the leftover units go to the eligible bin
//! closest to the active bin, so the split always sums to the deposit.

#[cfg(feature = "client")]
use borsh::{BorshDeserialize, BorshSerialize};
#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::constants::{BASIS_POINT_MAX, MAX_BIN_ID, MAX_BIN_PER_POSITION, MIN_BIN_ID};
use crate::errors::{CoreResult, DlmmError};
use crate::math::{mul_div, safe_cast_u128_to_u64, Rounding};

/// Shape of the liquidity curve around the active bin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub enum StrategyType {
    /// Uniform across eligible bins
    #[default]
    Spot,
    /// Concentrated at the active bin, tapering outward
    Curve,
    /// Thin at the active bin, growing outward
    BidAsk,
}

impl StrategyType {
    /// Integer weight of a bin `distance` bins from the active bin in a range
    /// whose farthest bin is `max_distance` away
    pub fn weight(self, distance: u32, max_distance: u32) -> u64 {
        match self {
            Self::Spot => 1,
            Self::Curve => u64::from(max_distance - distance.min(max_distance)) + 1,
            Self::BidAsk => u64::from(distance) + 1,
        }
    }
}

/// A deposit to split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct DistributionRequest {
    pub amount_x: u64,
    pub amount_y: u64,
    pub min_bin_id: i32,
    pub max_bin_id: i32,
    pub active_id: i32,
    pub strategy: StrategyType,
}

/// Amounts assigned to one bin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct BinAmount {
    pub bin_id: i32,
    pub amount_x: u64,
    pub amount_y: u64,
}

/// Per-bin weight in basis points, as the add-liquidity instruction takes it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "client",
    derive(Serialize, Deserialize, BorshSerialize, BorshDeserialize)
)]
pub struct BinLiquidityDistribution {
    pub bin_id: i32,
    pub distribution_x: u16,
    pub distribution_y: u16,
}

/// Add-liquidity-by-weight instruction payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "client",
    derive(Serialize, Deserialize, BorshSerialize, BorshDeserialize)
)]
pub struct LiquidityParameterByWeight {
    pub amount_x: u64,
    pub amount_y: u64,
    pub active_id: i32,
    pub max_active_bin_slippage: i32,
    pub bin_liquidity_dist: Vec<BinLiquidityDistribution>,
}

/// Result of splitting a deposit, ordered by bin id
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct Distribution {
    pub active_id: i32,
    pub bins: Vec<BinAmount>,
}

impl Distribution {
    pub fn total_x(&self) -> u64 {
        self.bins.iter().map(|bin| bin.amount_x).sum()
    }

    pub fn total_y(&self) -> u64 {
        self.bins.iter().map(|bin| bin.amount_y).sum()
    }

    pub fn get(&self, bin_id: i32) -> Option<&BinAmount> {
        self.bins
            .binary_search_by_key(&bin_id, |bin| bin.bin_id)
            .ok()
            .map(|position| &self.bins[position])
    }

    /// Per-bin shares in basis points; each non-empty side sums to 10_000
    pub fn to_weight_parameters(&self) -> CoreResult<Vec<BinLiquidityDistribution>> {
        let bps_x = to_bps(&self.bins, self.active_id, self.total_x(), |bin| bin.amount_x)?;
        let bps_y = to_bps(&self.bins, self.active_id, self.total_y(), |bin| bin.amount_y)?;

        Ok(self
            .bins
            .iter()
            .zip(bps_x.into_iter().zip(bps_y))
            .map(|(bin, (distribution_x, distribution_y))| BinLiquidityDistribution {
                bin_id: bin.bin_id,
                distribution_x,
                distribution_y,
            })
            .collect())
    }

    /// Instruction payload for depositing this distribution
    pub fn to_liquidity_parameter(
        &self,
        max_active_bin_slippage: i32,
    ) -> CoreResult<LiquidityParameterByWeight> {
        Ok(LiquidityParameterByWeight {
            amount_x: self.total_x(),
            amount_y: self.total_y(),
            active_id: self.active_id,
            max_active_bin_slippage,
            bin_liquidity_dist: self.to_weight_parameters()?,
        })
    }
}

/// Splits deposits across bins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidityDistributor {
    max_bins_per_deposit: usize,
}

impl Default for LiquidityDistributor {
    fn default() -> Self {
        Self::new(MAX_BIN_PER_POSITION)
    }
}

impl LiquidityDistributor {
    pub fn new(max_bins_per_deposit: usize) -> Self {
        Self {
            max_bins_per_deposit,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.max_bins_per_deposit)
    }

    pub fn distribute(&self, request: &DistributionRequest) -> CoreResult<Distribution> {
        let DistributionRequest {
            amount_x,
            amount_y,
            min_bin_id,
            max_bin_id,
            active_id,
            strategy,
        } = *request;

        if min_bin_id > max_bin_id || min_bin_id < MIN_BIN_ID || max_bin_id > MAX_BIN_ID {
            debug!(min_bin_id, max_bin_id, "rejected deposit range");
            return Err(DlmmError::InvalidRange);
        }
        let span = (i64::from(max_bin_id) - i64::from(min_bin_id) + 1) as usize;
        if span > self.max_bins_per_deposit {
            debug!(span, max = self.max_bins_per_deposit, "deposit range too wide");
            return Err(DlmmError::InvalidRange);
        }

        let range = min_bin_id..=max_bin_id;
        let active_in_range = range.contains(&active_id);
        let max_distance = active_id
            .abs_diff(min_bin_id)
            .max(active_id.abs_diff(max_bin_id));

        let side_bins = |above: bool| -> Vec<i32> {
            let bins: Vec<i32> = range
                .clone()
                .filter(|&bin_id| if above { bin_id > active_id } else { bin_id < active_id })
                .collect();
            if bins.is_empty() && active_in_range {
                vec![active_id]
            } else {
                bins
            }
        };

        let x_bins = side_bins(true);
        let y_bins = side_bins(false);
        if (amount_x > 0 && x_bins.is_empty()) || (amount_y > 0 && y_bins.is_empty()) {
            debug!(active_id, min_bin_id, max_bin_id, "no eligible bins for deposit side");
            return Err(DlmmError::InvalidRange);
        }

        let x_split = split(amount_x, &x_bins, active_id, strategy, max_distance)?;
        let y_split = split(amount_y, &y_bins, active_id, strategy, max_distance)?;

        let mut bins: Vec<BinAmount> = range
            .map(|bin_id| BinAmount {
                bin_id,
                amount_x: 0,
                amount_y: 0,
            })
            .collect();
        for (bin_id, amount) in x_split {
            bins[(bin_id - min_bin_id) as usize].amount_x = amount;
        }
        for (bin_id, amount) in y_split {
            bins[(bin_id - min_bin_id) as usize].amount_y = amount;
        }

        Ok(Distribution { active_id, bins })
    }
}

/// Eligible bin nearest the active bin, lower id on ties
fn closest_to_active(bin_ids: impl Iterator<Item = i32>, active_id: i32) -> Option<i32> {
    bin_ids.min_by_key(|&bin_id| (bin_id.abs_diff(active_id), bin_id))
}

/// Split `total` over `bin_ids` by strategy weight
fn split(
    total: u64,
    bin_ids: &[i32],
    active_id: i32,
    strategy: StrategyType,
    max_distance: u32,
) -> CoreResult<Vec<(i32, u64)>> {
    if total == 0 || bin_ids.is_empty() {
        return Ok(Vec::new());
    }

    let weights: Vec<u64> = bin_ids
        .iter()
        .map(|&bin_id| strategy.weight(bin_id.abs_diff(active_id), max_distance))
        .collect();
    let weight_sum: u128 = weights.iter().map(|&w| u128::from(w)).sum();

    let mut amounts = Vec::with_capacity(bin_ids.len());
    let mut allocated = 0u64;
    for (&bin_id, &weight) in bin_ids.iter().zip(&weights) {
        let amount = mul_div(u128::from(total), u128::from(weight), weight_sum, Rounding::Down)
            .ok_or(DlmmError::MathOverflow)?;
        let amount = safe_cast_u128_to_u64(amount)?;
        allocated += amount;
        amounts.push((bin_id, amount));
    }

    let residual = total - allocated;
    if residual > 0 {
        if let Some(target) = closest_to_active(bin_ids.iter().copied(), active_id) {
            if let Some(entry) = amounts.iter_mut().find(|(bin_id, _)| *bin_id == target) {
                entry.1 += residual;
            }
        }
    }
    Ok(amounts)
}

/// Shares of one side in basis points, residual to the bin closest to active
fn to_bps<F>(bins: &[BinAmount], active_id: i32, total: u64, amount_of: F) -> CoreResult<Vec<u16>>
where
    F: Fn(&BinAmount) -> u64,
{
    let mut shares = vec![0u16; bins.len()];
    if total == 0 {
        return Ok(shares);
    }

    let mut allocated = 0u64;
    for (share, bin) in shares.iter_mut().zip(bins) {
        let bps = mul_div(
            u128::from(amount_of(bin)),
            BASIS_POINT_MAX as u128,
            u128::from(total),
            Rounding::Down,
        )
        .ok_or(DlmmError::MathOverflow)?;
        *share = u16::try_from(bps).map_err(|_| DlmmError::ConversionError)?;
        allocated += u64::from(*share);
    }

    let residual = BASIS_POINT_MAX as u64 - allocated;
    let funded = bins.iter().filter(|bin| amount_of(bin) > 0).map(|bin| bin.bin_id);
    if let Some(target) = closest_to_active(funded, active_id) {
        if let Some(position) = bins.iter().position(|bin| bin.bin_id == target) {
            shares[position] += residual as u16;
        }
    }
    Ok(shares)
}
