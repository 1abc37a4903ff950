//! # Fee Engine
//!
//! Composite swap fee of a bin-stepped pool:
//!
//! ```text
//! base     = base_factor * bin_step * 10 * 10^base_fee_power_factor
//! variable = ceil(variable_fee_control * (volatility_accumulator * bin_step)^2 / 1e11)
//! total    = min(base + variable, MAX_FEE_RATE)
//! ```
//!
//! Rates are in `FEE_PRECISION` (1e9) units. The volatility accumulator moves
//! with every bin crossed during a swap, so each simulation works on its own
//! copy of the pool's [`VariableParameters`].

use crate::constants::{BASIS_POINT_MAX, FEE_PRECISION, MAX_FEE_RATE, VARIABLE_FEE_SCALE};
use crate::errors::{CoreResult, DlmmError};
use crate::math::{
    safe_add_u128, safe_cast_u128_to_u64, safe_ceil_div_u128, safe_mul_u128, safe_sub_u128,
};
use crate::state::{LbPair, StaticParameters, VariableParameters};

/// Fee calculator owning a private copy of the volatility state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeEngine {
    parameters: StaticParameters,
    v_parameters: VariableParameters,
    bin_step: u16,
}

impl FeeEngine {
    pub fn new(parameters: StaticParameters, v_parameters: VariableParameters, bin_step: u16) -> Self {
        Self {
            parameters,
            v_parameters,
            bin_step,
        }
    }

    /// Engine seeded from a pool snapshot
    pub fn from_pool(pool: &LbPair) -> Self {
        Self::new(pool.parameters, pool.v_parameters, pool.bin_step)
    }

    pub fn parameters(&self) -> &StaticParameters {
        &self.parameters
    }

    pub fn v_parameters(&self) -> &VariableParameters {
        &self.v_parameters
    }

    // ========================================================================
    // Fee Rates
    // ========================================================================

    pub fn base_fee_rate(&self) -> CoreResult<u128> {
        let power = 10u128
            .checked_pow(u32::from(self.parameters.base_fee_power_factor))
            .ok_or(DlmmError::MathOverflow)?;
        let rate = safe_mul_u128(
            u128::from(self.parameters.base_factor) * u128::from(self.bin_step),
            10,
        )?;
        safe_mul_u128(rate, power)
    }

    pub fn variable_fee_rate(&self) -> CoreResult<u128> {
        self.variable_fee_rate_for(self.v_parameters.volatility_accumulator)
    }

    /// Variable rate at an arbitrary accumulator value
    pub fn variable_fee_rate_for(&self, volatility_accumulator: u32) -> CoreResult<u128> {
        if self.parameters.variable_fee_control == 0 {
            return Ok(0);
        }
        let vol_step = u128::from(volatility_accumulator) * u128::from(self.bin_step);
        let squared = safe_mul_u128(vol_step, vol_step)?;
        let scaled = safe_mul_u128(u128::from(self.parameters.variable_fee_control), squared)?;
        safe_ceil_div_u128(scaled, VARIABLE_FEE_SCALE)
    }

    /// Base plus variable rate, capped at `MAX_FEE_RATE`
    pub fn total_fee_rate(&self) -> CoreResult<u128> {
        let total = safe_add_u128(self.base_fee_rate()?, self.variable_fee_rate()?)?;
        Ok(total.min(u128::from(MAX_FEE_RATE)))
    }

    // ========================================================================
    // Fee Amounts
    // ========================================================================

    /// Fee to charge on top of a fee-exclusive `amount`
    pub fn compute_fee(&self, amount: u64) -> CoreResult<u64> {
        let rate = self.total_fee_rate()?;
        let denominator = safe_sub_u128(u128::from(FEE_PRECISION), rate)?;
        let fee = safe_ceil_div_u128(safe_mul_u128(u128::from(amount), rate)?, denominator)?;
        safe_cast_u128_to_u64(fee)
    }

    /// Fee contained in a fee-inclusive `amount`
    pub fn compute_fee_from_amount(&self, amount_with_fees: u64) -> CoreResult<u64> {
        let rate = self.total_fee_rate()?;
        let fee = safe_ceil_div_u128(
            safe_mul_u128(u128::from(amount_with_fees), rate)?,
            u128::from(FEE_PRECISION),
        )?;
        safe_cast_u128_to_u64(fee)
    }

    /// Protocol's cut of `fee`, rounded down
    pub fn compute_protocol_fee(&self, fee: u64) -> CoreResult<u64> {
        let protocol = safe_mul_u128(u128::from(fee), u128::from(self.parameters.protocol_share))?
            / BASIS_POINT_MAX as u128;
        safe_cast_u128_to_u64(protocol)
    }

    // ========================================================================
    // Volatility State Machine
    // ========================================================================

    /// Refresh the index and volatility references at the start of a swap.
    ///
    /// Within `filter_period` of the last update nothing changes. Past it the
    /// index reference snaps to the active bin and the volatility reference
    /// decays by `reduction_factor`, or resets to zero past `decay_period`.
    pub fn update_references(&mut self, active_id: i32, current_timestamp: i64) -> CoreResult<()> {
        let elapsed = current_timestamp
            .checked_sub(self.v_parameters.last_update_timestamp)
            .ok_or(DlmmError::MathOverflow)?;

        if elapsed >= i64::from(self.parameters.filter_period) {
            self.v_parameters.index_reference = active_id;
            self.v_parameters.volatility_reference =
                if elapsed < i64::from(self.parameters.decay_period) {
                    let reduced = u64::from(self.v_parameters.volatility_accumulator)
                        * u64::from(self.parameters.reduction_factor)
                        / BASIS_POINT_MAX as u64;
                    u32::try_from(reduced).map_err(|_| DlmmError::ConversionError)?
                } else {
                    0
                };
        }
        Ok(())
    }

    /// Recompute the accumulator for the bin about to be priced
    pub fn update_volatility_accumulator(&mut self, active_id: i32) -> CoreResult<()> {
        let delta_id = i64::from(self.v_parameters.index_reference)
            .abs_diff(i64::from(active_id));
        let accumulator = u64::from(self.v_parameters.volatility_reference)
            .saturating_add(delta_id.saturating_mul(BASIS_POINT_MAX as u64));
        let capped = accumulator.min(u64::from(self.parameters.max_volatility_accumulator));
        self.v_parameters.volatility_accumulator =
            u32::try_from(capped).map_err(|_| DlmmError::ConversionError)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(base_factor: u16, variable_fee_control: u32, bin_step: u16) -> FeeEngine {
        FeeEngine::new(
            StaticParameters {
                base_factor,
                filter_period: 30,
                decay_period: 600,
                reduction_factor: 5_000,
                variable_fee_control,
                max_volatility_accumulator: 350_000,
                ..StaticParameters::default()
            },
            VariableParameters::default(),
            bin_step,
        )
    }

    #[test]
    fn test_one_basis_point_fee() {
        let fees = engine(1_000, 0, 10);
        assert_eq!(fees.base_fee_rate().unwrap(), 100_000);
        assert_eq!(fees.total_fee_rate().unwrap(), 100_000);
        assert_eq!(fees.compute_fee_from_amount(1_000_000).unwrap(), 100);
        // 1_000_000 * 1e5 / (1e9 - 1e5) = 100.01.. -> 101
        assert_eq!(fees.compute_fee(1_000_000).unwrap(), 101);
    }

    #[test]
    fn test_fees_round_up() {
        let fees = engine(1_000, 0, 10);
        assert_eq!(fees.compute_fee_from_amount(1).unwrap(), 1);
        assert_eq!(fees.compute_fee(1).unwrap(), 1);
        assert_eq!(fees.compute_fee_from_amount(0).unwrap(), 0);
    }

    #[test]
    fn test_base_fee_power_factor() {
        let mut fees = engine(1_000, 0, 10);
        fees.parameters.base_fee_power_factor = 2;
        assert_eq!(fees.base_fee_rate().unwrap(), 10_000_000);
    }

    #[test]
    fn test_variable_fee() {
        let mut fees = engine(1_000, 40_000, 10);
        fees.v_parameters.volatility_accumulator = 10_000;
        // 40_000 * (10_000 * 10)^2 / 1e11
        assert_eq!(fees.variable_fee_rate().unwrap(), 4_000);
        assert_eq!(fees.total_fee_rate().unwrap(), 104_000);
        assert_eq!(fees.variable_fee_rate_for(1).unwrap(), 1);
    }

    #[test]
    fn test_total_fee_capped() {
        let mut fees = engine(u16::MAX, 7_500_000, 100);
        fees.v_parameters.volatility_accumulator = 350_000;
        assert_eq!(fees.total_fee_rate().unwrap(), u128::from(MAX_FEE_RATE));
    }

    #[test]
    fn test_protocol_fee_floors() {
        let mut fees = engine(1_000, 0, 10);
        fees.parameters.protocol_share = 2_000;
        assert_eq!(fees.compute_protocol_fee(101).unwrap(), 20);
        assert_eq!(fees.compute_protocol_fee(4).unwrap(), 0);
    }

    #[test]
    fn test_references_inside_filter_period() {
        let mut fees = engine(1_000, 40_000, 10);
        fees.v_parameters = VariableParameters {
            volatility_accumulator: 30_000,
            volatility_reference: 10_000,
            index_reference: 5,
            last_update_timestamp: 1_000,
        };
        fees.update_references(9, 1_010).unwrap();
        assert_eq!(fees.v_parameters.index_reference, 5);
        assert_eq!(fees.v_parameters.volatility_reference, 10_000);
    }

    #[test]
    fn test_references_decay() {
        let mut fees = engine(1_000, 40_000, 10);
        fees.v_parameters = VariableParameters {
            volatility_accumulator: 30_000,
            volatility_reference: 10_000,
            index_reference: 5,
            last_update_timestamp: 1_000,
        };
        fees.update_references(9, 1_100).unwrap();
        assert_eq!(fees.v_parameters.index_reference, 9);
        assert_eq!(fees.v_parameters.volatility_reference, 15_000);

        fees.update_references(12, 1_600).unwrap();
        assert_eq!(fees.v_parameters.index_reference, 12);
        assert_eq!(fees.v_parameters.volatility_reference, 0);
    }

    #[test]
    fn test_volatility_accumulator() {
        let mut fees = engine(1_000, 40_000, 10);
        fees.v_parameters.volatility_reference = 5_000;
        fees.v_parameters.index_reference = 100;

        fees.update_volatility_accumulator(100).unwrap();
        assert_eq!(fees.v_parameters.volatility_accumulator, 5_000);

        fees.update_volatility_accumulator(97).unwrap();
        assert_eq!(fees.v_parameters.volatility_accumulator, 35_000);

        fees.update_volatility_accumulator(200).unwrap();
        assert_eq!(fees.v_parameters.volatility_accumulator, 350_000);
    }
}
