//! # Engine Properties
//!
//! Property-based checks over the price codec, fee bounds, bitmap search,
//! swap conservation and deposit distribution.

use dlmm_core::bitmap::{BinBitmapIndex, Direction};
use dlmm_core::math::{bin_array_lower_upper_bin_id, bin_id_to_bin_array_index, priceable_bin_range};
use dlmm_core::*;
use proptest::prelude::*;
use solana_program::pubkey::Pubkey;

// ============================================================================
// Test Strategies
// ============================================================================

/// Bin steps used by live pools
fn bin_step() -> impl Strategy<Value = u16> {
    1u16..=100
}

/// Ids whose price fits Q64.64 at every bin step up to 100
fn bounded_bin_id() -> impl Strategy<Value = i32> {
    -2_000i32..=2_000
}

/// Array indices inside the inline bitmap window
fn window_index() -> impl Strategy<Value = i32> {
    -512i32..=511
}

fn strategy_type() -> impl Strategy<Value = StrategyType> {
    prop_oneof![
        Just(StrategyType::Spot),
        Just(StrategyType::Curve),
        Just(StrategyType::BidAsk),
    ]
}

/// Deposit ranges of at most one position wide, with the active bin inside
fn deposit_request() -> impl Strategy<Value = DistributionRequest> {
    (-10_000i32..10_000, 1i32..=70, 0u64..1_000_000_000_000, 0u64..1_000_000_000_000, strategy_type())
        .prop_flat_map(|(min_bin_id, width, amount_x, amount_y, strategy)| {
            let max_bin_id = min_bin_id + width - 1;
            (min_bin_id..=max_bin_id).prop_map(move |active_id| DistributionRequest {
                amount_x,
                amount_y,
                min_bin_id,
                max_bin_id,
                active_id,
                strategy,
            })
        })
}

/// Output-side reserves for a run of bins walking down from the active bin
fn bin_reserves() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..10_000_000, 1..40)
}

fn pool_parameters() -> impl Strategy<Value = StaticParameters> {
    (1_000u16..20_000, 0u32..100_000, 0u16..=2_500).prop_map(
        |(base_factor, variable_fee_control, protocol_share)| StaticParameters {
            base_factor,
            filter_period: 30,
            decay_period: 600,
            reduction_factor: 5_000,
            variable_fee_control,
            max_volatility_accumulator: 350_000,
            protocol_share,
            ..StaticParameters::default()
        },
    )
}

// ============================================================================
// Price Codec Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_price_round_trips_through_bin_id(step in bin_step(), bin_id in bounded_bin_id()) {
        let price = get_price_from_id(bin_id, step).unwrap();
        prop_assert_eq!(get_id_from_price(price, step, Rounding::Down).unwrap(), bin_id);
        prop_assert_eq!(get_id_from_price(price, step, Rounding::Up).unwrap(), bin_id);
    }

    #[test]
    fn prop_price_strictly_increases(step in bin_step(), bin_id in bounded_bin_id()) {
        let lower = get_price_from_id(bin_id, step).unwrap();
        let upper = get_price_from_id(bin_id + 1, step).unwrap();
        prop_assert!(upper > lower);
    }

    #[test]
    fn prop_round_trip_across_priceable_range(step in bin_step(), position in 0.0f64..=1.0) {
        let (min_id, max_id) = priceable_bin_range(step).unwrap();
        let span = f64::from(max_id) - f64::from(min_id);
        let bin_id = (f64::from(min_id) + span * position).round() as i32;
        let price = get_price_from_id(bin_id, step).unwrap();
        prop_assert_eq!(get_id_from_price(price, step, Rounding::Down).unwrap(), bin_id);
        if bin_id < max_id {
            prop_assert!(get_price_from_id(bin_id + 1, step).unwrap() > price);
        }
    }

    #[test]
    fn prop_bin_lies_inside_its_array(bin_id in MIN_BIN_ID..=MAX_BIN_ID) {
        let index = bin_id_to_bin_array_index(bin_id);
        let (lower, upper) = bin_array_lower_upper_bin_id(index).unwrap();
        prop_assert!(lower <= bin_id && bin_id <= upper);
        prop_assert_eq!(upper - lower + 1, MAX_BIN_PER_ARRAY as i32);
    }
}

// ============================================================================
// Fee Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_fee_never_exceeds_amount(
        parameters in pool_parameters(),
        step in bin_step(),
        amount in 0u64..u64::MAX / 2,
        accumulator in 0u32..=350_000,
    ) {
        let mut pool = LbPair::new(step, 0, parameters);
        pool.v_parameters.volatility_accumulator = accumulator;
        let fees = FeeEngine::from_pool(&pool);

        prop_assert!(fees.total_fee_rate().unwrap() <= u128::from(MAX_FEE_RATE));
        let fee = fees.compute_fee_from_amount(amount).unwrap();
        prop_assert!(fee <= amount);
        prop_assert!(fees.compute_protocol_fee(fee).unwrap() <= fee);
    }
}

// ============================================================================
// Bitmap Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_bitmap_scan_matches_linear_search(
        populated in prop::collection::btree_set(window_index(), 0..20),
        start in window_index(),
    ) {
        let pool = LbPair::new(10, 0, StaticParameters::default());
        let mut bitmap = BinBitmapIndex::new(&pool, None);
        for &index in &populated {
            bitmap.mark_populated(index, true).unwrap();
        }

        let up = populated.range(start + 1..).next().copied();
        let down = populated.range(..start).next_back().copied();
        prop_assert_eq!(bitmap.next_index_with_liquidity(Direction::Up, start).unwrap(), up);
        prop_assert_eq!(bitmap.next_index_with_liquidity(Direction::Down, start).unwrap(), down);
    }
}

// ============================================================================
// Swap Conservation Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_swap_pays_out_no_more_than_reserves(
        parameters in pool_parameters(),
        reserves in bin_reserves(),
        amount in 1u64..50_000_000,
    ) {
        let address = Pubkey::new_unique();
        let active_id = 35;
        let pool = LbPair::new(10, active_id, parameters);
        let mut store = BinArrayStore::new();
        for (offset, &reserve_y) in reserves.iter().enumerate() {
            let bin_id = active_id - offset as i32;
            let index = bin_id_to_bin_array_index(bin_id);
            if !store.contains(index) {
                store.insert(BinArray::new(index, address).unwrap()).unwrap();
            }
            *store.bin_at_mut(bin_id).unwrap() = Bin::with_reserves(0, reserve_y);
        }
        let mut bitmap = BinBitmapIndex::new(&pool, None);
        for index in store.indices() {
            bitmap.mark_populated(index, true).unwrap();
        }

        let simulator = SwapSimulator::new(&pool, &bitmap, &store);
        match simulator.quote_exact_in(&SwapParams::exact_in(amount, true, 0)) {
            Ok(quote) => {
                let available: u64 = reserves.iter().sum();
                prop_assert!(quote.out_amount <= available);
                prop_assert_eq!(quote.consumed_in_amount, amount);
                prop_assert_eq!(quote.consumed_in_amount, quote.trace.iter().map(|s| s.amount_in).sum::<u64>());
                prop_assert!(quote.fee <= quote.consumed_in_amount);
                prop_assert!(quote.protocol_fee <= quote.fee);
                prop_assert!(quote.end_active_id <= active_id);
                for step in &quote.trace {
                    let reserve = reserves[(active_id - step.bin_id) as usize];
                    prop_assert!(step.amount_out <= reserve);
                }
            }
            Err(error) => prop_assert_eq!(error, DlmmError::InsufficientLiquidity),
        }
    }
}

// ============================================================================
// Distribution Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_distribution_is_exact(request in deposit_request()) {
        let distribution = LiquidityDistributor::default().distribute(&request).unwrap();

        prop_assert_eq!(distribution.total_x(), request.amount_x);
        prop_assert_eq!(distribution.total_y(), request.amount_y);
        prop_assert_eq!(
            distribution.bins.len(),
            (request.max_bin_id - request.min_bin_id + 1) as usize
        );
        for bin in &distribution.bins {
            if bin.amount_x > 0 {
                prop_assert!(bin.bin_id >= request.active_id);
            }
            if bin.amount_y > 0 {
                prop_assert!(bin.bin_id <= request.active_id);
            }
        }
    }

    #[test]
    fn prop_weight_parameters_sum_to_full_share(request in deposit_request()) {
        let distribution = LiquidityDistributor::default().distribute(&request).unwrap();
        let weights = distribution.to_weight_parameters().unwrap();

        let total_x: u64 = weights.iter().map(|w| u64::from(w.distribution_x)).sum();
        let total_y: u64 = weights.iter().map(|w| u64::from(w.distribution_y)).sum();
        prop_assert_eq!(total_x, if request.amount_x > 0 { 10_000 } else { 0 });
        prop_assert_eq!(total_y, if request.amount_y > 0 { 10_000 } else { 0 });
    }
}
