//! # Engine Parity Tests
//!
//! End-to-end scenarios checking that quotes, fee amounts, bitmap lookups
//! and deposit splits match the program's settlement arithmetic.

#[cfg(test)]
mod tests {
    use dlmm_core::bitmap::{BinBitmapIndex, Direction};
    use dlmm_core::math::*;
    use dlmm_core::*;
    use solana_program::pubkey::Pubkey;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn parameters(base_factor: u16) -> StaticParameters {
        StaticParameters {
            base_factor,
            filter_period: 30,
            decay_period: 600,
            reduction_factor: 5_000,
            variable_fee_control: 0,
            max_volatility_accumulator: 350_000,
            protocol_share: 1_000,
            ..StaticParameters::default()
        }
    }

    /// Snapshot with `bins` loaded and their arrays flagged in the bitmap
    fn snapshot(active_id: i32, base_factor: u16, bins: &[(i32, u64, u64)]) -> PoolSnapshot {
        let address = Pubkey::new_unique();
        let mut pool = LbPair::new(10, active_id, parameters(base_factor));
        let mut store = BinArrayStore::new();
        for &(bin_id, amount_x, amount_y) in bins {
            let index = bin_id_to_bin_array_index(bin_id);
            if !store.contains(index) {
                store.insert(BinArray::new(index, address).unwrap()).unwrap();
            }
            *store.bin_at_mut(bin_id).unwrap() = Bin::with_reserves(amount_x, amount_y);
            let position = (index + 512) as usize;
            pool.bin_array_bitmap[position / 64] |= 1 << (position % 64);
        }
        PoolSnapshot::from_parts(address, pool, None, store).unwrap()
    }

    // ========================================================================
    // Swap Scenarios
    // ========================================================================

    #[test]
    fn test_swap_walks_from_active_into_next_bin() {
        init_tracing();
        let snapshot = snapshot(100, 10_000, &[(100, 600_000, 0), (101, 600_000, 0)]);
        let simulator = snapshot.swap_simulator();

        let quote = simulator
            .quote_exact_in(&SwapParams::exact_in(1_000_000, false, 0))
            .unwrap();

        assert_eq!(quote.trace.len(), 2);
        assert_eq!(quote.trace[0].bin_id, 100);
        assert_eq!(quote.trace[1].bin_id, 101);
        assert_eq!(quote.end_active_id, 101);
        assert_eq!(quote.consumed_in_amount, 1_000_000);

        // Bin 100 is emptied at its own price plus the fee on top
        let fees = FeeEngine::from_pool(snapshot.pool());
        let price = get_price_from_id(100, 10).unwrap();
        let max_in = mul_shr(600_000, price, SCALE_OFFSET, Rounding::Up).unwrap() as u64;
        assert_eq!(quote.trace[0].amount_out, 600_000);
        assert_eq!(quote.trace[0].amount_in, max_in + fees.compute_fee(max_in).unwrap());

        let reserves: u64 = 1_200_000;
        assert!(quote.out_amount <= reserves);
        assert!(quote.out_amount > 600_000);
        assert_eq!(quote.fee, quote.trace.iter().map(|step| step.fee).sum::<u64>());
        assert_eq!(quote.protocol_fee, quote.trace.iter().map(|step| step.protocol_fee).sum::<u64>());
    }

    #[test]
    fn test_swap_exceeding_reserves_is_insufficient() {
        init_tracing();
        let snapshot = snapshot(100, 10_000, &[(100, 600_000, 0), (101, 600_000, 0)]);
        let result = snapshot
            .swap_simulator()
            .quote_exact_in(&SwapParams::exact_in(2_000_000, false, 0));
        assert_eq!(result, Err(DlmmError::InsufficientLiquidity));
        assert!(result.unwrap_err().needs_more_accounts());
    }

    #[test]
    fn test_exact_out_inverts_exact_in() {
        let snapshot = snapshot(0, 1_000, &[(0, 0, 500_000), (-1, 0, 500_000), (-2, 0, 500_000)]);
        let simulator = snapshot.swap_simulator();

        let exact_out = simulator
            .quote_exact_out(&SwapParams::exact_out(700_000, true, 0))
            .unwrap();
        assert_eq!(exact_out.out_amount, 700_000);

        // Spending the quoted input must buy at least the requested output
        let exact_in = simulator
            .quote_exact_in(&SwapParams::exact_in(exact_out.in_amount, true, 0))
            .unwrap();
        assert!(exact_in.out_amount >= 700_000);
        assert_eq!(exact_in.end_active_id, exact_out.end_active_id);
    }

    #[test]
    fn test_quote_through_config_limits() {
        let config = EngineConfig::from_toml_str(
            r#"
            default_slippage_bps = 50
            max_active_bin_slippage = 0
            "#,
        )
        .unwrap();
        let snapshot = snapshot(0, 1_000, &[(0, 0, 1_000), (-1, 0, 1_000)]);
        let limits = SwapLimits::from_config(&config);

        let small = SwapParams::exact_in(500, true, 0).with_limits(limits);
        let quote = snapshot.swap_simulator().quote_exact_in(&small).unwrap();
        assert_eq!(quote.min_out_amount, quote.out_amount * 9_950 / 10_000);

        let large = SwapParams::exact_in(1_500, true, 0).with_limits(limits);
        assert_eq!(
            snapshot.swap_simulator().quote_exact_in(&large),
            Err(DlmmError::SlippageExceeded)
        );
    }

    /// Pool at bin step 1 whose active bin is the last bin of array 511, the
    /// top of the inline bitmap window, holding `edge_reserve_x` of X
    fn window_edge_snapshot(edge_reserve_x: u64, far_reserve_x: Option<u64>) -> PoolSnapshot {
        let address = Pubkey::new_unique();
        let edge_bin = 511 * 70 + 69;
        let mut pool = LbPair::new(1, edge_bin, parameters(1_000));
        pool.bin_array_bitmap[15] |= 1 << 63;

        let mut store = BinArrayStore::new();
        store.insert(BinArray::new(511, address).unwrap()).unwrap();
        *store.bin_at_mut(edge_bin).unwrap() = Bin::with_reserves(edge_reserve_x, 0);

        let extension = far_reserve_x.map(|reserve_x| {
            store.insert(BinArray::new(600, address).unwrap()).unwrap();
            *store.bin_at_mut(600 * 70).unwrap() = Bin::with_reserves(reserve_x, 0);
            let mut extension = BinArrayBitmapExtension::new(address);
            extension.set_populated(600, true).unwrap();
            extension
        });
        PoolSnapshot::from_parts(address, pool, extension, store).unwrap()
    }

    #[test]
    fn test_swap_crosses_into_extension_arrays() {
        init_tracing();
        let snapshot = window_edge_snapshot(1_000, Some(1_000_000_000));
        let quote = snapshot
            .swap_simulator()
            .quote_exact_in(&SwapParams::exact_in(1_000_000, false, 0))
            .unwrap();

        assert_eq!(quote.bin_arrays, vec![511, 600]);
        assert_eq!(quote.trace.len(), 2);
        assert_eq!(quote.trace[0].bin_id, 511 * 70 + 69);
        assert_eq!(quote.trace[0].amount_out, 1_000);
        assert_eq!(quote.trace[1].bin_id, 600 * 70);
        assert_eq!(quote.end_active_id, 600 * 70);
        assert_eq!(quote.consumed_in_amount, 1_000_000);
    }

    #[test]
    fn test_swap_past_window_without_extension_is_indeterminate() {
        let snapshot = window_edge_snapshot(1_000, None);
        let result = snapshot
            .swap_simulator()
            .quote_exact_in(&SwapParams::exact_in(1_000_000, false, 0));
        assert_eq!(result, Err(DlmmError::Indeterminate(512)));
        assert!(result.unwrap_err().needs_more_accounts());

        // Filling inside the edge bin never needs the extension
        let quote = snapshot
            .swap_simulator()
            .quote_exact_in(&SwapParams::exact_in(10_000, false, 0))
            .unwrap();
        assert_eq!(quote.bin_arrays, vec![511]);
    }

    // ========================================================================
    // Fee Scenarios
    // ========================================================================

    #[test]
    fn test_one_basis_point_fee_without_volatility() {
        let pool = LbPair::new(10, 0, parameters(1_000));
        let fees = FeeEngine::from_pool(&pool);
        assert_eq!(fees.total_fee_rate().unwrap(), 100_000);
        assert_eq!(fees.compute_fee_from_amount(1_000_000).unwrap(), 100);
    }

    // ========================================================================
    // Bitmap Scenarios
    // ========================================================================

    #[test]
    fn test_bitmap_scan_over_populated_arrays() {
        let pool = LbPair::new(10, 0, StaticParameters::default());
        let mut bitmap = BinBitmapIndex::new(&pool, None);
        for index in [-3, 0, 5] {
            bitmap.mark_populated(index, true).unwrap();
        }
        let (lower_of_minus_three, _) = bin_array_lower_upper_bin_id(-3).unwrap();
        let (lower_of_five, upper_of_five) = bin_array_lower_upper_bin_id(5).unwrap();

        assert_eq!(bitmap.next_with_liquidity(Direction::Up, lower_of_minus_three).unwrap(), Some(0));
        assert_eq!(bitmap.next_with_liquidity(Direction::Down, lower_of_five).unwrap(), Some(0));
        assert_eq!(bitmap.next_with_liquidity(Direction::Up, upper_of_five).unwrap(), None);
        assert_eq!(
            bitmap.next_with_liquidity(Direction::Up, 600 * 70),
            Err(DlmmError::Indeterminate(600))
        );
    }

    // ========================================================================
    // Distribution Scenarios
    // ========================================================================

    #[test]
    fn test_spot_deposit_split() {
        let distributor = LiquidityDistributor::from_config(&EngineConfig::default());
        let request = DistributionRequest {
            amount_x: 500,
            amount_y: 0,
            min_bin_id: 98,
            max_bin_id: 102,
            active_id: 100,
            strategy: StrategyType::Spot,
        };
        let distribution = distributor.distribute(&request).unwrap();
        assert_eq!(distribution.get(101).unwrap().amount_x, 250);
        assert_eq!(distribution.get(102).unwrap().amount_x, 250);

        let odd = distributor
            .distribute(&DistributionRequest { amount_x: 501, ..request })
            .unwrap();
        assert_eq!(odd.get(101).unwrap().amount_x, 251);
        assert_eq!(odd.get(102).unwrap().amount_x, 250);
    }

    #[test]
    fn test_price_codec_matches_array_geometry() {
        for bin_id in [-141, -140, -71, -70, -1, 0, 69, 70, 139] {
            let index = bin_id_to_bin_array_index(bin_id);
            let (lower, upper) = bin_array_lower_upper_bin_id(index).unwrap();
            assert!(lower <= bin_id && bin_id <= upper);

            let price = get_price_from_id(bin_id, 25).unwrap();
            assert_eq!(get_id_from_price(price, 25, Rounding::Down).unwrap(), bin_id);
        }
    }
}
