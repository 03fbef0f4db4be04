//! Property-based tests for the projection stages.
//!
//! These tests verify invariants that should hold for all valid inputs,
//! using randomly generated panels, series and truncation parameters.

use anofox_demography::core::RatePanel;
use anofox_demography::decomposition::FactorDecomposer;
use anofox_demography::models::arima::ArimaOrder;
use anofox_demography::models::fit_forecast;
use anofox_demography::simulation::{percentiles, simulate, PercentileLevels};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Strategy for strictly positive rate panels of the given size range.
fn panel_strategy(max_periods: usize, max_categories: usize) -> impl Strategy<Value = RatePanel> {
    (2..=max_periods, 1..=max_categories).prop_flat_map(|(n, m)| {
        prop::collection::vec(prop::collection::vec(1e-4..0.5_f64, m), n).prop_map(move |rows| {
            let categories = (0..m).map(|x| format!("c{}", x)).collect();
            RatePanel::new((1980..1980 + n as i32).collect(), categories, rows).unwrap()
        })
    })
}

/// Strategy for sorted level lists inside (0, 1).
fn levels_strategy() -> impl Strategy<Value = PercentileLevels> {
    prop::collection::vec(0.001..0.999_f64, 1..10).prop_map(|mut levels| {
        levels.sort_by(|a, b| a.total_cmp(b));
        PercentileLevels::new(levels).unwrap()
    })
}

/// Strategy for valid truncation parameters: (point, lower, upper, std_dev).
fn truncation_strategy() -> impl Strategy<Value = (f64, f64, f64, f64)> {
    (-5.0..5.0_f64, -3.0..3.0_f64, 0.01..4.0_f64, 0.01..2.0_f64)
        .prop_map(|(point, lower, width, sd)| (point, lower, lower + width, sd))
}

// =============================================================================
// Property: full-rank decomposition round-trips the panel
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn full_rank_round_trip(panel in panel_strategy(8, 6)) {
        let k = panel.n_periods().min(panel.n_categories());
        let decomposer = FactorDecomposer::new();
        let decomposition = decomposer.decompose(&panel, k).unwrap();
        let rebuilt = decomposer
            .reconstruct(&decomposition, &decomposition.time_factors())
            .unwrap();
        prop_assert!(rebuilt.max_abs_diff(&panel).unwrap() < 1e-9);
    }

    #[test]
    fn singular_values_sorted_and_non_negative(panel in panel_strategy(10, 8)) {
        let k = panel.n_periods().min(panel.n_categories());
        let decomposition = FactorDecomposer::new().decompose(&panel, k).unwrap();
        let values = decomposition.singular_values();
        prop_assert!(values.iter().all(|&s| s >= 0.0));
        prop_assert!(values.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn category_patterns_sum_non_negative(panel in panel_strategy(10, 8)) {
        let decomposition = FactorDecomposer::new().decompose(&panel, 1).unwrap();
        prop_assert!(decomposition.category_pattern(0).iter().sum::<f64>() >= 0.0);
    }
}

// =============================================================================
// Property: truncated-normal draws stay within bounds
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn draws_within_bounds(
        (point, lower, upper, sd) in truncation_strategy(),
        seed in any::<u64>()
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let draws = simulate(point, lower, upper, sd, 200, &mut rng).unwrap();
        prop_assert_eq!(draws.len(), 200);
        prop_assert!(draws.values().iter().all(|v| *v >= lower && *v <= upper));
    }

    #[test]
    fn percentiles_non_decreasing(
        draws in prop::collection::vec(-100.0..100.0_f64, 1..300),
        levels in levels_strategy()
    ) {
        let values = percentiles(&draws, &levels).unwrap();
        prop_assert_eq!(values.len(), levels.len());
        prop_assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }
}

// =============================================================================
// Property: forecasts extend the input without altering it
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn fit_forecast_length_and_prefix(
        series in prop::collection::vec(-2.0..2.0_f64, 5..40),
        horizon in 0usize..15
    ) {
        let extended = fit_forecast(&series, ArimaOrder::default(), horizon, 1000).unwrap();
        prop_assert_eq!(extended.len(), series.len() + horizon);
        prop_assert_eq!(&extended[..series.len()], series.as_slice());
    }
}
