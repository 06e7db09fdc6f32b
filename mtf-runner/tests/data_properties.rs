//! Property tests for the generated data and the symbol universe.

use chrono::{TimeZone, Utc};
use mtf_core::domain::Timeframe;
use mtf_runner::data_loader::synthetic_bars;
use mtf_runner::SymbolUniverse;
use proptest::prelude::*;

fn timeframe() -> impl Strategy<Value = Timeframe> {
    prop::sample::select(vec![Timeframe::M5, Timeframe::M15, Timeframe::H1, Timeframe::H4])
}

proptest! {
    #[test]
    fn synthetic_bars_are_sane_and_evenly_spaced(
        symbol in "[A-Z]{3,8}",
        tf in timeframe(),
        n in 1usize..400,
    ) {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = synthetic_bars(&symbol, tf, n, start);
        prop_assert_eq!(bars.len(), n);
        prop_assert_eq!(bars[0].timestamp, start);
        for bar in &bars {
            prop_assert!(bar.is_sane());
            prop_assert!(bar.close > 0.0);
        }
        for pair in bars.windows(2) {
            prop_assert_eq!(pair[1].timestamp - pair[0].timestamp, tf.duration());
            // each bar opens at the previous close
            prop_assert_eq!(pair[1].open, pair[0].close);
        }
    }

    #[test]
    fn moving_a_symbol_keeps_the_universe_partitioned(
        used in prop::collection::btree_set("[a-z]{6}", 0..6),
        ignored in prop::collection::btree_set("[A-Z]{6}", 1..6),
        pick in any::<prop::sample::Index>(),
    ) {
        let universe = SymbolUniverse {
            used: used.iter().cloned().collect(),
            ignored: ignored.iter().cloned().collect(),
        };
        let symbol = pick.get(&universe.ignored).clone();

        let moved = universe.move_to_used(&symbol).unwrap();
        prop_assert!(moved.is_active(&symbol));
        prop_assert!(!moved.ignored.contains(&symbol));
        prop_assert_eq!(moved.used.len() + moved.ignored.len(), used.len() + ignored.len());

        let back = moved.move_to_ignored(&symbol).unwrap();
        prop_assert!(!back.is_active(&symbol));
        prop_assert!(back.ignored.contains(&symbol));
    }
}
