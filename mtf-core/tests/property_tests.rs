//! Property tests for position management invariants.
//!
//! Uses proptest to verify:
//! 1. Risk cap: open risk never exceeds the portfolio limit
//! 2. Partial additivity: slicing a position at one price books the same P&L
//! 3. R-multiple sign matches realized P&L sign
//! 4. Sizing: risk amount over stop distance, independent of side

use chrono::{DateTime, Duration, TimeZone, Utc};
use mtf_core::domain::Side;
use mtf_core::position_management::{ExitType, PositionConfig, PositionManager};
use proptest::prelude::*;

fn t(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(n)
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Long), Just(Side::Short)]
}

fn arb_price() -> impl Strategy<Value = f64> {
    (10.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_risk_percent() -> impl Strategy<Value = f64> {
    0.1..3.0_f64
}

fn arb_stop_percent() -> impl Strategy<Value = f64> {
    0.2..10.0_f64
}

// ── 1. Risk cap ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn open_risk_never_exceeds_cap(
        max_risk in 1.0..10.0_f64,
        attempts in prop::collection::vec((arb_side(), arb_price(), arb_risk_percent(), arb_stop_percent()), 1..30),
    ) {
        let mut manager = PositionManager::new(10_000.0, max_risk);
        for (i, (side, price, risk, stop)) in attempts.into_iter().enumerate() {
            let config = PositionConfig::percent_rr(risk, stop, 2.0);
            let before = manager.open_count();
            let opened = manager
                .open_position(&format!("s{i}"), t(i as i64), price, side, &config)
                .unwrap()
                .is_some();
            prop_assert!(manager.total_risk_percent() <= max_risk + 1e-9);
            if !opened {
                // a refusal leaves the book unchanged
                prop_assert_eq!(manager.open_count(), before);
            }
        }
    }
}

// ── 2. Partial additivity ────────────────────────────────────────────

proptest! {
    #[test]
    fn slices_sum_to_whole(
        side in arb_side(),
        entry in arb_price(),
        exit in arb_price(),
        fractions in prop::collection::vec(0.05..0.95_f64, 0..5),
    ) {
        let config = PositionConfig::percent_rr(1.0, 2.0, 2.0);

        let mut whole = PositionManager::new(10_000.0, 100.0);
        let id = whole.open_position("w", t(0), entry, side, &config).unwrap().unwrap().id;
        let expected = whole.close_position(id, t(1), exit, ExitType::Manual).unwrap().realized_pnl();

        let mut sliced = PositionManager::new(10_000.0, 100.0);
        let id = sliced.open_position("s", t(0), entry, side, &config).unwrap().unwrap().id;
        for fraction in &fractions {
            sliced.partial_close(id, t(1), exit, *fraction, "slice").unwrap();
        }
        let position = sliced.close_position(id, t(1), exit, ExitType::Manual).unwrap();
        prop_assert_eq!(position.partial_exit_history.len(), fractions.len());
        let tolerance = 1e-9 * expected.abs().max(1.0);
        prop_assert!((position.realized_pnl() - expected).abs() <= tolerance);
        prop_assert!((sliced.current_capital() - whole.current_capital()).abs() <= tolerance);
    }
}

// ── 3. R-multiple sign ───────────────────────────────────────────────

proptest! {
    #[test]
    fn r_multiple_sign_follows_pnl(side in arb_side(), entry in arb_price(), exit in arb_price()) {
        let mut manager = PositionManager::new(10_000.0, 100.0);
        let config = PositionConfig::percent_rr(1.0, 2.0, 2.0);
        let id = manager.open_position("r", t(0), entry, side, &config).unwrap().unwrap().id;
        let position = manager.close_position(id, t(1), exit, ExitType::Manual).unwrap();
        let pnl = position.realized_pnl();
        let r = position.r_multiple();
        prop_assert_eq!(pnl > 0.0, r > 0.0);
        prop_assert_eq!(pnl < 0.0, r < 0.0);
        prop_assert_eq!(position.is_winner(), pnl > 0.0);
    }
}

// ── 4. Sizing ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn stop_loss_exit_loses_one_r(side in arb_side(), entry in arb_price(), stop in arb_stop_percent()) {
        let mut manager = PositionManager::new(10_000.0, 100.0);
        let config = PositionConfig::percent_rr(1.0, stop, 2.0);
        let position = manager.open_position("z", t(0), entry, side, &config).unwrap().unwrap();
        let (id, stop_price) = (position.id, position.stop_loss.unwrap());
        prop_assert!((position.risk_amount - 100.0).abs() < 1e-9);

        let closed = manager.close_position(id, t(1), stop_price, ExitType::StopLoss).unwrap();
        prop_assert!((closed.r_multiple() + 1.0).abs() < 1e-6);
    }
}
