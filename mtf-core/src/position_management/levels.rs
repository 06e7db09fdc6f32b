//! Stop and target price resolution for a new position.

use super::config::{StopLossRule, TakeProfitRule};
use crate::domain::Side;

/// Stop distance used for sizing when a rule places no price stop.
pub const DEFAULT_SIZING_STOP_PERCENT: f64 = 1.0;

/// Resolved stop for one entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopLevels {
    /// Stop price fed into sizing.
    pub sizing_stop: f64,
    /// Stop actually placed on the position, if any.
    pub placed_stop: Option<f64>,
}

fn percent_away(entry: f64, side: Side, percent: f64) -> f64 {
    entry * (1.0 - side.sign() * percent / 100.0)
}

pub fn resolve_stop(entry: f64, side: Side, rule: &StopLossRule) -> StopLevels {
    match *rule {
        StopLossRule::Percent { percent } => {
            let stop = percent_away(entry, side, percent);
            StopLevels {
                sizing_stop: stop,
                placed_stop: Some(stop),
            }
        }
        StopLossRule::Price { price } => {
            let stop = price.unwrap_or_else(|| percent_away(entry, side, DEFAULT_SIZING_STOP_PERCENT));
            StopLevels {
                sizing_stop: stop,
                placed_stop: Some(stop),
            }
        }
        StopLossRule::Time { .. } | StopLossRule::Condition => StopLevels {
            sizing_stop: percent_away(entry, side, DEFAULT_SIZING_STOP_PERCENT),
            placed_stop: None,
        },
    }
}

/// Take-profit price. `risk_distance` is the absolute entry-to-stop distance.
pub fn resolve_take_profit(entry: f64, side: Side, risk_distance: f64, rule: &TakeProfitRule) -> Option<f64> {
    match *rule {
        TakeProfitRule::Percent { percent } => Some(entry * (1.0 + side.sign() * percent / 100.0)),
        TakeProfitRule::RiskReward { ratio } => Some(entry + side.sign() * risk_distance * ratio),
        TakeProfitRule::Price { price } => Some(price),
        TakeProfitRule::Time { .. } | TakeProfitRule::Condition => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "expected {b}, got {a}");
    }

    #[test]
    fn percent_stop_long_and_short() {
        let long = resolve_stop(100.0, Side::Long, &StopLossRule::Percent { percent: 2.0 });
        assert_approx(long.sizing_stop, 98.0);
        assert_eq!(long.placed_stop, Some(long.sizing_stop));

        let short = resolve_stop(100.0, Side::Short, &StopLossRule::Percent { percent: 2.0 });
        assert_approx(short.sizing_stop, 102.0);
    }

    #[test]
    fn time_stop_sizes_with_default_but_places_nothing() {
        let levels = resolve_stop(200.0, Side::Long, &StopLossRule::Time { bars: 10 });
        assert_approx(levels.sizing_stop, 198.0);
        assert_eq!(levels.placed_stop, None);
    }

    #[test]
    fn unset_price_stop_defaults_to_one_percent() {
        let levels = resolve_stop(50.0, Side::Short, &StopLossRule::Price { price: None });
        assert_approx(levels.sizing_stop, 50.5);
        assert_eq!(levels.placed_stop, Some(levels.sizing_stop));
    }

    #[test]
    fn rr_target_scales_with_risk_distance() {
        let tp = resolve_take_profit(100.0, Side::Long, 2.0, &TakeProfitRule::RiskReward { ratio: 2.0 });
        assert_approx(tp.unwrap(), 104.0);
        let tp = resolve_take_profit(100.0, Side::Short, 2.0, &TakeProfitRule::RiskReward { ratio: 3.0 });
        assert_approx(tp.unwrap(), 94.0);
    }

    #[test]
    fn condition_target_is_none() {
        assert_eq!(
            resolve_take_profit(100.0, Side::Long, 1.0, &TakeProfitRule::Condition),
            None
        );
    }
}
