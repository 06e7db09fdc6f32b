//! Per-bar exit decisions.
//!
//! Decisions are computed for every open position first and applied
//! afterwards, so closing one position never changes what another sees on
//! the same bar.

use crate::position_management::{ExitType, Position};

/// What to do with one open position on this bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDecision {
    Close(ExitType),
    /// Take this many pending partial-exit rungs.
    Partials(usize),
}

/// Price- and time-driven exit, in priority order: stop-loss, take-profit,
/// then the bar limit.
pub fn price_exit(position: &Position, price: f64) -> Option<ExitType> {
    if let Some(stop) = position.stop_loss {
        if position.breached(price, stop) {
            return Some(ExitType::StopLoss);
        }
    }
    if let Some(target) = position.take_profit {
        if position.reached(price, target) {
            return Some(ExitType::TakeProfit);
        }
    }
    if let Some(limit) = position.max_bars {
        if position.bars_held >= limit {
            return Some(ExitType::TimeBased);
        }
    }
    None
}

/// Number of consecutive pending partial rungs already reached at `price`.
pub fn reached_partials(position: &Position, price: f64) -> usize {
    position.partial_plan[position.partials_taken.min(position.partial_plan.len())..]
        .iter()
        .take_while(|rung| position.reached(price, position.target_price(&rung.target)))
        .count()
}

/// Size below which a partially closed position counts as fully exited.
pub(crate) fn is_exhausted(position: &Position) -> bool {
    position.size <= position.initial_size * 1e-12
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use crate::position_management::position::tests::sample_position;
    use crate::position_management::PartialExit;

    #[test]
    fn stop_wins_over_target() {
        // degenerate levels where both trigger on the same price
        let mut pos = sample_position(Side::Long, 100.0, 1.0, 2.0);
        pos.stop_loss = Some(101.0);
        pos.take_profit = Some(99.0);
        assert_eq!(price_exit(&pos, 100.0), Some(ExitType::StopLoss));
    }

    #[test]
    fn short_levels_are_mirrored() {
        let mut pos = sample_position(Side::Short, 100.0, 1.0, 2.0);
        pos.stop_loss = Some(102.0);
        pos.take_profit = Some(96.0);
        assert_eq!(price_exit(&pos, 101.0), None);
        assert_eq!(price_exit(&pos, 102.0), Some(ExitType::StopLoss));
        assert_eq!(price_exit(&pos, 95.5), Some(ExitType::TakeProfit));
    }

    #[test]
    fn time_limit_after_price_levels() {
        let mut pos = sample_position(Side::Long, 100.0, 1.0, 2.0);
        pos.max_bars = Some(3);
        pos.bars_held = 3;
        assert_eq!(price_exit(&pos, 100.0), Some(ExitType::TimeBased));
        pos.take_profit = Some(100.0);
        assert_eq!(price_exit(&pos, 100.0), Some(ExitType::TakeProfit));
    }

    #[test]
    fn partial_rungs_reached_in_order() {
        let mut pos = sample_position(Side::Long, 100.0, 10.0, 20.0);
        pos.partial_plan = vec![
            PartialExit::at_r(0.5, 1.0),
            PartialExit::at_r(0.5, 2.0),
            PartialExit::at_price(1.0, 110.0),
        ];
        assert_eq!(reached_partials(&pos, 101.0), 0);
        assert_eq!(reached_partials(&pos, 102.0), 1);
        assert_eq!(reached_partials(&pos, 104.5), 2);
        pos.partials_taken = 2;
        assert_eq!(reached_partials(&pos, 104.5), 0);
        assert_eq!(reached_partials(&pos, 111.0), 1);
    }
}
