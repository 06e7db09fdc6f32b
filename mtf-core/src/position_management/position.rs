//! Position: one simulated trade from entry to exit.
//!
//! P&L uses point-value economics: `price_diff × size × point_value`, signed by
//! side. A position is frozen once closed; only the manager closes it.

use super::config::{PartialExit, PartialTarget};
use crate::domain::{PositionId, Side};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Terminal state of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitType {
    StopLoss,
    TakeProfit,
    TimeBased,
    ConditionBased,
    Manual,
}

/// One realized slice of a partially closed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialExitRecord {
    pub time: DateTime<Utc>,
    pub price: f64,
    pub size: f64,
    pub pnl: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PositionError {
    #[error("partial close fraction must be in (0, 1], got {0}")]
    InvalidFraction(f64),
    #[error("position {0} is already closed")]
    AlreadyClosed(PositionId),
    #[error("position {0} not found among open positions")]
    NotFound(PositionId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub strategy_name: String,

    // ── Entry ──
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub side: Side,
    pub size: f64,
    pub initial_size: f64,

    // ── Risk ──
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    /// Currency amount risked, fixed at open.
    pub risk_amount: f64,
    pub point_value: f64,
    /// Absolute entry-to-stop distance used for sizing and R targets.
    pub risk_distance: f64,

    // ── Exit plan ──
    pub max_bars: Option<usize>,
    pub partial_plan: Vec<PartialExit>,
    /// Number of partial rungs already taken.
    pub partials_taken: usize,

    // ── Tracking ──
    pub current_price: f64,
    pub highest_price: f64,
    pub lowest_price: f64,
    pub bars_held: usize,

    // ── Exit ──
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_price: Option<f64>,
    pub exit_type: Option<ExitType>,
    pub partial_exit_history: Vec<PartialExitRecord>,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.exit_time.is_none() && self.size > 0.0
    }

    pub fn is_closed(&self) -> bool {
        self.exit_time.is_some()
    }

    fn slice_pnl(&self, price: f64, size: f64) -> f64 {
        (price - self.entry_price) * self.side.sign() * size * self.point_value
    }

    /// Mark-to-market P&L of the remaining size. Zero once closed.
    pub fn unrealized_pnl(&self) -> f64 {
        if !self.is_open() {
            return 0.0;
        }
        self.slice_pnl(self.current_price, self.size)
    }

    pub fn partial_pnl(&self) -> f64 {
        self.partial_exit_history.iter().map(|r| r.pnl).sum()
    }

    /// Realized P&L over the whole life: partial slices plus, once closed,
    /// the remaining slice at the exit price.
    pub fn realized_pnl(&self) -> f64 {
        let final_slice = self
            .exit_price
            .map(|price| self.slice_pnl(price, self.size))
            .unwrap_or(0.0);
        self.partial_pnl() + final_slice
    }

    /// P&L not yet booked into capital: unrealized plus realized partials.
    pub fn open_pnl(&self) -> f64 {
        if self.is_closed() {
            return 0.0;
        }
        self.unrealized_pnl() + self.partial_pnl()
    }

    pub fn r_multiple(&self) -> f64 {
        if self.risk_amount == 0.0 {
            return 0.0;
        }
        self.realized_pnl() / self.risk_amount
    }

    pub fn is_winner(&self) -> bool {
        self.realized_pnl() > 0.0
    }

    /// Wall-clock holding time, for closed positions.
    pub fn duration(&self) -> Option<Duration> {
        self.exit_time.map(|exit| exit - self.entry_time)
    }

    /// Mark to `price` and count one more bar held.
    pub fn update_price(&mut self, price: f64) {
        if self.is_closed() {
            return;
        }
        self.current_price = price;
        self.highest_price = self.highest_price.max(price);
        self.lowest_price = self.lowest_price.min(price);
        self.bars_held += 1;
    }

    /// Next untaken rung of the partial-exit ladder.
    pub fn next_partial(&self) -> Option<&PartialExit> {
        self.partial_plan.get(self.partials_taken)
    }

    /// Trigger price of a partial target.
    pub fn target_price(&self, target: &PartialTarget) -> f64 {
        match *target {
            PartialTarget::RMultiple { value } => {
                self.entry_price + self.side.sign() * value * self.risk_distance
            }
            PartialTarget::Price { value } => value,
        }
    }

    /// True once `price` is at or beyond `level` in the profitable direction.
    pub fn reached(&self, price: f64, level: f64) -> bool {
        match self.side {
            Side::Long => price >= level,
            Side::Short => price <= level,
        }
    }

    /// True once `price` is at or beyond `level` in the losing direction.
    pub fn breached(&self, price: f64, level: f64) -> bool {
        match self.side {
            Side::Long => price <= level,
            Side::Short => price >= level,
        }
    }

    /// Close `fraction` of the remaining size and return that slice's P&L.
    ///
    /// Stops and targets stay where they are.
    pub fn partial_close(
        &mut self,
        time: DateTime<Utc>,
        price: f64,
        fraction: f64,
        reason: impl Into<String>,
    ) -> Result<f64, PositionError> {
        if self.is_closed() {
            return Err(PositionError::AlreadyClosed(self.id));
        }
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(PositionError::InvalidFraction(fraction));
        }
        let exit_size = if fraction >= 1.0 { self.size } else { self.size * fraction };
        let pnl = self.slice_pnl(price, exit_size);
        self.size -= exit_size;
        self.partial_exit_history.push(PartialExitRecord {
            time,
            price,
            size: exit_size,
            pnl,
            reason: reason.into(),
        });
        Ok(pnl)
    }

    pub(crate) fn close(
        &mut self,
        time: DateTime<Utc>,
        price: f64,
        exit_type: ExitType,
    ) -> Result<(), PositionError> {
        if self.is_closed() {
            return Err(PositionError::AlreadyClosed(self.id));
        }
        self.current_price = price;
        self.exit_time = Some(time);
        self.exit_price = Some(price);
        self.exit_type = Some(exit_type);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn sample_position(side: Side, entry: f64, size: f64, risk_amount: f64) -> Position {
        Position {
            id: PositionId(1),
            strategy_name: "test".into(),
            entry_time: Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap(),
            entry_price: entry,
            side,
            size,
            initial_size: size,
            stop_loss: None,
            take_profit: None,
            risk_amount,
            point_value: 1.0,
            risk_distance: risk_amount / size,
            max_bars: None,
            partial_plan: Vec::new(),
            partials_taken: 0,
            current_price: entry,
            highest_price: entry,
            lowest_price: entry,
            bars_held: 0,
            exit_time: None,
            exit_price: None,
            exit_type: None,
            partial_exit_history: Vec::new(),
        }
    }

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, hour, 0, 0).unwrap()
    }

    fn assert_approx(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "expected {b}, got {a}");
    }

    #[test]
    fn unrealized_follows_price_and_side() {
        let mut long = sample_position(Side::Long, 100.0, 10.0, 20.0);
        long.update_price(103.0);
        assert_approx(long.unrealized_pnl(), 30.0);

        let mut short = sample_position(Side::Short, 100.0, 10.0, 20.0);
        short.update_price(103.0);
        assert_approx(short.unrealized_pnl(), -30.0);
    }

    #[test]
    fn update_tracks_extremes_and_bars() {
        let mut pos = sample_position(Side::Long, 100.0, 1.0, 1.0);
        pos.update_price(105.0);
        pos.update_price(97.0);
        assert_eq!(pos.highest_price, 105.0);
        assert_eq!(pos.lowest_price, 97.0);
        assert_eq!(pos.bars_held, 2);
    }

    #[test]
    fn point_value_scales_pnl() {
        let mut pos = sample_position(Side::Long, 1.1000, 2.0, 10.0);
        pos.point_value = 100_000.0;
        pos.close(t(12), 1.1010, ExitType::TakeProfit).unwrap();
        assert_approx(pos.realized_pnl(), 0.0010 * 2.0 * 100_000.0);
    }

    #[test]
    fn partials_add_up_with_final_slice() {
        let mut pos = sample_position(Side::Long, 100.0, 10.0, 20.0);
        let first = pos.partial_close(t(10), 104.0, 0.5, "partial_2R").unwrap();
        assert_approx(first, 20.0);
        assert_approx(pos.size, 5.0);
        pos.close(t(11), 106.0, ExitType::TakeProfit).unwrap();
        assert_approx(pos.realized_pnl(), 20.0 + 30.0);
        assert_approx(pos.r_multiple(), 2.5);
        assert_eq!(pos.initial_size, 10.0);
    }

    #[test]
    fn open_pnl_includes_realized_partials() {
        let mut pos = sample_position(Side::Short, 100.0, 4.0, 8.0);
        pos.partial_close(t(10), 98.0, 0.5, "scale").unwrap();
        pos.update_price(99.0);
        assert_approx(pos.open_pnl(), 4.0 + 2.0);
    }

    #[test]
    fn partial_close_rejects_bad_fraction() {
        let mut pos = sample_position(Side::Long, 100.0, 1.0, 1.0);
        assert_eq!(
            pos.partial_close(t(10), 101.0, 0.0, "x"),
            Err(PositionError::InvalidFraction(0.0))
        );
        assert_eq!(
            pos.partial_close(t(10), 101.0, 1.2, "x"),
            Err(PositionError::InvalidFraction(1.2))
        );
        assert!(pos.partial_exit_history.is_empty());
    }

    #[test]
    fn full_fraction_leaves_no_size() {
        let mut pos = sample_position(Side::Long, 100.0, 3.0, 3.0);
        pos.partial_close(t(10), 101.0, 1.0, "all").unwrap();
        assert_eq!(pos.size, 0.0);
        assert!(!pos.is_open());
    }

    #[test]
    fn closed_position_is_frozen() {
        let mut pos = sample_position(Side::Long, 100.0, 1.0, 1.0);
        pos.close(t(10), 99.0, ExitType::StopLoss).unwrap();
        pos.update_price(150.0);
        assert_eq!(pos.current_price, 99.0);
        assert_eq!(pos.bars_held, 0);
        assert_eq!(
            pos.close(t(11), 98.0, ExitType::Manual),
            Err(PositionError::AlreadyClosed(PositionId(1)))
        );
        assert_approx(pos.unrealized_pnl(), 0.0);
    }

    #[test]
    fn r_target_price_uses_risk_distance() {
        let pos = sample_position(Side::Short, 100.0, 10.0, 20.0);
        let level = pos.target_price(&PartialTarget::RMultiple { value: 1.5 });
        assert_approx(level, 97.0);
        assert!(pos.reached(96.5, level));
        assert!(!pos.reached(97.5, level));
        assert!(pos.breached(102.0, 102.0));
    }

    #[test]
    fn zero_risk_gives_zero_r() {
        let mut pos = sample_position(Side::Long, 100.0, 1.0, 1.0);
        pos.risk_amount = 0.0;
        pos.close(t(10), 110.0, ExitType::Manual).unwrap();
        assert_eq!(pos.r_multiple(), 0.0);
    }
}
