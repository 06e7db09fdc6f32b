//! PositionManager: owns every position of a run plus realized capital.
//!
//! Open positions live in an id-ordered map so that iteration, and therefore
//! exit order and the trade log, is identical across replays. Closed positions
//! are append-only. `current_capital` only moves when a position closes.

use super::config::PositionConfig;
use super::levels::{resolve_stop, resolve_take_profit};
use super::position::{ExitType, Position, PositionError};
use crate::domain::{PositionId, Side};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Headroom for floating-point noise when comparing against the risk cap.
const RISK_CAP_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SizingError {
    #[error("invalid stop loss {stop} for {side} entry at {entry}: no risk defined")]
    InvalidStop { entry: f64, stop: f64, side: Side },
    #[error("position size must be positive and finite, got {0}")]
    InvalidSize(f64),
}

/// Result of risk-based sizing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sizing {
    pub size: f64,
    pub risk_amount: f64,
}

#[derive(Debug, Clone)]
pub struct PositionManager {
    initial_capital: f64,
    current_capital: f64,
    max_total_risk_percent: f64,
    point_value: f64,
    compounding: bool,
    open: BTreeMap<PositionId, Position>,
    closed: Vec<Position>,
    next_id: u64,
}

impl PositionManager {
    pub fn new(initial_capital: f64, max_total_risk_percent: f64) -> Self {
        Self {
            initial_capital,
            current_capital: initial_capital,
            max_total_risk_percent,
            point_value: 1.0,
            compounding: false,
            open: BTreeMap::new(),
            closed: Vec::new(),
            next_id: 1,
        }
    }

    /// Currency value of a one-point move per unit of size.
    pub fn with_point_value(mut self, point_value: f64) -> Self {
        self.point_value = point_value;
        self
    }

    /// Size off current capital instead of initial capital.
    pub fn with_compounding(mut self, compounding: bool) -> Self {
        self.compounding = compounding;
        self
    }

    // ─── Accessors ──────────────────────────────────────────────────

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn current_capital(&self) -> f64 {
        self.current_capital
    }

    pub fn max_total_risk_percent(&self) -> f64 {
        self.max_total_risk_percent
    }

    pub fn point_value(&self) -> f64 {
        self.point_value
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.open.values()
    }

    pub fn open_ids(&self) -> Vec<PositionId> {
        self.open.keys().copied().collect()
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn closed_positions(&self) -> &[Position] {
        &self.closed
    }

    /// Look up a position by id, open first, then closed.
    pub fn get(&self, id: PositionId) -> Option<&Position> {
        self.open
            .get(&id)
            .or_else(|| self.closed.iter().find(|p| p.id == id))
    }

    pub fn has_open_for(&self, strategy_name: &str) -> bool {
        self.open.values().any(|p| p.strategy_name == strategy_name)
    }

    /// All positions of one strategy, open first, then closed.
    pub fn strategy_positions(&self, strategy_name: &str) -> Vec<&Position> {
        self.open
            .values()
            .chain(self.closed.iter())
            .filter(|p| p.strategy_name == strategy_name)
            .collect()
    }

    /// P&L of open positions not yet booked into capital.
    pub fn open_pnl(&self) -> f64 {
        self.open.values().map(Position::open_pnl).sum()
    }

    // ─── Risk ───────────────────────────────────────────────────────

    pub fn total_risk_amount(&self) -> f64 {
        self.open.values().map(|p| p.risk_amount).sum()
    }

    /// Open risk as a percent of current capital. Infinite when capital is gone.
    pub fn total_risk_percent(&self) -> f64 {
        if self.current_capital <= 0.0 {
            return f64::INFINITY;
        }
        self.total_risk_amount() / self.current_capital * 100.0
    }

    pub fn can_open_position(&self) -> bool {
        self.current_capital > 0.0 && self.total_risk_percent() < self.max_total_risk_percent
    }

    fn exceeds_cap_with(&self, additional_risk: f64) -> bool {
        let prospective = (self.total_risk_amount() + additional_risk) / self.current_capital * 100.0;
        prospective > self.max_total_risk_percent + RISK_CAP_EPSILON
    }

    /// Risk-based size for an entry at `entry` with its stop at `stop`.
    pub fn calculate_position_size(
        &self,
        entry: f64,
        stop: f64,
        config: &PositionConfig,
        side: Side,
    ) -> Result<Sizing, SizingError> {
        let risk_in_points = (entry - stop) * side.sign();
        if !(risk_in_points > 0.0) {
            return Err(SizingError::InvalidStop { entry, stop, side });
        }
        let capital_for_risk = if self.compounding {
            self.current_capital
        } else {
            self.initial_capital
        };
        let risk_amount = capital_for_risk * config.risk_percent / 100.0;
        let size = risk_amount / (risk_in_points * self.point_value);
        if !(size > 0.0 && size.is_finite()) {
            return Err(SizingError::InvalidSize(size));
        }
        Ok(Sizing { size, risk_amount })
    }

    // ─── Lifecycle ──────────────────────────────────────────────────

    /// Open a position, or return `Ok(None)` when the risk gate refuses it.
    pub fn open_position(
        &mut self,
        strategy_name: &str,
        time: DateTime<Utc>,
        price: f64,
        side: Side,
        config: &PositionConfig,
    ) -> Result<Option<&Position>, SizingError> {
        if !self.can_open_position() {
            return Ok(None);
        }
        let levels = resolve_stop(price, side, &config.stop_loss);
        let sizing = self.calculate_position_size(price, levels.sizing_stop, config, side)?;
        if self.exceeds_cap_with(sizing.risk_amount) {
            return Ok(None);
        }

        let risk_distance = (price - levels.sizing_stop).abs();
        let id = PositionId(self.next_id);
        self.next_id += 1;

        let position = Position {
            id,
            strategy_name: strategy_name.to_string(),
            entry_time: time,
            entry_price: price,
            side,
            size: sizing.size,
            initial_size: sizing.size,
            stop_loss: levels.placed_stop,
            take_profit: resolve_take_profit(price, side, risk_distance, &config.take_profit),
            risk_amount: sizing.risk_amount,
            point_value: self.point_value,
            risk_distance,
            max_bars: config.max_bars(),
            partial_plan: config.partial_exits.clone(),
            partials_taken: 0,
            current_price: price,
            highest_price: price,
            lowest_price: price,
            bars_held: 0,
            exit_time: None,
            exit_price: None,
            exit_type: None,
            partial_exit_history: Vec::new(),
        };
        self.open.insert(id, position);
        Ok(self.open.get(&id))
    }

    /// Close an open position and book its realized P&L into capital.
    pub fn close_position(
        &mut self,
        id: PositionId,
        time: DateTime<Utc>,
        price: f64,
        exit_type: ExitType,
    ) -> Result<&Position, PositionError> {
        let mut position = self.open.remove(&id).ok_or(PositionError::NotFound(id))?;
        position.close(time, price, exit_type)?;
        self.current_capital += position.realized_pnl();
        self.closed.push(position);
        self.closed.last().ok_or(PositionError::NotFound(id))
    }

    /// Close `fraction` of an open position's remaining size.
    pub fn partial_close(
        &mut self,
        id: PositionId,
        time: DateTime<Utc>,
        price: f64,
        fraction: f64,
        reason: &str,
    ) -> Result<f64, PositionError> {
        self.open
            .get_mut(&id)
            .ok_or(PositionError::NotFound(id))?
            .partial_close(time, price, fraction, reason)
    }

    /// Take the next rung of the position's partial-exit ladder at `price`.
    ///
    /// Returns `Ok(None)` when the ladder is exhausted.
    pub fn take_next_partial(
        &mut self,
        id: PositionId,
        time: DateTime<Utc>,
        price: f64,
    ) -> Result<Option<f64>, PositionError> {
        let position = self.open.get_mut(&id).ok_or(PositionError::NotFound(id))?;
        let Some(rung) = position.next_partial().copied() else {
            return Ok(None);
        };
        let pnl = position.partial_close(time, price, rung.fraction, rung.reason())?;
        position.partials_taken += 1;
        Ok(Some(pnl))
    }

    /// Mark every open position to `price`. Call once per bar before exits.
    pub fn update_positions(&mut self, price: f64) {
        for position in self.open.values_mut() {
            position.update_price(price);
        }
    }
}
