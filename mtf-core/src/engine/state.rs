//! Engine configuration, run phases, and results.

use super::window::TradingWindow;
use crate::domain::{Timeframe, TradeLogRecord};
use crate::performance::{
    DrawdownEpisode, DrawdownPoint, EquityPoint, PerformanceMetrics, RatioSettings, StrategySummary,
};
use crate::position_management::Position;
use serde::{Deserialize, Serialize};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Starting capital.
    pub initial_capital: f64,
    /// Cap on open risk, as percent of current capital.
    pub max_total_risk_percent: f64,
    /// Currency value of a one-point move per unit of size.
    pub point_value: f64,
    /// Size off current capital instead of initial capital.
    pub compounding: bool,
    pub periods_per_year: f64,
    pub risk_free_rate: f64,
    /// Close leftover positions at the last bar's close (exit type MANUAL).
    pub close_open_at_end: bool,
    /// Gate for new entries. `None` means always allowed.
    pub trading_window: Option<TradingWindow>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            max_total_risk_percent: 6.0,
            point_value: 1.0,
            compounding: false,
            periods_per_year: 252.0,
            risk_free_rate: 0.0,
            close_open_at_end: false,
            trading_window: None,
        }
    }
}

impl EngineConfig {
    pub fn ratio_settings(&self) -> RatioSettings {
        RatioSettings {
            periods_per_year: self.periods_per_year,
            risk_free_rate: self.risk_free_rate,
        }
    }

    /// Reason the config cannot run, if any.
    pub fn problem(&self) -> Option<String> {
        if !(self.initial_capital > 0.0 && self.initial_capital.is_finite()) {
            return Some(format!("initial_capital must be positive, got {}", self.initial_capital));
        }
        if !(self.max_total_risk_percent > 0.0) {
            return Some(format!(
                "max_total_risk_percent must be positive, got {}",
                self.max_total_risk_percent
            ));
        }
        if !(self.point_value > 0.0 && self.point_value.is_finite()) {
            return Some(format!("point_value must be positive, got {}", self.point_value));
        }
        if !(self.periods_per_year > 0.0) {
            return Some(format!("periods_per_year must be positive, got {}", self.periods_per_year));
        }
        None
    }
}

/// Lifecycle of one engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnginePhase {
    Uninitialized,
    Aligning,
    Running,
    Compiling,
    Done,
    Failed,
}

/// Counters collected during the bar loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub bars: usize,
    pub signals: usize,
    pub entries: usize,
    pub exits: usize,
    pub partial_exits: usize,
    /// Signals dropped because the strategy already had an open position.
    pub skipped_in_position: usize,
    pub risk_rejections: usize,
    pub sizing_errors: usize,
    pub window_skips: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResults {
    pub base_timeframe: Timeframe,
    pub overall_metrics: PerformanceMetrics,
    /// One summary per strategy, in registration order.
    pub per_strategy_metrics: Vec<StrategySummary>,
    pub equity_curve: Vec<EquityPoint>,
    pub drawdown_curve: Vec<DrawdownPoint>,
    /// Closed episodes, then the open one if the run ended underwater.
    pub drawdowns: Vec<DrawdownEpisode>,
    pub trade_log: Vec<TradeLogRecord>,
    pub closed_positions: Vec<Position>,
    pub open_positions: Vec<Position>,
    pub final_capital: f64,
    pub stats: RunStats,
}

impl BacktestResults {
    pub fn strategy_metrics(&self, name: &str) -> Option<&StrategySummary> {
        self.per_strategy_metrics.iter().find(|s| s.strategy == name)
    }

    pub fn entries(&self) -> impl Iterator<Item = &TradeLogRecord> {
        self.trade_log.iter().filter(|r| r.is_entry())
    }

    pub fn exits(&self) -> impl Iterator<Item = &TradeLogRecord> {
        self.trade_log.iter().filter(|r| !r.is_entry())
    }
}
