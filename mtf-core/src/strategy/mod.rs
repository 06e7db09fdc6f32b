//! Strategy interface and its composition.
//!
//! A strategy reads the aligned table and emits at most one [`StrategySignal`]
//! per bar. It never sees the position manager: entries are admitted by the
//! engine and sized from the strategy's [`PositionConfig`].
//!
//! Strategies receive the full table plus the current timestamp. Reading rows
//! after the current one is lookahead; implementations only index up to
//! `data.index_of(timestamp)`.

pub mod composer;
pub mod ma_crossover;

pub use composer::{ComposerError, MultiStrategyComposer};
pub use ma_crossover::{MaCrossover, MaCrossoverParams, TrendFilter};

use crate::data::AlignedTable;
use crate::domain::{StrategySignal, Timeframe};
use crate::position_management::{Position, PositionConfig};
use chrono::{DateTime, Utc};

pub trait Strategy: Send {
    /// Unique name within a run. Positions and the trade log carry it.
    fn name(&self) -> &str;

    /// Timeframes this strategy reads. The smallest across all strategies
    /// becomes the base timeframe of the run.
    fn timeframes(&self) -> &[Timeframe];

    fn position_config(&self) -> &PositionConfig;

    /// Entry signal for the bar at `timestamp`, if any.
    ///
    /// Called every bar, including while this strategy holds a position; the
    /// engine discards the signal in that case.
    fn generate_signals(&mut self, data: &AlignedTable, timestamp: DateTime<Utc>) -> Option<StrategySignal>;

    /// Strategy-driven exit for one of its open positions. Consulted after
    /// stop-loss, take-profit and time exits.
    fn should_exit(&mut self, _position: &Position, _data: &AlignedTable, _timestamp: DateTime<Utc>) -> bool {
        false
    }
}
