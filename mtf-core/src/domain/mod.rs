//! Domain types: timeframes, bars, signals, trade log records.

pub mod bar;
pub mod ids;
pub mod signal;
pub mod timeframe;
pub mod trade;

pub use bar::{Bar, Field};
pub use ids::PositionId;
pub use signal::{Side, SignalMetadata, StrategySignal};
pub use timeframe::{Timeframe, TimeframeError};
pub use trade::{TradeAction, TradeLogRecord};
