//! Backtest engine: configuration, the bar loop, exit decisions and results.

pub mod error;
pub mod exits;
pub mod loop_runner;
pub mod state;
pub mod window;

pub use error::EngineError;
pub use exits::{price_exit, reached_partials, ExitDecision};
pub use loop_runner::BacktestEngine;
pub use state::{BacktestResults, EngineConfig, EnginePhase, RunStats};
pub use window::{parse_time_range, TradingWindow, WindowError};
