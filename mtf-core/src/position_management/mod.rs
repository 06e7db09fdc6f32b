//! Position management: configuration, stop/target resolution, positions,
//! and the risk-gated manager that owns them.

pub mod config;
pub mod levels;
pub mod manager;
pub mod position;

pub use config::{
    PartialExit, PartialTarget, PositionConfig, PositionConfigError, StopLossRule, TakeProfitRule,
};
pub use levels::{resolve_stop, resolve_take_profit, StopLevels, DEFAULT_SIZING_STOP_PERCENT};
pub use manager::{PositionManager, Sizing, SizingError};
pub use position::{ExitType, PartialExitRecord, Position, PositionError};
