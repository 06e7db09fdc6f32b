//! Performance tracking: equity curve, drawdowns and summary statistics.

pub mod metrics;
pub mod tracker;

pub use metrics::{PerformanceMetrics, RatioSettings, StrategySummary};
pub use tracker::{DrawdownEpisode, DrawdownPoint, EquityPoint, MetricsError, PerformanceTracker};
