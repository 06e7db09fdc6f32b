use crate::data::AlignError;
use crate::performance::MetricsError;
use crate::strategy::ComposerError;
use chrono::{DateTime, Utc};

/// Fatal run errors. Sizing errors and risk rejections are not here: they
/// drop one signal and the loop continues.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
    #[error("strategy setup failed: {0}")]
    Strategies(#[from] ComposerError),
    #[error("alignment failed: {0}")]
    Align(#[from] AlignError),
    #[error(
        "no data in range {start:?}..={end:?} ({aligned_rows} aligned rows before filtering)"
    )]
    EmptyRange {
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        aligned_rows: usize,
    },
    #[error("metrics failed: {0}")]
    Metrics(#[from] MetricsError),
}
