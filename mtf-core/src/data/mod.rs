//! Data layer: multi-timeframe alignment and resampling.

pub mod align;
pub mod resample;

pub use align::{AlignError, AlignedRow, AlignedTable, TimeframeAligner, TimeframeData};
pub use resample::resample;
