//! Indicator series computed once per run from the aligned table.

pub mod sma;

pub use sma::sma;
