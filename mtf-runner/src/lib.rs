//! MTF Runner: backtest orchestration on top of `mtf-core`.
//!
//! This crate provides:
//! - TOML run configuration with validation and content-hashed run ids
//! - A strategy registry mapping config ids to constructors
//! - Data loading from CSV with resample and synthetic fallback
//! - The symbol universe (used / ignored lists)
//! - JSON, CSV and Markdown export of run results

pub mod config;
pub mod data_loader;
pub mod export;
pub mod registry;
pub mod report;
pub mod runner;
pub mod symbols;

pub use config::{BacktestConfig, ConfigError, RunId, StrategyEntry};
pub use data_loader::{load_data, DataSource, LoadError, LoadOptions, LoadedData};
pub use export::save_artifacts;
pub use registry::{RegistryError, StrategyConstructor, StrategyRegistry};
pub use report::generate_report;
pub use runner::{run_from_config, run_from_data, run_with_registry, RunError, RunReport};
pub use symbols::{SymbolError, SymbolUniverse};
