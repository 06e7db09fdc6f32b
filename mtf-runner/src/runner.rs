//! Backtest runner: wires config, registry, data loading and the engine.
//!
//! Two entry points:
//! - `run_from_config()`: builds strategies and loads bars as the config says.
//!   Used by the CLI.
//! - `run_from_data()`: takes pre-loaded bars. Used by tests and callers that
//!   bring their own data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use mtf_core::domain::Timeframe;
use mtf_core::engine::{BacktestEngine, BacktestResults, EngineError};
use mtf_core::strategy::Strategy;

use crate::config::{BacktestConfig, ConfigError, RunId};
use crate::data_loader::{load_data, DataSource, LoadError, LoadOptions, LoadedData};
use crate::registry::{RegistryError, StrategyRegistry};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("strategy error: {0}")]
    Registry(#[from] RegistryError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Everything one run produced, plus where its inputs came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub symbol: String,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub sources: BTreeMap<Timeframe, DataSource>,
    pub results: BacktestResults,
}

/// Run with the built-in strategy registry.
pub fn run_from_config(config: &BacktestConfig) -> Result<RunReport, RunError> {
    run_with_registry(config, &StrategyRegistry::with_builtins())
}

pub fn run_with_registry(
    config: &BacktestConfig,
    registry: &StrategyRegistry,
) -> Result<RunReport, RunError> {
    config.validate()?;
    let strategies = registry.build_all(&config.strategies)?;
    let timeframes = required_timeframes(config, &strategies);

    let opts = LoadOptions {
        dir: config.data.dir.clone(),
        synthetic: config.data.synthetic,
        synthetic_bars: config.data.synthetic_bars,
        synthetic_start: config.backtest.start,
    };
    let loaded = load_data(&config.backtest.symbol, &timeframes, &opts)?;
    tracing::info!(
        symbol = %config.backtest.symbol,
        timeframes = ?timeframes,
        synthetic = loaded.has_synthetic,
        "data loaded"
    );

    run_strategies(config, strategies, loaded)
}

/// Run the config's strategies over bars the caller already has.
pub fn run_from_data(config: &BacktestConfig, loaded: LoadedData) -> Result<RunReport, RunError> {
    config.validate()?;
    let strategies = StrategyRegistry::with_builtins().build_all(&config.strategies)?;
    run_strategies(config, strategies, loaded)
}

fn run_strategies(
    config: &BacktestConfig,
    strategies: Vec<Box<dyn Strategy>>,
    loaded: LoadedData,
) -> Result<RunReport, RunError> {
    let run_id = config.run_id();
    let mut engine = BacktestEngine::new(config.engine_config()?);
    let results = engine.run(
        strategies,
        &loaded.data,
        config.backtest.start,
        config.backtest.end,
    )?;

    let m = &results.overall_metrics;
    tracing::info!(
        run_id = %short_id(&run_id),
        trades = m.total_trades,
        total_return_pct = m.total_return_pct,
        max_drawdown_pct = m.max_drawdown_pct,
        sharpe = m.sharpe_ratio,
        "backtest finished"
    );

    Ok(RunReport {
        run_id,
        symbol: config.backtest.symbol.clone(),
        dataset_hash: loaded.dataset_hash,
        has_synthetic: loaded.has_synthetic,
        sources: loaded.sources,
        results,
    })
}

/// Config timeframes plus any a strategy asked for on top (trend filters).
fn required_timeframes(config: &BacktestConfig, strategies: &[Box<dyn Strategy>]) -> Vec<Timeframe> {
    let mut all = config.timeframes();
    all.extend(strategies.iter().flat_map(|s| s.timeframes().iter().copied()));
    all.sort();
    all.dedup();
    all
}

pub(crate) fn short_id(run_id: &str) -> &str {
    run_id.get(..12).unwrap_or(run_id)
}
