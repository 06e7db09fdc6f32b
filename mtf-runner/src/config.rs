//! TOML backtest configuration.
//!
//! One file describes a complete run: engine settings, where the bars come
//! from, an optional entry window and the strategies to register.

use chrono::{DateTime, Utc, Weekday};
use mtf_core::domain::Timeframe;
use mtf_core::engine::{EngineConfig, TradingWindow, WindowError};
use mtf_core::position_management::{PositionConfig, PositionConfigError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Content hash of a config, stable across runs.
pub type RunId = String;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid [backtest] section: {0}")]
    Engine(String),
    #[error("at least one [[strategies]] entry is required")]
    NoStrategies,
    #[error("start {start} is after end {end}")]
    RangeOrder {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("strategy '{strategy}' lists no timeframes")]
    NoTimeframes { strategy: String },
    #[error("strategy '{strategy}': {source}")]
    Position {
        strategy: String,
        source: PositionConfigError,
    },
    #[error("invalid [trading_window]: {0}")]
    Window(#[from] WindowError),
}

// ─── Sections ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    #[serde(default)]
    pub data: DataSection,
    #[serde(default)]
    pub trading_window: Option<TradingWindowSection>,
    #[serde(default)]
    pub strategies: Vec<StrategyEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSection {
    pub symbol: String,
    #[serde(default = "default_capital")]
    pub initial_capital: f64,
    #[serde(default = "default_max_risk")]
    pub max_total_risk_percent: f64,
    #[serde(default = "default_point_value")]
    pub point_value: f64,
    #[serde(default)]
    pub compounding: bool,
    /// RFC 3339, inclusive.
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    /// RFC 3339, inclusive.
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default = "default_periods_per_year")]
    pub periods_per_year: f64,
    #[serde(default)]
    pub risk_free_rate: f64,
    #[serde(default)]
    pub close_open_at_end: bool,
}

fn default_capital() -> f64 {
    10_000.0
}

fn default_max_risk() -> f64 {
    6.0
}

fn default_point_value() -> f64 {
    1.0
}

fn default_periods_per_year() -> f64 {
    252.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSection {
    /// Directory holding `<symbol>_<timeframe>.csv` files.
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
    /// Generate a seeded random walk when a CSV file is missing.
    #[serde(default)]
    pub synthetic: bool,
    /// Base-timeframe bars per synthetic series.
    #[serde(default = "default_synthetic_bars")]
    pub synthetic_bars: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_synthetic_bars() -> usize {
    2_000
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            synthetic: false,
            synthetic_bars: default_synthetic_bars(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradingWindowSection {
    #[serde(default)]
    pub days: Vec<Weekday>,
    /// `HH:MM-HH:MM`, UTC.
    #[serde(default)]
    pub time_range: Option<String>,
}

impl TradingWindowSection {
    pub fn to_window(&self) -> Result<TradingWindow, WindowError> {
        let window = TradingWindow::new(self.days.clone());
        match &self.time_range {
            Some(range) => window.with_time_range_str(range),
            None => Ok(window),
        }
    }
}

/// One `[[strategies]]` entry. `params` is interpreted by the registered
/// constructor for `id`; `extra` is carried through untouched for custom
/// strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub timeframes: Vec<Timeframe>,
    #[serde(default)]
    pub params: toml::Table,
    #[serde(default)]
    pub position: PositionConfig,
    #[serde(default)]
    pub extra: toml::Table,
}

impl StrategyEntry {
    /// Name used in error messages before the strategy exists.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

// ─── Loading and validation ─────────────────────────────────────────

impl BacktestConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = self.engine_config()?;
        if let Some(problem) = engine.problem() {
            return Err(ConfigError::Engine(problem));
        }
        if let (Some(start), Some(end)) = (self.backtest.start, self.backtest.end) {
            if start > end {
                return Err(ConfigError::RangeOrder { start, end });
            }
        }
        if self.strategies.is_empty() {
            return Err(ConfigError::NoStrategies);
        }
        for entry in &self.strategies {
            if entry.timeframes.is_empty() {
                return Err(ConfigError::NoTimeframes {
                    strategy: entry.label().to_string(),
                });
            }
            entry
                .position
                .validate()
                .map_err(|source| ConfigError::Position {
                    strategy: entry.label().to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let b = &self.backtest;
        let trading_window = self
            .trading_window
            .as_ref()
            .map(TradingWindowSection::to_window)
            .transpose()?;
        Ok(EngineConfig {
            initial_capital: b.initial_capital,
            max_total_risk_percent: b.max_total_risk_percent,
            point_value: b.point_value,
            compounding: b.compounding,
            periods_per_year: b.periods_per_year,
            risk_free_rate: b.risk_free_rate,
            close_open_at_end: b.close_open_at_end,
            trading_window,
        })
    }

    /// Every timeframe any strategy lists, ascending.
    pub fn timeframes(&self) -> Vec<Timeframe> {
        let mut all: Vec<Timeframe> = self
            .strategies
            .iter()
            .flat_map(|s| s.timeframes.iter().copied())
            .collect();
        all.sort();
        all.dedup();
        all
    }

    /// BLAKE3 hash of the canonical JSON form. Identical configs share an id.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [backtest]
        symbol = "EURUSD"

        [[strategies]]
        id = "simple_ma"
        timeframes = ["1h"]
    "#;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = BacktestConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.backtest.initial_capital, 10_000.0);
        assert_eq!(config.backtest.max_total_risk_percent, 6.0);
        assert_eq!(config.data, DataSection::default());
        assert_eq!(config.strategies[0].position, PositionConfig::default());
        assert!(config.strategies[0].params.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn run_id_is_deterministic() {
        let a = BacktestConfig::from_toml(MINIMAL).unwrap();
        let b = BacktestConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(a.run_id(), b.run_id());
        assert_eq!(a.run_id().len(), 64);
    }

    #[test]
    fn run_id_changes_with_params() {
        let a = BacktestConfig::from_toml(MINIMAL).unwrap();
        let mut b = a.clone();
        b.backtest.initial_capital = 20_000.0;
        assert_ne!(a.run_id(), b.run_id());
    }

    #[test]
    fn timeframes_are_merged_and_sorted() {
        let mut config = BacktestConfig::from_toml(MINIMAL).unwrap();
        let mut second = config.strategies[0].clone();
        second.timeframes = vec![Timeframe::H4, Timeframe::M15, Timeframe::H1];
        config.strategies.push(second);
        assert_eq!(
            config.timeframes(),
            vec![Timeframe::M15, Timeframe::H1, Timeframe::H4]
        );
    }

    #[test]
    fn empty_strategy_list_is_rejected() {
        let config = BacktestConfig::from_toml("[backtest]\nsymbol = \"X\"\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::NoStrategies)));
    }
}
