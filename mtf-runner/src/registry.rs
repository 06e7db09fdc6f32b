//! Strategy registry: maps config ids to constructors.

use crate::config::StrategyEntry;
use mtf_core::strategy::{MaCrossover, MaCrossoverParams, Strategy};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown strategy id '{id}' (known: {})", known.join(", "))]
    UnknownStrategy { id: String, known: Vec<String> },
    #[error("strategy '{strategy}' has invalid params: {message}")]
    Params { strategy: String, message: String },
    #[error("id '{0}' is already registered")]
    Duplicate(String),
}

/// Builds one strategy from its config entry.
pub type StrategyConstructor = fn(&StrategyEntry) -> Result<Box<dyn Strategy>, RegistryError>;

#[derive(Clone, Default)]
pub struct StrategyRegistry {
    constructors: BTreeMap<String, StrategyConstructor>,
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every strategy shipped in `mtf-core`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.constructors.insert("simple_ma".into(), build_ma_crossover);
        registry
    }

    pub fn register(&mut self, id: &str, constructor: StrategyConstructor) -> Result<(), RegistryError> {
        if self.constructors.contains_key(id) {
            return Err(RegistryError::Duplicate(id.to_string()));
        }
        self.constructors.insert(id.to_string(), constructor);
        Ok(())
    }

    pub fn ids(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    pub fn build(&self, entry: &StrategyEntry) -> Result<Box<dyn Strategy>, RegistryError> {
        let constructor = self
            .constructors
            .get(&entry.id)
            .ok_or_else(|| RegistryError::UnknownStrategy {
                id: entry.id.clone(),
                known: self.constructors.keys().cloned().collect(),
            })?;
        constructor(entry)
    }

    /// Build every entry, in config order.
    pub fn build_all(&self, entries: &[StrategyEntry]) -> Result<Vec<Box<dyn Strategy>>, RegistryError> {
        entries.iter().map(|entry| self.build(entry)).collect()
    }
}

/// `simple_ma`: the first listed timeframe is the signal timeframe. A trend
/// filter timeframe comes from `params.trend_filter`.
fn build_ma_crossover(entry: &StrategyEntry) -> Result<Box<dyn Strategy>, RegistryError> {
    let params_error = |message: String| RegistryError::Params {
        strategy: entry.label().to_string(),
        message,
    };
    let timeframe = *entry
        .timeframes
        .first()
        .ok_or_else(|| params_error("no signal timeframe listed".into()))?;
    let params: MaCrossoverParams = toml::Value::Table(entry.params.clone())
        .try_into()
        .map_err(|e: toml::de::Error| params_error(e.to_string()))?;
    let name = entry
        .name
        .clone()
        .unwrap_or_else(|| MaCrossover::default_name(&params));
    let strategy = MaCrossover::new(name, timeframe, params, entry.position.clone())
        .map_err(|e| params_error(e.to_string()))?;
    Ok(Box::new(strategy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtf_core::domain::Timeframe;

    fn entry(id: &str, params: &str) -> StrategyEntry {
        StrategyEntry {
            id: id.into(),
            name: None,
            timeframes: vec![Timeframe::H1],
            params: toml::from_str(params).unwrap(),
            position: Default::default(),
            extra: Default::default(),
        }
    }

    #[test]
    fn builds_ma_crossover_with_default_name() {
        let registry = StrategyRegistry::with_builtins();
        let strategy = registry
            .build(&entry("simple_ma", "fast_period = 5\nslow_period = 20"))
            .unwrap();
        assert_eq!(strategy.name(), "MA 5/20");
        assert_eq!(strategy.timeframes(), &[Timeframe::H1]);
    }

    #[test]
    fn trend_filter_adds_timeframe() {
        let registry = StrategyRegistry::with_builtins();
        let params = "fast_period = 5\nslow_period = 20\n[trend_filter]\ntimeframe = \"4h\"\nperiod = 10";
        let strategy = registry.build(&entry("simple_ma", params)).unwrap();
        assert_eq!(strategy.timeframes(), &[Timeframe::H1, Timeframe::H4]);
    }

    #[test]
    fn unknown_id_lists_known_ones() {
        let err = StrategyRegistry::with_builtins()
            .build(&entry("nope", ""))
            .err()
            .unwrap();
        assert_eq!(
            err,
            RegistryError::UnknownStrategy {
                id: "nope".into(),
                known: vec!["simple_ma".into()]
            }
        );
    }

    #[test]
    fn bad_params_are_reported() {
        let registry = StrategyRegistry::with_builtins();
        let err = registry
            .build(&entry("simple_ma", "fast_period = 30\nslow_period = 20"))
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::Params { .. }));

        let err = registry
            .build(&entry("simple_ma", "fats_period = 3"))
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::Params { .. }));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = StrategyRegistry::with_builtins();
        assert_eq!(
            registry.register("simple_ma", build_ma_crossover),
            Err(RegistryError::Duplicate("simple_ma".into()))
        );
    }
}
