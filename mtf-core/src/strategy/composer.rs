//! Multi-strategy composer. Fans each bar out to every registered strategy.

use super::Strategy;
use crate::data::AlignedTable;
use crate::domain::{StrategySignal, Timeframe};
use crate::position_management::Position;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComposerError {
    #[error("at least one strategy is required")]
    Empty,
    #[error("duplicate strategy name: '{0}'")]
    DuplicateName(String),
}

/// Owns the strategies of one run, in registration order.
pub struct MultiStrategyComposer {
    strategies: Vec<Box<dyn Strategy>>,
}

impl std::fmt::Debug for MultiStrategyComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiStrategyComposer")
            .field("strategies", &self.names())
            .finish()
    }
}

impl MultiStrategyComposer {
    pub fn new(strategies: Vec<Box<dyn Strategy>>) -> Result<Self, ComposerError> {
        if strategies.is_empty() {
            return Err(ComposerError::Empty);
        }
        let mut seen = HashSet::new();
        for strategy in &strategies {
            if !seen.insert(strategy.name().to_string()) {
                return Err(ComposerError::DuplicateName(strategy.name().to_string()));
            }
        }
        Ok(Self { strategies })
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Union of every strategy's timeframes, ascending.
    pub fn required_timeframes(&self) -> BTreeSet<Timeframe> {
        self.strategies
            .iter()
            .flat_map(|s| s.timeframes().iter().copied())
            .collect()
    }

    pub fn strategy(&self, name: &str) -> Option<&dyn Strategy> {
        self.strategies
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
    }

    pub fn strategies(&self) -> impl Iterator<Item = &dyn Strategy> {
        self.strategies.iter().map(|s| s.as_ref())
    }

    /// One optional signal per strategy, in registration order.
    pub fn generate_all_signals(
        &mut self,
        data: &AlignedTable,
        timestamp: DateTime<Utc>,
    ) -> Vec<(String, StrategySignal)> {
        self.strategies
            .iter_mut()
            .filter_map(|s| {
                s.generate_signals(data, timestamp)
                    .map(|signal| (s.name().to_string(), signal))
            })
            .collect()
    }

    /// Ask the owning strategy whether `position` should exit. Unknown
    /// strategy names never exit.
    pub fn should_exit(&mut self, position: &Position, data: &AlignedTable, timestamp: DateTime<Utc>) -> bool {
        self.strategies
            .iter_mut()
            .find(|s| s.name() == position.strategy_name)
            .is_some_and(|s| s.should_exit(position, data, timestamp))
    }
}
