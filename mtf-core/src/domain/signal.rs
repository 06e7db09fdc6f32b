//! Strategy signals and trade direction.

use crate::position_management::PartialExit;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => f.write_str("LONG"),
            Side::Short => f.write_str("SHORT"),
        }
    }
}

/// Per-signal overrides and diagnostics.
///
/// `sl_price`, `tp_price` and `partial_exits` replace the matching fields of
/// the strategy's position config for this one entry. `values` is free-form
/// and only travels into logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sl_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tp_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_exits: Option<Vec<PartialExit>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, f64>,
}

impl SignalMetadata {
    pub fn has_overrides(&self) -> bool {
        self.sl_price.is_some() || self.tp_price.is_some() || self.partial_exits.is_some()
    }
}

/// A request to open a position, emitted by a strategy for one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySignal {
    pub timestamp: DateTime<Utc>,
    pub side: Side,
    /// In `[0, 1]`. Informational; sizing ignores it.
    pub confidence: f64,
    #[serde(default)]
    pub metadata: SignalMetadata,
}

impl StrategySignal {
    pub fn new(timestamp: DateTime<Utc>, side: Side) -> Self {
        Self {
            timestamp,
            side,
            confidence: 1.0,
            metadata: SignalMetadata::default(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_stop_price(mut self, price: f64) -> Self {
        self.metadata.sl_price = Some(price);
        self
    }

    pub fn with_target_price(mut self, price: f64) -> Self {
        self.metadata.tp_price = Some(price);
        self
    }

    pub fn with_partial_exits(mut self, exits: Vec<PartialExit>) -> Self {
        self.metadata.partial_exits = Some(exits);
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metadata.values.insert(key.into(), value);
        self
    }
}
