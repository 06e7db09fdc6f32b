//! Position configuration: risk per trade, stop-loss and take-profit rules,
//! partial-exit ladder.

use crate::domain::SignalMetadata;
use serde::{Deserialize, Serialize};

/// Stop-loss rule.
///
/// `Time` and `Condition` place no price stop; sizing falls back to a 1%
/// distance (see [`super::levels::DEFAULT_SIZING_STOP_PERCENT`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopLossRule {
    Percent {
        percent: f64,
    },
    Price {
        #[serde(default)]
        price: Option<f64>,
    },
    Time {
        bars: usize,
    },
    Condition,
}

impl Default for StopLossRule {
    fn default() -> Self {
        StopLossRule::Percent { percent: 1.0 }
    }
}

/// Take-profit rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TakeProfitRule {
    Percent {
        percent: f64,
    },
    /// Target at `ratio` times the stop distance.
    #[serde(rename = "rr")]
    RiskReward {
        ratio: f64,
    },
    Time {
        bars: usize,
    },
    Condition,
    /// Absolute level. Normally produced by a signal's `tp_price` override.
    Price {
        price: f64,
    },
}

impl Default for TakeProfitRule {
    fn default() -> Self {
        TakeProfitRule::RiskReward { ratio: 2.0 }
    }
}

/// Where a partial exit triggers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartialTarget {
    /// Multiple of the initial stop distance beyond entry.
    RMultiple { value: f64 },
    Price { value: f64 },
}

/// One rung of the partial-exit ladder. `fraction` applies to the size
/// remaining when the rung triggers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartialExit {
    pub fraction: f64,
    pub target: PartialTarget,
}

impl PartialExit {
    pub fn at_r(fraction: f64, r: f64) -> Self {
        Self {
            fraction,
            target: PartialTarget::RMultiple { value: r },
        }
    }

    pub fn at_price(fraction: f64, price: f64) -> Self {
        Self {
            fraction,
            target: PartialTarget::Price { value: price },
        }
    }

    /// Human-readable reason recorded in the partial-exit history.
    pub fn reason(&self) -> String {
        match self.target {
            PartialTarget::RMultiple { value } => format!("partial_{value}R"),
            PartialTarget::Price { value } => format!("partial_at_{value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PositionConfigError {
    #[error("risk_percent must be positive, got {0}")]
    NonPositiveRisk(f64),
    #[error("stop-loss percent must be positive, got {0}")]
    StopPercent(f64),
    #[error("take-profit percent must be positive, got {0}")]
    TargetPercent(f64),
    #[error("risk:reward ratio must be positive, got {0}")]
    Ratio(f64),
    #[error("time-based exit needs at least one bar")]
    ZeroBars,
    #[error("price level must be positive and finite, got {0}")]
    Price(f64),
    #[error("partial exit #{index}: fraction must be in (0, 1], got {fraction}")]
    PartialFraction { index: usize, fraction: f64 },
    #[error("partial exit #{index}: target must be positive and finite")]
    PartialTarget { index: usize },
}

/// Per-strategy position management settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionConfig {
    /// Percent of capital risked per trade.
    #[serde(default = "default_risk_percent")]
    pub risk_percent: f64,
    #[serde(default)]
    pub stop_loss: StopLossRule,
    #[serde(default)]
    pub take_profit: TakeProfitRule,
    #[serde(default)]
    pub partial_exits: Vec<PartialExit>,
}

fn default_risk_percent() -> f64 {
    1.0
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            risk_percent: default_risk_percent(),
            stop_loss: StopLossRule::default(),
            take_profit: TakeProfitRule::default(),
            partial_exits: Vec::new(),
        }
    }
}

impl PositionConfig {
    /// Percent stop with a risk:reward target, the most common setup.
    pub fn percent_rr(risk_percent: f64, stop_percent: f64, ratio: f64) -> Self {
        Self {
            risk_percent,
            stop_loss: StopLossRule::Percent {
                percent: stop_percent,
            },
            take_profit: TakeProfitRule::RiskReward { ratio },
            partial_exits: Vec::new(),
        }
    }

    pub fn with_partial_exits(mut self, exits: Vec<PartialExit>) -> Self {
        self.partial_exits = exits;
        self
    }

    /// Copy of this config with the signal's overrides substituted.
    ///
    /// Fields the signal does not override keep their configured value.
    pub fn with_overrides(&self, metadata: &SignalMetadata) -> PositionConfig {
        let mut config = self.clone();
        if let Some(price) = metadata.sl_price {
            config.stop_loss = StopLossRule::Price { price: Some(price) };
        }
        if let Some(price) = metadata.tp_price {
            config.take_profit = TakeProfitRule::Price { price };
        }
        if let Some(exits) = &metadata.partial_exits {
            config.partial_exits = exits.clone();
        }
        config
    }

    /// Bar limit for a time-based exit, from either the stop or target rule.
    pub fn max_bars(&self) -> Option<usize> {
        let sl = match self.stop_loss {
            StopLossRule::Time { bars } => Some(bars),
            _ => None,
        };
        let tp = match self.take_profit {
            TakeProfitRule::Time { bars } => Some(bars),
            _ => None,
        };
        match (sl, tp) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn validate(&self) -> Result<(), PositionConfigError> {
        if !(self.risk_percent > 0.0 && self.risk_percent.is_finite()) {
            return Err(PositionConfigError::NonPositiveRisk(self.risk_percent));
        }
        match self.stop_loss {
            StopLossRule::Percent { percent } if !(percent > 0.0 && percent < 100.0) => {
                return Err(PositionConfigError::StopPercent(percent));
            }
            StopLossRule::Price { price: Some(p) } if !(p > 0.0 && p.is_finite()) => {
                return Err(PositionConfigError::Price(p));
            }
            StopLossRule::Time { bars: 0 } => return Err(PositionConfigError::ZeroBars),
            _ => {}
        }
        match self.take_profit {
            TakeProfitRule::Percent { percent } if !(percent > 0.0 && percent.is_finite()) => {
                return Err(PositionConfigError::TargetPercent(percent));
            }
            TakeProfitRule::RiskReward { ratio } if !(ratio > 0.0 && ratio.is_finite()) => {
                return Err(PositionConfigError::Ratio(ratio));
            }
            TakeProfitRule::Price { price } if !(price > 0.0 && price.is_finite()) => {
                return Err(PositionConfigError::Price(price));
            }
            TakeProfitRule::Time { bars: 0 } => return Err(PositionConfigError::ZeroBars),
            _ => {}
        }
        for (index, exit) in self.partial_exits.iter().enumerate() {
            if !(exit.fraction > 0.0 && exit.fraction <= 1.0) {
                return Err(PositionConfigError::PartialFraction {
                    index,
                    fraction: exit.fraction,
                });
            }
            let value = match exit.target {
                PartialTarget::RMultiple { value } | PartialTarget::Price { value } => value,
            };
            if !(value > 0.0 && value.is_finite()) {
                return Err(PositionConfigError::PartialTarget { index });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PositionConfig::default().validate().is_ok());
    }

    #[test]
    fn overrides_do_not_touch_the_original() {
        let base = PositionConfig::percent_rr(1.0, 2.0, 2.0);
        let metadata = SignalMetadata {
            sl_price: Some(95.0),
            ..Default::default()
        };
        let overridden = base.with_overrides(&metadata);
        assert_eq!(
            overridden.stop_loss,
            StopLossRule::Price { price: Some(95.0) }
        );
        assert_eq!(overridden.take_profit, TakeProfitRule::RiskReward { ratio: 2.0 });
        assert_eq!(base.stop_loss, StopLossRule::Percent { percent: 2.0 });
    }

    #[test]
    fn partial_override_replaces_ladder() {
        let base = PositionConfig::default().with_partial_exits(vec![PartialExit::at_r(0.5, 1.0)]);
        let metadata = SignalMetadata {
            partial_exits: Some(vec![PartialExit::at_r(0.5, 1.5), PartialExit::at_r(0.5, 4.0)]),
            ..Default::default()
        };
        assert_eq!(base.with_overrides(&metadata).partial_exits.len(), 2);
    }

    #[test]
    fn max_bars_takes_the_tighter_rule() {
        let config = PositionConfig {
            stop_loss: StopLossRule::Time { bars: 12 },
            take_profit: TakeProfitRule::Time { bars: 8 },
            ..Default::default()
        };
        assert_eq!(config.max_bars(), Some(8));
        assert_eq!(PositionConfig::default().max_bars(), None);
    }

    #[test]
    fn validate_rejects_bad_fraction() {
        let config = PositionConfig::default().with_partial_exits(vec![PartialExit::at_r(1.5, 2.0)]);
        assert_eq!(
            config.validate(),
            Err(PositionConfigError::PartialFraction {
                index: 0,
                fraction: 1.5
            })
        );
    }

    #[test]
    fn validate_rejects_non_positive_ratio() {
        let config = PositionConfig::percent_rr(1.0, 2.0, 0.0);
        assert_eq!(config.validate(), Err(PositionConfigError::Ratio(0.0)));
    }

    #[test]
    fn toml_shape_round_trips_through_serde_json() {
        let json = r#"{
            "risk_percent": 0.5,
            "stop_loss": {"type": "price"},
            "take_profit": {"type": "rr", "ratio": 3.0},
            "partial_exits": [{"fraction": 0.5, "target": {"type": "r_multiple", "value": 2.0}}]
        }"#;
        let config: PositionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.stop_loss, StopLossRule::Price { price: None });
        assert_eq!(config.take_profit, TakeProfitRule::RiskReward { ratio: 3.0 });
        assert_eq!(config.partial_exits[0], PartialExit::at_r(0.5, 2.0));
    }
}
