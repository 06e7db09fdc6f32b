//! PerformanceTracker: equity samples, running peak and drawdown episodes.

use super::metrics::{drawdown_series, PerformanceMetrics, RatioSettings};
use crate::position_management::Position;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
    /// Realized capital at this sample.
    pub realized: f64,
    /// Open P&L at this sample.
    pub unrealized: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
    pub peak: f64,
    pub drawdown: f64,
    pub drawdown_pct: f64,
}

/// A peak-to-recovery drawdown. `end` is the timestamp of the new peak that
/// closed it; `None` while still underwater.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownEpisode {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub peak: f64,
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetricsError {
    #[error(
        "no equity data to calculate metrics \
         ({equity_samples} equity samples, {closed_positions} closed positions)"
    )]
    NoEquityData {
        equity_samples: usize,
        closed_positions: usize,
    },
}

#[derive(Debug, Clone)]
pub struct PerformanceTracker {
    initial_capital: f64,
    ratios: RatioSettings,
    equity_curve: Vec<EquityPoint>,
    peak: f64,
    current_drawdown: f64,
    drawdown_start: Option<DateTime<Utc>>,
    episodes: Vec<DrawdownEpisode>,
}

impl PerformanceTracker {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            ratios: RatioSettings::default(),
            equity_curve: Vec::new(),
            peak: initial_capital,
            current_drawdown: 0.0,
            drawdown_start: None,
            episodes: Vec::new(),
        }
    }

    pub fn with_ratio_settings(mut self, ratios: RatioSettings) -> Self {
        self.ratios = ratios;
        self
    }

    /// Record one equity sample: `current_capital + open_pnl`.
    pub fn update(&mut self, timestamp: DateTime<Utc>, current_capital: f64, open_pnl: f64) {
        let equity = current_capital + open_pnl;
        self.equity_curve.push(EquityPoint {
            timestamp,
            equity,
            realized: current_capital,
            unrealized: open_pnl,
        });

        if equity > self.peak {
            if let Some(start) = self.drawdown_start.take() {
                self.episodes.push(DrawdownEpisode {
                    start,
                    end: Some(timestamp),
                    peak: self.peak,
                    max_drawdown: self.current_drawdown,
                    max_drawdown_pct: self.current_drawdown / self.peak * 100.0,
                });
            }
            self.peak = equity;
            self.current_drawdown = 0.0;
        } else {
            let drawdown = self.peak - equity;
            if drawdown > self.current_drawdown {
                self.current_drawdown = drawdown;
                if self.drawdown_start.is_none() {
                    self.drawdown_start = Some(timestamp);
                }
            }
        }
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn peak_equity(&self) -> f64 {
        self.peak
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn equity_values(&self) -> Vec<f64> {
        self.equity_curve.iter().map(|p| p.equity).collect()
    }

    /// Closed drawdown episodes, oldest first.
    pub fn drawdowns(&self) -> &[DrawdownEpisode] {
        &self.episodes
    }

    /// The episode still in progress, if equity is below its peak.
    pub fn open_drawdown(&self) -> Option<DrawdownEpisode> {
        let start = self.drawdown_start?;
        Some(DrawdownEpisode {
            start,
            end: None,
            peak: self.peak,
            max_drawdown: self.current_drawdown,
            max_drawdown_pct: self.current_drawdown / self.peak * 100.0,
        })
    }

    /// Closed episodes followed by the open one, if any.
    pub fn all_drawdowns(&self) -> Vec<DrawdownEpisode> {
        let mut all = self.episodes.clone();
        all.extend(self.open_drawdown());
        all
    }

    pub fn drawdown_curve(&self) -> Vec<DrawdownPoint> {
        let values = self.equity_values();
        let series = drawdown_series(self.initial_capital, &values);
        self.equity_curve
            .iter()
            .zip(series)
            .map(|(point, (drawdown, drawdown_pct))| DrawdownPoint {
                timestamp: point.timestamp,
                equity: point.equity,
                peak: point.equity + drawdown,
                drawdown,
                drawdown_pct,
            })
            .collect()
    }

    pub fn calculate_metrics(&self, closed: &[Position]) -> Result<PerformanceMetrics, MetricsError> {
        if self.equity_curve.is_empty() {
            return Err(MetricsError::NoEquityData {
                equity_samples: self.equity_curve.len(),
                closed_positions: closed.len(),
            });
        }
        Ok(PerformanceMetrics::compute(
            self.initial_capital,
            &self.equity_values(),
            &self.episodes,
            closed,
            self.ratios,
        ))
    }
}
