//! Performance metrics: pure functions over an equity series and closed positions.
//!
//! `PerformanceMetrics::compute` assembles the full snapshot; every individual
//! statistic is also exposed as a free function.

use super::tracker::DrawdownEpisode;
use crate::position_management::Position;
use serde::{Deserialize, Serialize};

/// Aggregate statistics for one run.
///
/// Percent fields are in percent units (`9.52` means 9.52%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // ── Returns ──
    pub initial_capital: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub total_return_pct: f64,

    // ── Trades ──
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,

    // ── P&L ──
    pub total_pnl: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub avg_trade: f64,
    pub max_win: f64,
    pub max_loss: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: f64,

    // ── Risk ──
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub avg_drawdown: f64,
    pub avg_drawdown_pct: f64,
    pub max_drawdown_duration_days: i64,

    // ── Risk-adjusted ──
    pub sharpe_ratio: f64,
    /// `+inf` when no sample-to-sample return was negative.
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,

    // ── Duration ──
    pub avg_trade_duration_bars: f64,
    pub max_trade_duration_bars: usize,

    // ── R-multiples ──
    pub avg_r_multiple: f64,
    pub expectancy: f64,

    // ── Streaks ──
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
}

/// Annualization and risk-free settings for the ratio metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioSettings {
    pub periods_per_year: f64,
    /// Annual rate as a fraction.
    pub risk_free_rate: f64,
}

impl Default for RatioSettings {
    fn default() -> Self {
        Self {
            periods_per_year: 252.0,
            risk_free_rate: 0.0,
        }
    }
}

impl PerformanceMetrics {
    /// `equity` must be non-empty; the tracker guarantees it.
    pub fn compute(
        initial_capital: f64,
        equity: &[f64],
        episodes: &[DrawdownEpisode],
        closed: &[Position],
        ratios: RatioSettings,
    ) -> Self {
        let final_equity = equity.last().copied().unwrap_or(initial_capital);
        let total_return = final_equity - initial_capital;
        let total_return_pct = if initial_capital != 0.0 {
            total_return / initial_capital * 100.0
        } else {
            0.0
        };

        let pnls: Vec<f64> = closed.iter().map(Position::realized_pnl).collect();
        let wins: Vec<f64> = pnls.iter().copied().filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = pnls.iter().copied().filter(|p| *p < 0.0).collect();
        let total_trades = pnls.len();
        let total_pnl: f64 = pnls.iter().sum();
        let gross_profit: f64 = wins.iter().sum();
        let gross_loss: f64 = losses.iter().sum::<f64>().abs();

        let curve = drawdown_series(initial_capital, equity);
        let max_drawdown_pct = curve.iter().map(|(_, pct)| *pct).fold(0.0, f64::max);
        let avg_trade = if total_trades > 0 {
            total_pnl / total_trades as f64
        } else {
            0.0
        };

        let bars: Vec<usize> = closed.iter().map(|p| p.bars_held).collect();
        let r_multiples: Vec<f64> = closed
            .iter()
            .map(Position::r_multiple)
            .filter(|r| *r != 0.0)
            .collect();

        Self {
            initial_capital,
            final_equity,
            total_return,
            total_return_pct,
            total_trades,
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_rate: if total_trades > 0 {
                wins.len() as f64 / total_trades as f64 * 100.0
            } else {
                0.0
            },
            total_pnl,
            avg_win: mean_f64(&wins),
            avg_loss: mean_f64(&losses),
            avg_trade,
            max_win: wins.iter().copied().fold(0.0, f64::max),
            max_loss: losses.iter().copied().fold(0.0, f64::min),
            gross_profit,
            gross_loss,
            profit_factor: profit_factor(gross_profit, gross_loss),
            max_drawdown: curve.iter().map(|(dd, _)| *dd).fold(0.0, f64::max),
            max_drawdown_pct,
            avg_drawdown: mean_f64(&positive(curve.iter().map(|(dd, _)| *dd))),
            avg_drawdown_pct: mean_f64(&positive(curve.iter().map(|(_, pct)| *pct))),
            max_drawdown_duration_days: max_drawdown_duration_days(episodes),
            sharpe_ratio: sharpe_ratio(equity, ratios),
            sortino_ratio: sortino_ratio(equity, ratios),
            calmar_ratio: calmar_ratio(total_return_pct, max_drawdown_pct),
            avg_trade_duration_bars: if bars.is_empty() {
                0.0
            } else {
                bars.iter().sum::<usize>() as f64 / bars.len() as f64
            },
            max_trade_duration_bars: bars.iter().copied().max().unwrap_or(0),
            avg_r_multiple: mean_f64(&r_multiples),
            expectancy: avg_trade,
            max_consecutive_wins: max_consecutive(&pnls, true),
            max_consecutive_losses: max_consecutive(&pnls, false),
        }
    }
}

/// Trade-only aggregate for one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySummary {
    pub strategy: String,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub avg_trade: f64,
    pub profit_factor: f64,
    pub avg_r_multiple: f64,
    pub avg_bars_held: f64,
    pub max_win: f64,
    pub max_loss: f64,
}

impl StrategySummary {
    /// Summary over the closed positions among `positions`.
    pub fn from_positions<'a>(strategy: &str, positions: impl IntoIterator<Item = &'a Position>) -> Self {
        let closed: Vec<&Position> = positions.into_iter().filter(|p| p.is_closed()).collect();
        let pnls: Vec<f64> = closed.iter().map(|p| p.realized_pnl()).collect();
        let wins: Vec<f64> = pnls.iter().copied().filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = pnls.iter().copied().filter(|p| *p < 0.0).collect();
        let total_trades = closed.len();
        let total_pnl: f64 = pnls.iter().sum();
        let r_multiples: Vec<f64> = closed
            .iter()
            .map(|p| p.r_multiple())
            .filter(|r| *r != 0.0)
            .collect();
        let bars: Vec<f64> = closed.iter().map(|p| p.bars_held as f64).collect();

        Self {
            strategy: strategy.to_string(),
            total_trades,
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_rate: if total_trades > 0 {
                wins.len() as f64 / total_trades as f64 * 100.0
            } else {
                0.0
            },
            total_pnl,
            avg_trade: if total_trades > 0 {
                total_pnl / total_trades as f64
            } else {
                0.0
            },
            profit_factor: profit_factor(wins.iter().sum(), losses.iter().sum::<f64>().abs()),
            avg_r_multiple: mean_f64(&r_multiples),
            avg_bars_held: mean_f64(&bars),
            max_win: wins.iter().copied().fold(0.0, f64::max),
            max_loss: losses.iter().copied().fold(0.0, f64::min),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Per-sample `(drawdown, drawdown_pct)` against the running maximum of
/// `equity`, with the peak starting at `initial_capital`.
pub fn drawdown_series(initial_capital: f64, equity: &[f64]) -> Vec<(f64, f64)> {
    let mut peak = initial_capital;
    equity
        .iter()
        .map(|&e| {
            peak = peak.max(e);
            let dd = peak - e;
            let pct = if peak > 0.0 { dd / peak * 100.0 } else { 0.0 };
            (dd, pct)
        })
        .collect()
}

/// Sample-to-sample simple returns.
pub fn period_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

fn annualized_return(equity: &[f64], periods_per_year: f64) -> f64 {
    let (Some(first), Some(last)) = (equity.first(), equity.last()) else {
        return 0.0;
    };
    if *first <= 0.0 {
        return 0.0;
    }
    let total = last / first - 1.0;
    (1.0 + total).powf(periods_per_year / equity.len() as f64) - 1.0
}

/// Annualized return over annualized volatility. 0.0 with fewer than two
/// samples or zero volatility.
pub fn sharpe_ratio(equity: &[f64], ratios: RatioSettings) -> f64 {
    if equity.len() < 2 {
        return 0.0;
    }
    let returns = period_returns(equity);
    let std = std_dev(&returns);
    if returns.is_empty() || std < 1e-15 {
        return 0.0;
    }
    let vol = std * ratios.periods_per_year.sqrt();
    (annualized_return(equity, ratios.periods_per_year) - ratios.risk_free_rate) / vol
}

/// Like Sharpe but over downside deviation only.
///
/// `+inf` with no negative returns. 0.0 when the downside deviation is
/// undefined (a single negative sample) or zero.
pub fn sortino_ratio(equity: &[f64], ratios: RatioSettings) -> f64 {
    if equity.len() < 2 {
        return 0.0;
    }
    let returns = period_returns(equity);
    if returns.is_empty() {
        return 0.0;
    }
    let downside: Vec<f64> = returns.into_iter().filter(|r| *r < 0.0).collect();
    if downside.is_empty() {
        return f64::INFINITY;
    }
    let std = std_dev(&downside);
    if std < 1e-15 {
        return 0.0;
    }
    let deviation = std * ratios.periods_per_year.sqrt();
    (annualized_return(equity, ratios.periods_per_year) - ratios.risk_free_rate) / deviation
}

pub fn calmar_ratio(total_return_pct: f64, max_drawdown_pct: f64) -> f64 {
    if max_drawdown_pct == 0.0 {
        return 0.0;
    }
    (total_return_pct / max_drawdown_pct).abs()
}

/// Gross profit over gross loss. 0.0 when there are no losses.
pub fn profit_factor(gross_profit: f64, gross_loss: f64) -> f64 {
    if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else {
        0.0
    }
}

/// Longest closed drawdown episode in whole days.
pub fn max_drawdown_duration_days(episodes: &[DrawdownEpisode]) -> i64 {
    episodes
        .iter()
        .filter_map(|ep| ep.end.map(|end| (end - ep.start).num_days()))
        .max()
        .unwrap_or(0)
}

pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1). 0.0 for fewer than two values.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn positive(values: impl Iterator<Item = f64>) -> Vec<f64> {
    values.filter(|v| *v > 0.0).collect()
}

fn max_consecutive(pnls: &[f64], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for pnl in pnls {
        if (*pnl > 0.0) == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}
