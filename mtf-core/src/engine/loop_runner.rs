//! Bar-by-bar event loop of the backtesting engine.
//!
//! Five steps per bar, always in this order:
//! 1. Mark open positions to the bar's close
//! 2. Exits: stop-loss, take-profit, time limit, strategy condition, partial targets
//! 3. Signals from every strategy
//! 4. Entries for strategies without an open position
//! 5. Equity snapshot
//!
//! Because exits run before signals, a strategy whose position closed on this
//! bar may re-enter on the same bar.

use super::error::EngineError;
use super::exits::{is_exhausted, price_exit, reached_partials, ExitDecision};
use super::state::{BacktestResults, EngineConfig, EnginePhase, RunStats};
use crate::data::{AlignedTable, TimeframeAligner, TimeframeData};
use crate::domain::{PositionId, TradeLogRecord};
use crate::performance::{PerformanceTracker, StrategySummary};
use crate::position_management::{ExitType, PositionManager};
use crate::strategy::{MultiStrategyComposer, Strategy};
use chrono::{DateTime, Utc};

/// Runs strategies over multi-timeframe data. One engine can run many
/// backtests; each `run` starts from a fresh manager and tracker.
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    config: EngineConfig,
    phase: EnginePhase,
}

impl BacktestEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            phase: EnginePhase::Uninitialized,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// Run `strategies` over `data`, optionally clipped to `[start, end]`
    /// after alignment.
    pub fn run(
        &mut self,
        strategies: Vec<Box<dyn Strategy>>,
        data: &TimeframeData,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<BacktestResults, EngineError> {
        self.phase = EnginePhase::Uninitialized;
        let outcome = self.execute(strategies, data, start, end);
        if let Err(err) = &outcome {
            self.set_phase(EnginePhase::Failed);
            tracing::error!(error = %err, "backtest failed");
        }
        outcome
    }

    fn set_phase(&mut self, phase: EnginePhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "engine phase");
        self.phase = phase;
    }

    fn execute(
        &mut self,
        strategies: Vec<Box<dyn Strategy>>,
        data: &TimeframeData,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<BacktestResults, EngineError> {
        if let Some(problem) = self.config.problem() {
            return Err(EngineError::InvalidConfig(problem));
        }
        let composer = MultiStrategyComposer::new(strategies)?;
        let aligner = TimeframeAligner::new(composer.required_timeframes())?;

        self.set_phase(EnginePhase::Aligning);
        let table = aligner.align(data)?;
        let aligned_rows = table.len();
        let table = table.between(start, end);
        if table.is_empty() {
            return Err(EngineError::EmptyRange {
                start,
                end,
                aligned_rows,
            });
        }

        tracing::info!(
            strategies = composer.len(),
            base = %table.base_timeframe(),
            bars = table.len(),
            "starting backtest"
        );

        self.set_phase(EnginePhase::Running);
        let config = self.config.clone();
        let mut run = RunState::new(&config, composer);
        for index in 0..table.len() {
            run.step(&table, index);
        }
        if self.config.close_open_at_end {
            run.close_remaining(&table);
        }

        self.set_phase(EnginePhase::Compiling);
        let results = run.compile(&table)?;
        self.set_phase(EnginePhase::Done);

        tracing::info!(
            trades = results.overall_metrics.total_trades,
            final_capital = results.final_capital,
            return_pct = results.overall_metrics.total_return_pct,
            risk_rejections = results.stats.risk_rejections,
            sizing_errors = results.stats.sizing_errors,
            "backtest complete"
        );
        Ok(results)
    }
}

// ─── Per-run state ──────────────────────────────────────────────────

struct RunState<'a> {
    config: &'a EngineConfig,
    composer: MultiStrategyComposer,
    manager: PositionManager,
    tracker: PerformanceTracker,
    trade_log: Vec<TradeLogRecord>,
    stats: RunStats,
}

impl<'a> RunState<'a> {
    fn new(config: &'a EngineConfig, composer: MultiStrategyComposer) -> Self {
        Self {
            config,
            composer,
            manager: PositionManager::new(config.initial_capital, config.max_total_risk_percent)
                .with_point_value(config.point_value)
                .with_compounding(config.compounding),
            tracker: PerformanceTracker::new(config.initial_capital)
                .with_ratio_settings(config.ratio_settings()),
            trade_log: Vec::new(),
            stats: RunStats::default(),
        }
    }

    fn step(&mut self, table: &AlignedTable, index: usize) {
        let Some(row) = table.row(index) else {
            return;
        };
        let timestamp = row.timestamp();
        let price = row.bar.close;
        self.stats.bars += 1;

        self.manager.update_positions(price);
        self.process_exits(table, timestamp, price);
        self.process_signals(table, timestamp, price);
        self.tracker
            .update(timestamp, self.manager.current_capital(), self.manager.open_pnl());
    }

    fn process_exits(&mut self, table: &AlignedTable, timestamp: DateTime<Utc>, price: f64) {
        // Pass 1: decide for every open position
        let mut decisions: Vec<(PositionId, ExitDecision)> = Vec::new();
        for position in self.manager.open_positions() {
            let decision = if let Some(exit_type) = price_exit(position, price) {
                Some(ExitDecision::Close(exit_type))
            } else if self.composer.should_exit(position, table, timestamp) {
                Some(ExitDecision::Close(ExitType::ConditionBased))
            } else {
                match reached_partials(position, price) {
                    0 => None,
                    n => Some(ExitDecision::Partials(n)),
                }
            };
            if let Some(decision) = decision {
                decisions.push((position.id, decision));
            }
        }

        // Pass 2: apply
        for (id, decision) in decisions {
            match decision {
                ExitDecision::Close(exit_type) => self.close(id, timestamp, price, exit_type),
                ExitDecision::Partials(count) => {
                    self.take_partials(id, timestamp, price, count);
                    if self
                        .manager
                        .get(id)
                        .is_some_and(|p| !p.is_closed() && is_exhausted(p))
                    {
                        self.close(id, timestamp, price, ExitType::TakeProfit);
                    }
                }
            }
        }
    }

    fn take_partials(&mut self, id: PositionId, timestamp: DateTime<Utc>, price: f64, count: usize) {
        for _ in 0..count {
            match self.manager.take_next_partial(id, timestamp, price) {
                Ok(Some(pnl)) => {
                    self.stats.partial_exits += 1;
                    tracing::debug!(position = %id, price, pnl, "partial exit");
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(position = %id, error = %err, "partial exit failed");
                    break;
                }
            }
        }
    }

    fn close(&mut self, id: PositionId, timestamp: DateTime<Utc>, price: f64, exit_type: ExitType) {
        match self.manager.close_position(id, timestamp, price, exit_type) {
            Ok(position) => {
                tracing::debug!(
                    position = %id,
                    strategy = %position.strategy_name,
                    exit = ?exit_type,
                    price,
                    pnl = position.realized_pnl(),
                    "exit"
                );
                self.trade_log.extend(TradeLogRecord::exit(position));
                self.stats.exits += 1;
            }
            Err(err) => tracing::warn!(position = %id, error = %err, "close failed"),
        }
    }

    fn process_signals(&mut self, table: &AlignedTable, timestamp: DateTime<Utc>, price: f64) {
        let signals = self.composer.generate_all_signals(table, timestamp);
        for (name, signal) in signals {
            self.stats.signals += 1;
            if self.manager.has_open_for(&name) {
                self.stats.skipped_in_position += 1;
                continue;
            }
            if let Some(window) = &self.config.trading_window {
                if !window.allows(timestamp) {
                    self.stats.window_skips += 1;
                    continue;
                }
            }
            let Some(strategy) = self.composer.strategy(&name) else {
                continue;
            };
            let config = strategy.position_config().with_overrides(&signal.metadata);

            let outcome = self
                .manager
                .open_position(&name, timestamp, price, signal.side, &config)
                .map(|opened| opened.map(TradeLogRecord::entry));

            match outcome {
                Ok(Some(record)) => {
                    tracing::debug!(
                        position = %record.position_id,
                        strategy = %name,
                        side = %record.side,
                        price,
                        size = record.size,
                        "entry"
                    );
                    self.trade_log.push(record);
                    self.stats.entries += 1;
                }
                Ok(None) => {
                    tracing::debug!(
                        strategy = %name,
                        open_risk_pct = self.manager.total_risk_percent(),
                        "entry rejected by risk limit"
                    );
                    self.stats.risk_rejections += 1;
                }
                Err(err) => {
                    tracing::warn!(strategy = %name, error = %err, "position sizing failed, skipping signal");
                    self.stats.sizing_errors += 1;
                }
            }
        }
    }

    fn close_remaining(&mut self, table: &AlignedTable) {
        let Some(last) = table.rows().last() else {
            return;
        };
        let (timestamp, price) = (last.timestamp(), last.bar.close);
        for id in self.manager.open_ids() {
            self.close(id, timestamp, price, ExitType::Manual);
        }
    }

    fn compile(self, table: &AlignedTable) -> Result<BacktestResults, EngineError> {
        let overall_metrics = self.tracker.calculate_metrics(self.manager.closed_positions())?;
        let per_strategy_metrics = self
            .composer
            .names()
            .into_iter()
            .map(|name| StrategySummary::from_positions(name, self.manager.strategy_positions(name)))
            .collect();

        Ok(BacktestResults {
            base_timeframe: table.base_timeframe(),
            overall_metrics,
            per_strategy_metrics,
            equity_curve: self.tracker.equity_curve().to_vec(),
            drawdown_curve: self.tracker.drawdown_curve(),
            drawdowns: self.tracker.all_drawdowns(),
            closed_positions: self.manager.closed_positions().to_vec(),
            open_positions: self.manager.open_positions().cloned().collect(),
            final_capital: self.manager.current_capital(),
            trade_log: self.trade_log,
            stats: self.stats,
        })
    }
}
