//! MTF Core: multi-timeframe backtesting engine.
//!
//! This crate holds everything a run needs short of loading files:
//! - Domain types (timeframes, bars, signals, trade log records)
//! - Timeframe alignment with a strict no-lookahead join
//! - Position management with a portfolio risk gate and partial exits
//! - The strategy trait, the multi-strategy composer and an MA crossover
//! - Bar-by-bar event loop with exits processed before entries
//! - Equity tracking, drawdown episodes and performance metrics

pub mod data;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod performance;
pub mod position_management;
pub mod strategy;
