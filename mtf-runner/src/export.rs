//! Result export: JSON summary, CSV tables and a Markdown report.
//!
//! `save_artifacts` writes one directory per run:
//! - `results.json`: the full `RunReport`
//! - `trades.csv`: the trade log, ENTRY and EXIT rows in one table
//! - `equity.csv`: equity, realized and unrealized per bar
//! - `drawdown.csv`: peak and drawdown per bar
//! - `report.md`: the Markdown summary
//!
//! Non-finite ratios (a Sortino with no losing periods) are written as `null`
//! in JSON and `inf` in CSV.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mtf_core::domain::TradeLogRecord;
use mtf_core::performance::{DrawdownPoint, EquityPoint};
use mtf_core::position_management::ExitType;

use crate::report::generate_report;
use crate::runner::{short_id, RunReport};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize RunReport to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: timestamp, strategy, action, side, price, size, position_id,
/// entry_time, entry_price, exit_type, pnl, r_multiple
pub fn export_trades_csv(trades: &[TradeLogRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "strategy",
        "action",
        "side",
        "price",
        "size",
        "position_id",
        "entry_time",
        "entry_price",
        "exit_type",
        "pnl",
        "r_multiple",
    ])?;

    for t in trades {
        let action = if t.is_entry() { "ENTRY" } else { "EXIT" };
        wtr.write_record([
            t.timestamp.to_rfc3339(),
            t.strategy.clone(),
            action.to_string(),
            t.side.to_string(),
            format!("{:.6}", t.price),
            opt_num(t.size, 6),
            t.position_id.to_string(),
            t.entry_time.map(|ts| ts.to_rfc3339()).unwrap_or_default(),
            opt_num(t.entry_price, 6),
            t.exit_type.map(exit_label).unwrap_or_default().to_string(),
            opt_num(t.pnl, 2),
            opt_num(t.r_multiple, 4),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_equity_csv(curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity", "realized", "unrealized"])?;
    for p in curve {
        wtr.write_record([
            p.timestamp.to_rfc3339(),
            format!("{:.2}", p.equity),
            format!("{:.2}", p.realized),
            format!("{:.2}", p.unrealized),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_drawdown_csv(curve: &[DrawdownPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity", "peak", "drawdown", "drawdown_pct"])?;
    for p in curve {
        wtr.write_record([
            p.timestamp.to_rfc3339(),
            format!("{:.2}", p.equity),
            format!("{:.2}", p.peak),
            format!("{:.2}", p.drawdown),
            format!("{:.4}", p.drawdown_pct),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

fn opt_num(value: Option<f64>, decimals: usize) -> String {
    value
        .map(|v| format!("{v:.decimals$}"))
        .unwrap_or_default()
}

pub fn exit_label(exit: ExitType) -> &'static str {
    match exit {
        ExitType::StopLoss => "STOP_LOSS",
        ExitType::TakeProfit => "TAKE_PROFIT",
        ExitType::TimeBased => "TIME_BASED",
        ExitType::ConditionBased => "CONDITION_BASED",
        ExitType::Manual => "MANUAL",
    }
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set under `output_dir/{symbol}_{run id prefix}/` and
/// return that directory. Re-running the same config overwrites it.
pub fn save_artifacts(report: &RunReport, output_dir: &Path) -> Result<PathBuf> {
    let run_dir = output_dir.join(format!("{}_{}", report.symbol, short_id(&report.run_id)));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let results = &report.results;
    write(&run_dir, "results.json", &export_json(report)?)?;
    write(&run_dir, "trades.csv", &export_trades_csv(&results.trade_log)?)?;
    write(&run_dir, "equity.csv", &export_equity_csv(&results.equity_curve)?)?;
    write(&run_dir, "drawdown.csv", &export_drawdown_csv(&results.drawdown_curve)?)?;
    write(&run_dir, "report.md", &generate_report(report))?;

    tracing::info!(dir = %run_dir.display(), "artifacts saved");
    Ok(run_dir)
}

fn write(dir: &Path, name: &str, content: &str) -> Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))
}
