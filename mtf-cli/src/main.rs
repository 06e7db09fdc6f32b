//! MTF CLI: backtest runs and symbol universe management.
//!
//! Commands:
//! - `run`: execute a backtest from a TOML config file and save artifacts
//! - `symbols list`: show the used and ignored symbol lists
//! - `symbols use <SYMBOL>` / `symbols ignore <SYMBOL>`: move a symbol between lists

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use mtf_runner::{run_from_config, save_artifacts, BacktestConfig, RunReport, SymbolUniverse};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mtf", about = "MTF CLI: multi-timeframe backtesting engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Override the config start (RFC 3339).
        #[arg(long)]
        start: Option<String>,

        /// Override the config end (RFC 3339).
        #[arg(long)]
        end: Option<String>,

        /// Use synthetic data as fallback, whatever the config says.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Print overall metrics as JSON instead of the text summary.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Symbol universe commands.
    Symbols {
        /// Symbol list file.
        #[arg(long, default_value = "symbols.toml")]
        file: PathBuf,

        #[command(subcommand)]
        action: SymbolsAction,
    },
}

#[derive(Subcommand)]
enum SymbolsAction {
    /// Show used and ignored symbols.
    List,
    /// Move a symbol from the ignored list to the used list.
    Use { symbol: String },
    /// Move a symbol from the used list to the ignored list.
    Ignore { symbol: String },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            start,
            end,
            synthetic,
            json,
            output_dir,
        } => run_backtest_cmd(config, start, end, synthetic, json, output_dir),
        Commands::Symbols { file, action } => run_symbols_cmd(file, action),
    }
}

fn run_backtest_cmd(
    config_path: PathBuf,
    start: Option<String>,
    end: Option<String>,
    synthetic: bool,
    json: bool,
    output_dir: PathBuf,
) -> Result<()> {
    tracing::info!(config = %config_path.display(), "loading config");
    let mut config = BacktestConfig::from_file(&config_path)?;
    if let Some(start) = start.as_deref() {
        config.backtest.start = Some(parse_datetime(start)?);
    }
    if let Some(end) = end.as_deref() {
        config.backtest.end = Some(parse_datetime(end)?);
    }
    if synthetic {
        config.data.synthetic = true;
    }

    let report = run_from_config(&config)?;

    if json {
        let metrics = serde_json::to_string_pretty(&report.results.overall_metrics)
            .context("failed to serialize metrics")?;
        println!("{metrics}");
    } else {
        print_summary(&report);
    }

    let run_dir = save_artifacts(&report, &output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("invalid RFC 3339 timestamp '{value}'"))?
        .with_timezone(&Utc))
}

fn print_summary(report: &RunReport) {
    let r = &report.results;
    let m = &r.overall_metrics;
    println!("Symbol:         {}", report.symbol);
    println!("Run ID:         {}", report.run_id);
    if report.has_synthetic {
        println!("Data:           SYNTHETIC");
    }
    println!("Bars:           {} ({})", r.stats.bars, r.base_timeframe);
    println!("Final capital:  {:.2}", r.final_capital);
    println!("Total return:   {:.2}%", m.total_return_pct);
    println!("Max drawdown:   {:.2}%", m.max_drawdown_pct);
    println!("Sharpe:         {:.3}", m.sharpe_ratio);
    println!("Trades:         {} ({:.1}% win)", m.total_trades, m.win_rate);
    println!();
    println!(
        "{:<24} {:>7} {:>8} {:>12} {:>7}",
        "Strategy", "Trades", "Win %", "P&L", "Avg R"
    );
    println!("{}", "-".repeat(62));
    for s in &r.per_strategy_metrics {
        println!(
            "{:<24} {:>7} {:>7.1}% {:>12.2} {:>7.2}",
            s.strategy,
            s.total_trades,
            s.win_rate,
            s.total_pnl,
            s.avg_r_multiple
        );
    }
    println!();
}

fn run_symbols_cmd(file: PathBuf, action: SymbolsAction) -> Result<()> {
    let universe = SymbolUniverse::load(&file)?;
    match action {
        SymbolsAction::List => {
            println!("Used ({}):", universe.used.len());
            for s in universe.active_symbols() {
                println!("  {s}");
            }
            println!("Ignored ({}):", universe.ignored.len());
            for s in &universe.ignored {
                println!("  {s}");
            }
        }
        SymbolsAction::Use { symbol } => {
            universe.move_to_used(&symbol)?.save(&file)?;
            println!("Using {symbol}");
        }
        SymbolsAction::Ignore { symbol } => {
            universe.move_to_ignored(&symbol)?.save(&file)?;
            println!("Ignoring {symbol}");
        }
    }
    Ok(())
}
