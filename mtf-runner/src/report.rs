//! Markdown report for a single run.

use mtf_core::performance::PerformanceMetrics;

use crate::runner::RunReport;

pub fn generate_report(report: &RunReport) -> String {
    let results = &report.results;
    let mut md = String::with_capacity(2048);

    md.push_str("# Backtest Report\n\n");

    // Metadata
    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Symbol | {} |\n", report.symbol));
    md.push_str(&format!("| Run ID | {} |\n", report.run_id));
    md.push_str(&format!("| Base Timeframe | {} |\n", results.base_timeframe));
    if let (Some(first), Some(last)) = (results.equity_curve.first(), results.equity_curve.last()) {
        md.push_str(&format!(
            "| Period | {} to {} |\n",
            first.timestamp.format("%Y-%m-%d %H:%M"),
            last.timestamp.format("%Y-%m-%d %H:%M")
        ));
    }
    md.push_str(&format!("| Bars | {} |\n", results.stats.bars));
    md.push_str(&format!("| Dataset Hash | {} |\n", report.dataset_hash));
    if report.has_synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push('\n');

    md.push_str("## Performance\n\n");
    md.push_str(&metrics_table(&results.overall_metrics));
    md.push('\n');

    // Per-strategy breakdown
    md.push_str("## Strategies\n\n");
    md.push_str("| Strategy | Trades | Win Rate | P&L | Profit Factor | Avg R | Avg Bars |\n");
    md.push_str("| --- | ---: | ---: | ---: | ---: | ---: | ---: |\n");
    for s in &results.per_strategy_metrics {
        md.push_str(&format!(
            "| {} | {} | {:.1}% | {:.2} | {:.2} | {:.2} | {:.1} |\n",
            s.strategy,
            s.total_trades,
            s.win_rate,
            s.total_pnl,
            s.profit_factor,
            s.avg_r_multiple,
            s.avg_bars_held
        ));
    }
    md.push('\n');

    // Run counters
    let st = &results.stats;
    md.push_str("## Run Statistics\n\n");
    md.push_str("| Counter | Value |\n");
    md.push_str("| --- | ---: |\n");
    md.push_str(&format!("| Signals | {} |\n", st.signals));
    md.push_str(&format!("| Entries | {} |\n", st.entries));
    md.push_str(&format!("| Exits | {} |\n", st.exits));
    md.push_str(&format!("| Partial Exits | {} |\n", st.partial_exits));
    md.push_str(&format!("| Skipped (in position) | {} |\n", st.skipped_in_position));
    md.push_str(&format!("| Risk Rejections | {} |\n", st.risk_rejections));
    md.push_str(&format!("| Sizing Errors | {} |\n", st.sizing_errors));
    md.push_str(&format!("| Window Skips | {} |\n", st.window_skips));
    if !results.open_positions.is_empty() {
        md.push_str(&format!(
            "| Open at End | {} |\n",
            results.open_positions.len()
        ));
    }
    md.push('\n');

    // Drawdowns, deepest first
    if !results.drawdowns.is_empty() {
        let mut episodes: Vec<_> = results.drawdowns.iter().collect();
        episodes.sort_by(|a, b| b.max_drawdown.total_cmp(&a.max_drawdown));
        md.push_str("## Largest Drawdowns\n\n");
        md.push_str("| Start | End | Peak | Max DD | Max DD % |\n");
        md.push_str("| --- | --- | ---: | ---: | ---: |\n");
        for ep in episodes.into_iter().take(5) {
            let end = ep
                .end
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "open".into());
            md.push_str(&format!(
                "| {} | {} | {:.2} | {:.2} | {:.2}% |\n",
                ep.start.format("%Y-%m-%d %H:%M"),
                end,
                ep.peak,
                ep.max_drawdown,
                ep.max_drawdown_pct
            ));
        }
        md.push('\n');
    }

    md
}

fn metrics_table(m: &PerformanceMetrics) -> String {
    let mut md = String::new();
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | ---: |\n");
    md.push_str(&format!("| Initial Capital | {:.2} |\n", m.initial_capital));
    md.push_str(&format!("| Final Equity | {:.2} |\n", m.final_equity));
    md.push_str(&format!("| Total Return | {:.2}% |\n", m.total_return_pct));
    md.push_str(&format!("| Trades | {} |\n", m.total_trades));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", m.win_rate));
    md.push_str(&format!("| Profit Factor | {:.2} |\n", m.profit_factor));
    md.push_str(&format!("| Avg Win | {:.2} |\n", m.avg_win));
    md.push_str(&format!("| Avg Loss | {:.2} |\n", m.avg_loss));
    md.push_str(&format!("| Expectancy | {:.2} |\n", m.expectancy));
    md.push_str(&format!("| Avg R | {:.2} |\n", m.avg_r_multiple));
    md.push_str(&format!("| Max Drawdown | {:.2} ({:.2}%) |\n", m.max_drawdown, m.max_drawdown_pct));
    md.push_str(&format!(
        "| Max DD Duration | {} days |\n",
        m.max_drawdown_duration_days
    ));
    md.push_str(&format!("| Sharpe | {:.3} |\n", m.sharpe_ratio));
    md.push_str(&format!("| Sortino | {} |\n", ratio(m.sortino_ratio)));
    md.push_str(&format!("| Calmar | {:.3} |\n", m.calmar_ratio));
    md.push_str(&format!(
        "| Max Consecutive Wins / Losses | {} / {} |\n",
        m.max_consecutive_wins, m.max_consecutive_losses
    ));
    md
}

fn ratio(value: f64) -> String {
    if value.is_infinite() {
        "∞".into()
    } else {
        format!("{value:.3}")
    }
}
