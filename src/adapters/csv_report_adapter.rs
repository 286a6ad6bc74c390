//! CSV report adapter implementing ReportPort.
//!
//! Writes `equity.csv`, `trades.csv` and `metrics.csv` into the output
//! directory, creating it if needed.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::RsiTraderError;
use crate::domain::metrics::MetricsReport;
use crate::domain::strategy::StrategyConfig;
use crate::ports::report_port::ReportPort;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Serialize)]
struct EquityRow {
    timestamp: String,
    equity: f64,
    signal: String,
}

#[derive(Serialize)]
struct TradeRow {
    entry_timestamp: String,
    entry_price: f64,
    exit_timestamp: String,
    exit_price: f64,
    quantity: f64,
    cost_basis: f64,
    proceeds: f64,
    pnl: f64,
    return_pct: f64,
    duration_bars: usize,
    exit_reason: String,
}

#[derive(Serialize)]
struct MetricRow {
    metric: &'static str,
    value: String,
}

fn opt(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.6}"))
}

fn metric_rows(strategy: &StrategyConfig, m: &MetricsReport) -> Vec<MetricRow> {
    let ts = |t: Option<chrono::NaiveDateTime>| {
        t.map_or_else(|| "N/A".to_string(), |t| t.format(TIMESTAMP_FORMAT).to_string())
    };
    let row = |metric, value| MetricRow { metric, value };
    vec![
        row("strategy", strategy.name.clone()),
        row("kind", strategy.variant.to_string()),
        row("initial_cash", format!("{:.2}", m.initial_cash)),
        row("final_equity", format!("{:.2}", m.final_equity)),
        row("total_return", format!("{:.6}", m.total_return)),
        row("annualized_return", opt(m.annualized_return)),
        row("buy_and_hold_return", opt(m.buy_and_hold_return)),
        row("max_drawdown", format!("{:.6}", m.drawdown.max_drawdown)),
        row("drawdown_peak", ts(m.drawdown.peak)),
        row("drawdown_trough", ts(m.drawdown.trough)),
        row("longest_drawdown_bars", m.drawdown.longest_duration_bars.to_string()),
        row("sharpe_ratio", opt(m.sharpe_ratio)),
        row("sortino_ratio", opt(m.sortino_ratio)),
        row("annualization_factor", format!("{}", m.annualization_factor)),
        row("trades", m.trade_count.to_string()),
        row("synthetic_exits", m.synthetic_exits.to_string()),
        row("win_rate", opt(m.win_rate)),
        row("profit_factor", opt(m.profit_factor)),
        row("avg_win", opt(m.avg_win)),
        row("avg_loss", opt(m.avg_loss)),
        row("largest_win", opt(m.largest_win)),
        row("largest_loss", opt(m.largest_loss)),
        row("avg_trade_duration_bars", opt(m.avg_trade_duration_bars)),
        row("exposure", format!("{:.6}", m.exposure)),
    ]
}

fn write_rows<T: Serialize>(
    path: &Path,
    rows: impl IntoIterator<Item = T>,
) -> Result<(), RsiTraderError> {
    let to_err = |e: csv::Error| RsiTraderError::Data {
        reason: format!("failed to write {}: {e}", path.display()),
    };
    let mut writer = csv::Writer::from_path(path).map_err(to_err)?;
    for row in rows {
        writer.serialize(row).map_err(to_err)?;
    }
    writer.flush()?;
    Ok(())
}

pub struct CsvReportAdapter;

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        strategy: &StrategyConfig,
        output_path: &str,
    ) -> Result<(), RsiTraderError> {
        let dir = Path::new(output_path);
        fs::create_dir_all(dir)?;

        let equity = result
            .equity_curve
            .iter()
            .zip(&result.signals)
            .map(|(point, signal)| EquityRow {
                timestamp: point.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                equity: point.equity,
                signal: signal.to_string(),
            });
        write_rows(&dir.join("equity.csv"), equity)?;

        let trades = result.trades.iter().map(|t| TradeRow {
            entry_timestamp: t.entry_timestamp.format(TIMESTAMP_FORMAT).to_string(),
            entry_price: t.entry_price,
            exit_timestamp: t.exit_timestamp.format(TIMESTAMP_FORMAT).to_string(),
            exit_price: t.exit_price,
            quantity: t.quantity,
            cost_basis: t.cost_basis,
            proceeds: t.proceeds,
            pnl: t.pnl,
            return_pct: t.return_pct(),
            duration_bars: t.duration_bars(),
            exit_reason: t.exit_reason.to_string(),
        });
        write_rows(&dir.join("trades.csv"), trades)?;

        write_rows(&dir.join("metrics.csv"), metric_rows(strategy, &result.metrics))?;

        info!(output = %dir.display(), trades = result.trades.len(), "report written");
        Ok(())
    }
}
