//! Performance metrics derived from a finished run.
//!
//! Ratios that are undefined for the run (no trades, zero volatility, no
//! losses) are `None` and render as N/A.

use chrono::NaiveDateTime;

use super::ledger::{EquityPoint, Ledger};
use super::ohlcv::Bar;

const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 60.0 * 60.0;

/// Used when the bar interval cannot be inferred (fewer than two bars).
pub const DEFAULT_ANNUALIZATION_FACTOR: f64 = 365.0;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Drawdown {
    /// Largest peak-to-trough decline as a fraction of the peak.
    pub max_drawdown: f64,
    pub peak: Option<NaiveDateTime>,
    pub trough: Option<NaiveDateTime>,
    /// Longest run of consecutive bars below a prior peak.
    pub longest_duration_bars: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsReport {
    pub initial_cash: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub annualized_return: Option<f64>,
    pub buy_and_hold_return: Option<f64>,
    pub drawdown: Drawdown,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    pub annualization_factor: f64,
    pub trade_count: usize,
    pub synthetic_exits: usize,
    pub winners: usize,
    pub losers: usize,
    pub win_rate: Option<f64>,
    pub profit_factor: Option<f64>,
    pub avg_win: Option<f64>,
    pub avg_loss: Option<f64>,
    pub largest_win: Option<f64>,
    pub largest_loss: Option<f64>,
    pub avg_trade_duration_bars: Option<f64>,
    /// Fraction of bar intervals spent holding a position.
    pub exposure: f64,
}

impl MetricsReport {
    pub fn compute(
        ledger: &Ledger,
        bars: &[Bar],
        risk_free_rate: f64,
        annualization_factor: f64,
    ) -> Self {
        let equity_curve = &ledger.equity_curve;
        let trades = &ledger.trades;
        let initial_cash = ledger.initial_cash;
        let final_equity = ledger.final_equity();

        let total_return = if initial_cash > 0.0 {
            final_equity / initial_cash - 1.0
        } else {
            0.0
        };

        let periods = equity_curve.len().saturating_sub(1) as f64;
        let years = periods / annualization_factor;
        let annualized_return = if years > 0.0 && 1.0 + total_return > 0.0 {
            Some((1.0 + total_return).powf(1.0 / years) - 1.0)
        } else {
            None
        };

        let buy_and_hold_return = match (bars.first(), bars.last()) {
            (Some(first), Some(last)) if bars.len() > 1 => Some(last.close / first.close - 1.0),
            _ => None,
        };

        let drawdown = compute_drawdown(equity_curve);
        let (sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(equity_curve, risk_free_rate, annualization_factor);

        let mut winners = 0usize;
        let mut losers = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win: Option<f64> = None;
        let mut largest_loss: Option<f64> = None;
        let mut bars_held = 0usize;

        for trade in trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                winners += 1;
                total_wins += pnl;
                largest_win = Some(largest_win.map_or(pnl, |w| w.max(pnl)));
            } else if pnl < 0.0 {
                losers += 1;
                total_losses += pnl.abs();
                largest_loss = Some(largest_loss.map_or(pnl.abs(), |l| l.max(pnl.abs())));
            }
            bars_held += trade.duration_bars();
        }

        let trade_count = trades.len();
        let synthetic_exits = trades.iter().filter(|t| t.is_synthetic()).count();

        let win_rate = (trade_count > 0).then(|| winners as f64 / trade_count as f64);
        let profit_factor = (total_losses > 0.0).then(|| total_wins / total_losses);
        let avg_win = (winners > 0).then(|| total_wins / winners as f64);
        let avg_loss = (losers > 0).then(|| total_losses / losers as f64);
        let avg_trade_duration_bars =
            (trade_count > 0).then(|| bars_held as f64 / trade_count as f64);

        let exposure = if periods > 0.0 {
            (bars_held as f64 / periods).min(1.0)
        } else {
            0.0
        };

        MetricsReport {
            initial_cash,
            final_equity,
            total_return,
            annualized_return,
            buy_and_hold_return,
            drawdown,
            sharpe_ratio,
            sortino_ratio,
            annualization_factor,
            trade_count,
            synthetic_exits,
            winners,
            losers,
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            avg_trade_duration_bars,
            exposure,
        }
    }
}

/// Bars per year implied by the median spacing between timestamps.
///
/// `None` with fewer than two bars.
pub fn infer_annualization_factor(bars: &[Bar]) -> Option<f64> {
    let mut gaps: Vec<i64> = bars
        .windows(2)
        .map(|w| (w[1].timestamp - w[0].timestamp).num_seconds())
        .filter(|&s| s > 0)
        .collect();
    if gaps.is_empty() {
        return None;
    }
    gaps.sort_unstable();

    let mid = gaps.len() / 2;
    let median = if gaps.len() % 2 == 0 {
        (gaps[mid - 1] + gaps[mid]) as f64 / 2.0
    } else {
        gaps[mid] as f64
    };
    Some(SECONDS_PER_YEAR / median)
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> Drawdown {
    let Some(first) = equity_curve.first() else {
        return Drawdown::default();
    };

    let mut peak = first.equity;
    let mut peak_at = first.timestamp;
    let mut result = Drawdown::default();
    let mut current_duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            peak_at = point.timestamp;
            current_duration = 0;
            continue;
        }
        if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            if dd > result.max_drawdown {
                result.max_drawdown = dd;
                result.peak = Some(peak_at);
                result.trough = Some(point.timestamp);
            }
        }
        current_duration += 1;
        result.longest_duration_bars = result.longest_duration_bars.max(current_duration);
    }

    result
}

fn per_bar_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect()
}

fn compute_risk_adjusted(
    equity_curve: &[EquityPoint],
    risk_free_rate: f64,
    annualization_factor: f64,
) -> (Option<f64>, Option<f64>) {
    let returns = per_bar_returns(equity_curve);
    if returns.len() < 2 {
        return (None, None);
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let per_bar_rf = risk_free_rate / annualization_factor;
    let excess = mean - per_bar_rf;
    let scale = annualization_factor.sqrt();

    let sharpe = (stddev > 0.0).then(|| excess / stddev * scale);

    let downside_sq: f64 = returns
        .iter()
        .filter(|&&r| r < per_bar_rf)
        .map(|&r| (r - per_bar_rf).powi(2))
        .sum();
    let downside_dev = (downside_sq / n).sqrt();
    let sortino = (downside_dev > 0.0).then(|| excess / downside_dev * scale);

    (sharpe, sortino)
}
