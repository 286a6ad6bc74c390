//! Parameter sweeps over RSI thresholds and indicator periods.
//!
//! Each combination is an independent backtest over the same bars. Runs
//! execute in parallel and share nothing but the bar slice.

use rayon::prelude::*;
use tracing::{debug, info};

use super::backtest::{BacktestConfig, run_backtest};
use super::error::RsiTraderError;
use super::metrics::MetricsReport;
use super::ohlcv::{Bar, validate_bars};
use super::strategy::StrategyConfig;

/// Most values a single grid axis may expand to.
pub const MAX_GRID_VALUES: usize = 1_000;

/// Most combinations a sweep may run.
pub const MAX_SWEEP_RUNS: usize = 100_000;

/// Values to try for each swept parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    pub buy_thresholds: Vec<f64>,
    pub sell_thresholds: Vec<f64>,
    pub sma_periods: Vec<usize>,
    pub rsi_periods: Vec<usize>,
}

impl ParamGrid {
    /// A grid holding only the base strategy's own values.
    pub fn from_base(base: &StrategyConfig) -> Self {
        ParamGrid {
            buy_thresholds: vec![base.buy_threshold],
            sell_thresholds: vec![base.sell_threshold],
            sma_periods: vec![base.sma_period],
            rsi_periods: vec![base.rsi_period],
        }
    }

    /// buy 50..70, sell 30..50 (step 5), SMA 20..100 (step 10).
    pub fn threshold_default(base: &StrategyConfig) -> Self {
        ParamGrid {
            buy_thresholds: (50..70).step_by(5).map(f64::from).collect(),
            sell_thresholds: (30..50).step_by(5).map(f64::from).collect(),
            sma_periods: (20..100).step_by(10).collect(),
            rsi_periods: vec![base.rsi_period],
        }
    }

    /// Upper bound on runs, before invalid combinations are dropped.
    pub fn size(&self) -> usize {
        self.buy_thresholds
            .len()
            .saturating_mul(self.sell_thresholds.len())
            .saturating_mul(self.sma_periods.len())
            .saturating_mul(self.rsi_periods.len())
    }

    /// Reject grids with an empty axis or more than [`MAX_SWEEP_RUNS`]
    /// combinations.
    pub fn validate(&self) -> Result<(), RsiTraderError> {
        let size = self.size();
        if size == 0 {
            return Err(RsiTraderError::invalid("sweep", "grid", "every axis needs a value"));
        }
        if size > MAX_SWEEP_RUNS {
            return Err(RsiTraderError::invalid(
                "sweep",
                "grid",
                format!("{size} combinations exceeds the limit of {MAX_SWEEP_RUNS}"),
            ));
        }
        Ok(())
    }

    /// Every valid combination applied to `base`. Combinations where the
    /// buy threshold does not exceed the sell threshold are skipped.
    pub fn generate_configs(&self, base: &StrategyConfig) -> Vec<StrategyConfig> {
        let mut configs = Vec::new();
        for &buy in &self.buy_thresholds {
            for &sell in &self.sell_thresholds {
                if buy <= sell {
                    continue;
                }
                for &sma in &self.sma_periods {
                    for &rsi in &self.rsi_periods {
                        configs.push(StrategyConfig {
                            name: format!(
                                "{} buy={buy} sell={sell} sma={sma} rsi={rsi}",
                                base.variant
                            ),
                            buy_threshold: buy,
                            sell_threshold: sell,
                            sma_period: sma,
                            rsi_period: rsi,
                            ..base.clone()
                        });
                    }
                }
            }
        }
        configs
    }
}

/// Parse `"a,b,c"` or `"start:end:step"` (end exclusive) into numbers.
pub fn parse_grid_values(raw: &str) -> Result<Vec<f64>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty grid".to_string());
    }

    if raw.contains(':') {
        let parts: Vec<&str> = raw.split(':').map(str::trim).collect();
        let [start, end, step] = parts.as_slice() else {
            return Err(format!("range '{raw}' must be start:end:step"));
        };
        let parse = |s: &str| {
            s.parse::<f64>()
                .map_err(|_| format!("'{s}' is not a number"))
        };
        let (start, end, step) = (parse(*start)?, parse(*end)?, parse(*step)?);
        if !(step.is_finite() && step > 0.0) {
            return Err(format!("range step must be positive, got {step}"));
        }
        if end <= start {
            return Err(format!("range end {end} must exceed start {start}"));
        }
        let count = ((end - start) / step).ceil();
        if !count.is_finite() || count > MAX_GRID_VALUES as f64 {
            return Err(too_many_values(raw));
        }

        let mut values = Vec::new();
        let mut i = 0u32;
        loop {
            let v = start + step * f64::from(i);
            if v >= end {
                break;
            }
            if values.len() == MAX_GRID_VALUES {
                return Err(too_many_values(raw));
            }
            values.push(v);
            i += 1;
        }
        return Ok(values);
    }

    let values = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().map_err(|_| format!("'{s}' is not a number")))
        .collect::<Result<Vec<f64>, String>>()?;
    if values.len() > MAX_GRID_VALUES {
        return Err(too_many_values(raw));
    }
    Ok(values)
}

fn too_many_values(raw: &str) -> String {
    format!("grid '{raw}' expands to more than {MAX_GRID_VALUES} values")
}

/// Like [`parse_grid_values`] but every value must be a positive integer.
pub fn parse_period_values(raw: &str) -> Result<Vec<usize>, String> {
    parse_grid_values(raw)?
        .into_iter()
        .map(|v| {
            if v >= 1.0 && v.fract() == 0.0 {
                Ok(v as usize)
            } else {
                Err(format!("period {v} must be a positive integer"))
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct SweepEntry {
    pub strategy: StrategyConfig,
    pub metrics: MetricsReport,
}

#[derive(Debug, Clone)]
pub struct SkippedRun {
    pub strategy: StrategyConfig,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Completed runs, best total return first.
    pub ranked: Vec<SweepEntry>,
    pub skipped: Vec<SkippedRun>,
}

/// Run every combination in `grid` against `bars`.
///
/// The account config and bars are validated once up front. A combination
/// that fails its own setup (e.g. an SMA longer than the data) is recorded
/// in `skipped` and does not stop the sweep.
pub fn run_sweep(
    bars: &[Bar],
    grid: &ParamGrid,
    base: &StrategyConfig,
    config: &BacktestConfig,
) -> Result<SweepReport, RsiTraderError> {
    config.validate()?;
    grid.validate()?;
    validate_bars(bars)?;

    let configs = grid.generate_configs(base);
    info!(
        combinations = configs.len(),
        grid_size = grid.size(),
        "starting parameter sweep"
    );

    let outcomes: Vec<(StrategyConfig, Result<MetricsReport, RsiTraderError>)> = configs
        .into_par_iter()
        .map(|strategy| {
            let outcome = run_backtest(bars, &strategy, config).map(|r| r.metrics);
            (strategy, outcome)
        })
        .collect();

    let mut report = SweepReport::default();
    for (strategy, outcome) in outcomes {
        match outcome {
            Ok(metrics) => report.ranked.push(SweepEntry { strategy, metrics }),
            Err(e) => {
                debug!(strategy = %strategy.name, error = %e, "sweep run skipped");
                report.skipped.push(SkippedRun {
                    strategy,
                    reason: e.to_string(),
                });
            }
        }
    }
    report
        .ranked
        .sort_by(|a, b| b.metrics.total_return.total_cmp(&a.metrics.total_return));

    info!(
        completed = report.ranked.len(),
        skipped = report.skipped.len(),
        "parameter sweep finished"
    );
    Ok(report)
}
