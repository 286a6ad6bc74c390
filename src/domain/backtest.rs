//! Backtest pipeline: bars → indicators → signals → simulation → metrics.
//!
//! `BacktestConfig` holds the account and execution parameters. All
//! validation happens in [`run_backtest`] before the first bar is processed.

use tracing::{debug, info};

use super::error::RsiTraderError;
use super::execution::{ExecutionConfig, ExecutionPriceRule};
use super::indicator::IndicatorSet;
use super::ledger::EquityPoint;
use super::metrics::{DEFAULT_ANNUALIZATION_FACTOR, MetricsReport, infer_annualization_factor};
use super::ohlcv::{Bar, validate_bars};
use super::position::Trade;
use super::signal::Signal;
use super::signal_generator::generate_signals;
use super::simulator::simulate;
use super::strategy::{StrategyConfig, StrategyKind};

pub const DEFAULT_INITIAL_CASH: f64 = 1_000_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_cash: f64,
    pub transaction_cost: f64,
    pub execution_price: ExecutionPriceRule,
    pub risk_free_rate: f64,
    /// Bars per year. Inferred from bar spacing when unset.
    pub annualization_factor: Option<f64>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_cash: DEFAULT_INITIAL_CASH,
            transaction_cost: 0.0,
            execution_price: ExecutionPriceRule::SameBarClose,
            risk_free_rate: 0.0,
            annualization_factor: None,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), RsiTraderError> {
        const SECTION: &str = "backtest";

        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(RsiTraderError::invalid(
                SECTION,
                "initial_cash",
                format!("must be positive, got {}", self.initial_cash),
            ));
        }
        if !(0.0..1.0).contains(&self.transaction_cost) {
            return Err(RsiTraderError::invalid(
                SECTION,
                "transaction_cost",
                format!("must be in [0, 1), got {}", self.transaction_cost),
            ));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(RsiTraderError::invalid(
                SECTION,
                "risk_free_rate",
                "must be a finite number",
            ));
        }
        if let Some(af) = self.annualization_factor {
            if !(af.is_finite() && af > 0.0) {
                return Err(RsiTraderError::invalid(
                    SECTION,
                    "annualization_factor",
                    format!("must be positive, got {af}"),
                ));
            }
        }
        Ok(())
    }

    pub fn execution_config(&self) -> ExecutionConfig {
        ExecutionConfig {
            transaction_cost: self.transaction_cost,
            price_rule: self.execution_price,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub equity_curve: Vec<EquityPoint>,
    pub signals: Vec<Signal>,
    pub trades: Vec<Trade>,
    pub metrics: MetricsReport,
}

/// Fail with `InsufficientData` unless `bars` covers every indicator warm-up.
pub fn check_sufficient(bars: &[Bar], strategy: &StrategyConfig) -> Result<(), RsiTraderError> {
    let minimum = strategy.indicator_spec().minimum_bars();
    if bars.len() < minimum {
        return Err(RsiTraderError::InsufficientData {
            bars: bars.len(),
            minimum,
        });
    }
    Ok(())
}

/// Run one backtest. Errors are setup errors only; once the bars pass
/// validation the run always produces a result.
pub fn run_backtest(
    bars: &[Bar],
    strategy: &StrategyConfig,
    config: &BacktestConfig,
) -> Result<BacktestResult, RsiTraderError> {
    strategy.validate()?;
    config.validate()?;
    validate_bars(bars)?;
    check_sufficient(bars, strategy)?;

    debug!(strategy = %strategy.name, bars = bars.len(), "computing indicators");
    let indicators = IndicatorSet::compute(bars, &strategy.indicator_spec());

    let kind = StrategyKind::from_config(strategy);
    let signals = generate_signals(bars, &indicators, &kind);

    let ledger = simulate(bars, &signals, config.initial_cash, &config.execution_config());

    let annualization_factor = config
        .annualization_factor
        .or_else(|| infer_annualization_factor(bars))
        .unwrap_or(DEFAULT_ANNUALIZATION_FACTOR);
    let metrics =
        MetricsReport::compute(&ledger, bars, config.risk_free_rate, annualization_factor);

    info!(
        strategy = %strategy.name,
        trades = metrics.trade_count,
        total_return = metrics.total_return,
        "backtest complete"
    );

    Ok(BacktestResult {
        equity_curve: ledger.equity_curve,
        signals,
        trades: ledger.trades,
        metrics,
    })
}
