//! Report generation port.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::RsiTraderError;
use crate::domain::strategy::StrategyConfig;

/// Port for persisting or rendering a finished backtest.
pub trait ReportPort {
    fn write(
        &self,
        result: &BacktestResult,
        strategy: &StrategyConfig,
        output_path: &str,
    ) -> Result<(), RsiTraderError>;
}
