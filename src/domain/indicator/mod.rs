//! Technical indicators over an ordered bar sequence.
//!
//! - `IndicatorPoint`: one value aligned with one bar (`None` while warming up)
//! - `IndicatorType`: indicator identity + parameters
//! - `IndicatorSeries`: a series aligned 1:1 with the bars
//! - `IndicatorSet` / `IndicatorSnapshot`: the RSI, SMA and ATR series a
//!   strategy reads, and their values at a single bar

pub mod atr;
pub mod rsi;
pub mod sma;

use chrono::NaiveDateTime;
use std::fmt;

use crate::domain::ohlcv::Bar;

pub use rsi::RsiSource;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
}

impl IndicatorPoint {
    pub fn is_ready(&self) -> bool {
        self.value.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Rsi(usize),
    VolumeWeightedRsi(usize),
    Atr(usize),
}

impl IndicatorType {
    /// Bars needed before the series produces its first value.
    pub fn required_bars(&self) -> usize {
        match self {
            IndicatorType::Sma(p) | IndicatorType::Rsi(p) | IndicatorType::Atr(p) => p + 1,
            // volume mean warms up over `p` bars, then RSI needs `p` changes
            IndicatorType::VolumeWeightedRsi(p) => 2 * p,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::VolumeWeightedRsi(period) => write!(f, "VWRSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.values.get(index).and_then(|p| p.value)
    }

    /// Index of the first ready value, if any.
    pub fn first_ready(&self) -> Option<usize> {
        self.values.iter().position(IndicatorPoint::is_ready)
    }

    pub(crate) fn not_ready(bars: &[Bar], indicator_type: IndicatorType) -> Self {
        IndicatorSeries {
            indicator_type,
            values: bars
                .iter()
                .map(|b| IndicatorPoint {
                    timestamp: b.timestamp,
                    value: None,
                })
                .collect(),
        }
    }
}

/// Compute a single indicator.
pub fn calculate(bars: &[Bar], indicator_type: IndicatorType) -> IndicatorSeries {
    match indicator_type {
        IndicatorType::Sma(period) => sma::calculate_sma(bars, period),
        IndicatorType::Rsi(period) => rsi::calculate_rsi(bars, period, RsiSource::Close),
        IndicatorType::VolumeWeightedRsi(period) => {
            rsi::calculate_rsi(bars, period, RsiSource::VolumeWeightedTypical)
        }
        IndicatorType::Atr(period) => atr::calculate_atr(bars, period),
    }
}

/// Wilder's running average: the first `period` inputs are averaged, every
/// later input updates `avg = (avg * (period - 1) + x) / period`.
#[derive(Debug, Clone)]
pub(crate) struct WilderAverage {
    period: usize,
    count: usize,
    sum: f64,
    avg: Option<f64>,
}

impl WilderAverage {
    pub(crate) fn new(period: usize) -> Self {
        WilderAverage {
            period,
            count: 0,
            sum: 0.0,
            avg: None,
        }
    }

    pub(crate) fn push(&mut self, x: f64) -> Option<f64> {
        self.count += 1;
        match self.avg {
            Some(prev) => {
                let n = self.period as f64;
                self.avg = Some((prev * (n - 1.0) + x) / n);
            }
            None => {
                self.sum += x;
                if self.count == self.period {
                    self.avg = Some(self.sum / self.period as f64);
                }
            }
        }
        self.avg
    }
}

/// Which indicators a strategy run needs and with what parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSpec {
    pub rsi_period: usize,
    pub rsi_source: RsiSource,
    pub sma_period: usize,
    pub atr_period: usize,
}

impl IndicatorSpec {
    pub fn rsi_type(&self) -> IndicatorType {
        match self.rsi_source {
            RsiSource::Close => IndicatorType::Rsi(self.rsi_period),
            RsiSource::VolumeWeightedTypical => IndicatorType::VolumeWeightedRsi(self.rsi_period),
        }
    }

    pub fn types(&self) -> [IndicatorType; 3] {
        [
            self.rsi_type(),
            IndicatorType::Sma(self.sma_period),
            IndicatorType::Atr(self.atr_period),
        ]
    }

    /// Longest warm-up across all indicators.
    pub fn minimum_bars(&self) -> usize {
        self.types()
            .iter()
            .map(IndicatorType::required_bars)
            .max()
            .unwrap_or(0)
    }
}

/// Indicator values visible at one bar.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IndicatorSnapshot {
    pub rsi: Option<f64>,
    /// RSI of the previous bar, for cross triggers.
    pub prev_rsi: Option<f64>,
    pub sma: Option<f64>,
    pub atr: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct IndicatorSet {
    pub rsi: IndicatorSeries,
    pub sma: IndicatorSeries,
    pub atr: IndicatorSeries,
}

impl IndicatorSet {
    pub fn compute(bars: &[Bar], spec: &IndicatorSpec) -> Self {
        IndicatorSet {
            rsi: calculate(bars, spec.rsi_type()),
            sma: calculate(bars, IndicatorType::Sma(spec.sma_period)),
            atr: calculate(bars, IndicatorType::Atr(spec.atr_period)),
        }
    }

    /// Values at `index`. Never reads a later bar.
    pub fn snapshot(&self, index: usize) -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi: self.rsi.value_at(index),
            prev_rsi: index.checked_sub(1).and_then(|i| self.rsi.value_at(i)),
            sma: self.sma.value_at(index),
            atr: self.atr.value_at(index),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_bars {
    use crate::domain::ohlcv::Bar;
    use chrono::{Duration, NaiveDate};

    /// Bars four hours apart with open/high/low all equal to close.
    pub fn from_closes(closes: &[f64]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: start + Duration::hours(4 * i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            })
            .collect()
    }
}
