//! Simple Moving Average of close.
//!
//! SMA(n)[i] = sum(C[i-j] for j in 0..n) / n
//! Warmup: first (n-1) bars are not ready.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

pub fn calculate_sma(bars: &[Bar], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Sma(period);
    if period == 0 || bars.len() < indicator_type.required_bars() {
        return IndicatorSeries::not_ready(bars, indicator_type);
    }

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let value = if i + 1 >= period {
                let window = &bars[i + 1 - period..=i];
                Some(window.iter().map(|b| b.close).sum::<f64>() / period as f64)
            } else {
                None
            };
            IndicatorPoint {
                timestamp: bar.timestamp,
                value,
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

/// Trailing mean of an arbitrary per-bar quantity; `None` while warming up.
pub(crate) fn trailing_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if period > 0 && i + 1 >= period {
                Some(values[i + 1 - period..=i].iter().sum::<f64>() / period as f64)
            } else {
                None
            }
        })
        .collect()
}
