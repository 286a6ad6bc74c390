//! RSI (Relative Strength Index) indicator implementation.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100, unless avg_gain is also 0. A window with no
//! price movement has no defined RSI and is reported as not ready.
//!
//! Warmup: first n bars are not ready (need n price changes to compute initial average).
//!
//! The price series is either the close or the volume-weighted typical price
//! `hlc3 * volume / mean(volume, n)`.

use std::fmt;
use std::str::FromStr;

use crate::domain::indicator::sma::trailing_mean;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, WilderAverage};
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RsiSource {
    #[default]
    Close,
    VolumeWeightedTypical,
}

impl FromStr for RsiSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "close" => Ok(RsiSource::Close),
            "volume_weighted_hlc3" => Ok(RsiSource::VolumeWeightedTypical),
            other => Err(format!(
                "unknown rsi_source '{other}' (expected close or volume_weighted_hlc3)"
            )),
        }
    }
}

impl fmt::Display for RsiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RsiSource::Close => write!(f, "close"),
            RsiSource::VolumeWeightedTypical => write!(f, "volume_weighted_hlc3"),
        }
    }
}

pub fn calculate_rsi(bars: &[Bar], period: usize, source: RsiSource) -> IndicatorSeries {
    let indicator_type = match source {
        RsiSource::Close => IndicatorType::Rsi(period),
        RsiSource::VolumeWeightedTypical => IndicatorType::VolumeWeightedRsi(period),
    };
    if period == 0 || bars.len() < indicator_type.required_bars() {
        return IndicatorSeries::not_ready(bars, indicator_type);
    }

    let prices = source_prices(bars, period, source);

    let mut avg_gain = WilderAverage::new(period);
    let mut avg_loss = WilderAverage::new(period);
    let mut values = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        let change = match (i.checked_sub(1).and_then(|p| prices[p]), prices[i]) {
            (Some(prev), Some(curr)) => Some(curr - prev),
            _ => None,
        };

        let value = change.and_then(|change| {
            let gain = avg_gain.push(change.max(0.0));
            let loss = avg_loss.push((-change).max(0.0));
            match (gain, loss) {
                (Some(g), Some(l)) => rsi_from_averages(g, l),
                _ => None,
            }
        });

        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            value,
        });
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 {
        (avg_gain > 0.0).then_some(100.0)
    } else {
        Some(100.0 - (100.0 / (1.0 + avg_gain / avg_loss)))
    }
}

fn source_prices(bars: &[Bar], period: usize, source: RsiSource) -> Vec<Option<f64>> {
    match source {
        RsiSource::Close => bars.iter().map(|b| Some(b.close)).collect(),
        RsiSource::VolumeWeightedTypical => {
            let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
            trailing_mean(&volumes, period)
                .into_iter()
                .zip(bars)
                .map(|(mean, bar)| {
                    mean.map(|mean| {
                        // a zero mean leaves the typical price unweighted
                        let factor = if mean > 0.0 { bar.volume / mean } else { 1.0 };
                        bar.typical_price() * factor
                    })
                })
                .collect()
        }
    }
}
