//! OHLCV bar representation.

use chrono::NaiveDateTime;

use crate::domain::error::RsiTraderError;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Check that prices are positive, volume is non-negative and timestamps
/// strictly increase.
pub fn validate_bars(bars: &[Bar]) -> Result<(), RsiTraderError> {
    for (index, bar) in bars.iter().enumerate() {
        let prices = [
            ("open", bar.open),
            ("high", bar.high),
            ("low", bar.low),
            ("close", bar.close),
        ];
        for (name, price) in prices {
            if !(price.is_finite() && price > 0.0) {
                return Err(RsiTraderError::InvalidBar {
                    index,
                    reason: format!("{name} must be positive, got {price}"),
                });
            }
        }
        if !(bar.volume.is_finite() && bar.volume >= 0.0) {
            return Err(RsiTraderError::InvalidBar {
                index,
                reason: format!("volume must be non-negative, got {}", bar.volume),
            });
        }
        if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
            return Err(RsiTraderError::InvalidBar {
                index,
                reason: format!(
                    "timestamp {} does not follow {}",
                    bar.timestamp,
                    bars[index - 1].timestamp
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn sample_bar() -> Bar {
        Bar {
            timestamp: ts(0),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            volume: 50_000.0,
        }
    }

    #[test]
    fn typical_price() {
        let bar = sample_bar();
        let expected = (110.0 + 90.0 + 105.0) / 3.0;
        assert!((bar.typical_price() - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_hl_dominates() {
        let bar = sample_bar();
        assert!((bar.true_range(100.0) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bar = sample_bar();
        // |110-70| = 40
        assert!((bar.true_range(70.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_down() {
        let bar = sample_bar();
        // |90-130| = 40
        assert!((bar.true_range(130.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_accepts_ordered_bars() {
        let bars = vec![
            sample_bar(),
            Bar {
                timestamp: ts(4),
                ..sample_bar()
            },
        ];
        assert!(validate_bars(&bars).is_ok());
    }

    #[test]
    fn validate_rejects_non_positive_close() {
        let bars = vec![Bar {
            close: 0.0,
            ..sample_bar()
        }];
        let err = validate_bars(&bars).unwrap_err();
        assert!(matches!(err, RsiTraderError::InvalidBar { index: 0, .. }));
    }

    #[test]
    fn validate_rejects_negative_volume() {
        let bars = vec![Bar {
            volume: -1.0,
            ..sample_bar()
        }];
        assert!(validate_bars(&bars).is_err());
    }

    #[test]
    fn validate_rejects_repeated_timestamp() {
        let bars = vec![sample_bar(), sample_bar()];
        let err = validate_bars(&bars).unwrap_err();
        assert!(matches!(err, RsiTraderError::InvalidBar { index: 1, .. }));
    }
}
