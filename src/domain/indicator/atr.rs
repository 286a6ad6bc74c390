//! ATR (Average True Range), Wilder-smoothed.
//!
//! TR[i] = max(H[i] - L[i], |H[i] - C[i-1]|, |L[i] - C[i-1]|), defined from bar 1.
//! Seed: mean of the first n true ranges; then ATR = (prev * (n-1) + TR) / n.
//! Warmup: first n bars are not ready.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, WilderAverage};
use crate::domain::ohlcv::Bar;

pub fn calculate_atr(bars: &[Bar], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Atr(period);
    if period == 0 || bars.len() < indicator_type.required_bars() {
        return IndicatorSeries::not_ready(bars, indicator_type);
    }

    let mut avg = WilderAverage::new(period);
    let mut values = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        let value = match i.checked_sub(1) {
            Some(prev) => avg.push(bar.true_range(bars[prev].close)),
            None => None,
        };
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::from_closes;

    fn make_bars(hlc: &[(f64, f64, f64)]) -> Vec<Bar> {
        let closes: Vec<f64> = hlc.iter().map(|&(_, _, c)| c).collect();
        from_closes(&closes)
            .into_iter()
            .zip(hlc)
            .map(|(bar, &(high, low, _))| Bar { high, low, ..bar })
            .collect()
    }

    #[test]
    fn atr_warmup() {
        let bars = make_bars(&[(110.0, 90.0, 100.0); 5]);
        let series = calculate_atr(&bars, 3);

        assert_eq!(series.values.len(), 5);
        assert!(!series.values[0].is_ready());
        assert!(!series.values[1].is_ready());
        assert!(!series.values[2].is_ready());
        assert!(series.values[3].is_ready());
        assert!(series.values[4].is_ready());
    }

    #[test]
    fn atr_seed_is_average() {
        let bars = make_bars(&[
            (110.0, 100.0, 105.0),
            (115.0, 105.0, 110.0),
            (120.0, 110.0, 115.0),
            (130.0, 112.0, 125.0),
        ]);

        let series = calculate_atr(&bars, 3);
        // TRs: 10, 10, 18
        let expected = (10.0 + 10.0 + 18.0) / 3.0;
        assert!((series.values[3].value.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn atr_wilder_smoothing() {
        let bars = make_bars(&[
            (110.0, 100.0, 105.0),
            (115.0, 105.0, 110.0),
            (120.0, 110.0, 115.0),
            (125.0, 115.0, 120.0),
            (140.0, 120.0, 130.0),
        ]);

        let series = calculate_atr(&bars, 3);
        let seed = 10.0;
        // TR at bar 4 = max(20, 20, 0) = 20
        let expected = (seed * 2.0 + 20.0) / 3.0;
        assert!((series.values[4].value.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn atr_insufficient_bars() {
        let bars = make_bars(&[(110.0, 90.0, 100.0); 5]);
        let series = calculate_atr(&bars, 5);
        assert_eq!(series.values.len(), 5);
        assert!(series.first_ready().is_none());
    }

    #[test]
    fn atr_handles_gaps() {
        let bars = make_bars(&[
            (110.0, 100.0, 105.0),
            (130.0, 120.0, 125.0),
            (120.0, 110.0, 115.0),
        ]);

        let series = calculate_atr(&bars, 2);
        // gap TR = |130 - 105| = 25, then max(10, |120-125|, |110-125|) = 15
        assert_eq!(series.values[2].value, Some(20.0));
    }
}
