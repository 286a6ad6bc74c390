//! Bar-by-bar signal generation.
//!
//! The generator owns the position state for a single run and is fed one
//! bar and its indicator snapshot at a time, so no decision can see a later
//! bar.

use tracing::debug;

use crate::domain::indicator::{IndicatorSet, IndicatorSnapshot};
use crate::domain::ohlcv::Bar;
use crate::domain::signal::{PositionState, Signal};
use crate::domain::strategy::{Bracket, Strategy};

pub struct SignalGenerator<'a, S: Strategy + ?Sized> {
    strategy: &'a S,
    state: PositionState,
    bracket: Option<Bracket>,
}

impl<'a, S: Strategy + ?Sized> SignalGenerator<'a, S> {
    pub fn new(strategy: &'a S) -> Self {
        SignalGenerator {
            strategy,
            state: PositionState::Flat,
            bracket: None,
        }
    }

    /// Decide for the next bar in time order.
    pub fn next(&mut self, bar: &Bar, indicators: &IndicatorSnapshot) -> Signal {
        if !self.strategy.is_ready(indicators) {
            return Signal::Hold;
        }

        let proposed = match (self.state, self.bracket.and_then(|b| b.check(bar))) {
            (PositionState::Long, Some(reason)) => Signal::ExitLong { reason },
            _ => self.strategy.decide(bar, indicators, self.state),
        };

        let (state, signal) = self.state.apply(proposed);
        match signal {
            Signal::EnterLong => {
                self.bracket = self.strategy.bracket(bar, indicators);
                debug!(timestamp = %bar.timestamp, rsi = ?indicators.rsi, "enter long");
            }
            Signal::ExitLong { reason } => {
                self.bracket = None;
                debug!(timestamp = %bar.timestamp, rsi = ?indicators.rsi, %reason, "exit long");
            }
            Signal::Hold => {}
        }
        self.state = state;
        signal
    }
}

/// Run the generator over a whole series, one signal per bar.
pub fn generate_signals<S: Strategy + ?Sized>(
    bars: &[Bar],
    indicators: &IndicatorSet,
    strategy: &S,
) -> Vec<Signal> {
    let mut generator = SignalGenerator::new(strategy);
    bars.iter()
        .enumerate()
        .map(|(i, bar)| generator.next(bar, &indicators.snapshot(i)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::from_closes;
    use crate::domain::signal::ExitReason;
    use crate::domain::strategy::{StrategyConfig, StrategyKind, StrategyVariant};

    fn snap(rsi: Option<f64>) -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi,
            prev_rsi: None,
            sma: Some(90.0),
            atr: Some(2.0),
        }
    }

    #[test]
    fn not_ready_is_hold() {
        let strategy = StrategyKind::from_config(&StrategyConfig::default());
        let mut generator = SignalGenerator::new(&strategy);
        let bar = &from_closes(&[100.0])[0];
        assert_eq!(generator.next(bar, &snap(None)), Signal::Hold);
        assert_eq!(generator.state, PositionState::Flat);
    }

    #[test]
    fn enters_once_and_exits_once() {
        let strategy = StrategyKind::from_config(&StrategyConfig::default());
        let mut generator = SignalGenerator::new(&strategy);
        let bars = from_closes(&[100.0; 5]);

        let rsis = [50.0, 60.0, 65.0, 50.0, 40.0];
        let signals: Vec<Signal> = bars
            .iter()
            .zip(rsis)
            .map(|(bar, rsi)| generator.next(bar, &snap(Some(rsi))))
            .collect();

        assert_eq!(
            signals,
            vec![
                Signal::Hold,
                Signal::EnterLong,
                Signal::Hold,
                Signal::Hold,
                Signal::exit()
            ]
        );
        assert_eq!(generator.state, PositionState::Flat);
    }

    #[test]
    fn bracket_stop_fires_before_rsi_rule() {
        let config = StrategyConfig {
            variant: StrategyVariant::RsiTrendAtr,
            ..StrategyConfig::default()
        };
        let strategy = StrategyKind::from_config(&config);
        let mut generator = SignalGenerator::new(&strategy);
        let bars = from_closes(&[100.0, 99.0, 96.0]);

        assert_eq!(generator.next(&bars[0], &snap(Some(60.0))), Signal::EnterLong);
        // stop = 100 - 1.5 * 2 = 97
        assert_eq!(generator.next(&bars[1], &snap(Some(60.0))), Signal::Hold);
        assert_eq!(
            generator.next(&bars[2], &snap(Some(60.0))),
            Signal::ExitLong {
                reason: ExitReason::StopLoss
            }
        );
        assert_eq!(generator.state, PositionState::Flat);
    }

    #[test]
    fn bracket_is_anchored_to_signal_close() {
        let config = StrategyConfig {
            variant: StrategyVariant::RsiTrendAtr,
            ..StrategyConfig::default()
        };
        let strategy = StrategyKind::from_config(&config);
        let mut generator = SignalGenerator::new(&strategy);
        let mut bars = from_closes(&[100.0, 98.0, 96.5]);
        // next-bar-open fill would happen at 94
        bars[1].open = 94.0;
        bars[1].low = 94.0;

        assert_eq!(generator.next(&bars[0], &snap(Some(60.0))), Signal::EnterLong);
        assert_eq!(generator.state, PositionState::Long);
        assert_eq!(generator.next(&bars[1], &snap(Some(60.0))), Signal::Hold);
        // stop stays at 100 - 1.5 * 2 = 97
        assert_eq!(
            generator.next(&bars[2], &snap(Some(60.0))),
            Signal::ExitLong {
                reason: ExitReason::StopLoss
            }
        );
    }

    #[test]
    fn bracket_take_profit() {
        let config = StrategyConfig {
            variant: StrategyVariant::RsiTrendAtr,
            ..StrategyConfig::default()
        };
        let strategy = StrategyKind::from_config(&config);
        let mut generator = SignalGenerator::new(&strategy);
        let bars = from_closes(&[100.0, 111.0]);

        generator.next(&bars[0], &snap(Some(60.0)));
        assert_eq!(
            generator.next(&bars[1], &snap(Some(60.0))),
            Signal::ExitLong {
                reason: ExitReason::TakeProfit
            }
        );
    }

    #[test]
    fn generate_signals_is_aligned_with_bars() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i % 4) as f64).collect();
        let bars = from_closes(&closes);
        let config = StrategyConfig {
            rsi_period: 5,
            sma_period: 5,
            atr_period: 5,
            ..StrategyConfig::default()
        };
        let indicators = IndicatorSet::compute(&bars, &config.indicator_spec());
        let strategy = StrategyKind::from_config(&config);

        let signals = generate_signals(&bars, &indicators, &strategy);
        assert_eq!(signals.len(), bars.len());
        assert!(signals[..5].iter().all(Signal::is_hold));
    }
}
