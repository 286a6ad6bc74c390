//! Walks bars and signals in lockstep, filling orders against a [`Ledger`].

use tracing::{debug, warn};

use super::execution::{EntryResult, ExecutionConfig, ExecutionPriceRule, enter_long, exit_long};
use super::ledger::Ledger;
use super::ohlcv::Bar;
use super::signal::{ExitReason, Signal};

pub struct Simulator<'a> {
    config: &'a ExecutionConfig,
    ledger: Ledger,
    pending: Option<Signal>,
}

impl<'a> Simulator<'a> {
    pub fn new(initial_cash: f64, config: &'a ExecutionConfig) -> Self {
        Simulator {
            config,
            ledger: Ledger::new(initial_cash),
            pending: None,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Process bar `index` and the signal emitted on it, then record equity
    /// at the bar's close.
    pub fn step(&mut self, index: usize, bar: &Bar, signal: Signal) {
        match self.config.price_rule {
            ExecutionPriceRule::SameBarClose => self.fill(index, bar, signal, bar.close),
            ExecutionPriceRule::NextBarOpen => {
                if let Some(pending) = self.pending.take() {
                    self.fill(index, bar, pending, bar.open);
                }
                if !signal.is_hold() {
                    self.pending = Some(signal);
                }
            }
        }
        self.ledger.record_equity(bar.timestamp, bar.close);
    }

    fn fill(&mut self, index: usize, bar: &Bar, signal: Signal, price: f64) {
        match signal {
            Signal::EnterLong => {
                match enter_long(&mut self.ledger, index, bar.timestamp, price, self.config) {
                    EntryResult::Entered { quantity, fee, .. } => {
                        debug!(index, price, quantity, fee, "filled entry");
                    }
                    EntryResult::NoCash => {
                        warn!(index, cash = self.ledger.cash, "entry skipped: no cash available");
                    }
                    EntryResult::AlreadyLong => {
                        warn!(index, "entry skipped: position already open");
                    }
                }
            }
            Signal::ExitLong { reason } => {
                match exit_long(&mut self.ledger, index, bar.timestamp, price, reason, self.config)
                {
                    Some(trade) => debug!(index, price, pnl = trade.pnl, %reason, "filled exit"),
                    None => debug!(index, "exit ignored: no open position"),
                }
            }
            Signal::Hold => {}
        }
    }

    /// Close any open position at the last bar's close and return the ledger.
    /// The final equity point is rewritten to the resulting cash balance.
    pub fn finish(mut self, last_index: usize, last_bar: &Bar) -> Ledger {
        if let Some(pending) = self.pending.take() {
            debug!(signal = %pending, "signal on final bar left unfilled");
        }

        if let Some(trade) = exit_long(
            &mut self.ledger,
            last_index,
            last_bar.timestamp,
            last_bar.close,
            ExitReason::EndOfData,
            self.config,
        ) {
            debug!(pnl = trade.pnl, "force-closed position at end of data");
            let cash = self.ledger.cash;
            if let Some(last) = self.ledger.equity_curve.last_mut() {
                last.equity = cash;
            }
        }
        self.ledger
    }
}

/// Simulate a full run. `signals` must be aligned with `bars`.
pub fn simulate(
    bars: &[Bar],
    signals: &[Signal],
    initial_cash: f64,
    config: &ExecutionConfig,
) -> Ledger {
    let mut simulator = Simulator::new(initial_cash, config);
    for (i, (bar, signal)) in bars.iter().zip(signals).enumerate() {
        simulator.step(i, bar, *signal);
    }
    match bars.last() {
        Some(last) => simulator.finish(bars.len() - 1, last),
        None => simulator.ledger,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::from_closes;

    fn hold(n: usize) -> Vec<Signal> {
        vec![Signal::Hold; n]
    }

    fn same_close(cost: f64) -> ExecutionConfig {
        ExecutionConfig {
            transaction_cost: cost,
            price_rule: ExecutionPriceRule::SameBarClose,
        }
    }

    #[test]
    fn no_signals_gives_flat_equity() {
        let bars = from_closes(&[100.0, 105.0, 95.0, 110.0]);
        let ledger = simulate(&bars, &hold(4), 1_000.0, &same_close(0.0));

        assert_eq!(ledger.equity_curve.len(), 4);
        assert!(ledger.equity_curve.iter().all(|p| p.equity == 1_000.0));
        assert!(ledger.trades.is_empty());
    }

    #[test]
    fn same_bar_close_round_trip() {
        let bars = from_closes(&[100.0, 100.0, 120.0, 150.0]);
        let mut signals = hold(4);
        signals[1] = Signal::EnterLong;
        signals[2] = Signal::exit();

        let ledger = simulate(&bars, &signals, 1_000.0, &same_close(0.0));
        assert_eq!(ledger.trades.len(), 1);
        let trade = &ledger.trades[0];
        assert_eq!(trade.entry_price, 100.0);
        assert_eq!(trade.exit_price, 120.0);
        assert!((ledger.cash - 1_200.0).abs() < 1e-9);

        let equity: Vec<f64> = ledger.equity_curve.iter().map(|p| p.equity).collect();
        assert!((equity[1] - 1_000.0).abs() < 1e-9);
        assert!((equity[2] - 1_200.0).abs() < 1e-9);
        assert!((equity[3] - 1_200.0).abs() < 1e-9);
    }

    #[test]
    fn next_bar_open_fills_on_following_bar() {
        let mut bars = from_closes(&[100.0, 100.0, 100.0, 100.0]);
        bars[2].open = 90.0;
        bars[3].open = 99.0;
        let mut signals = hold(4);
        signals[1] = Signal::EnterLong;
        signals[2] = Signal::exit();

        let config = ExecutionConfig {
            transaction_cost: 0.0,
            price_rule: ExecutionPriceRule::NextBarOpen,
        };
        let ledger = simulate(&bars, &signals, 900.0, &config);

        assert_eq!(ledger.trades.len(), 1);
        let trade = &ledger.trades[0];
        assert_eq!(trade.entry_index, 2);
        assert_eq!(trade.entry_price, 90.0);
        assert_eq!(trade.exit_index, 3);
        assert_eq!(trade.exit_price, 99.0);
        assert!((ledger.cash - 990.0).abs() < 1e-9);
    }

    #[test]
    fn next_bar_open_signal_on_last_bar_never_fills() {
        let bars = from_closes(&[100.0, 100.0, 100.0]);
        let mut signals = hold(3);
        signals[2] = Signal::EnterLong;
        let config = ExecutionConfig {
            transaction_cost: 0.0,
            price_rule: ExecutionPriceRule::NextBarOpen,
        };

        let ledger = simulate(&bars, &signals, 500.0, &config);
        assert!(ledger.trades.is_empty());
        assert_eq!(ledger.cash, 500.0);
    }

    #[test]
    fn open_position_is_force_closed() {
        let bars = from_closes(&[100.0, 100.0, 110.0, 125.0]);
        let mut signals = hold(4);
        signals[1] = Signal::EnterLong;

        let ledger = simulate(&bars, &signals, 1_000.0, &same_close(0.001));
        assert_eq!(ledger.trades.len(), 1);
        let trade = &ledger.trades[0];
        assert!(trade.is_synthetic());
        assert_eq!(trade.exit_index, 3);
        assert!(ledger.is_flat());
        assert_eq!(ledger.final_equity(), ledger.cash);
    }

    #[test]
    fn cash_and_quantity_never_both_positive() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + (i as f64).sin() * 5.0).collect();
        let bars = from_closes(&closes);
        let signals: Vec<Signal> = (0..20)
            .map(|i| match i % 6 {
                1 => Signal::EnterLong,
                4 => Signal::exit(),
                _ => Signal::Hold,
            })
            .collect();

        let config = same_close(0.002);
        let mut simulator = Simulator::new(1_000.0, &config);
        for (i, (bar, signal)) in bars.iter().zip(&signals).enumerate() {
            simulator.step(i, bar, *signal);
            let ledger = simulator.ledger();
            assert!(!(ledger.cash > 0.0 && ledger.quantity() > 0.0));
        }
    }
}
