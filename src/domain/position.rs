//! Open position and closed trade records.

use chrono::NaiveDateTime;

use crate::domain::signal::ExitReason;

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub entry_index: usize,
    pub entry_timestamp: NaiveDateTime,
    pub entry_price: f64,
    pub quantity: f64,
    /// Cash committed at entry, transaction cost included.
    pub cost_basis: f64,
}

impl OpenPosition {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub entry_index: usize,
    pub entry_timestamp: NaiveDateTime,
    pub entry_price: f64,
    pub exit_index: usize,
    pub exit_timestamp: NaiveDateTime,
    pub exit_price: f64,
    pub quantity: f64,
    pub cost_basis: f64,
    /// Cash received at exit, transaction cost deducted.
    pub proceeds: f64,
    pub pnl: f64,
    pub exit_reason: ExitReason,
}

impl Trade {
    /// Force-closed at the end of the data rather than by a signal.
    pub fn is_synthetic(&self) -> bool {
        self.exit_reason == ExitReason::EndOfData
    }

    pub fn return_pct(&self) -> f64 {
        if self.cost_basis > 0.0 {
            self.pnl / self.cost_basis
        } else {
            0.0
        }
    }

    pub fn duration_bars(&self) -> usize {
        self.exit_index - self.entry_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sample_position() -> OpenPosition {
        OpenPosition {
            entry_index: 3,
            entry_timestamp: ts(3),
            entry_price: 50.0,
            quantity: 200.0,
            cost_basis: 10_000.0,
        }
    }

    fn sample_trade(reason: ExitReason) -> Trade {
        Trade {
            entry_index: 3,
            entry_timestamp: ts(3),
            entry_price: 50.0,
            exit_index: 8,
            exit_timestamp: ts(8),
            exit_price: 55.0,
            quantity: 200.0,
            cost_basis: 10_000.0,
            proceeds: 11_000.0,
            pnl: 1_000.0,
            exit_reason: reason,
        }
    }

    #[test]
    fn market_value_marks_quantity_at_price() {
        let pos = sample_position();
        assert!((pos.market_value(55.0) - 11_000.0).abs() < 1e-9);
        assert!((pos.market_value(45.0) - 9_000.0).abs() < 1e-9);
    }

    #[test]
    fn trade_return_and_duration() {
        let trade = sample_trade(ExitReason::Signal);
        assert!((trade.return_pct() - 0.10).abs() < 1e-12);
        assert_eq!(trade.duration_bars(), 5);
        assert!(!trade.is_synthetic());
    }

    #[test]
    fn end_of_data_trade_is_synthetic() {
        assert!(sample_trade(ExitReason::EndOfData).is_synthetic());
        assert!(!sample_trade(ExitReason::StopLoss).is_synthetic());
    }
}
