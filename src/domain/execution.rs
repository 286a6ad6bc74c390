//! Fill pricing and all-in/all-out order execution against the ledger.
//!
//! Entries spend the whole cash balance on a fractional quantity, exits sell
//! the whole quantity. A proportional transaction cost is charged on both
//! sides.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;

use super::ledger::Ledger;
use super::position::{OpenPosition, Trade};
use super::signal::ExitReason;

/// Which price a signal on bar `i` fills at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionPriceRule {
    /// Close of bar `i`.
    #[default]
    SameBarClose,
    /// Open of bar `i + 1`. A signal on the last bar never fills.
    ///
    /// Position state and any ATR stop/target are still set from the close
    /// of the signal bar, not from the fill price.
    NextBarOpen,
}

impl FromStr for ExecutionPriceRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "same_bar_close" | "close" => Ok(ExecutionPriceRule::SameBarClose),
            "next_bar_open" | "next_open" => Ok(ExecutionPriceRule::NextBarOpen),
            other => Err(format!(
                "unknown execution price rule '{other}', expected same_bar_close or next_bar_open"
            )),
        }
    }
}

impl fmt::Display for ExecutionPriceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionPriceRule::SameBarClose => write!(f, "same_bar_close"),
            ExecutionPriceRule::NextBarOpen => write!(f, "next_bar_open"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionConfig {
    /// Fraction of notional charged per fill, in `[0, 1)`.
    pub transaction_cost: f64,
    pub price_rule: ExecutionPriceRule,
}

/// Value left after paying the proportional cost on `gross`.
pub fn net_of_cost(gross: f64, transaction_cost: f64) -> f64 {
    gross * (1.0 - transaction_cost)
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        quantity: f64,
        execution_price: f64,
        fee: f64,
    },
    AlreadyLong,
    NoCash,
}

/// Open a long position with all available cash.
///
/// quantity = cash * (1 - cost) / price; cash drops to zero.
pub fn enter_long(
    ledger: &mut Ledger,
    index: usize,
    timestamp: NaiveDateTime,
    price: f64,
    config: &ExecutionConfig,
) -> EntryResult {
    if !ledger.is_flat() {
        return EntryResult::AlreadyLong;
    }
    if ledger.cash <= 0.0 {
        return EntryResult::NoCash;
    }

    let committed = ledger.cash;
    let investable = net_of_cost(committed, config.transaction_cost);
    let quantity = investable / price;

    ledger.cash = 0.0;
    ledger.position = Some(OpenPosition {
        entry_index: index,
        entry_timestamp: timestamp,
        entry_price: price,
        quantity,
        cost_basis: committed,
    });

    EntryResult::Entered {
        quantity,
        execution_price: price,
        fee: committed - investable,
    }
}

/// Close the open position in full. Returns `None` when already flat.
///
/// proceeds = quantity * price * (1 - cost); quantity drops to zero.
pub fn exit_long(
    ledger: &mut Ledger,
    index: usize,
    timestamp: NaiveDateTime,
    price: f64,
    reason: ExitReason,
    config: &ExecutionConfig,
) -> Option<Trade> {
    let position = ledger.position.take()?;

    let proceeds = net_of_cost(position.quantity * price, config.transaction_cost);
    ledger.cash += proceeds;

    let trade = Trade {
        entry_index: position.entry_index,
        entry_timestamp: position.entry_timestamp,
        entry_price: position.entry_price,
        exit_index: index,
        exit_timestamp: timestamp,
        exit_price: price,
        quantity: position.quantity,
        cost_basis: position.cost_basis,
        proceeds,
        pnl: proceeds - position.cost_basis,
        exit_reason: reason,
    };
    ledger.record_trade(trade.clone());
    Some(trade)
}
