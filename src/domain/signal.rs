//! Trading decisions and the FLAT/LONG position state machine.

use std::fmt;

/// Why a long position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitReason {
    /// RSI fell below the sell threshold.
    Signal,
    StopLoss,
    TakeProfit,
    /// Synthetic close at the final bar; not a strategy decision.
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Signal => write!(f, "signal"),
            ExitReason::StopLoss => write!(f, "stop_loss"),
            ExitReason::TakeProfit => write!(f, "take_profit"),
            ExitReason::EndOfData => write!(f, "end_of_data"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    EnterLong,
    ExitLong { reason: ExitReason },
    Hold,
}

impl Signal {
    pub fn exit() -> Self {
        Signal::ExitLong {
            reason: ExitReason::Signal,
        }
    }

    pub fn is_hold(&self) -> bool {
        matches!(self, Signal::Hold)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::EnterLong => write!(f, "ENTER_LONG"),
            Signal::ExitLong { .. } => write!(f, "EXIT_LONG"),
            Signal::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Long,
}

impl PositionState {
    /// Apply a signal. Returns the new state and the signal that actually
    /// took effect: entering while long or exiting while flat is a no-op
    /// and comes back as `Hold`.
    pub fn apply(self, signal: Signal) -> (PositionState, Signal) {
        match (self, signal) {
            (PositionState::Flat, Signal::EnterLong) => (PositionState::Long, signal),
            (PositionState::Long, Signal::ExitLong { .. }) => (PositionState::Flat, signal),
            (state, _) => (state, Signal::Hold),
        }
    }
}
