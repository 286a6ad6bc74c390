//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod signal;
pub mod strategy;
pub mod signal_generator;
pub mod position;
pub mod ledger;
pub mod execution;
pub mod simulator;
pub mod metrics;
pub mod backtest;
pub mod sweep;
pub mod error;
