//! Strategy configuration and the pluggable decision rules.
//!
//! Every strategy answers one question through [`Strategy::decide`]: given
//! this bar, the indicator values visible at it and the current position,
//! what should happen? Variants are dispatched through [`StrategyKind`].

use std::fmt;
use std::str::FromStr;

use crate::domain::error::RsiTraderError;
use crate::domain::indicator::{IndicatorSnapshot, IndicatorSpec, RsiSource};
use crate::domain::ohlcv::Bar;
use crate::domain::signal::{ExitReason, PositionState, Signal};

const SECTION: &str = "strategy";

/// How an RSI threshold is considered hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trigger {
    /// RSI is beyond the threshold on this bar.
    #[default]
    Level,
    /// RSI crossed the threshold between the previous bar and this one.
    Cross,
}

impl FromStr for Trigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "level" => Ok(Trigger::Level),
            "cross" => Ok(Trigger::Cross),
            other => Err(format!("unknown trigger '{other}' (expected level or cross)")),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Level => write!(f, "level"),
            Trigger::Cross => write!(f, "cross"),
        }
    }
}

/// Which rule set a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyVariant {
    #[default]
    RsiThreshold,
    RsiTrend,
    RsiTrendAtr,
}

impl FromStr for StrategyVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rsi_threshold" => Ok(StrategyVariant::RsiThreshold),
            "rsi_trend" => Ok(StrategyVariant::RsiTrend),
            "rsi_trend_atr" => Ok(StrategyVariant::RsiTrendAtr),
            other => Err(format!(
                "unknown strategy kind '{other}' (expected rsi_threshold, rsi_trend or rsi_trend_atr)"
            )),
        }
    }
}

impl fmt::Display for StrategyVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyVariant::RsiThreshold => write!(f, "rsi_threshold"),
            StrategyVariant::RsiTrend => write!(f, "rsi_trend"),
            StrategyVariant::RsiTrendAtr => write!(f, "rsi_trend_atr"),
        }
    }
}

/// Immutable strategy parameters, validated once before a run.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub name: String,
    pub variant: StrategyVariant,
    pub rsi_period: usize,
    pub rsi_source: RsiSource,
    pub sma_period: usize,
    pub atr_period: usize,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    pub trigger: Trigger,
    pub atr_stop_multiplier: f64,
    pub atr_take_profit_multiplier: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            name: "RSI Threshold".to_string(),
            variant: StrategyVariant::RsiThreshold,
            rsi_period: 21,
            rsi_source: RsiSource::Close,
            sma_period: 50,
            atr_period: 14,
            buy_threshold: 55.0,
            sell_threshold: 45.0,
            trigger: Trigger::Level,
            atr_stop_multiplier: 1.5,
            atr_take_profit_multiplier: 5.0,
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), RsiTraderError> {
        for (key, period) in [
            ("rsi_period", self.rsi_period),
            ("sma_period", self.sma_period),
            ("atr_period", self.atr_period),
        ] {
            if period == 0 {
                return Err(RsiTraderError::invalid(
                    SECTION,
                    key,
                    format!("{key} must be positive"),
                ));
            }
        }

        for (key, threshold) in [
            ("buy_threshold", self.buy_threshold),
            ("sell_threshold", self.sell_threshold),
        ] {
            if !(0.0..=100.0).contains(&threshold) {
                return Err(RsiTraderError::invalid(
                    SECTION,
                    key,
                    format!("{key} must be between 0 and 100"),
                ));
            }
        }

        if self.buy_threshold <= self.sell_threshold {
            return Err(RsiTraderError::invalid(
                SECTION,
                "buy_threshold",
                "buy_threshold must exceed sell_threshold",
            ));
        }

        for (key, multiplier) in [
            ("atr_stop_multiplier", self.atr_stop_multiplier),
            ("atr_take_profit_multiplier", self.atr_take_profit_multiplier),
        ] {
            if !(multiplier.is_finite() && multiplier > 0.0) {
                return Err(RsiTraderError::invalid(
                    SECTION,
                    key,
                    format!("{key} must be positive"),
                ));
            }
        }

        Ok(())
    }

    pub fn indicator_spec(&self) -> IndicatorSpec {
        IndicatorSpec {
            rsi_period: self.rsi_period,
            rsi_source: self.rsi_source,
            sma_period: self.sma_period,
            atr_period: self.atr_period,
        }
    }

    fn rsi_rule(&self) -> RsiRule {
        RsiRule {
            buy_threshold: self.buy_threshold,
            sell_threshold: self.sell_threshold,
            trigger: self.trigger,
        }
    }
}

/// Protective exit levels fixed when a position opens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl Bracket {
    pub fn check(&self, bar: &Bar) -> Option<ExitReason> {
        if bar.close <= self.stop_loss {
            Some(ExitReason::StopLoss)
        } else if bar.close >= self.take_profit {
            Some(ExitReason::TakeProfit)
        } else {
            None
        }
    }
}

pub trait Strategy {
    fn name(&self) -> &'static str;

    /// Whether every indicator this strategy reads has a value.
    fn is_ready(&self, indicators: &IndicatorSnapshot) -> bool;

    fn decide(&self, bar: &Bar, indicators: &IndicatorSnapshot, position: PositionState)
    -> Signal;

    /// Stop/target levels to attach to an entry made on `bar`.
    fn bracket(&self, _bar: &Bar, _indicators: &IndicatorSnapshot) -> Option<Bracket> {
        None
    }
}

/// The RSI threshold contract shared by every variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiRule {
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    pub trigger: Trigger,
}

impl RsiRule {
    pub fn wants_entry(&self, indicators: &IndicatorSnapshot) -> bool {
        let Some(rsi) = indicators.rsi else {
            return false;
        };
        match self.trigger {
            Trigger::Level => rsi > self.buy_threshold,
            Trigger::Cross => {
                rsi > self.buy_threshold
                    && indicators.prev_rsi.is_some_and(|p| p <= self.buy_threshold)
            }
        }
    }

    pub fn wants_exit(&self, indicators: &IndicatorSnapshot) -> bool {
        let Some(rsi) = indicators.rsi else {
            return false;
        };
        match self.trigger {
            Trigger::Level => rsi < self.sell_threshold,
            Trigger::Cross => {
                rsi < self.sell_threshold
                    && indicators.prev_rsi.is_some_and(|p| p >= self.sell_threshold)
            }
        }
    }

    fn decide(
        &self,
        indicators: &IndicatorSnapshot,
        position: PositionState,
        entry_ok: bool,
    ) -> Signal {
        match position {
            PositionState::Flat if entry_ok && self.wants_entry(indicators) => Signal::EnterLong,
            PositionState::Long if self.wants_exit(indicators) => Signal::exit(),
            _ => Signal::Hold,
        }
    }
}

/// Enter when RSI is above the buy threshold, exit below the sell threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiThreshold {
    pub rule: RsiRule,
}

impl Strategy for RsiThreshold {
    fn name(&self) -> &'static str {
        "rsi_threshold"
    }

    fn is_ready(&self, indicators: &IndicatorSnapshot) -> bool {
        indicators.rsi.is_some()
    }

    fn decide(
        &self,
        _bar: &Bar,
        indicators: &IndicatorSnapshot,
        position: PositionState,
    ) -> Signal {
        self.rule.decide(indicators, position, true)
    }
}

/// RSI threshold entries only while the close is above its SMA.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiTrend {
    pub rule: RsiRule,
}

impl Strategy for RsiTrend {
    fn name(&self) -> &'static str {
        "rsi_trend"
    }

    fn is_ready(&self, indicators: &IndicatorSnapshot) -> bool {
        indicators.rsi.is_some() && indicators.sma.is_some()
    }

    fn decide(&self, bar: &Bar, indicators: &IndicatorSnapshot, position: PositionState) -> Signal {
        let uptrend = indicators.sma.is_some_and(|sma| bar.close > sma);
        self.rule.decide(indicators, position, uptrend)
    }
}

/// [`RsiTrend`] plus an ATR stop-loss / take-profit bracket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiTrendAtr {
    pub trend: RsiTrend,
    pub stop_multiplier: f64,
    pub take_profit_multiplier: f64,
}

impl Strategy for RsiTrendAtr {
    fn name(&self) -> &'static str {
        "rsi_trend_atr"
    }

    fn is_ready(&self, indicators: &IndicatorSnapshot) -> bool {
        self.trend.is_ready(indicators) && indicators.atr.is_some()
    }

    fn decide(&self, bar: &Bar, indicators: &IndicatorSnapshot, position: PositionState) -> Signal {
        self.trend.decide(bar, indicators, position)
    }

    fn bracket(&self, bar: &Bar, indicators: &IndicatorSnapshot) -> Option<Bracket> {
        let atr = indicators.atr?;
        Some(Bracket {
            stop_loss: bar.close - self.stop_multiplier * atr,
            take_profit: bar.close + self.take_profit_multiplier * atr,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StrategyKind {
    RsiThreshold(RsiThreshold),
    RsiTrend(RsiTrend),
    RsiTrendAtr(RsiTrendAtr),
}

impl StrategyKind {
    pub fn from_config(config: &StrategyConfig) -> Self {
        let rule = config.rsi_rule();
        match config.variant {
            StrategyVariant::RsiThreshold => StrategyKind::RsiThreshold(RsiThreshold { rule }),
            StrategyVariant::RsiTrend => StrategyKind::RsiTrend(RsiTrend { rule }),
            StrategyVariant::RsiTrendAtr => StrategyKind::RsiTrendAtr(RsiTrendAtr {
                trend: RsiTrend { rule },
                stop_multiplier: config.atr_stop_multiplier,
                take_profit_multiplier: config.atr_take_profit_multiplier,
            }),
        }
    }

    fn inner(&self) -> &dyn Strategy {
        match self {
            StrategyKind::RsiThreshold(s) => s,
            StrategyKind::RsiTrend(s) => s,
            StrategyKind::RsiTrendAtr(s) => s,
        }
    }
}

impl Strategy for StrategyKind {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn is_ready(&self, indicators: &IndicatorSnapshot) -> bool {
        self.inner().is_ready(indicators)
    }

    fn decide(&self, bar: &Bar, indicators: &IndicatorSnapshot, position: PositionState) -> Signal {
        self.inner().decide(bar, indicators, position)
    }

    fn bracket(&self, bar: &Bar, indicators: &IndicatorSnapshot) -> Option<Bracket> {
        self.inner().bracket(bar, indicators)
    }
}
