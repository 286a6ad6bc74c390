#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
pub use rsitrader::domain::ohlcv::Bar;
use rsitrader::domain::error::RsiTraderError;
use rsitrader::domain::strategy::StrategyConfig;
use rsitrader::ports::data_port::DataPort;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        _interval: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, RsiTraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(RsiTraderError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|b| start.is_none_or(|s| b.timestamp >= s))
            .filter(|b| end.is_none_or(|e| b.timestamp <= e))
            .collect())
    }

    fn list_symbols(&self, _interval: &str) -> Result<Vec<String>, RsiTraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
        _interval: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, RsiTraderError> {
        match self.data.get(symbol) {
            Some(bars) if !bars.is_empty() => Ok(Some((
                bars[0].timestamp,
                bars[bars.len() - 1].timestamp,
                bars.len(),
            ))),
            _ => Ok(None),
        }
    }
}

pub fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// 4-hour bars. Each bar opens at the previous close.
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: start_time() + Duration::hours(4 * i as i64),
                open,
                high: open.max(close) + 0.5,
                low: open.min(close) - 0.5,
                close,
                volume: 1000.0 + (i % 7) as f64 * 100.0,
            }
        })
        .collect()
}

/// Closes alternating 100/101, so RSI(21) hovers around 50.
pub fn oscillating(count: usize) -> Vec<f64> {
    (0..count).map(|i| 100.0 + (i % 2) as f64).collect()
}

/// 51 oscillating bars, 10 bars rising by 2, 40 bars falling by 2.
/// With RSI(21) and 55/45 thresholds this enters once (bar 52) and exits
/// once (bar 69).
pub fn rise_then_fall() -> Vec<f64> {
    let mut closes = oscillating(51);
    let mut last = closes[closes.len() - 1];
    for _ in 0..10 {
        last += 2.0;
        closes.push(last);
    }
    for _ in 0..40 {
        last -= 2.0;
        closes.push(last);
    }
    closes
}

/// 51 oscillating bars then 20 rising bars; the position never closes.
pub fn rise_and_hold() -> Vec<f64> {
    let mut closes = oscillating(51);
    let mut last = closes[closes.len() - 1];
    for _ in 0..20 {
        last += 2.0;
        closes.push(last);
    }
    closes
}

pub fn default_strategy() -> StrategyConfig {
    StrategyConfig::default()
}

pub fn write_csv(dir: &Path, symbol: &str, interval: &str, bars: &[Bar]) {
    let mut content = String::from("timestamp,open,high,low,close,volume\n");
    for bar in bars {
        writeln!(
            content,
            "{},{},{},{},{},{}",
            bar.timestamp.format("%Y-%m-%d %H:%M:%S"),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        )
        .unwrap();
    }
    std::fs::write(dir.join(format!("{symbol}_{interval}.csv")), content).unwrap();
}
