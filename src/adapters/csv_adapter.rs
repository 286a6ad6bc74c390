//! CSV file data adapter.
//!
//! Reads `<base>/<SYMBOL>_<interval>.csv` with the header
//! `timestamp,open,high,low,close,volume`.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::error::RsiTraderError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "date", alias = "open_time")]
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Parse RFC3339, `%Y-%m-%d %H:%M:%S`, `%Y-%m-%dT%H:%M:%S`, `%Y-%m-%d`, or
/// integer epoch milliseconds. Offsets are normalized to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    raw.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(|dt| dt.naive_utc())
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, interval: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}_{interval}.csv"))
    }

    fn read_all(&self, symbol: &str, interval: &str) -> Result<Vec<Bar>, RsiTraderError> {
        let path = self.csv_path(symbol, interval);
        let content = fs::read_to_string(&path).map_err(|e| RsiTraderError::Data {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();
        let mut skipped = 0usize;

        for (line, row) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    warn!(
                        file = %path.display(),
                        line = line + 2,
                        error = %e,
                        "skipping malformed row"
                    );
                    skipped += 1;
                    continue;
                }
            };
            let Some(timestamp) = parse_timestamp(&row.timestamp) else {
                warn!(
                    file = %path.display(),
                    line = line + 2,
                    timestamp = %row.timestamp,
                    "skipping row with unparsable timestamp"
                );
                skipped += 1;
                continue;
            };
            bars.push(Bar {
                timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        debug!(file = %path.display(), bars = bars.len(), skipped, "loaded csv");
        Ok(bars)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, RsiTraderError> {
        let mut bars = self.read_all(symbol, interval)?;
        bars.retain(|b| {
            start.is_none_or(|s| b.timestamp >= s) && end.is_none_or(|e| b.timestamp <= e)
        });
        Ok(bars)
    }

    fn list_symbols(&self, interval: &str) -> Result<Vec<String>, RsiTraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| RsiTraderError::Data {
            reason: format!(
                "failed to read directory {}: {e}",
                self.base_path.display()
            ),
        })?;

        let suffix = format!("_{interval}.csv");
        let mut symbols = Vec::new();

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(symbol) = name.strip_suffix(&suffix) {
                if !symbol.is_empty() {
                    symbols.push(symbol.to_string());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
        interval: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, RsiTraderError> {
        let bars = self.read_all(symbol, interval)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp, bars.len())),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "timestamp,open,high,low,close,volume\n";

    fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let content = format!(
            "{HEADER}\
            2024-01-01 08:00:00,42100.5,42500.0,41900.0,42300.0,1520.25\n\
            2024-01-01 00:00:00,42000.0,42200.0,41800.0,42100.5,1210.0\n\
            2024-01-01 04:00:00,42100.5,42400.0,42000.0,42100.5,980.5\n"
        );
        fs::write(path.join("BTCUSDT_4h.csv"), content).unwrap();
        fs::write(path.join("ETHUSDT_4h.csv"), HEADER).unwrap();
        fs::write(path.join("BTCUSDT_1d.csv"), HEADER).unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_bars_sorts_by_timestamp() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter.fetch_bars("BTCUSDT", "4h", None, None).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].timestamp, dt(2024, 1, 1, 0));
        assert_eq!(bars[2].timestamp, dt(2024, 1, 1, 8));
        assert_eq!(bars[0].open, 42000.0);
        assert_eq!(bars[2].volume, 1520.25);
    }

    #[test]
    fn fetch_bars_filters_inclusive_range() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter
            .fetch_bars("BTCUSDT", "4h", Some(dt(2024, 1, 1, 4)), Some(dt(2024, 1, 1, 4)))
            .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].timestamp, dt(2024, 1, 1, 4));
    }

    #[test]
    fn fetch_bars_missing_file_is_data_error() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let err = adapter.fetch_bars("XRPUSDT", "4h", None, None).unwrap_err();
        assert!(matches!(err, RsiTraderError::Data { .. }));
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let dir = TempDir::new().unwrap();
        let content = format!(
            "{HEADER}\
            2024-01-01,1.0,1.0,1.0,1.0,10\n\
            not-a-date,1.0,1.0,1.0,1.0,10\n\
            2024-01-02,abc,1.0,1.0,1.0,10\n\
            2024-01-03,2.0,2.0,2.0,2.0,20\n"
        );
        fs::write(dir.path().join("X_1d.csv"), content).unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());

        let bars = adapter.fetch_bars("X", "1d", None, None).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 2.0);
    }

    #[test]
    fn list_symbols_for_interval() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        assert_eq!(adapter.list_symbols("4h").unwrap(), vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(adapter.list_symbols("1d").unwrap(), vec!["BTCUSDT"]);
        assert!(adapter.list_symbols("15m").unwrap().is_empty());
    }

    #[test]
    fn data_range() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let range = adapter.get_data_range("BTCUSDT", "4h").unwrap();
        assert_eq!(range, Some((dt(2024, 1, 1, 0), dt(2024, 1, 1, 8), 3)));
        assert_eq!(adapter.get_data_range("ETHUSDT", "4h").unwrap(), None);
    }

    #[test]
    fn timestamp_formats() {
        let expected = dt(2024, 3, 1, 4);
        assert_eq!(parse_timestamp("2024-03-01T04:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T06:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 04:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T04:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01"), Some(dt(2024, 3, 1, 0)));
        assert_eq!(parse_timestamp("1709265600000"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
