//! Market data port.

use chrono::NaiveDateTime;

use crate::domain::error::RsiTraderError;
use crate::domain::ohlcv::Bar;

pub trait DataPort {
    /// Bars for `symbol` at `interval`, oldest first, optionally bounded by
    /// inclusive start/end timestamps.
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, RsiTraderError>;

    fn list_symbols(&self, interval: &str) -> Result<Vec<String>, RsiTraderError>;

    /// First timestamp, last timestamp and bar count, if any data exists.
    fn get_data_range(
        &self,
        symbol: &str,
        interval: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, RsiTraderError>;
}
