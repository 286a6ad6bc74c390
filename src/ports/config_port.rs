//! Configuration access port.

use crate::domain::error::RsiTraderError;

/// Lookups over `[section] key = value` settings.
///
/// Absent or blank keys are `None`. A value that is present but does not
/// parse is a `ConfigInvalid` error, never a silent default.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    fn get_f64(&self, section: &str, key: &str) -> Result<Option<f64>, RsiTraderError> {
        self.get_string(section, key)
            .map(|raw| match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(v),
                _ => Err(RsiTraderError::invalid(
                    section,
                    key,
                    format!("'{raw}' is not a number"),
                )),
            })
            .transpose()
    }

    fn get_usize(&self, section: &str, key: &str) -> Result<Option<usize>, RsiTraderError> {
        self.get_string(section, key)
            .map(|raw| {
                raw.parse::<usize>().map_err(|_| {
                    RsiTraderError::invalid(
                        section,
                        key,
                        format!("'{raw}' is not a non-negative integer"),
                    )
                })
            })
            .transpose()
    }
}
