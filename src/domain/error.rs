//! Domain error types.
//!
//! Every variant is raised during setup (config, data loading, data
//! sufficiency). Once a run has started it cannot fail.

/// Top-level error type for rsitrader.
#[derive(Debug, thiserror::Error)]
pub enum RsiTraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: String },

    #[error("insufficient data: have {bars} bars, need {minimum}")]
    InsufficientData { bars: usize, minimum: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RsiTraderError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        RsiTraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            RsiTraderError::ConfigParse { .. }
                | RsiTraderError::ConfigMissing { .. }
                | RsiTraderError::ConfigInvalid { .. }
        )
    }
}

impl From<&RsiTraderError> for std::process::ExitCode {
    fn from(err: &RsiTraderError) -> Self {
        let code: u8 = match err {
            RsiTraderError::Io(_) => 1,
            RsiTraderError::ConfigParse { .. }
            | RsiTraderError::ConfigMissing { .. }
            | RsiTraderError::ConfigInvalid { .. } => 2,
            RsiTraderError::Data { .. } | RsiTraderError::InvalidBar { .. } => 3,
            RsiTraderError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
