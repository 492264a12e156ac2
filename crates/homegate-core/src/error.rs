//! Unified Error Model
use thiserror::Error;

pub type HubResult<T> = Result<T, HubError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HubError {
    #[error("CONFIG/TIME: invalid time '{value}' in {field} (expected HH:MM)")]
    InvalidTime { field: &'static str, value: String },

    #[error("CONFIG/DAY: day {0} is outside 0..=6 (0 = Sunday)")]
    InvalidDay(u8),

    #[error("CONFIG/RANGE: {field} has min {min} greater than max {max}")]
    InvalidRange {
        field: String,
        min: f64,
        max: f64,
    },

    #[error("CONFIG/RANGE: {field} bound is not a finite number")]
    NonFiniteBound { field: String },

    #[error("CONFIG/AUDIT: audit_log_max_entries must be at least 1")]
    ZeroAuditCapacity,

    #[error("CONFIG/TIMEOUT: confirmation_timeout_secs must be at least 1")]
    ZeroConfirmationTimeout,

    #[error("CONFIG/PARSE/{0}")]
    ConfigParse(String),

    #[error("RUNTIME/{0}")]
    Runtime(String),
}

impl HubError {
    /// True for every error raised while validating configuration.
    pub fn is_config(&self) -> bool {
        !matches!(self, HubError::Runtime(_))
    }
}
