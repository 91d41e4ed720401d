//! Error taxonomy for the metric engine.
//!
//! Every variant is local and recoverable: callers render "N/A" rather than
//! fabricating a number. A zero previous value is not an error at all, it
//! yields an absent percent change.

use chrono::NaiveDate;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Range end precedes range start.
    #[error("invalid range: end {end} precedes start {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// Unit string outside the closed formatting set.
    #[error("unsupported unit: {0:?}")]
    UnsupportedUnit(String),

    /// Metric key not present in the registry.
    #[error("no metric definition for key {0:?}")]
    MissingDefinition(String),

    /// Definition failed validation at load time.
    #[error("invalid metric definition {key:?}: {reason}")]
    InvalidDefinition { key: String, reason: String },

    #[error("duplicate metric key {0:?}")]
    DuplicateDefinition(String),

    /// Value source produced nothing for a period.
    #[error("no value for metric {metric:?} in {period}")]
    MissingValue { metric: String, period: String },

    #[error("non-finite value {value} for metric {metric:?} in {period}")]
    NonFiniteValue {
        metric: String,
        period: String,
        value: f64,
    },

    #[error("invalid time frame: {0}")]
    InvalidTimeFrame(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl EngineError {
    /// True for errors caused by caller input rather than configuration.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidRange { .. }
                | EngineError::MissingDefinition(_)
                | EngineError::MissingValue { .. }
                | EngineError::NonFiniteValue { .. }
                | EngineError::InvalidTimeFrame(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
