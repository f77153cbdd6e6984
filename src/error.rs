//! Error types for Trendline

use thiserror::Error;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum ComputeError {
    /// No measurements across any source. Callers render a "no data yet" state.
    #[error("No measurements available in any source")]
    EmptyInput,

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Invalid measurement: {0}")]
    InvalidMeasurement(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Failed to parse provider payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
}

impl ComputeError {
    /// True for the "no data" condition, which is a presentation state rather than a failure
    pub fn is_empty_input(&self) -> bool {
        matches!(self, ComputeError::EmptyInput)
    }
}
