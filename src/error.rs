use std::io;
use thiserror::Error;

/// Error type for CSV conversion operations.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// IO error while reading the source or writing the sink.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// CSV tokenizing or printing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// No source (or sink) has been configured.
    #[error("No source has been specified")]
    NoSource,

    /// Input without any records and without a declared header.
    #[error("No rows and no declared header")]
    NoRows,

    /// A schema that violates its invariants.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// A cell in a numeric column that does not parse as a number.
    #[error("Row {row}, column {column}: '{value}' is not a number")]
    InvalidNumber {
        row: usize,
        column: usize,
        value: String,
    },

    /// A cell in a categorical column that is not one of its labels.
    #[error("Row {row}, column {column}: '{value}' is not a declared label")]
    UnknownCategory {
        row: usize,
        column: usize,
        value: String,
    },

    /// A cell in a date column that does not match the date format.
    #[error("Row {row}, column {column}: '{value}' does not match date format '{format}'")]
    InvalidDate {
        row: usize,
        column: usize,
        value: String,
        format: String,
    },

    /// Batch and incremental access mixed on one session.
    #[error("Cannot mix batch and incremental mode on the same instance")]
    ModeMix,

    /// Operation not allowed in the current session state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ConvertError {
    /// Returns true for errors caused by a single cell value.
    pub fn is_value_error(&self) -> bool {
        matches!(
            self,
            ConvertError::InvalidNumber { .. }
                | ConvertError::UnknownCategory { .. }
                | ConvertError::InvalidDate { .. }
        )
    }
}

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, ConvertError>;
