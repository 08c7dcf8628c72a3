//! Error types for the data-loader crate.
//!
//! Two families live here:
//! - per-row problems (`ParseError`, `InvalidValue`) that the parsers count and
//!   skip instead of aborting a whole load
//! - integrity problems (`DataIntegrity`, `MissingReference`, `EmptySplit`)
//!   that are fatal to the store build or split that hit them

use thiserror::Error;

/// Errors that can occur during ingestion, store building and splitting
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// File could not be found or opened
    #[error("Failed to open file: {path}")]
    FileNotFound { path: String },

    /// I/O error occurred while reading file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Line in data file couldn't be parsed
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// A data field had an invalid value
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Referenced entity doesn't exist (e.g., click on an article missing from the catalog)
    #[error("Missing reference: {entity} with id {id}")]
    MissingReference { entity: String, id: u32 },

    /// Embedding vectors of different lengths in one snapshot
    #[error("Embedding for article {article_id} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        article_id: u32,
        expected: usize,
        found: usize,
    },

    /// The split cutoff would leave one side empty
    #[error("Split at {t_split} is outside the observed range [{min_ts}, {max_ts}]: {side} set would be empty")]
    EmptySplit {
        t_split: i64,
        min_ts: i64,
        max_ts: i64,
        side: &'static str,
    },

    /// Inconsistent input data
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),
}

impl DataLoadError {
    /// True for errors that mean the input data itself is inconsistent,
    /// as opposed to a single unreadable row or an I/O failure.
    pub fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            DataLoadError::MissingReference { .. }
                | DataLoadError::DimensionMismatch { .. }
                | DataLoadError::EmptySplit { .. }
                | DataLoadError::DataIntegrity(_)
        )
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataLoadError>;
