//! Errors raised by the scorers.

use data_loader::DataLoadError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoringError {
    /// A user or article lacks the signal a scorer needs. Recoverable:
    /// the engine answers from the other side or from popularity.
    #[error("Insufficient data for {entity} {id}")]
    InsufficientData { entity: &'static str, id: u32 },

    /// Parameters that can never produce a model
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Vectors of different lengths were compared
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// Serialized model parts do not fit together
    #[error("Corrupt model: {0}")]
    CorruptModel(String),

    #[error(transparent)]
    Data(#[from] DataLoadError),
}

impl ScoringError {
    pub fn insufficient_user(id: u32) -> Self {
        ScoringError::InsufficientData { entity: "user", id }
    }

    pub fn insufficient_article(id: u32) -> Self {
        ScoringError::InsufficientData { entity: "article", id }
    }

    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, ScoringError::InsufficientData { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScoringError>;
