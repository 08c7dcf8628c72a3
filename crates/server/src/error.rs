//! Errors surfaced by the engine to its callers.

use data_loader::DataLoadError;
use evaluation::EvaluationError;
use sources::ScoringError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed request input. Surfaced to the caller, never retried.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No snapshot has been published and there is no popularity fallback
    #[error("No model snapshot is available yet")]
    SnapshotUnavailable,

    /// Snapshot components built from different training runs
    #[error("Snapshot version mismatch: {component} has version {found}, expected {expected}")]
    VersionMismatch {
        component: &'static str,
        expected: u64,
        found: u64,
    },

    #[error("Data integrity error: {0}")]
    DataIntegrity(#[from] DataLoadError),

    #[error("Scoring error: {0}")]
    Scoring(#[from] ScoringError),

    /// A post-scoring filter rejected the candidate list
    #[error("Filter failed: {0:#}")]
    Filter(#[from] anyhow::Error),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    /// A background scoring or training task panicked or was cancelled
    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// True for errors caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        matches!(self, EngineError::InvalidRequest(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
