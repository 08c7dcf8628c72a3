//! Error types for evaluation runs.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvaluationError {
    /// No recall cutoffs were configured
    #[error("At least one recall cutoff is required")]
    NoCutoffs,

    /// A cutoff of zero recommends nothing
    #[error("Recall cutoff must be positive, got {0}")]
    InvalidCutoff(usize),

    /// The comparison baseline was not among the evaluated models
    #[error("Baseline model '{0}' was not evaluated")]
    UnknownBaseline(String),
}

pub type Result<T> = std::result::Result<T, EvaluationError>;
