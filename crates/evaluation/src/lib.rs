//! # Evaluation Crate
//!
//! Offline evaluation of recommenders against a temporal split.
//!
//! ## Components
//!
//! - **Recommender**: the capability every evaluated model exposes
//! - **harness**: the shared protocol (Recall@N, Hit@N, Precision@N, RMSE)
//! - **metrics**: per-user metric definitions and reducers
//!
//! Reports are pure outputs: two runs over the same split and model give
//! identical numbers.
//!
//! ## Example Usage
//!
//! ```ignore
//! use evaluation::EvaluationHarness;
//!
//! let harness = EvaluationHarness::new(&[5, 10])?;
//! let comparison = harness.compare(&[&popularity, &hybrid], "popularity", &split)?;
//! println!("{}", comparison);
//! ```

pub mod error;
pub mod harness;
pub mod metrics;

pub use error::{EvaluationError, Result};
pub use harness::{ComparisonReport, EvaluationHarness, EvaluationReport};
pub use metrics::{f1_at, hits_at, recall_at, CutoffMetrics, RmseReport};

use data_loader::{ArticleId, UserId};

/// A model that can be evaluated
pub trait Recommender: Send + Sync {
    /// Name used in reports
    fn name(&self) -> &str;

    /// Top `n` article ids for a user, best first
    fn recommend(&self, user_id: UserId, n: usize) -> anyhow::Result<Vec<ArticleId>>;

    /// Predicted interaction weight, for models that estimate one.
    /// None means the pair cannot be predicted.
    fn predict(&self, _user_id: UserId, _article_id: ArticleId) -> Option<f32> {
        None
    }
}
