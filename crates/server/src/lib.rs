//! Server crate for the news recommendation engine.
//!
//! This crate ties the scorers together: configuration, the versioned model
//! snapshot with its atomic swap, batch training, the per-request
//! recommendation state machine and the request/response contract.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod snapshot;
pub mod training;
pub mod variants;

pub use api::{handle_json, ErrorResponse, RecommendRequest, RecommendResponse};
pub use config::EngineConfig;
pub use engine::{RecommendationEngine, RecommendationMethod, RecommendationResult};
pub use error::{EngineError, Result};
pub use snapshot::{ModelSnapshot, Pinned, SnapshotStore};
pub use training::{build_snapshot, read_artifacts, train_and_publish, write_artifacts, ArtifactManifest};
pub use variants::{compare_variants, ModelVariant, SnapshotRecommender};
