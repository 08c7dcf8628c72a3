//! Engine-backed model variants for offline evaluation.
//!
//! Each variant pins one snapshot at construction and answers through the
//! engine's state machine, so cold-start handling and filters are identical
//! across the comparison. Only the scorers allowed in SCORE differ.

use std::fmt;
use std::sync::Arc;

use data_loader::{ArticleId, TemporalSplit, UserId};
use evaluation::{ComparisonReport, EvaluationHarness, Recommender};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::RecommendationEngine;
use crate::error::Result;
use crate::snapshot::ModelSnapshot;

/// Which scorers a variant may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    /// Popularity ranking for everyone; the baseline
    Popularity,
    ContentBased,
    Collaborative,
    Hybrid,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 4] = [
        ModelVariant::Popularity,
        ModelVariant::ContentBased,
        ModelVariant::Collaborative,
        ModelVariant::Hybrid,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelVariant::Popularity => "popularity",
            ModelVariant::ContentBased => "content_based",
            ModelVariant::Collaborative => "collaborative",
            ModelVariant::Hybrid => "hybrid",
        }
    }

    pub fn uses_content(&self) -> bool {
        matches!(self, ModelVariant::ContentBased | ModelVariant::Hybrid)
    }

    pub fn uses_collaborative(&self) -> bool {
        matches!(self, ModelVariant::Collaborative | ModelVariant::Hybrid)
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A variant bound to one pinned snapshot
pub struct SnapshotRecommender {
    engine: RecommendationEngine,
    snapshot: Arc<ModelSnapshot>,
    variant: ModelVariant,
}

impl SnapshotRecommender {
    pub fn new(engine: RecommendationEngine, snapshot: Arc<ModelSnapshot>, variant: ModelVariant) -> Self {
        Self {
            engine,
            snapshot,
            variant,
        }
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    pub fn snapshot_version(&self) -> u64 {
        self.snapshot.version()
    }
}

impl Recommender for SnapshotRecommender {
    fn name(&self) -> &str {
        self.variant.name()
    }

    fn recommend(&self, user_id: UserId, n: usize) -> anyhow::Result<Vec<ArticleId>> {
        let result = self.engine.recommend_pinned(&self.snapshot, user_id, n, self.variant)?;
        Ok(result.article_ids())
    }

    /// Only the factor model estimates interaction weights
    fn predict(&self, user_id: UserId, article_id: ArticleId) -> Option<f32> {
        if self.variant != ModelVariant::Collaborative {
            return None;
        }
        self.snapshot.model()?.predict(user_id, article_id).ok()
    }
}

/// Evaluate every variant on one pinned snapshot against the popularity baseline.
///
/// The snapshot's histories must be the split's train side.
pub fn compare_variants(
    engine: &RecommendationEngine,
    snapshot: Arc<ModelSnapshot>,
    split: &TemporalSplit,
) -> Result<ComparisonReport> {
    let harness = EvaluationHarness::new(&engine.config().recall_cutoffs)?;
    let variants: Vec<SnapshotRecommender> = ModelVariant::ALL
        .iter()
        .map(|&variant| SnapshotRecommender::new(engine.clone(), snapshot.clone(), variant))
        .collect();
    let models: Vec<&dyn Recommender> = variants.iter().map(|v| v as &dyn Recommender).collect();

    info!(
        version = snapshot.version(),
        variants = models.len(),
        "Comparing model variants"
    );
    Ok(harness.compare(&models, ModelVariant::Popularity.name(), split)?)
}
