//! # Model Snapshots
//!
//! A `ModelSnapshot` is everything a serving request reads: embeddings,
//! factor model, popularity ranking and train histories, all from one
//! training run. It is immutable; the next training run builds a new one and
//! the `SnapshotStore` swaps the pointer in a single write.
//!
//! ## Guarantees
//! - Components carry the same version or the snapshot is not built
//! - Readers clone an `Arc` under the read lock and never see a swap in progress
//! - A request keeps its pinned `Arc` even if a newer snapshot is published

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use data_loader::{ArticleCatalog, EmbeddingSnapshot, InteractionStore};
use parking_lot::RwLock;
use sources::{CollaborativeScorer, ContentScorer, LatentFactorModel, PopularityRanking, ProfileWeighting};
use tracing::info;

use crate::error::{EngineError, Result};

/// One self-consistent set of serving artifacts
#[derive(Debug)]
pub struct ModelSnapshot {
    version: u64,
    catalog: Arc<ArticleCatalog>,
    embeddings: Arc<EmbeddingSnapshot>,
    model: Option<Arc<LatentFactorModel>>,
    popularity: Arc<PopularityRanking>,
    histories: Arc<InteractionStore>,
}

impl ModelSnapshot {
    /// Bundle the artifacts of one training run.
    ///
    /// The snapshot takes the embeddings' version; the factor model and the
    /// popularity ranking must match it.
    pub fn new(
        catalog: Arc<ArticleCatalog>,
        embeddings: Arc<EmbeddingSnapshot>,
        model: Option<LatentFactorModel>,
        popularity: PopularityRanking,
        histories: Arc<InteractionStore>,
    ) -> Result<Self> {
        let version = embeddings.version();
        if let Some(model) = &model
            && model.version() != version
        {
            return Err(EngineError::VersionMismatch {
                component: "factor model",
                expected: version,
                found: model.version(),
            });
        }
        if popularity.version() != version {
            return Err(EngineError::VersionMismatch {
                component: "popularity ranking",
                expected: version,
                found: popularity.version(),
            });
        }

        Ok(Self {
            version,
            catalog,
            embeddings,
            model: model.map(Arc::new),
            popularity: Arc::new(popularity),
            histories,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn catalog(&self) -> &Arc<ArticleCatalog> {
        &self.catalog
    }

    pub fn embeddings(&self) -> &Arc<EmbeddingSnapshot> {
        &self.embeddings
    }

    pub fn model(&self) -> Option<&Arc<LatentFactorModel>> {
        self.model.as_ref()
    }

    pub fn popularity(&self) -> &Arc<PopularityRanking> {
        &self.popularity
    }

    /// Train-side interactions that define each user's history
    pub fn histories(&self) -> &Arc<InteractionStore> {
        &self.histories
    }

    pub fn content_scorer(&self, weighting: ProfileWeighting) -> ContentScorer {
        ContentScorer::new(self.embeddings.clone(), self.catalog.clone()).with_weighting(weighting)
    }

    /// None when the snapshot was built without a factor model
    pub fn collaborative_scorer(&self) -> Option<CollaborativeScorer> {
        self.model
            .as_ref()
            .map(|model| CollaborativeScorer::new(model.clone(), self.catalog.clone()))
    }
}

/// What a request pinned at its start
#[derive(Debug, Clone)]
pub enum Pinned {
    Snapshot(Arc<ModelSnapshot>),
    /// Nothing trained yet; only the bootstrap ranking can answer
    PopularityOnly(Arc<PopularityRanking>),
}

/// Holder of the active snapshot
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Option<Arc<ModelSnapshot>>>,
    fallback: RwLock<Option<Arc<PopularityRanking>>>,
    /// Highest version handed out or published
    last_version: AtomicU64,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that serves `ranking` until the first snapshot is published
    pub fn with_fallback(ranking: PopularityRanking) -> Self {
        Self {
            current: RwLock::new(None),
            fallback: RwLock::new(Some(Arc::new(ranking))),
            last_version: AtomicU64::new(0),
        }
    }

    /// Hand out a version no other caller of this store has received or published
    pub fn reserve_version(&self) -> u64 {
        self.last_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Make `snapshot` active and return the one it replaced
    pub fn publish(&self, snapshot: ModelSnapshot) -> Option<Arc<ModelSnapshot>> {
        self.publish_shared(Arc::new(snapshot))
    }

    pub fn publish_shared(&self, snapshot: Arc<ModelSnapshot>) -> Option<Arc<ModelSnapshot>> {
        let version = snapshot.version();
        self.last_version.fetch_max(version, Ordering::SeqCst);
        let previous = self.current.write().replace(snapshot);
        info!(
            version,
            previous = previous.as_ref().map(|s| s.version()),
            "Published model snapshot"
        );
        previous
    }

    /// Publish unless a newer version is already active.
    ///
    /// Returns false, leaving the store untouched, when `snapshot` is stale.
    pub fn publish_if_newer(&self, snapshot: Arc<ModelSnapshot>) -> bool {
        let version = snapshot.version();
        let mut current = self.current.write();
        if current.as_ref().is_some_and(|active| active.version() >= version) {
            return false;
        }
        self.last_version.fetch_max(version, Ordering::SeqCst);
        let previous = current.replace(snapshot);
        info!(
            version,
            previous = previous.as_ref().map(|s| s.version()),
            "Published model snapshot"
        );
        true
    }

    pub fn set_fallback(&self, ranking: PopularityRanking) {
        *self.fallback.write() = Some(Arc::new(ranking));
    }

    pub fn current(&self) -> Option<Arc<ModelSnapshot>> {
        self.current.read().clone()
    }

    pub fn version(&self) -> Option<u64> {
        self.current.read().as_ref().map(|s| s.version())
    }

    /// Pin the active snapshot, or the fallback ranking before the first publish
    pub fn pin(&self) -> Result<Pinned> {
        if let Some(snapshot) = self.current() {
            return Ok(Pinned::Snapshot(snapshot));
        }
        self.fallback
            .read()
            .clone()
            .map(Pinned::PopularityOnly)
            .ok_or(EngineError::SnapshotUnavailable)
    }
}
