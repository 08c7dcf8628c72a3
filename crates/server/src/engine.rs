//! # Recommendation Engine
//!
//! Answers one request with a per-request state machine:
//!
//! ```text
//! RESOLVE_USER ──(unknown or below threshold)──> COLD_START
//!      │
//!      └──> SCORE ──(both sides empty)──> COLD_START
//!             │
//!             └──> BLEND
//! ```
//!
//! - **RESOLVE_USER**: read the user's train history from the pinned snapshot
//! - **COLD_START**: popularity top-K, tagged `cold_start_popularity`
//! - **SCORE**: content and collaborative scorers run concurrently; an
//!   `InsufficientData` error or a missed deadline leaves that side empty
//! - **BLEND**: hybrid blend, then exclude-read and dedup filters, then top-K
//!
//! The async path runs each scorer on `spawn_blocking` under one deadline;
//! `recommend_blocking` runs the same machine on the caller's thread with
//! `rayon::join`.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use data_loader::{ArticleId, UserId};
use pipeline::{FilterPipeline, HybridBlender};
use serde::{Deserialize, Serialize};
use sources::{PopularityRanking, ScoredArticle, UserContext, user_context::build_user_context};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::snapshot::{ModelSnapshot, Pinned, SnapshotStore};
use crate::variants::ModelVariant;

/// How a result was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationMethod {
    ColdStartPopularity,
    ContentBased,
    CollaborativeFiltering,
    /// Both scorers contributed
    WeightedContentBased,
}

impl RecommendationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationMethod::ColdStartPopularity => "cold_start_popularity",
            RecommendationMethod::ContentBased => "content_based",
            RecommendationMethod::CollaborativeFiltering => "collaborative_filtering",
            RecommendationMethod::WeightedContentBased => "weighted_content_based",
        }
    }
}

impl fmt::Display for RecommendationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final answer for one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationResult {
    pub user_id: UserId,
    pub method: RecommendationMethod,
    /// Best first, at most K, no duplicates
    pub recommendations: Vec<ScoredArticle>,
    /// None when answered from the bootstrap ranking
    pub snapshot_version: Option<u64>,
}

impl RecommendationResult {
    pub fn article_ids(&self) -> Vec<ArticleId> {
        self.recommendations.iter().map(|r| r.article_id).collect()
    }
}

/// Outcome of RESOLVE_USER
enum Route {
    ColdStart(UserContext),
    Score(UserContext),
}

/// Serving entry point. Cheap to clone; clones share the snapshot store.
#[derive(Clone)]
pub struct RecommendationEngine {
    snapshots: Arc<SnapshotStore>,
    config: Arc<EngineConfig>,
    blender: HybridBlender,
    filter_pipeline: Arc<FilterPipeline>,
}

impl RecommendationEngine {
    pub fn new(snapshots: Arc<SnapshotStore>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let blender = HybridBlender::new(config.blend_alpha)?.with_normalization(config.normalization);
        let filter_pipeline = Arc::new(FilterPipeline::standard(config.allow_read));
        debug!("Engine filters: {:?}", filter_pipeline.filter_names());

        Ok(Self {
            snapshots,
            config: Arc::new(config),
            blender,
            filter_pipeline,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn snapshots(&self) -> &Arc<SnapshotStore> {
        &self.snapshots
    }

    /// Get recommendations for a user within the request latency budget
    #[instrument(skip(self), fields(user_id = user_id, k = k))]
    pub async fn recommend(&self, user_id: UserId, k: usize) -> Result<RecommendationResult> {
        let start_time = Instant::now();
        let deadline = tokio::time::Instant::now() + self.config.request_timeout();
        self.check_k(k)?;

        let snapshot = match self.snapshots.pin()? {
            Pinned::Snapshot(snapshot) => snapshot,
            Pinned::PopularityOnly(ranking) => return Ok(self.bootstrap(user_id, &ranking, k)),
        };

        let context = match self.resolve_user(&snapshot, user_id) {
            Route::ColdStart(context) => return self.cold_start(&snapshot, &context, k),
            Route::Score(context) => Arc::new(context),
        };

        let pool = self.pool_size(k);
        let (content, collaborative) = tokio::join!(
            Self::await_side(
                "content",
                tokio::task::spawn_blocking({
                    let scorer = snapshot.content_scorer(self.config.profile);
                    let context = context.clone();
                    move || scorer.score(&context, pool)
                }),
                deadline,
            ),
            Self::await_side(
                "collaborative",
                tokio::task::spawn_blocking({
                    let scorer = snapshot.collaborative_scorer();
                    let context = context.clone();
                    move || match scorer {
                        Some(scorer) => scorer.score(&context, pool),
                        None => Ok(Vec::new()),
                    }
                }),
                deadline,
            )
        );
        info!(
            "Scored {:?} content and {:?} collaborative candidates",
            content.as_ref().map(|c| c.len()).ok(),
            collaborative.as_ref().map(|c| c.len()).ok()
        );

        let result = self.blend(&snapshot, &context, content?, collaborative?, k)?;
        info!(
            method = %result.method,
            returned = result.recommendations.len(),
            "Total time to get recommendations for user {}: {:.2?}",
            user_id,
            start_time.elapsed()
        );
        Ok(result)
    }

    /// Same state machine on the calling thread, against the active snapshot
    pub fn recommend_blocking(&self, user_id: UserId, k: usize) -> Result<RecommendationResult> {
        self.check_k(k)?;
        match self.snapshots.pin()? {
            Pinned::Snapshot(snapshot) => self.recommend_pinned(&snapshot, user_id, k, ModelVariant::Hybrid),
            Pinned::PopularityOnly(ranking) => Ok(self.bootstrap(user_id, &ranking, k)),
        }
    }

    /// Run the state machine against a caller-pinned snapshot.
    ///
    /// `variant` picks which scorers SCORE may use; the rest of the machine
    /// (cold start, blend, filters) is shared by every variant.
    pub fn recommend_pinned(
        &self,
        snapshot: &ModelSnapshot,
        user_id: UserId,
        k: usize,
        variant: ModelVariant,
    ) -> Result<RecommendationResult> {
        self.check_k(k)?;
        let context = match self.resolve_user(snapshot, user_id) {
            Route::ColdStart(context) => return self.cold_start(snapshot, &context, k),
            Route::Score(context) => context,
        };
        if variant == ModelVariant::Popularity {
            return self.cold_start(snapshot, &context, k);
        }

        let pool = self.pool_size(k);
        let content_scorer = variant
            .uses_content()
            .then(|| snapshot.content_scorer(self.config.profile));
        let collaborative_scorer = snapshot.collaborative_scorer().filter(|_| variant.uses_collaborative());

        let (content, collaborative) = rayon::join(
            || match &content_scorer {
                Some(scorer) => scorer.score(&context, pool),
                None => Ok(Vec::new()),
            },
            || match &collaborative_scorer {
                Some(scorer) => scorer.score(&context, pool),
                None => Ok(Vec::new()),
            },
        );
        let content = Self::side_or_empty("content", content)?;
        let collaborative = Self::side_or_empty("collaborative", collaborative)?;

        self.blend(snapshot, &context, content, collaborative, k)
    }

    // =========================================================================
    // States
    // =========================================================================

    fn resolve_user(&self, snapshot: &ModelSnapshot, user_id: UserId) -> Route {
        let context = build_user_context(snapshot.histories(), user_id);
        if context.is_empty() || context.interaction_count() < self.config.cold_start_threshold {
            debug!(
                user_id,
                history = context.interaction_count(),
                threshold = self.config.cold_start_threshold,
                "Routing to cold start"
            );
            Route::ColdStart(context)
        } else {
            Route::Score(context)
        }
    }

    fn cold_start(&self, snapshot: &ModelSnapshot, context: &UserContext, k: usize) -> Result<RecommendationResult> {
        let ranked = self.popular(snapshot.popularity(), context, k);
        let recommendations = self.filter_pipeline.apply(ranked, context, k)?;
        Ok(RecommendationResult {
            user_id: context.user_id,
            method: RecommendationMethod::ColdStartPopularity,
            recommendations,
            snapshot_version: Some(snapshot.version()),
        })
    }

    /// Nothing published yet: there is no history to exclude
    fn bootstrap(&self, user_id: UserId, ranking: &PopularityRanking, k: usize) -> RecommendationResult {
        warn!(user_id, "No snapshot published, serving the bootstrap popularity ranking");
        RecommendationResult {
            user_id,
            method: RecommendationMethod::ColdStartPopularity,
            recommendations: ranking.top_k(k, &HashSet::new()),
            snapshot_version: None,
        }
    }

    fn blend(
        &self,
        snapshot: &ModelSnapshot,
        context: &UserContext,
        content: Vec<ScoredArticle>,
        collaborative: Vec<ScoredArticle>,
        k: usize,
    ) -> Result<RecommendationResult> {
        let method = match (content.is_empty(), collaborative.is_empty()) {
            (true, true) => {
                debug!(user_id = context.user_id, "Both scorers empty, falling back to cold start");
                return self.cold_start(snapshot, context, k);
            }
            (false, false) => RecommendationMethod::WeightedContentBased,
            (false, true) => RecommendationMethod::ContentBased,
            (true, false) => RecommendationMethod::CollaborativeFiltering,
        };

        let blended = self.blender.blend(&content, &collaborative, self.pool_size(k));
        let recommendations = self.filter_pipeline.apply(blended, context, k)?;
        Ok(RecommendationResult {
            user_id: context.user_id,
            method,
            recommendations,
            snapshot_version: Some(snapshot.version()),
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn check_k(&self, k: usize) -> Result<()> {
        if k == 0 || k > self.config.max_k {
            return Err(EngineError::InvalidRequest(format!(
                "k must be between 1 and {}, got {}",
                self.config.max_k, k
            )));
        }
        Ok(())
    }

    fn pool_size(&self, k: usize) -> usize {
        self.config.candidate_pool_size.max(k)
    }

    fn popular(&self, ranking: &PopularityRanking, context: &UserContext, k: usize) -> Vec<ScoredArticle> {
        if self.config.allow_read {
            ranking.top_k(k, &HashSet::new())
        } else {
            ranking.top_k(k, &context.read_articles)
        }
    }

    /// Wait for one scorer until `deadline`; a late scorer is abandoned
    async fn await_side(
        side: &'static str,
        task: JoinHandle<sources::Result<Vec<ScoredArticle>>>,
        deadline: tokio::time::Instant,
    ) -> Result<Vec<ScoredArticle>> {
        match tokio::time::timeout_at(deadline, task).await {
            Ok(joined) => {
                let scored =
                    joined.map_err(|e| EngineError::TaskFailed(format!("{} scorer task panicked: {}", side, e)))?;
                Self::side_or_empty(side, scored)
            }
            Err(_) => {
                warn!(side, "Scorer missed the request deadline, answering without it");
                Ok(Vec::new())
            }
        }
    }

    /// `InsufficientData` empties a side; anything else fails the request
    fn side_or_empty(side: &'static str, scored: sources::Result<Vec<ScoredArticle>>) -> Result<Vec<ScoredArticle>> {
        match scored {
            Ok(scored) => Ok(scored),
            Err(e) if e.is_insufficient_data() => {
                debug!(side, "Scorer has no signal: {}", e);
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}
