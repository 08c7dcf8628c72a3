//! Content Similarity Scorer
//!
//! Scores unread articles by cosine similarity between their embedding and
//! the user's profile vector.
//!
//! ## Algorithm
//! 1. Weight every read article that has an embedding:
//!    `interaction_weight × exp(−recency·days) × exp(−position·(rank−1)) × category_share`
//! 2. Profile = weighted mean of those embeddings
//! 3. Score every embedded, unread article by cosine(profile, embedding)
//! 4. Rank with the shared tie-break and keep the top `limit`

use crate::error::{Result, ScoringError};
use crate::ranking::top_k;
use crate::types::{ScoreSource, ScoredArticle, UserContext};
use data_loader::{ArticleCatalog, CategoryId, EmbeddingSnapshot, SECONDS_PER_DAY};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Cosine similarity, accumulated in f64.
///
/// Returns 0.0 when either vector has zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0f64, 0.0f64, 0.0f64), |(dot, na, nb), (&x, &y)| {
        let (x, y) = (x as f64, y as f64);
        (dot + x * y, na + x * x, nb + y * y)
    });
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

/// How much each read article contributes to the profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileWeighting {
    /// Per-day decay rate for older reads (0 disables)
    pub recency_rate: f64,
    /// Decay per click-rank position below the first (0 disables)
    pub position_rate: f64,
    /// Multiply by the share of the user's reads in the article's category
    pub category_share: bool,
}

impl Default for ProfileWeighting {
    /// Plain interaction-weighted mean
    fn default() -> Self {
        Self {
            recency_rate: 0.0,
            position_rate: 0.0,
            category_share: false,
        }
    }
}

impl ProfileWeighting {
    /// Recency, position and category weighting tuned for news reading
    pub fn news_defaults() -> Self {
        Self {
            recency_rate: 0.25,
            position_rate: 0.5,
            category_share: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.recency_rate.is_finite() && self.recency_rate >= 0.0) {
            return Err(ScoringError::InvalidConfig(format!(
                "recency_rate must be a non-negative number, got {}",
                self.recency_rate
            )));
        }
        if !(self.position_rate.is_finite() && self.position_rate >= 0.0) {
            return Err(ScoringError::InvalidConfig(format!(
                "position_rate must be a non-negative number, got {}",
                self.position_rate
            )));
        }
        Ok(())
    }
}

/// Content-based scorer over one embedding snapshot
#[derive(Debug, Clone)]
pub struct ContentScorer {
    embeddings: Arc<EmbeddingSnapshot>,
    catalog: Arc<ArticleCatalog>,
    weighting: ProfileWeighting,
}

impl ContentScorer {
    pub fn new(embeddings: Arc<EmbeddingSnapshot>, catalog: Arc<ArticleCatalog>) -> Self {
        Self {
            embeddings,
            catalog,
            weighting: ProfileWeighting::default(),
        }
    }

    /// Configure profile weighting (default: plain weighted mean)
    pub fn with_weighting(mut self, weighting: ProfileWeighting) -> Self {
        self.weighting = weighting;
        self
    }

    pub fn embeddings(&self) -> &EmbeddingSnapshot {
        &self.embeddings
    }

    /// Weighted mean embedding of the user's reads.
    ///
    /// Fails with `InsufficientData` when no read article has an embedding
    /// or every weight is zero.
    pub fn user_profile(&self, context: &UserContext) -> Result<Vec<f32>> {
        let shares = if self.weighting.category_share {
            self.category_shares(context)
        } else {
            HashMap::new()
        };

        let dimension = self.embeddings.dimension();
        let mut profile = vec![0.0f64; dimension];
        let mut total_weight = 0.0f64;

        for interaction in &context.interactions {
            let Some(embedding) = self.embeddings.get(interaction.article_id) else {
                continue;
            };

            let mut weight = interaction.weight as f64;
            if self.weighting.recency_rate > 0.0 {
                let days = (context.reference_time - interaction.timestamp).max(0) as f64 / SECONDS_PER_DAY;
                weight *= (-self.weighting.recency_rate * days).exp();
            }
            if self.weighting.position_rate > 0.0
                && let Some(rank) = interaction.click_rank
            {
                weight *= (-self.weighting.position_rate * (rank.saturating_sub(1)) as f64).exp();
            }
            if self.weighting.category_share {
                let category = self.catalog.category_of(interaction.article_id);
                weight *= category
                    .and_then(|c| shares.get(&c).copied())
                    .unwrap_or(1.0 / shares.len().max(1) as f64);
            }

            for (acc, &x) in profile.iter_mut().zip(embedding) {
                *acc += weight * x as f64;
            }
            total_weight += weight;
        }

        if total_weight <= 0.0 {
            return Err(ScoringError::insufficient_user(context.user_id));
        }

        Ok(profile.into_iter().map(|x| (x / total_weight) as f32).collect())
    }

    /// Share of the user's clicks per category
    fn category_shares(&self, context: &UserContext) -> HashMap<CategoryId, f64> {
        let mut counts: HashMap<CategoryId, u32> = HashMap::new();
        let mut total = 0u32;
        for interaction in &context.interactions {
            if let Some(category) = self.catalog.category_of(interaction.article_id) {
                *counts.entry(category).or_insert(0) += interaction.count;
                total += interaction.count;
            }
        }
        counts
            .into_iter()
            .map(|(category, count)| (category, count as f64 / total.max(1) as f64))
            .collect()
    }

    /// Top `limit` unread articles by similarity to the user's profile
    #[instrument(skip(self, context), fields(user_id = context.user_id))]
    pub fn score(&self, context: &UserContext, limit: usize) -> Result<Vec<ScoredArticle>> {
        let profile = self.user_profile(context)?;

        let scored: Vec<ScoredArticle> = self
            .embeddings
            .par_iter()
            .filter(|(article_id, _)| !context.has_read(*article_id))
            .map(|(article_id, embedding)| {
                ScoredArticle::new(
                    article_id,
                    cosine_similarity(&profile, embedding),
                    self.catalog.published_at(article_id),
                    ScoreSource::Content,
                )
            })
            .collect();

        debug!("Scored {} unread articles by content", scored.len());
        Ok(top_k(scored, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user_context::build_user_context;
    use data_loader::{Aggregation, Article, InteractionKind, InteractionStore, InteractionWeights, RawInteraction};
    use proptest::prelude::*;

    fn create_test_catalog() -> ArticleCatalog {
        ArticleCatalog::from_articles(vec![
            Article { id: 1, category_id: 10, published_at: 100, words_count: 100 },
            Article { id: 2, category_id: 10, published_at: 200, words_count: 100 },
            Article { id: 3, category_id: 20, published_at: 300, words_count: 100 },
            Article { id: 4, category_id: 20, published_at: 400, words_count: 100 },
            Article { id: 5, category_id: 20, published_at: 500, words_count: 100 },
        ])
    }

    fn create_test_embeddings() -> EmbeddingSnapshot {
        EmbeddingSnapshot::new(
            1,
            vec![
                (1, vec![1.0, 0.0]),
                (2, vec![0.9, 0.1]),
                (3, vec![0.0, 1.0]),
                (4, vec![0.1, 0.9]),
                (5, vec![0.7, 0.7]),
            ],
        )
        .unwrap()
    }

    fn click(user_id: u32, article_id: u32, timestamp: i64, click_rank: Option<u32>) -> RawInteraction {
        RawInteraction { user_id, article_id, timestamp, kind: InteractionKind::View, click_rank }
    }

    fn scorer() -> ContentScorer {
        ContentScorer::new(Arc::new(create_test_embeddings()), Arc::new(create_test_catalog()))
    }

    fn context_for(clicks: &[RawInteraction], user_id: u32) -> UserContext {
        let store = InteractionStore::build(
            clicks,
            &create_test_catalog(),
            &InteractionWeights::default(),
            Aggregation::Sum,
        )
        .unwrap();
        build_user_context(&store, user_id)
    }

    #[test]
    fn test_cosine_zero_norm() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) < -0.99);
    }

    #[test]
    fn test_profile_is_weighted_mean() {
        let context = context_for(&[click(1, 1, 10, None), click(1, 3, 20, None), click(1, 3, 30, None)], 1);
        let profile = scorer().user_profile(&context).unwrap();

        // Article 3 has aggregated weight 2
        assert!((profile[0] - 1.0 / 3.0).abs() < 1e-6);
        assert!((profile[1] - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_excludes_read_articles() {
        let context = context_for(&[click(1, 1, 10, None)], 1);
        let results = scorer().score(&context, 10).unwrap();

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.article_id != 1));
        assert_eq!(results[0].article_id, 2);
    }

    #[test]
    fn test_no_embedded_reads_is_insufficient() {
        let embeddings = create_test_embeddings().restrict_to(|id| id != 1);
        let scorer = ContentScorer::new(Arc::new(embeddings), Arc::new(create_test_catalog()));
        let context = context_for(&[click(7, 1, 10, None)], 7);

        let err = scorer.score(&context, 5).unwrap_err();
        assert!(err.is_insufficient_data());
    }

    #[test]
    fn test_position_weighting_favours_top_ranked_clicks() {
        let clicks = [click(1, 1, 10, Some(1)), click(1, 3, 10, Some(5))];
        let context = context_for(&clicks, 1);

        let plain = scorer().user_profile(&context).unwrap();
        let weighted = scorer()
            .with_weighting(ProfileWeighting { position_rate: 0.5, ..Default::default() })
            .user_profile(&context)
            .unwrap();

        assert!((plain[0] - plain[1]).abs() < 1e-6);
        assert!(weighted[0] > weighted[1]);
    }

    #[test]
    fn test_news_defaults_recency() {
        let day = SECONDS_PER_DAY as i64;
        let clicks = [click(1, 1, 0, Some(1)), click(1, 3, 10 * day, Some(1))];
        let context = context_for(&clicks, 1);

        let profile = scorer()
            .with_weighting(ProfileWeighting::news_defaults())
            .user_profile(&context)
            .unwrap();

        // The recent read in category 20 dominates
        assert!(profile[1] > 0.9);
    }

    proptest! {
        #[test]
        fn prop_cosine_is_bounded_and_symmetric(
            a in prop::collection::vec(-100.0f32..100.0, 8),
            b in prop::collection::vec(-100.0f32..100.0, 8),
        ) {
            let ab = cosine_similarity(&a, &b);
            let ba = cosine_similarity(&b, &a);
            prop_assert!((-1.0001..=1.0001).contains(&ab));
            prop_assert_eq!(ab, ba);
        }
    }
}
