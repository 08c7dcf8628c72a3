//! # Sources Crate
//!
//! This crate implements the three scorers behind news recommendations.
//!
//! ## Components
//!
//! ### Content Scorer
//! Embedding similarity between unread articles and the user's profile:
//! - Profile is a weighted mean of read-article embeddings
//! - Optional recency, click-position and category weighting
//!
//! ### Collaborative Scorer
//! Latent factor model trained with weighted ALS:
//! - `Trainer` trait with the `AlsTrainer` implementation
//! - Seeded negative sampling, deterministic row solves
//!
//! ### Popularity Ranker
//! Static, optionally time-decayed ranking for cold start and as a baseline.
//!
//! ## Example Usage
//!
//! ```ignore
//! use sources::{AlsTrainer, ContentScorer, InteractionMatrix, Trainer, TrainerParams};
//! use sources::user_context::build_user_context;
//! use std::sync::Arc;
//!
//! let context = build_user_context(&split.train, user_id);
//!
//! let content = ContentScorer::new(embeddings.clone(), catalog.clone());
//! let by_content = content.score(&context, 100)?;
//!
//! let matrix = InteractionMatrix::from_store(&split.train);
//! let model = AlsTrainer::new().fit(&matrix, &TrainerParams::default())?;
//! ```
//!
//! Every scorer ranks with the same order: score descending, newer article,
//! lower article id.

pub mod collaborative;
pub mod content;
pub mod error;
pub mod popularity;
pub mod ranking;
pub mod types;
pub mod user_context;

// Re-export commonly used types
pub use collaborative::{
    AlsTrainer, CollaborativeScorer, InteractionMatrix, LatentFactorModel, ModelParts, Trainer, TrainerParams,
};
pub use content::{cosine_similarity, ContentScorer, ProfileWeighting};
pub use error::{Result, ScoringError};
pub use popularity::PopularityRanking;
pub use ranking::{compare_ranked, top_k};
pub use types::{ScoreSource, ScoredArticle, UserContext};

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{
        Aggregation, Article, ArticleCatalog, EmbeddingSnapshot, InteractionKind, InteractionStore,
        InteractionWeights, RawInteraction,
    };
    use std::sync::Arc;

    fn create_test_data() -> (Arc<ArticleCatalog>, Arc<EmbeddingSnapshot>, InteractionStore) {
        let catalog = ArticleCatalog::from_articles((1..=4).map(|id| Article {
            id,
            category_id: 1,
            published_at: 1000,
            words_count: 100,
        }));
        let embeddings = EmbeddingSnapshot::new(
            1,
            vec![
                (1, vec![1.0, 0.0]),
                (2, vec![1.0, 0.0]),
                (3, vec![1.0, 0.0]),
                (4, vec![0.0, 1.0]),
            ],
        )
        .unwrap();
        let raw = vec![RawInteraction {
            user_id: 1,
            article_id: 1,
            timestamp: 10,
            kind: InteractionKind::View,
            click_rank: None,
        }];
        let store = InteractionStore::build(&raw, &catalog, &InteractionWeights::default(), Aggregation::Sum).unwrap();
        (Arc::new(catalog), Arc::new(embeddings), store)
    }

    #[test]
    fn test_equal_scores_rank_by_lower_id() {
        let (catalog, embeddings, store) = create_test_data();
        let context = user_context::build_user_context(&store, 1);

        let results = ContentScorer::new(embeddings, catalog).score(&context, 2).unwrap();
        let ids: Vec<u32> = results.iter().map(|r| r.article_id).collect();

        // Articles 2 and 3 tie on score and publication time
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_scored_article_creation() {
        let scored = ScoredArticle::new(1, 0.85, 1000, ScoreSource::Content);
        assert_eq!(scored.article_id, 1);
        assert_eq!(scored.source, ScoreSource::Content);
        assert_eq!(scored.score, 0.85);
    }
}
