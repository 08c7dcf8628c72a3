//! # Data Loader Crate
//!
//! This crate handles loading the news click dataset and preparing it for
//! training and evaluation.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (Article, Interaction, InteractionStore, EmbeddingSnapshot)
//! - **parser**: Parse the CSV exports into Rust structs, skipping corrupt rows
//! - **index**: Aggregate clicks into the InteractionStore and load whole datasets
//! - **split**: Temporal train/test split
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{Aggregation, Dataset, InteractionWeights, TemporalSplit};
//! use std::path::Path;
//!
//! let dataset = Dataset::load_from_dir(
//!     Path::new("data/news"),
//!     &InteractionWeights::default(),
//!     Aggregation::Sum,
//! )?;
//!
//! let split = TemporalSplit::at_fraction(&dataset.store, 0.8)?;
//! println!("{} train / {} test interactions", split.train.len(), split.test.len());
//! ```

pub mod error;
pub mod index;
pub mod parser;
pub mod split;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{DataLoadError, Result};
pub use index::{Dataset, IngestionReport};
pub use parser::{normalize_timestamp, ParseReport};
pub use split::{SplitSummary, TemporalSplit};
pub use types::{
    // Type aliases
    ArticleId,
    CategoryId,
    Timestamp,
    UserId,
    SECONDS_PER_DAY,
    // Core types
    Aggregation,
    Article,
    ArticleCatalog,
    EmbeddingParts,
    EmbeddingSnapshot,
    Interaction,
    InteractionKind,
    InteractionStore,
    InteractionWeights,
    RawInteraction,
    StoreStats,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_catalog() -> ArticleCatalog {
        ArticleCatalog::from_articles(vec![
            Article { id: 1, category_id: 7, published_at: 1_000, words_count: 120 },
            Article { id: 2, category_id: 7, published_at: 2_000, words_count: 80 },
            Article { id: 3, category_id: 9, published_at: 3_000, words_count: 200 },
        ])
    }

    #[test]
    fn test_csv_to_split_end_to_end() {
        let clicks = "user_id,click_article_id,click_timestamp\n\
                      1,1,1000\n\
                      1,2,2000\n\
                      1,3,5000\n\
                      2,1,1500\n\
                      2,1,1600\n\
                      2,3,6000\n\
                      bad,row,here\n";
        let report = parser::parse_clicks_str(clicks, "clicks.csv");
        assert_eq!(report.skipped, 1);

        let store = InteractionStore::build(
            &report.records,
            &create_test_catalog(),
            &InteractionWeights::default(),
            Aggregation::Sum,
        )
        .unwrap();

        // User 2's two clicks on article 1 are merged
        assert_eq!(store.len(), 5);
        assert_eq!(store.user_interactions(2)[0].weight, 2.0);

        let split = TemporalSplit::split(&store, 4000).unwrap();
        assert_eq!(split.train.len(), 3);
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.summary().test_users, 2);
    }

    #[test]
    fn test_empty_queries() {
        let store = InteractionStore::new();
        let catalog = ArticleCatalog::new();

        // Querying non-existent data should return None or empty slices
        assert!(store.user_interactions(999).is_empty());
        assert_eq!(store.article_interaction_count(999), 0);
        assert!(catalog.get(999).is_none());
        assert!(catalog.articles_in_category(1).is_empty());
        assert_eq!(store.stats().interactions, 0);
    }
}
