//! Building the InteractionStore and loading a full dataset snapshot.
//!
//! Raw clicks are folded into one record per (user, article) pair and checked
//! against the article catalog. A click on an unknown article is an integrity
//! error and fails the build.

use crate::error::{DataLoadError, Result};
use crate::parser::{self, ParseReport};
use crate::types::*;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// File names expected inside a dataset directory
pub const ARTICLES_FILE: &str = "articles_metadata.csv";
pub const CLICKS_FILE: &str = "clicks.csv";
pub const EMBEDDINGS_FILE: &str = "articles_embeddings.csv";

impl InteractionStore {
    /// Aggregate raw clicks into a store.
    ///
    /// Duplicate (user, article) pairs are merged with `aggregation`; the
    /// merged record keeps the earliest timestamp and the lowest click rank.
    pub fn build(
        raw: &[RawInteraction],
        catalog: &ArticleCatalog,
        weights: &InteractionWeights,
        aggregation: Aggregation,
    ) -> Result<Self> {
        let mut merged: HashMap<(UserId, ArticleId), Interaction> = HashMap::with_capacity(raw.len());

        for record in raw {
            if !catalog.contains(record.article_id) {
                return Err(DataLoadError::MissingReference {
                    entity: "Article".to_string(),
                    id: record.article_id,
                });
            }
            let weight = weights.weight(record.kind);
            if !weight.is_finite() || weight < 0.0 {
                return Err(DataLoadError::InvalidValue {
                    field: "interaction weight".to_string(),
                    value: weight.to_string(),
                });
            }

            merged
                .entry((record.user_id, record.article_id))
                .and_modify(|existing| {
                    existing.weight = match aggregation {
                        Aggregation::Sum => existing.weight + weight,
                        Aggregation::Max => existing.weight.max(weight),
                    };
                    existing.timestamp = existing.timestamp.min(record.timestamp);
                    existing.click_rank = match (existing.click_rank, record.click_rank) {
                        (Some(a), Some(b)) => Some(a.min(b)),
                        (a, b) => a.or(b),
                    };
                    existing.count += 1;
                })
                .or_insert(Interaction {
                    user_id: record.user_id,
                    article_id: record.article_id,
                    timestamp: record.timestamp,
                    weight,
                    click_rank: record.click_rank,
                    count: 1,
                });
        }

        Ok(Self::from_aggregated(merged.into_values()))
    }
}

/// Ingestion bookkeeping for the three input files
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct IngestionReport {
    pub articles_total: usize,
    pub articles_skipped: usize,
    pub clicks_total: usize,
    pub clicks_skipped: usize,
    pub embeddings_total: usize,
    pub embeddings_skipped: usize,
}

impl IngestionReport {
    fn from_reports<A, B, C>(articles: &ParseReport<A>, clicks: &ParseReport<B>, embeddings: &ParseReport<C>) -> Self {
        Self {
            articles_total: articles.total,
            articles_skipped: articles.skipped,
            clicks_total: clicks.total,
            clicks_skipped: clicks.skipped,
            embeddings_total: embeddings.total,
            embeddings_skipped: embeddings.skipped,
        }
    }

    /// Skipped rows over all rows, across every file
    pub fn corruption_rate(&self) -> f64 {
        let total = self.articles_total + self.clicks_total + self.embeddings_total;
        let skipped = self.articles_skipped + self.clicks_skipped + self.embeddings_skipped;
        if total == 0 {
            0.0
        } else {
            skipped as f64 / total as f64
        }
    }
}

/// Everything loaded from one dataset directory
#[derive(Debug, Clone)]
pub struct Dataset {
    pub catalog: ArticleCatalog,
    pub embeddings: EmbeddingSnapshot,
    pub store: InteractionStore,
    pub report: IngestionReport,
}

impl Dataset {
    /// Load articles, clicks and embeddings from a directory.
    ///
    /// Steps:
    /// 1. Parse the three files in parallel
    /// 2. Build the article catalog and embedding snapshot
    /// 3. Aggregate clicks into the InteractionStore
    /// 4. Validate cross references
    pub fn load_from_dir(
        data_dir: &Path,
        weights: &InteractionWeights,
        aggregation: Aggregation,
    ) -> Result<Self> {
        info!("Loading news dataset from {:?}", data_dir);

        let articles_path = data_dir.join(ARTICLES_FILE);
        let clicks_path = data_dir.join(CLICKS_FILE);
        let embeddings_path = data_dir.join(EMBEDDINGS_FILE);

        let ((articles, embeddings), clicks) = rayon::join(
            || {
                rayon::join(
                    || parser::parse_articles(&articles_path),
                    || parser::parse_embeddings(&embeddings_path),
                )
            },
            || parser::parse_clicks(&clicks_path),
        );
        let articles = articles?;
        let embeddings = embeddings?;
        let clicks = clicks?;

        let report = IngestionReport::from_reports(&articles, &clicks, &embeddings);
        let dataset = Self::from_records(articles.records, embeddings.records, &clicks.records, weights, aggregation, report)?;

        info!(
            "Loaded {} articles, {} embeddings (dim {}), {} interactions from {} users; corruption rate {:.4}",
            dataset.catalog.len(),
            dataset.embeddings.len(),
            dataset.embeddings.dimension(),
            dataset.store.len(),
            dataset.store.user_count(),
            dataset.report.corruption_rate()
        );
        Ok(dataset)
    }

    /// Assemble a dataset from already parsed records
    pub fn from_records(
        articles: Vec<Article>,
        embeddings: Vec<(ArticleId, Vec<f32>)>,
        clicks: &[RawInteraction],
        weights: &InteractionWeights,
        aggregation: Aggregation,
        report: IngestionReport,
    ) -> Result<Self> {
        let catalog = ArticleCatalog::from_articles(articles);
        let embeddings = EmbeddingSnapshot::new(0, embeddings)?;
        let store = InteractionStore::build(clicks, &catalog, weights, aggregation)?;

        let dataset = Self {
            catalog,
            embeddings,
            store,
            report,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    /// Every embedded article must be in the catalog
    pub fn validate(&self) -> Result<()> {
        let missing = self
            .embeddings
            .par_iter()
            .map(|(id, _)| id)
            .filter(|id| !self.catalog.contains(*id))
            .min();

        match missing {
            Some(id) => Err(DataLoadError::MissingReference {
                entity: "Article".to_string(),
                id,
            }),
            None => Ok(()),
        }
    }
}
