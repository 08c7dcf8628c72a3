//! Popularity Ranker
//!
//! Static ranking of articles by (optionally time-decayed) interaction count
//! over the train split. Serves cold-start users and the evaluation baseline.

use crate::types::{ScoreSource, ScoredArticle};
use data_loader::{ArticleId, InteractionStore, SECONDS_PER_DAY, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Articles ordered by popularity score, highest first, ties by lower id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopularityRanking {
    version: u64,
    /// Per-day decay rate applied to each interaction's age
    decay: f64,
    reference_time: Timestamp,
    ranked: Vec<(ArticleId, f32)>,
}

impl PopularityRanking {
    /// Rank articles from the train store.
    ///
    /// Each interaction contributes `exp(−decay · days_before_reference)`;
    /// `decay = 0` gives plain counts. The reference defaults to the latest
    /// interaction in the store.
    pub fn from_store(store: &InteractionStore, decay: f64, reference_time: Option<Timestamp>) -> Self {
        let reference_time = reference_time
            .or_else(|| store.time_range().map(|(_, max)| max))
            .unwrap_or_default();

        let mut scores: HashMap<ArticleId, f64> = HashMap::new();
        for interaction in store.iter() {
            let contribution = if decay > 0.0 {
                let days = (reference_time - interaction.timestamp).max(0) as f64 / SECONDS_PER_DAY;
                (-decay * days).exp()
            } else {
                1.0
            };
            *scores.entry(interaction.article_id).or_insert(0.0) += contribution;
        }

        let mut ranked: Vec<(ArticleId, f32)> = scores
            .into_iter()
            .map(|(id, score)| (id, score as f32))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        debug!("Ranked {} articles by popularity", ranked.len());
        Self {
            version: 0,
            decay,
            reference_time,
            ranked,
        }
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Full ranking, most popular first
    pub fn ranked(&self) -> &[(ArticleId, f32)] {
        &self.ranked
    }

    /// Score of one article; 0 when it never appeared in training
    pub fn score_of(&self, article_id: ArticleId) -> f32 {
        self.ranked
            .iter()
            .find(|(id, _)| *id == article_id)
            .map(|(_, score)| *score)
            .unwrap_or(0.0)
    }

    /// The `k` most popular articles not in `exclude`
    pub fn top_k(&self, k: usize, exclude: &HashSet<ArticleId>) -> Vec<ScoredArticle> {
        self.ranked
            .iter()
            .filter(|(id, _)| !exclude.contains(id))
            .take(k)
            .map(|&(id, score)| ScoredArticle::new(id, score, Timestamp::MIN, ScoreSource::Popularity))
            .collect()
    }
}
