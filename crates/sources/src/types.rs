//! Core types shared by the scorers

use data_loader::{ArticleId, Interaction, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Which scorer produced a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    /// Embedding similarity to the user profile
    Content,
    /// Latent factor dot product
    Collaborative,
    /// Global popularity
    Popularity,
    /// Blend of content and collaborative scores
    Hybrid,
}

/// An article with a score from one of the scorers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredArticle {
    pub article_id: ArticleId,
    pub score: f32,
    /// Used only to break score ties; newer wins
    #[serde(skip)]
    pub published_at: Timestamp,
    #[serde(skip, default = "default_source")]
    pub source: ScoreSource,
}

fn default_source() -> ScoreSource {
    ScoreSource::Hybrid
}

impl ScoredArticle {
    /// NaN scores are stored as negative infinity so they rank last
    pub fn new(article_id: ArticleId, score: f32, published_at: Timestamp, source: ScoreSource) -> Self {
        Self {
            article_id,
            score: if score.is_nan() { f32::NEG_INFINITY } else { score },
            published_at,
            source,
        }
    }
}

/// Everything the scorers need to know about one user
#[derive(Debug, Clone, Default)]
pub struct UserContext {
    pub user_id: UserId,

    /// Train-side interactions, oldest first
    pub interactions: Vec<Interaction>,

    /// Articles the user has already read (O(1) lookup)
    pub read_articles: HashSet<ArticleId>,

    /// Recency decays are measured back from this instant
    pub reference_time: Timestamp,
}

impl UserContext {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    /// Override the reference time (defaults to the latest interaction)
    pub fn with_reference_time(mut self, reference_time: Timestamp) -> Self {
        self.reference_time = reference_time;
        self
    }

    pub fn has_read(&self, article_id: ArticleId) -> bool {
        self.read_articles.contains(&article_id)
    }

    pub fn interaction_count(&self) -> usize {
        self.interactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }
}
