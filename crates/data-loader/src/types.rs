//! Core domain types for the news click dataset.
//!
//! Users, articles and interactions are plain typed records validated at the
//! ingestion boundary. The `InteractionStore` is the in-memory view shared by
//! training and evaluation.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{DataLoadError, Result};

// =============================================================================
// Type Aliases
// =============================================================================

/// Unique identifier for a user
pub type UserId = u32;

/// Unique identifier for an article
pub type ArticleId = u32;

/// Identifier of an editorial category
pub type CategoryId = u32;

/// Seconds since the Unix epoch
pub type Timestamp = i64;

/// Number of seconds in a day, used by every recency decay
pub const SECONDS_PER_DAY: f64 = 86_400.0;

// =============================================================================
// Interaction-related Types
// =============================================================================

/// What the user did with the article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    View,
    Like,
    Comment,
}

impl InteractionKind {
    /// Parse the textual kind found in click logs. Empty means a plain view.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "view" | "click" => Ok(InteractionKind::View),
            "like" => Ok(InteractionKind::Like),
            "comment" => Ok(InteractionKind::Comment),
            other => Err(DataLoadError::InvalidValue {
                field: "interaction_type".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Weight given to each interaction kind.
///
/// The click logs do not say how much a like is worth compared to a view,
/// so the mapping is configuration rather than a constant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionWeights {
    pub view: f32,
    pub like: f32,
    pub comment: f32,
}

impl InteractionWeights {
    pub fn weight(&self, kind: InteractionKind) -> f32 {
        match kind {
            InteractionKind::View => self.view,
            InteractionKind::Like => self.like,
            InteractionKind::Comment => self.comment,
        }
    }
}

impl Default for InteractionWeights {
    fn default() -> Self {
        Self {
            view: 1.0,
            like: 2.0,
            comment: 3.0,
        }
    }
}

/// How repeated (user, article) interactions are folded into one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Sum,
    Max,
}

/// One row of the click log, before aggregation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawInteraction {
    pub user_id: UserId,
    pub article_id: ArticleId,
    pub timestamp: Timestamp,
    pub kind: InteractionKind,
    /// 1-based position of the click inside its session, when known
    pub click_rank: Option<u32>,
}

/// An aggregated (user, article) interaction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: UserId,
    pub article_id: ArticleId,
    /// Earliest timestamp among the merged raw records
    pub timestamp: Timestamp,
    pub weight: f32,
    /// Lowest click rank among the merged raw records
    pub click_rank: Option<u32>,
    /// How many raw records were merged into this one
    pub count: u32,
}

// =============================================================================
// Article-related Types
// =============================================================================

/// Article metadata. The embedding lives in the `EmbeddingSnapshot`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub category_id: CategoryId,
    /// Publication time in seconds since the epoch
    pub published_at: Timestamp,
    pub words_count: u32,
}

/// All known articles, indexed by id and by category
#[derive(Debug, Clone, Default)]
pub struct ArticleCatalog {
    pub(crate) articles: HashMap<ArticleId, Article>,
    pub(crate) category_index: HashMap<CategoryId, Vec<ArticleId>>,
}

impl ArticleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from parsed metadata rows
    pub fn from_articles(articles: impl IntoIterator<Item = Article>) -> Self {
        let mut catalog = Self::new();
        for article in articles {
            catalog.insert(article);
        }
        catalog
    }

    /// Insert or replace an article
    pub fn insert(&mut self, article: Article) {
        if let Some(previous) = self.articles.insert(article.id, article) {
            if let Some(ids) = self.category_index.get_mut(&previous.category_id) {
                ids.retain(|&id| id != previous.id);
            }
        }
        self.category_index
            .entry(article.category_id)
            .or_default()
            .push(article.id);
    }

    pub fn get(&self, id: ArticleId) -> Option<&Article> {
        self.articles.get(&id)
    }

    pub fn contains(&self, id: ArticleId) -> bool {
        self.articles.contains_key(&id)
    }

    /// Publication timestamp used for tie-breaking. Unknown articles sort as oldest.
    pub fn published_at(&self, id: ArticleId) -> Timestamp {
        self.articles
            .get(&id)
            .map(|a| a.published_at)
            .unwrap_or(Timestamp::MIN)
    }

    pub fn category_of(&self, id: ArticleId) -> Option<CategoryId> {
        self.articles.get(&id).map(|a| a.category_id)
    }

    /// Articles belonging to one category
    pub fn articles_in_category(&self, category: CategoryId) -> &[ArticleId] {
        self.category_index
            .get(&category)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// All article ids in ascending order
    pub fn article_ids(&self) -> Vec<ArticleId> {
        let mut ids: Vec<ArticleId> = self.articles.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

/// Serialized form of an [`EmbeddingSnapshot`], checked on the way back in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingParts {
    pub version: u64,
    pub dimension: usize,
    pub vectors: BTreeMap<ArticleId, Vec<f32>>,
}

/// Versioned, immutable mapping from article to embedding vector.
///
/// Every vector has the same dimension; construction fails otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EmbeddingParts", into = "EmbeddingParts")]
pub struct EmbeddingSnapshot {
    version: u64,
    dimension: usize,
    vectors: BTreeMap<ArticleId, Vec<f32>>,
}

impl EmbeddingSnapshot {
    /// Validate and freeze a set of embeddings.
    ///
    /// The dimension is taken from the lowest article id; an empty snapshot
    /// has dimension 0.
    pub fn new(version: u64, vectors: impl IntoIterator<Item = (ArticleId, Vec<f32>)>) -> Result<Self> {
        let vectors: BTreeMap<ArticleId, Vec<f32>> = vectors.into_iter().collect();
        let dimension = vectors.values().next().map(|v| v.len()).unwrap_or(0);

        for (&article_id, vector) in &vectors {
            if vector.len() != dimension {
                return Err(DataLoadError::DimensionMismatch {
                    article_id,
                    expected: dimension,
                    found: vector.len(),
                });
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(DataLoadError::DataIntegrity(format!(
                    "embedding for article {} contains a non-finite value",
                    article_id
                )));
            }
        }

        Ok(Self {
            version,
            dimension,
            vectors,
        })
    }

    /// Rebuild from serialized parts, enforcing the same checks as [`Self::new`].
    ///
    /// The declared dimension must match the vectors; it is kept as-is for an
    /// empty snapshot.
    pub fn from_parts(parts: EmbeddingParts) -> Result<Self> {
        let declared = parts.dimension;
        let mut snapshot = Self::new(parts.version, parts.vectors)?;
        if let Some((&article_id, vector)) = snapshot.vectors.iter().next() {
            if vector.len() != declared {
                return Err(DataLoadError::DimensionMismatch {
                    article_id,
                    expected: declared,
                    found: vector.len(),
                });
            }
        }
        snapshot.dimension = declared;
        Ok(snapshot)
    }

    /// Same vectors under a new version number
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Keep only the articles accepted by `keep`
    pub fn restrict_to(&self, keep: impl Fn(ArticleId) -> bool) -> Self {
        Self {
            version: self.version,
            dimension: self.dimension,
            vectors: self
                .vectors
                .iter()
                .filter(|(id, _)| keep(**id))
                .map(|(id, v)| (*id, v.clone()))
                .collect(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn get(&self, id: ArticleId) -> Option<&[f32]> {
        self.vectors.get(&id).map(|v| v.as_slice())
    }

    pub fn contains(&self, id: ArticleId) -> bool {
        self.vectors.contains_key(&id)
    }

    /// Iterate in ascending article id order
    pub fn iter(&self) -> impl Iterator<Item = (ArticleId, &[f32])> {
        self.vectors.iter().map(|(id, v)| (*id, v.as_slice()))
    }

    /// Parallel iteration for scoring every article against one vector
    pub fn par_iter(&self) -> impl ParallelIterator<Item = (ArticleId, &[f32])> {
        self.vectors.par_iter().map(|(id, v)| (*id, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

// =============================================================================
// InteractionStore - the in-memory view over aggregated interactions
// =============================================================================

/// Aggregated interactions with per-user and per-article indices.
///
/// Each user's list is sorted by (timestamp, article id) so that every
/// consumer sees the same order.
#[derive(Debug, Clone, Default)]
pub struct InteractionStore {
    pub(crate) user_interactions: BTreeMap<UserId, Vec<Interaction>>,
    pub(crate) article_counts: HashMap<ArticleId, u32>,
}

/// Summary counts for logging and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub users: usize,
    pub articles: usize,
    pub interactions: usize,
    pub min_timestamp: Option<Timestamp>,
    pub max_timestamp: Option<Timestamp>,
}

impl InteractionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interactions of one user, oldest first. Empty for unknown users.
    pub fn user_interactions(&self, user_id: UserId) -> &[Interaction] {
        self.user_interactions
            .get(&user_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains_user(&self, user_id: UserId) -> bool {
        self.user_interactions.contains_key(&user_id)
    }

    /// Number of distinct users that interacted with an article
    pub fn article_interaction_count(&self, article_id: ArticleId) -> u32 {
        self.article_counts.get(&article_id).copied().unwrap_or(0)
    }

    /// User ids in ascending order
    pub fn user_ids(&self) -> impl Iterator<Item = UserId> + '_ {
        self.user_interactions.keys().copied()
    }

    /// All interactions, grouped by user in ascending user id order
    pub fn iter(&self) -> impl Iterator<Item = &Interaction> {
        self.user_interactions.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.user_interactions.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.user_interactions.is_empty()
    }

    pub fn user_count(&self) -> usize {
        self.user_interactions.len()
    }

    /// Earliest and latest interaction timestamps
    pub fn time_range(&self) -> Option<(Timestamp, Timestamp)> {
        let mut timestamps = self.iter().map(|i| i.timestamp);
        let first = timestamps.next()?;
        Some(timestamps.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
    }

    pub fn stats(&self) -> StoreStats {
        let range = self.time_range();
        StoreStats {
            users: self.user_interactions.len(),
            articles: self.article_counts.len(),
            interactions: self.len(),
            min_timestamp: range.map(|r| r.0),
            max_timestamp: range.map(|r| r.1),
        }
    }

    /// Build a store directly from already aggregated interactions.
    ///
    /// Callers guarantee there is one record per (user, article) pair; use
    /// `InteractionStore::build` for raw clicks.
    pub fn from_aggregated(interactions: impl IntoIterator<Item = Interaction>) -> Self {
        let mut store = Self::new();
        for interaction in interactions {
            store
                .user_interactions
                .entry(interaction.user_id)
                .or_default()
                .push(interaction);
            *store.article_counts.entry(interaction.article_id).or_insert(0) += 1;
        }
        for list in store.user_interactions.values_mut() {
            list.sort_by_key(|i| (i.timestamp, i.article_id));
        }
        store
    }
}

impl TryFrom<EmbeddingParts> for EmbeddingSnapshot {
    type Error = DataLoadError;

    fn try_from(parts: EmbeddingParts) -> Result<Self> {
        Self::from_parts(parts)
    }
}

impl From<EmbeddingSnapshot> for EmbeddingParts {
    fn from(snapshot: EmbeddingSnapshot) -> Self {
        EmbeddingParts {
            version: snapshot.version,
            dimension: snapshot.dimension,
            vectors: snapshot.vectors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(id: ArticleId, category_id: CategoryId, published_at: Timestamp) -> Article {
        Article {
            id,
            category_id,
            published_at,
            words_count: 200,
        }
    }

    #[test]
    fn test_interaction_kind_parse() {
        assert_eq!(InteractionKind::parse("").unwrap(), InteractionKind::View);
        assert_eq!(InteractionKind::parse("Like").unwrap(), InteractionKind::Like);
        assert_eq!(InteractionKind::parse(" comment ").unwrap(), InteractionKind::Comment);
        assert!(InteractionKind::parse("share").is_err());
    }

    #[test]
    fn test_catalog_reinsert_moves_category() {
        let mut catalog = ArticleCatalog::new();
        catalog.insert(article(1, 10, 100));
        catalog.insert(article(1, 20, 100));

        assert!(catalog.articles_in_category(10).is_empty());
        assert_eq!(catalog.articles_in_category(20), &[1]);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_unknown_article_sorts_oldest() {
        let catalog = ArticleCatalog::from_articles([article(1, 1, 500)]);
        assert_eq!(catalog.published_at(1), 500);
        assert_eq!(catalog.published_at(2), Timestamp::MIN);
    }

    #[test]
    fn test_embedding_snapshot_rejects_mixed_dimensions() {
        let result = EmbeddingSnapshot::new(1, [(1, vec![1.0, 0.0]), (2, vec![1.0, 0.0, 0.0])]);
        assert!(matches!(
            result,
            Err(DataLoadError::DimensionMismatch { article_id: 2, expected: 2, found: 3 })
        ));
    }

    #[test]
    fn test_embedding_json_rejects_mixed_dimensions() {
        let json = r#"{"version":1,"dimension":2,"vectors":{"1":[1.0],"2":[1.0,2.0,3.0]}}"#;
        assert!(serde_json::from_str::<EmbeddingSnapshot>(json).is_err());

        // Vectors agree with each other but not with the declared dimension
        let json = r#"{"version":1,"dimension":2,"vectors":{"1":[1.0,0.0,0.0]}}"#;
        assert!(serde_json::from_str::<EmbeddingSnapshot>(json).is_err());
    }

    #[test]
    fn test_embedding_json_reload() {
        let snapshot = EmbeddingSnapshot::new(4, [(1, vec![1.0, 0.5]), (7, vec![0.0, 2.0])]).unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: EmbeddingSnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, snapshot);
        assert_eq!(restored.dimension(), 2);

        let empty = snapshot.restrict_to(|_| false);
        let restored: EmbeddingSnapshot = serde_json::from_str(&serde_json::to_string(&empty).unwrap()).unwrap();
        assert_eq!(restored.dimension(), 2);
        assert!(restored.is_empty());
    }

    #[test]
    fn test_embedding_snapshot_rejects_nan() {
        let result = EmbeddingSnapshot::new(1, [(1, vec![f32::NAN, 0.0])]);
        assert!(result.is_err());
    }

    #[test]
    fn test_embedding_snapshot_restrict() {
        let snapshot =
            EmbeddingSnapshot::new(3, [(1, vec![1.0]), (2, vec![2.0]), (3, vec![3.0])]).unwrap();
        let restricted = snapshot.restrict_to(|id| id != 2);

        assert_eq!(restricted.len(), 2);
        assert_eq!(restricted.version(), 3);
        assert!(!restricted.contains(2));
    }

    #[test]
    fn test_empty_store_queries() {
        let store = InteractionStore::new();
        assert!(store.user_interactions(1).is_empty());
        assert_eq!(store.time_range(), None);
        assert_eq!(store.article_interaction_count(7), 0);
        assert!(store.is_empty());
    }
}
