//! Collaborative Filtering - latent factor model trained with weighted ALS
//!
//! ## Algorithm
//! 1. Index users and articles of the train store into a sparse matrix
//! 2. For each user, draw `negative_ratio × |reads|` unread articles once,
//!    from a ChaCha8 stream seeded with `seed`
//! 3. Alternate between solving every user row and every article row:
//!    `(Σ c·vvᵀ + λI) x = Σ c·t·v`, with target `t = weight` and confidence
//!    `c = 1 + α·weight` on observed pairs, `t = 0, c = 1` on sampled ones
//! 4. Score = dot(user row, article row)
//!
//! Rows are solved in parallel; each row depends only on the other side's
//! factors, so results do not depend on the thread schedule.

use crate::error::{Result, ScoringError};
use crate::ranking::top_k;
use crate::types::{ScoreSource, ScoredArticle, UserContext};
use data_loader::{ArticleCatalog, ArticleId, InteractionStore, Timestamp, UserId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument};

// =============================================================================
// Interaction matrix
// =============================================================================

/// Sparse user × article matrix of aggregated interaction weights
#[derive(Debug, Clone, Default)]
pub struct InteractionMatrix {
    users: Vec<UserId>,
    articles: Vec<ArticleId>,
    /// Per user row: (article column, weight), columns ascending
    rows: Vec<Vec<(usize, f32)>>,
    nnz: usize,
    latest_timestamp: Timestamp,
}

impl InteractionMatrix {
    pub fn from_store(store: &InteractionStore) -> Self {
        Self::from_store_filtered(store, 1)
    }

    /// Keep only users with at least `min_user_interactions` interactions
    pub fn from_store_filtered(store: &InteractionStore, min_user_interactions: usize) -> Self {
        let users: Vec<UserId> = store
            .user_ids()
            .filter(|&u| store.user_interactions(u).len() >= min_user_interactions)
            .collect();

        let mut articles: Vec<ArticleId> = users
            .iter()
            .flat_map(|&u| store.user_interactions(u).iter().map(|i| i.article_id))
            .collect();
        articles.sort_unstable();
        articles.dedup();

        let article_index: HashMap<ArticleId, usize> =
            articles.iter().enumerate().map(|(idx, &id)| (id, idx)).collect();

        let mut nnz = 0;
        let mut latest_timestamp = Timestamp::MIN;
        let rows: Vec<Vec<(usize, f32)>> = users
            .iter()
            .map(|&u| {
                let mut row: Vec<(usize, f32)> = store
                    .user_interactions(u)
                    .iter()
                    .filter_map(|i| {
                        latest_timestamp = latest_timestamp.max(i.timestamp);
                        article_index.get(&i.article_id).map(|&col| (col, i.weight))
                    })
                    .collect();
                row.sort_unstable_by_key(|(col, _)| *col);
                nnz += row.len();
                row
            })
            .collect();

        Self {
            users,
            articles,
            rows,
            nnz,
            latest_timestamp: if nnz == 0 { 0 } else { latest_timestamp },
        }
    }

    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    pub fn num_articles(&self) -> usize {
        self.articles.len()
    }

    /// Number of observed (user, article) pairs
    pub fn nnz(&self) -> usize {
        self.nnz
    }

    pub fn is_empty(&self) -> bool {
        self.nnz == 0
    }

    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    pub fn articles(&self) -> &[ArticleId] {
        &self.articles
    }

    pub fn row(&self, user_idx: usize) -> &[(usize, f32)] {
        self.rows.get(user_idx).map(|r| r.as_slice()).unwrap_or(&[])
    }
}

// =============================================================================
// Trainer
// =============================================================================

/// Hyperparameters of a factorization run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerParams {
    /// Latent dimension
    pub rank: usize,
    /// L2 regularization
    pub lambda: f32,
    pub iterations: usize,
    pub seed: u64,
    /// Unobserved pairs sampled per observed pair
    pub negative_ratio: f32,
    /// Confidence slope on observed weights
    pub confidence_alpha: f32,
}

impl Default for TrainerParams {
    fn default() -> Self {
        Self {
            rank: 32,
            lambda: 0.1,
            iterations: 10,
            seed: 42,
            negative_ratio: 1.0,
            confidence_alpha: 10.0,
        }
    }
}

impl TrainerParams {
    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    pub fn with_lambda(mut self, lambda: f32) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_negative_ratio(mut self, negative_ratio: f32) -> Self {
        self.negative_ratio = negative_ratio;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.rank == 0 {
            return Err(ScoringError::InvalidConfig("rank must be at least 1".to_string()));
        }
        if !(self.lambda.is_finite() && self.lambda > 0.0) {
            return Err(ScoringError::InvalidConfig(format!(
                "lambda must be positive, got {}",
                self.lambda
            )));
        }
        if self.iterations == 0 {
            return Err(ScoringError::InvalidConfig("iterations must be at least 1".to_string()));
        }
        if !(self.negative_ratio.is_finite() && self.negative_ratio >= 0.0) {
            return Err(ScoringError::InvalidConfig(format!(
                "negative_ratio must be non-negative, got {}",
                self.negative_ratio
            )));
        }
        if !(self.confidence_alpha.is_finite() && self.confidence_alpha >= 0.0) {
            return Err(ScoringError::InvalidConfig(format!(
                "confidence_alpha must be non-negative, got {}",
                self.confidence_alpha
            )));
        }
        Ok(())
    }
}

/// Anything that can fit a latent factor model from an interaction matrix
pub trait Trainer: Send + Sync {
    fn name(&self) -> &'static str;

    fn fit(&self, matrix: &InteractionMatrix, params: &TrainerParams) -> Result<LatentFactorModel>;
}

/// One term of a least-squares row
#[derive(Debug, Clone, Copy)]
struct Entry {
    index: usize,
    target: f32,
    confidence: f32,
}

/// Weighted alternating least squares with sampled negatives
#[derive(Debug, Clone, Copy, Default)]
pub struct AlsTrainer;

impl AlsTrainer {
    pub fn new() -> Self {
        Self
    }

    /// Observed entries plus sampled negatives for every user row
    fn user_entries(matrix: &InteractionMatrix, params: &TrainerParams, rng: &mut ChaCha8Rng) -> Vec<Vec<Entry>> {
        let n_articles = matrix.num_articles();

        (0..matrix.num_users())
            .map(|u| {
                let row = matrix.row(u);
                let mut entries: Vec<Entry> = row
                    .iter()
                    .map(|&(col, weight)| Entry {
                        index: col,
                        target: weight,
                        confidence: 1.0 + params.confidence_alpha * weight,
                    })
                    .collect();

                let available = n_articles - row.len();
                let wanted = ((row.len() as f32 * params.negative_ratio).round() as usize).min(available);
                if wanted > 0 {
                    let observed: HashSet<usize> = row.iter().map(|(col, _)| *col).collect();
                    let mut chosen: HashSet<usize> = HashSet::with_capacity(wanted);
                    let max_draws = wanted * 20 + 100;
                    for _ in 0..max_draws {
                        if chosen.len() == wanted {
                            break;
                        }
                        let col = rng.random_range(0..n_articles);
                        if !observed.contains(&col) && chosen.insert(col) {
                            entries.push(Entry {
                                index: col,
                                target: 0.0,
                                confidence: 1.0,
                            });
                        }
                    }
                }
                entries
            })
            .collect()
    }

    /// Column view of the user entries
    fn transpose(user_entries: &[Vec<Entry>], n_articles: usize) -> Vec<Vec<Entry>> {
        let mut article_entries = vec![Vec::new(); n_articles];
        for (u, entries) in user_entries.iter().enumerate() {
            for entry in entries {
                article_entries[entry.index].push(Entry {
                    index: u,
                    target: entry.target,
                    confidence: entry.confidence,
                });
            }
        }
        article_entries
    }

    fn init_factors(n: usize, rank: usize, rng: &mut ChaCha8Rng) -> Vec<f32> {
        (0..n * rank).map(|_| rng.random_range(-0.1f32..0.1)).collect()
    }

    /// Solve every row of one side against the fixed factors of the other
    fn solve_side(entries: &[Vec<Entry>], fixed: &[f32], rank: usize, lambda: f64) -> Result<Vec<f32>> {
        let rows: Vec<Vec<f32>> = entries
            .par_iter()
            .map(|row| solve_row(row, fixed, rank, lambda))
            .collect::<Result<_>>()?;
        Ok(rows.into_iter().flatten().collect())
    }

    fn loss(user_entries: &[Vec<Entry>], users: &[f32], articles: &[f32], rank: usize, lambda: f64) -> f64 {
        let mut loss = 0.0f64;
        for (u, entries) in user_entries.iter().enumerate() {
            let user = &users[u * rank..(u + 1) * rank];
            for entry in entries {
                let article = &articles[entry.index * rank..(entry.index + 1) * rank];
                let err = entry.target as f64 - dot(user, article) as f64;
                loss += entry.confidence as f64 * err * err;
            }
        }
        let norm: f64 = users.iter().chain(articles).map(|&x| (x as f64) * (x as f64)).sum();
        loss + lambda * norm
    }
}

impl Trainer for AlsTrainer {
    fn name(&self) -> &'static str {
        "als"
    }

    #[instrument(skip(self, matrix, params), fields(users = matrix.num_users(), articles = matrix.num_articles()))]
    fn fit(&self, matrix: &InteractionMatrix, params: &TrainerParams) -> Result<LatentFactorModel> {
        params.validate()?;
        if matrix.is_empty() {
            return Err(ScoringError::InsufficientData {
                entity: "interaction matrix",
                id: 0,
            });
        }

        let rank = params.rank;
        let lambda = params.lambda as f64;
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);

        let user_entries = Self::user_entries(matrix, params, &mut rng);
        let article_entries = Self::transpose(&user_entries, matrix.num_articles());
        let negatives: usize = user_entries.iter().map(|e| e.len()).sum::<usize>() - matrix.nnz();
        debug!("Sampled {} negative pairs for {} observed", negatives, matrix.nnz());

        let mut user_factors = Self::init_factors(matrix.num_users(), rank, &mut rng);
        let mut article_factors = Self::init_factors(matrix.num_articles(), rank, &mut rng);

        for iteration in 0..params.iterations {
            user_factors = Self::solve_side(&user_entries, &article_factors, rank, lambda)?;
            article_factors = Self::solve_side(&article_entries, &user_factors, rank, lambda)?;

            let loss = Self::loss(&user_entries, &user_factors, &article_factors, rank, lambda);
            debug!(iteration, loss, "ALS iteration complete");
        }

        info!(
            "Trained rank-{} model over {} users and {} articles",
            rank,
            matrix.num_users(),
            matrix.num_articles()
        );

        LatentFactorModel::from_parts(ModelParts {
            version: 0,
            rank,
            trained_at: matrix.latest_timestamp,
            training_interactions: matrix.nnz(),
            users: matrix.users.clone(),
            articles: matrix.articles.clone(),
            user_factors,
            article_factors,
        })
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Build and solve the normal equations of one row
fn solve_row(entries: &[Entry], fixed: &[f32], rank: usize, lambda: f64) -> Result<Vec<f32>> {
    let mut a = vec![0.0f64; rank * rank];
    let mut b = vec![0.0f64; rank];

    for entry in entries {
        let v = &fixed[entry.index * rank..(entry.index + 1) * rank];
        let c = entry.confidence as f64;
        for i in 0..rank {
            let ci = c * v[i] as f64;
            for j in 0..=i {
                a[i * rank + j] += ci * v[j] as f64;
            }
            b[i] += ci * entry.target as f64;
        }
    }
    for i in 0..rank {
        a[i * rank + i] += lambda;
    }

    let x = cholesky_solve(&a, &b, rank).ok_or_else(|| {
        ScoringError::InvalidConfig("normal equations are not positive definite; increase lambda".to_string())
    })?;
    Ok(x.into_iter().map(|v| v as f32).collect())
}

/// Solve `A x = b` for symmetric positive definite `A` (row-major, lower
/// triangle used). Returns None if `A` is not positive definite.
pub(crate) fn cholesky_solve(a: &[f64], b: &[f64], n: usize) -> Option<Vec<f64>> {
    let mut l = vec![0.0f64; n * n];
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[i * n + k] * l[j * n + k]).sum();
            if i == j {
                let diag = a[i * n + i] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[i * n + j] = diag.sqrt();
            } else {
                l[i * n + j] = (a[i * n + j] - sum) / l[j * n + j];
            }
        }
    }

    // Forward substitution: L y = b
    let mut y = vec![0.0f64; n];
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[i * n + j] * y[j]).sum();
        y[i] = (b[i] - sum) / l[i * n + i];
    }

    // Backward substitution: Lᵀ x = y
    let mut x = vec![0.0f64; n];
    for i in (0..n).rev() {
        let sum: f64 = (i + 1..n).map(|j| l[j * n + i] * x[j]).sum();
        x[i] = (y[i] - sum) / l[i * n + i];
    }
    Some(x)
}

// =============================================================================
// Latent factor model
// =============================================================================

/// Serialized form of a LatentFactorModel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParts {
    pub version: u64,
    pub rank: usize,
    pub trained_at: Timestamp,
    pub training_interactions: usize,
    pub users: Vec<UserId>,
    pub articles: Vec<ArticleId>,
    /// Row-major, `users.len() × rank`
    pub user_factors: Vec<f32>,
    /// Row-major, `articles.len() × rank`
    pub article_factors: Vec<f32>,
}

/// Immutable user and article factor rows of a fixed rank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ModelParts", into = "ModelParts")]
pub struct LatentFactorModel {
    version: u64,
    rank: usize,
    /// Latest interaction timestamp the model was trained on
    trained_at: Timestamp,
    training_interactions: usize,
    articles: Vec<ArticleId>,
    users: Vec<UserId>,
    user_factors: Vec<f32>,
    article_factors: Vec<f32>,
    user_index: HashMap<UserId, usize>,
    article_index: HashMap<ArticleId, usize>,
}

impl LatentFactorModel {
    /// Check the factor shapes and rebuild the id indices
    pub fn from_parts(parts: ModelParts) -> Result<Self> {
        if parts.rank == 0 {
            return Err(ScoringError::CorruptModel("rank is 0".to_string()));
        }
        if parts.user_factors.len() != parts.users.len() * parts.rank {
            return Err(ScoringError::CorruptModel(format!(
                "{} user factors for {} users at rank {}",
                parts.user_factors.len(),
                parts.users.len(),
                parts.rank
            )));
        }
        if parts.article_factors.len() != parts.articles.len() * parts.rank {
            return Err(ScoringError::CorruptModel(format!(
                "{} article factors for {} articles at rank {}",
                parts.article_factors.len(),
                parts.articles.len(),
                parts.rank
            )));
        }
        if parts.user_factors.iter().chain(&parts.article_factors).any(|x| !x.is_finite()) {
            return Err(ScoringError::CorruptModel("non-finite factor".to_string()));
        }

        Ok(Self {
            user_index: parts.users.iter().enumerate().map(|(i, &id)| (id, i)).collect(),
            article_index: parts.articles.iter().enumerate().map(|(i, &id)| (id, i)).collect(),
            version: parts.version,
            rank: parts.rank,
            trained_at: parts.trained_at,
            training_interactions: parts.training_interactions,
            articles: parts.articles,
            users: parts.users,
            user_factors: parts.user_factors,
            article_factors: parts.article_factors,
        })
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn trained_at(&self) -> Timestamp {
        self.trained_at
    }

    pub fn training_interactions(&self) -> usize {
        self.training_interactions
    }

    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    pub fn num_articles(&self) -> usize {
        self.articles.len()
    }

    pub fn contains_user(&self, user_id: UserId) -> bool {
        self.user_index.contains_key(&user_id)
    }

    pub fn user_vector(&self, user_id: UserId) -> Option<&[f32]> {
        let idx = *self.user_index.get(&user_id)?;
        Some(&self.user_factors[idx * self.rank..(idx + 1) * self.rank])
    }

    pub fn article_vector(&self, article_id: ArticleId) -> Option<&[f32]> {
        let idx = *self.article_index.get(&article_id)?;
        Some(&self.article_factors[idx * self.rank..(idx + 1) * self.rank])
    }

    /// Predicted interaction weight for one pair
    pub fn predict(&self, user_id: UserId, article_id: ArticleId) -> Result<f32> {
        let user = self
            .user_vector(user_id)
            .ok_or_else(|| ScoringError::insufficient_user(user_id))?;
        let article = self
            .article_vector(article_id)
            .ok_or_else(|| ScoringError::insufficient_article(article_id))?;
        Ok(dot(user, article))
    }

    /// Dot-product score of every known article not in `exclude`
    pub fn score_user(&self, user_id: UserId, exclude: &HashSet<ArticleId>) -> Result<Vec<(ArticleId, f32)>> {
        let user = self
            .user_vector(user_id)
            .ok_or_else(|| ScoringError::insufficient_user(user_id))?;

        Ok(self
            .articles
            .par_iter()
            .enumerate()
            .filter(|(_, id)| !exclude.contains(*id))
            .map(|(idx, &id)| (id, dot(user, &self.article_factors[idx * self.rank..(idx + 1) * self.rank])))
            .collect())
    }
}

impl TryFrom<ModelParts> for LatentFactorModel {
    type Error = ScoringError;

    fn try_from(parts: ModelParts) -> Result<Self> {
        Self::from_parts(parts)
    }
}

impl From<LatentFactorModel> for ModelParts {
    fn from(model: LatentFactorModel) -> Self {
        ModelParts {
            version: model.version,
            rank: model.rank,
            trained_at: model.trained_at,
            training_interactions: model.training_interactions,
            users: model.users,
            articles: model.articles,
            user_factors: model.user_factors,
            article_factors: model.article_factors,
        }
    }
}

/// Top-K scorer over a trained model
#[derive(Debug, Clone)]
pub struct CollaborativeScorer {
    model: Arc<LatentFactorModel>,
    catalog: Arc<ArticleCatalog>,
}

impl CollaborativeScorer {
    pub fn new(model: Arc<LatentFactorModel>, catalog: Arc<ArticleCatalog>) -> Self {
        Self { model, catalog }
    }

    pub fn model(&self) -> &LatentFactorModel {
        &self.model
    }

    /// Top `limit` unread articles by predicted affinity
    #[instrument(skip(self, context), fields(user_id = context.user_id))]
    pub fn score(&self, context: &UserContext, limit: usize) -> Result<Vec<ScoredArticle>> {
        let scores = self.model.score_user(context.user_id, &context.read_articles)?;
        debug!("Scored {} unread articles by latent factors", scores.len());

        let scored = scores
            .into_iter()
            .map(|(id, score)| ScoredArticle::new(id, score, self.catalog.published_at(id), ScoreSource::Collaborative))
            .collect();
        Ok(top_k(scored, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{Aggregation, Article, InteractionKind, InteractionWeights, RawInteraction};

    /// Two disjoint reader groups: users 1-3 read articles 1-3, users 4-6 read 4-6
    fn create_test_store() -> InteractionStore {
        let catalog = ArticleCatalog::from_articles((1..=6).map(|id| Article {
            id,
            category_id: 1,
            published_at: id as i64,
            words_count: 100,
        }));
        let mut raw = Vec::new();
        for user_id in 1..=6u32 {
            let block = if user_id <= 3 { 1..=3u32 } else { 4..=6u32 };
            for article_id in block {
                // User 1 never read article 3, user 4 never read article 6
                if (user_id, article_id) == (1, 3) || (user_id, article_id) == (4, 6) {
                    continue;
                }
                raw.push(RawInteraction {
                    user_id,
                    article_id,
                    timestamp: 100 + article_id as i64,
                    kind: InteractionKind::View,
                    click_rank: None,
                });
            }
        }
        InteractionStore::build(&raw, &catalog, &InteractionWeights::default(), Aggregation::Sum).unwrap()
    }

    fn params() -> TrainerParams {
        TrainerParams::default()
            .with_rank(4)
            .with_iterations(15)
            .with_seed(7)
            .with_negative_ratio(0.5)
    }

    #[test]
    fn test_matrix_from_store() {
        let matrix = InteractionMatrix::from_store(&create_test_store());

        assert_eq!(matrix.num_users(), 6);
        assert_eq!(matrix.num_articles(), 6);
        assert_eq!(matrix.nnz(), 16);
        assert_eq!(matrix.row(0).len(), 2);
    }

    #[test]
    fn test_matrix_filters_light_users() {
        let matrix = InteractionMatrix::from_store_filtered(&create_test_store(), 3);

        assert_eq!(matrix.num_users(), 4);
        assert!(!matrix.users().contains(&1));
    }

    #[test]
    fn test_cholesky_solve() {
        // [4 2; 2 3] x = [2; 5] => x = [-0.5, 2]
        let a = [4.0, 0.0, 2.0, 3.0];
        let x = cholesky_solve(&a, &[2.0, 5.0], 2).unwrap();

        assert!((x[0] + 0.5).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
        assert!(cholesky_solve(&[-1.0], &[1.0], 1).is_none());
    }

    #[test]
    fn test_rank_zero_is_invalid_config() {
        let matrix = InteractionMatrix::from_store(&create_test_store());
        let err = AlsTrainer::new().fit(&matrix, &params().with_rank(0)).unwrap_err();

        assert!(matches!(err, ScoringError::InvalidConfig(_)));
    }

    #[test]
    fn test_empty_matrix_is_insufficient_data() {
        let matrix = InteractionMatrix::from_store(&InteractionStore::new());
        let err = AlsTrainer::new().fit(&matrix, &params()).unwrap_err();

        assert!(err.is_insufficient_data());
    }

    #[test]
    fn test_fit_is_deterministic() {
        let matrix = InteractionMatrix::from_store(&create_test_store());
        let first = AlsTrainer::new().fit(&matrix, &params()).unwrap();
        let second = AlsTrainer::new().fit(&matrix, &params()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.rank(), 4);
        assert_eq!(first.training_interactions(), 16);
    }

    #[test]
    fn test_fit_learns_reader_groups() {
        let matrix = InteractionMatrix::from_store(&create_test_store());
        let model = AlsTrainer::new().fit(&matrix, &params()).unwrap();

        let own_group = model.predict(1, 1).unwrap();
        let other_group = model.predict(1, 5).unwrap();
        assert!(own_group > 0.5, "observed pair predicted {}", own_group);
        assert!(own_group > other_group + 0.3);
    }

    #[test]
    fn test_unknown_user_is_insufficient_data() {
        let matrix = InteractionMatrix::from_store(&create_test_store());
        let model = AlsTrainer::new().fit(&matrix, &params()).unwrap();

        assert!(model.predict(99, 1).unwrap_err().is_insufficient_data());
        assert!(model.predict(1, 99).unwrap_err().is_insufficient_data());
        assert!(model.score_user(99, &HashSet::new()).unwrap_err().is_insufficient_data());
    }

    #[test]
    fn test_scorer_excludes_read_articles() {
        let store = create_test_store();
        let matrix = InteractionMatrix::from_store(&store);
        let model = AlsTrainer::new().fit(&matrix, &params()).unwrap();
        let catalog = ArticleCatalog::from_articles((1..=6).map(|id| Article {
            id,
            category_id: 1,
            published_at: id as i64,
            words_count: 100,
        }));
        let scorer = CollaborativeScorer::new(Arc::new(model), Arc::new(catalog));

        let context = crate::user_context::build_user_context(&store, 1);
        let results = scorer.score(&context, 10).unwrap();

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| !context.has_read(r.article_id)));
        assert_eq!(results[0].article_id, 3);
    }

    #[test]
    fn test_corrupt_parts_rejected() {
        let parts = ModelParts {
            version: 1,
            rank: 2,
            trained_at: 0,
            training_interactions: 0,
            users: vec![1],
            articles: vec![1, 2],
            user_factors: vec![0.1, 0.2],
            article_factors: vec![0.1, 0.2, 0.3],
        };
        assert!(matches!(
            LatentFactorModel::from_parts(parts),
            Err(ScoringError::CorruptModel(_))
        ));
    }

    #[test]
    fn test_model_json_keeps_factors() {
        let matrix = InteractionMatrix::from_store(&create_test_store());
        let model = AlsTrainer::new().fit(&matrix, &params()).unwrap().with_version(3);

        let json = serde_json::to_string(&model).unwrap();
        let restored: LatentFactorModel = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.version(), 3);
        assert_eq!(restored.user_vector(2), model.user_vector(2));
    }
}
