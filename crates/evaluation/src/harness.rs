//! The evaluation protocol shared by every model variant.
//!
//! ## Protocol
//! 1. Evaluated users = test users that have train history
//! 2. Ask the model for the top max(N) articles per user (in parallel)
//! 3. Reduce per-user hits in ascending user id order
//! 4. RMSE over every held-out (user, article, weight) triple the model can predict
//!
//! A user whose recommendation call fails counts as zero hits and is
//! reported in `failed_users`.

use crate::error::{EvaluationError, Result};
use crate::metrics::{hits_at, CutoffAccumulator, CutoffMetrics, RmseAccumulator, RmseReport};
use crate::Recommender;
use data_loader::{ArticleId, TemporalSplit, UserId};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Metrics of one model over one split
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub model: String,
    pub users: usize,
    pub failed_users: usize,
    pub metrics: Vec<CutoffMetrics>,
    pub rmse: RmseReport,
}

impl EvaluationReport {
    pub fn at(&self, n: usize) -> Option<&CutoffMetrics> {
        self.metrics.iter().find(|m| m.n == n)
    }

    /// Recall@N with the capped denominator
    pub fn recall_at(&self, n: usize) -> Option<f64> {
        self.at(n).map(|m| m.recall)
    }
}

/// Reports of several models against one baseline
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub baseline: String,
    pub reports: Vec<EvaluationReport>,
}

impl ComparisonReport {
    pub fn baseline_report(&self) -> Option<&EvaluationReport> {
        self.reports.iter().find(|r| r.model == self.baseline)
    }

    /// Recall@N of `model` divided by the baseline's; None if either is missing or the baseline is 0
    pub fn lift(&self, model: &str, n: usize) -> Option<f64> {
        let base = self.baseline_report()?.recall_at(n)?;
        let value = self.reports.iter().find(|r| r.model == model)?.recall_at(n)?;
        (base > 0.0).then(|| value / base)
    }

    /// Model with the highest Recall@N; earlier models win ties
    pub fn best_at(&self, n: usize) -> Option<&EvaluationReport> {
        self.reports.iter().fold(None, |best: Option<&EvaluationReport>, report| {
            match (best.and_then(|b| b.recall_at(n)), report.recall_at(n)) {
                (Some(b), Some(r)) if r <= b => best,
                (_, Some(_)) => Some(report),
                _ => best,
            }
        })
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cutoffs: Vec<usize> = self
            .reports
            .first()
            .map(|r| r.metrics.iter().map(|m| m.n).collect())
            .unwrap_or_default();

        write!(f, "{:<28}", "model")?;
        for n in &cutoffs {
            write!(f, " {:>10}", format!("R@{}", n))?;
        }
        for n in &cutoffs {
            write!(f, " {:>10}", format!("F1@{}", n))?;
        }
        writeln!(f, " {:>10} {:>8}", "RMSE", "users")?;

        for report in &self.reports {
            write!(f, "{:<28}", report.model)?;
            for n in &cutoffs {
                match report.recall_at(*n) {
                    Some(r) => write!(f, " {:>10.4}", r)?,
                    None => write!(f, " {:>10}", "-")?,
                }
            }
            for n in &cutoffs {
                match report.at(*n) {
                    Some(m) => write!(f, " {:>10.4}", m.f1)?,
                    None => write!(f, " {:>10}", "-")?,
                }
            }
            match report.rmse.rmse {
                Some(rmse) => write!(f, " {:>10.4}", rmse)?,
                None => write!(f, " {:>10}", "-")?,
            }
            writeln!(f, " {:>8}", report.users)?;
        }
        Ok(())
    }
}

/// Per-user outcome before reduction
struct UserOutcome {
    truth_len: usize,
    hits: Vec<usize>,
    failed: bool,
}

/// Runs the same protocol against any Recommender
#[derive(Debug, Clone)]
pub struct EvaluationHarness {
    cutoffs: Vec<usize>,
}

impl EvaluationHarness {
    /// Cutoffs are sorted and deduplicated; each must be positive
    pub fn new(cutoffs: &[usize]) -> Result<Self> {
        if cutoffs.is_empty() {
            return Err(EvaluationError::NoCutoffs);
        }
        if let Some(&bad) = cutoffs.iter().find(|&&n| n == 0) {
            return Err(EvaluationError::InvalidCutoff(bad));
        }
        let mut cutoffs = cutoffs.to_vec();
        cutoffs.sort_unstable();
        cutoffs.dedup();
        Ok(Self { cutoffs })
    }

    pub fn cutoffs(&self) -> &[usize] {
        &self.cutoffs
    }

    fn max_cutoff(&self) -> usize {
        self.cutoffs.last().copied().unwrap_or(0)
    }

    /// Users that can be evaluated, ascending
    pub fn evaluated_users(split: &TemporalSplit) -> Vec<UserId> {
        split
            .test
            .user_ids()
            .filter(|&u| split.train.contains_user(u))
            .collect()
    }

    /// Evaluate one model on one split
    pub fn evaluate(&self, model: &dyn Recommender, split: &TemporalSplit) -> EvaluationReport {
        let start = Instant::now();
        let users = Self::evaluated_users(split);
        let max_n = self.max_cutoff();

        let outcomes: Vec<UserOutcome> = users
            .par_iter()
            .map(|&user_id| {
                let truth: HashSet<ArticleId> = split
                    .test
                    .user_interactions(user_id)
                    .iter()
                    .map(|i| i.article_id)
                    .collect();

                match model.recommend(user_id, max_n) {
                    Ok(recommended) => UserOutcome {
                        truth_len: truth.len(),
                        hits: self.cutoffs.iter().map(|&n| hits_at(&recommended, &truth, n)).collect(),
                        failed: false,
                    },
                    Err(e) => {
                        debug!(user_id, "Recommendation failed: {:#}", e);
                        UserOutcome {
                            truth_len: truth.len(),
                            hits: vec![0; self.cutoffs.len()],
                            failed: true,
                        }
                    }
                }
            })
            .collect();

        // Ascending user order keeps the float sums bit-identical across runs
        let mut accumulators = vec![CutoffAccumulator::default(); self.cutoffs.len()];
        let mut failed_users = 0;
        for outcome in &outcomes {
            failed_users += usize::from(outcome.failed);
            for ((acc, &n), &hits) in accumulators.iter_mut().zip(&self.cutoffs).zip(&outcome.hits) {
                acc.add(hits, n, outcome.truth_len);
            }
        }
        if failed_users > 0 {
            warn!("{}: {} of {} users failed to score", model.name(), failed_users, users.len());
        }

        let mut rmse = RmseAccumulator::default();
        for interaction in split.test.iter() {
            rmse.add(
                model.predict(interaction.user_id, interaction.article_id),
                interaction.weight,
            );
        }

        let report = EvaluationReport {
            model: model.name().to_string(),
            users: users.len(),
            failed_users,
            metrics: accumulators
                .into_iter()
                .zip(&self.cutoffs)
                .map(|(acc, &n)| acc.finish(n, users.len()))
                .collect(),
            rmse: rmse.finish(),
        };

        info!(
            model = %report.model,
            users = report.users,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Evaluation complete"
        );
        report
    }

    /// Evaluate several models and compare them to `baseline`
    pub fn compare(&self, models: &[&dyn Recommender], baseline: &str, split: &TemporalSplit) -> Result<ComparisonReport> {
        if !models.iter().any(|m| m.name() == baseline) {
            return Err(EvaluationError::UnknownBaseline(baseline.to_string()));
        }
        let reports = models.iter().map(|model| self.evaluate(*model, split)).collect();
        Ok(ComparisonReport {
            baseline: baseline.to_string(),
            reports,
        })
    }
}

impl Default for EvaluationHarness {
    fn default() -> Self {
        Self { cutoffs: vec![5, 10] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{Interaction, InteractionStore};
    use std::collections::HashMap;

    fn interaction(user_id: UserId, article_id: ArticleId, timestamp: i64) -> Interaction {
        Interaction {
            user_id,
            article_id,
            timestamp,
            weight: 1.0,
            click_rank: None,
            count: 1,
        }
    }

    fn create_test_split() -> TemporalSplit {
        let store = InteractionStore::from_aggregated(vec![
            interaction(1, 1, 10),
            interaction(1, 2, 20),
            interaction(1, 3, 200),
            interaction(1, 4, 210),
            interaction(2, 1, 15),
            interaction(2, 5, 220),
            // Only after the cutoff: never evaluated
            interaction(3, 6, 300),
        ]);
        TemporalSplit::split(&store, 100).unwrap()
    }

    /// Fixed lists per user
    struct FixedRecommender {
        lists: HashMap<UserId, Vec<ArticleId>>,
    }

    impl Recommender for FixedRecommender {
        fn name(&self) -> &str {
            "fixed"
        }

        fn recommend(&self, user_id: UserId, n: usize) -> anyhow::Result<Vec<ArticleId>> {
            match self.lists.get(&user_id) {
                Some(list) => Ok(list.iter().copied().take(n).collect()),
                None => anyhow::bail!("no list for user {}", user_id),
            }
        }

        fn predict(&self, _user_id: UserId, article_id: ArticleId) -> Option<f32> {
            (article_id != 5).then_some(0.5)
        }
    }

    #[test]
    fn test_test_only_users_are_not_evaluated() {
        let split = create_test_split();
        assert_eq!(EvaluationHarness::evaluated_users(&split), vec![1, 2]);
    }

    #[test]
    fn test_recall_and_failures() {
        let split = create_test_split();
        let model = FixedRecommender {
            lists: [(1, vec![3, 9, 9, 4, 8])].into_iter().collect(),
        };
        let report = EvaluationHarness::new(&[1, 5]).unwrap().evaluate(&model, &split);

        assert_eq!(report.users, 2);
        assert_eq!(report.failed_users, 1);
        // User 1: hit at rank 1, both test articles by rank 5; user 2 failed
        assert_eq!(report.recall_at(1), Some(0.5));
        assert_eq!(report.recall_at(5), Some(0.5));
        assert_eq!(report.at(5).unwrap().total_hits, 2);
        // User 1 at N=1: precision 1, recall 1/2; at N=5: precision 2/5, recall 1
        assert!((report.at(1).unwrap().f1 - 1.0 / 3.0).abs() < 1e-12);
        assert!((report.at(5).unwrap().f1 - 2.0 / 7.0).abs() < 1e-12);

        // Three test pairs for evaluated users, article 5 cannot be predicted
        assert_eq!(report.rmse.predicted, 2);
        assert_eq!(report.rmse.skipped, 1);
        assert!((report.rmse.rmse.unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let split = create_test_split();
        let model = FixedRecommender {
            lists: [(1, vec![4, 3]), (2, vec![7, 5])].into_iter().collect(),
        };
        let harness = EvaluationHarness::default();

        assert_eq!(harness.evaluate(&model, &split), harness.evaluate(&model, &split));
    }

    #[test]
    fn test_invalid_cutoffs() {
        assert!(matches!(EvaluationHarness::new(&[]), Err(EvaluationError::NoCutoffs)));
        assert!(matches!(EvaluationHarness::new(&[5, 0]), Err(EvaluationError::InvalidCutoff(0))));
        assert_eq!(EvaluationHarness::new(&[10, 5, 10]).unwrap().cutoffs(), &[5, 10]);
    }

    #[test]
    fn test_compare_requires_known_baseline() {
        let split = create_test_split();
        let model = FixedRecommender { lists: HashMap::new() };
        let harness = EvaluationHarness::default();

        let err = harness.compare(&[&model], "popularity", &split).unwrap_err();
        assert!(matches!(err, EvaluationError::UnknownBaseline(_)));

        let comparison = harness.compare(&[&model], "fixed", &split).unwrap();
        assert_eq!(comparison.lift("fixed", 5), None);
        let table = comparison.to_string();
        assert!(table.contains("fixed"));
        assert!(table.contains("F1@5"));
    }
}
