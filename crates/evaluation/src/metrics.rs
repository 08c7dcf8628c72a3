//! Ranking and rating metrics.
//!
//! ## Definitions (per evaluated user u with held-out set T_u)
//! - hits@N = |top-N ∩ T_u|
//! - Recall@N = hits@N / min(N, |T_u|)
//! - full Recall@N = hits@N / |T_u|
//! - Hit@N = 1 if hits@N > 0
//! - Precision@N = hits@N / N
//! - F1@N = harmonic mean of Precision@N and full Recall@N, 0 with no hits
//!
//! Each is averaged over evaluated users.

use data_loader::ArticleId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Distinct relevant articles among the first `n` recommendations
pub fn hits_at(recommended: &[ArticleId], truth: &HashSet<ArticleId>, n: usize) -> usize {
    let mut seen = HashSet::new();
    recommended
        .iter()
        .take(n)
        .filter(|id| truth.contains(id) && seen.insert(**id))
        .count()
}

/// Recall with the `min(N, |T|)` denominator; 0 for an empty truth set
pub fn recall_at(hits: usize, n: usize, truth_len: usize) -> f64 {
    let denominator = n.min(truth_len);
    if denominator == 0 {
        0.0
    } else {
        hits as f64 / denominator as f64
    }
}

/// Harmonic mean of `hits / n` and `hits / truth_len`
pub fn f1_at(hits: usize, n: usize, truth_len: usize) -> f64 {
    if hits == 0 || n == 0 || truth_len == 0 {
        return 0.0;
    }
    let precision = hits as f64 / n as f64;
    let recall = hits as f64 / truth_len as f64;
    2.0 * precision * recall / (precision + recall)
}

/// Averages at one cutoff
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CutoffMetrics {
    pub n: usize,
    pub recall: f64,
    pub full_recall: f64,
    pub hit_rate: f64,
    pub precision: f64,
    pub f1: f64,
    /// Sum of hits over all evaluated users
    pub total_hits: usize,
}

/// Running sums for one cutoff, reduced in a fixed user order
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CutoffAccumulator {
    recall: f64,
    full_recall: f64,
    hit_users: usize,
    precision: f64,
    f1: f64,
    total_hits: usize,
}

impl CutoffAccumulator {
    pub(crate) fn add(&mut self, hits: usize, n: usize, truth_len: usize) {
        self.recall += recall_at(hits, n, truth_len);
        if truth_len > 0 {
            self.full_recall += hits as f64 / truth_len as f64;
        }
        if hits > 0 {
            self.hit_users += 1;
        }
        self.precision += hits as f64 / n as f64;
        self.f1 += f1_at(hits, n, truth_len);
        self.total_hits += hits;
    }

    pub(crate) fn finish(self, n: usize, users: usize) -> CutoffMetrics {
        let mean = |sum: f64| if users == 0 { 0.0 } else { sum / users as f64 };
        CutoffMetrics {
            n,
            recall: mean(self.recall),
            full_recall: mean(self.full_recall),
            hit_rate: mean(self.hit_users as f64),
            precision: mean(self.precision),
            f1: mean(self.f1),
            total_hits: self.total_hits,
        }
    }
}

/// Root mean squared error over the held-out pairs a model could predict
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RmseReport {
    /// None when no pair could be predicted
    pub rmse: Option<f64>,
    pub predicted: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RmseAccumulator {
    squared_error: f64,
    predicted: usize,
    skipped: usize,
}

impl RmseAccumulator {
    pub(crate) fn add(&mut self, predicted: Option<f32>, actual: f32) {
        match predicted {
            Some(p) if p.is_finite() => {
                let err = p as f64 - actual as f64;
                self.squared_error += err * err;
                self.predicted += 1;
            }
            _ => self.skipped += 1,
        }
    }

    pub(crate) fn finish(self) -> RmseReport {
        RmseReport {
            rmse: (self.predicted > 0).then(|| (self.squared_error / self.predicted as f64).sqrt()),
            predicted: self.predicted,
            skipped: self.skipped,
        }
    }
}
