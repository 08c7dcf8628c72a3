//! Hybrid Blender
//!
//! Content and collaborative scores live on different scales (cosine vs raw
//! dot product), so each list is normalized to [0, 1] on its own before the
//! weighted sum. The blend runs over the union of both lists; an article
//! missing from one side scores 0 on that side.

use serde::{Deserialize, Serialize};
use sources::{top_k, Result, ScoreSource, ScoredArticle, ScoringError};
use std::collections::BTreeMap;
use tracing::debug;

/// How a score list is mapped onto [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// `(s − min) / (max − min)`; a list of equal scores maps to 1.0
    #[default]
    MinMax,
    /// `(n − position) / n` in ranking order; tied scores share a position
    Rank,
}

/// Normalize the scores of one list, in input order
pub fn normalize(scores: &[ScoredArticle], method: Normalization) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }

    match method {
        Normalization::MinMax => {
            let finite = scores.iter().map(|s| s.score).filter(|s| s.is_finite());
            let (min, max) = finite.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), s| (lo.min(s), hi.max(s)));
            scores
                .iter()
                .map(|s| {
                    if !s.score.is_finite() || min > max {
                        0.0
                    } else if max == min {
                        1.0
                    } else {
                        ((s.score as f64 - min as f64) / (max as f64 - min as f64)) as f32
                    }
                })
                .collect()
        }
        Normalization::Rank => {
            let n = scores.len();
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by(|&a, &b| scores[b].score.total_cmp(&scores[a].score));

            let mut normalized = vec![0.0f32; n];
            let mut position = 0;
            for (rank, &idx) in order.iter().enumerate() {
                if rank > 0 && scores[order[rank - 1]].score.total_cmp(&scores[idx].score).is_ne() {
                    position = rank;
                }
                normalized[idx] = (n - position) as f32 / n as f32;
            }
            normalized
        }
    }
}

/// Weighted blend of content and collaborative scores
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridBlender {
    alpha: f32,
    normalization: Normalization,
}

impl HybridBlender {
    /// `alpha` is the content weight; must lie in [0, 1]
    pub fn new(alpha: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(ScoringError::InvalidConfig(format!(
                "blend alpha must be in [0, 1], got {}",
                alpha
            )));
        }
        Ok(Self {
            alpha,
            normalization: Normalization::default(),
        })
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Blend both lists and keep the top `k`
    pub fn blend(&self, content: &[ScoredArticle], collaborative: &[ScoredArticle], k: usize) -> Vec<ScoredArticle> {
        let content_norm = normalize(content, self.normalization);
        let cf_norm = normalize(collaborative, self.normalization);

        // article -> (content, cf, published_at)
        let mut union: BTreeMap<u32, (f32, f32, i64)> = BTreeMap::new();
        for (scored, norm) in content.iter().zip(&content_norm) {
            let entry = union.entry(scored.article_id).or_insert((0.0, 0.0, scored.published_at));
            entry.0 = entry.0.max(*norm);
        }
        for (scored, norm) in collaborative.iter().zip(&cf_norm) {
            let entry = union.entry(scored.article_id).or_insert((0.0, 0.0, scored.published_at));
            entry.1 = entry.1.max(*norm);
            entry.2 = entry.2.max(scored.published_at);
        }

        debug!(
            "Blending {} content and {} collaborative scores into {} candidates",
            content.len(),
            collaborative.len(),
            union.len()
        );

        let blended = union
            .into_iter()
            .map(|(article_id, (c, f, published_at))| {
                let score = self.alpha * c + (1.0 - self.alpha) * f;
                ScoredArticle::new(article_id, score, published_at, ScoreSource::Hybrid)
            })
            .collect();
        top_k(blended, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sources::compare_ranked;

    fn scored(article_id: u32, score: f32, published_at: i64, source: ScoreSource) -> ScoredArticle {
        ScoredArticle::new(article_id, score, published_at, source)
    }

    #[test]
    fn test_min_max_normalization() {
        let list = vec![
            scored(1, 2.0, 0, ScoreSource::Content),
            scored(2, 4.0, 0, ScoreSource::Content),
            scored(3, 3.0, 0, ScoreSource::Content),
        ];
        assert_eq!(normalize(&list, Normalization::MinMax), vec![0.0, 1.0, 0.5]);

        let flat = vec![scored(1, 0.3, 0, ScoreSource::Content), scored(2, 0.3, 0, ScoreSource::Content)];
        assert_eq!(normalize(&flat, Normalization::MinMax), vec![1.0, 1.0]);
    }

    #[test]
    fn test_rank_normalization_shares_ties() {
        let list = vec![
            scored(1, 0.1, 0, ScoreSource::Content),
            scored(2, 0.9, 0, ScoreSource::Content),
            scored(3, 0.9, 0, ScoreSource::Content),
            scored(4, 0.5, 0, ScoreSource::Content),
        ];
        assert_eq!(normalize(&list, Normalization::Rank), vec![0.25, 1.0, 1.0, 0.5]);
    }

    #[test]
    fn test_alpha_out_of_range() {
        assert!(HybridBlender::new(-0.1).is_err());
        assert!(HybridBlender::new(1.5).is_err());
        assert!(HybridBlender::new(f32::NAN).is_err());
        assert!(HybridBlender::new(0.0).is_ok());
        assert!(HybridBlender::new(1.0).is_ok());
    }

    #[test]
    fn test_union_with_missing_side_scoring_zero() {
        let content = vec![scored(1, 0.9, 0, ScoreSource::Content), scored(2, 0.1, 0, ScoreSource::Content)];
        let cf = vec![scored(3, 5.0, 0, ScoreSource::Collaborative), scored(2, 1.0, 0, ScoreSource::Collaborative)];

        let blended = HybridBlender::new(0.5).unwrap().blend(&content, &cf, 10);
        let ids: Vec<u32> = blended.iter().map(|s| s.article_id).collect();

        // 1 -> 0.5, 3 -> 0.5, 2 -> 0.0; tie between 1 and 3 goes to the lower id
        assert_eq!(ids, vec![1, 3, 2]);
        assert!(blended.iter().all(|s| s.source == ScoreSource::Hybrid));
    }

    #[test]
    fn test_tie_broken_by_recency() {
        let content = vec![scored(1, 1.0, 100, ScoreSource::Content), scored(2, 1.0, 200, ScoreSource::Content)];
        let blended = HybridBlender::new(1.0).unwrap().blend(&content, &[], 2);

        assert_eq!(blended[0].article_id, 2);
        assert_eq!(blended[0].score, blended[1].score);
    }

    proptest! {
        #[test]
        fn prop_extreme_alpha_reproduces_single_ranking(
            raw in prop::collection::vec((-50i32..50, -50i32..50, 0i64..3), 1..40),
        ) {
            // Identical candidate sets on both sides
            let content: Vec<ScoredArticle> = raw
                .iter()
                .enumerate()
                .map(|(i, (c, _, p))| scored(i as u32, *c as f32 / 10.0, *p, ScoreSource::Content))
                .collect();
            let cf: Vec<ScoredArticle> = raw
                .iter()
                .enumerate()
                .map(|(i, (_, f, p))| scored(i as u32, *f as f32, *p, ScoreSource::Collaborative))
                .collect();
            let k = raw.len();

            let expected_ids = |list: &[ScoredArticle]| {
                let mut sorted = list.to_vec();
                sorted.sort_by(compare_ranked);
                sorted.iter().map(|s| s.article_id).collect::<Vec<_>>()
            };
            let ids = |list: Vec<ScoredArticle>| list.iter().map(|s| s.article_id).collect::<Vec<_>>();

            let pure_content = HybridBlender::new(1.0).unwrap().blend(&content, &cf, k);
            prop_assert_eq!(ids(pure_content), expected_ids(&content));

            let pure_cf = HybridBlender::new(0.0).unwrap().blend(&content, &cf, k);
            prop_assert_eq!(ids(pure_cf), expected_ids(&cf));
        }
    }
}
