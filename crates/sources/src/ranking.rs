//! Deterministic top-K selection shared by every scorer.
//!
//! Order: score descending, then newer `published_at`, then lower article id.
//! Scores compare with `total_cmp`, so the order is total even for infinities.

use crate::types::ScoredArticle;
use std::cmp::Ordering;

/// Ranking order of two scored articles
pub fn compare_ranked(a: &ScoredArticle, b: &ScoredArticle) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.published_at.cmp(&a.published_at))
        .then_with(|| a.article_id.cmp(&b.article_id))
}

/// Keep the best `k` articles in ranking order
pub fn top_k(mut scored: Vec<ScoredArticle>, k: usize) -> Vec<ScoredArticle> {
    if k == 0 {
        return Vec::new();
    }
    if scored.len() > k {
        scored.select_nth_unstable_by(k - 1, compare_ranked);
        scored.truncate(k);
    }
    scored.sort_by(compare_ranked);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScoreSource;
    use proptest::prelude::*;

    fn scored(article_id: u32, score: f32, published_at: i64) -> ScoredArticle {
        ScoredArticle::new(article_id, score, published_at, ScoreSource::Content)
    }

    #[test]
    fn test_tie_broken_by_recency_then_id() {
        let ranked = top_k(
            vec![
                scored(1, 0.5, 100),
                scored(2, 0.5, 200),
                scored(3, 0.9, 0),
                scored(4, 0.5, 200),
            ],
            4,
        );
        let ids: Vec<u32> = ranked.iter().map(|s| s.article_id).collect();

        assert_eq!(ids, vec![3, 2, 4, 1]);
    }

    #[test]
    fn test_truncates_to_k() {
        let ranked = top_k((0..10).map(|i| scored(i, i as f32, 0)).collect(), 3);
        let ids: Vec<u32> = ranked.iter().map(|s| s.article_id).collect();

        assert_eq!(ids, vec![9, 8, 7]);
        assert!(top_k(vec![scored(1, 1.0, 0)], 0).is_empty());
    }

    #[test]
    fn test_nan_never_outranks_real_scores() {
        let ranked = top_k(vec![scored(1, f32::NAN, 0), scored(2, -5.0, 0)], 2);
        assert_eq!(ranked[0].article_id, 2);
    }

    proptest! {
        #[test]
        fn prop_top_k_is_prefix_of_full_sort(
            items in prop::collection::vec((0u32..1000, -10i32..10, 0i64..5), 0..60),
            k in 0usize..20,
        ) {
            let mut seen = std::collections::HashSet::new();
            let list: Vec<ScoredArticle> = items
                .into_iter()
                .filter(|(id, _, _)| seen.insert(*id))
                .map(|(id, s, p)| scored(id, s as f32 / 4.0, p))
                .collect();

            let mut full = list.clone();
            full.sort_by(compare_ranked);
            let top = top_k(list, k);

            prop_assert!(top.len() <= k);
            prop_assert_eq!(&top[..], &full[..top.len()]);
        }
    }
}
