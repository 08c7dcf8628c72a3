//! Filter to remove articles the user has already read.
//!
//! Runs first in the serving pipeline; skipped when `allow_read` is set.

use crate::traits::Filter;
use anyhow::Result;
use sources::{ScoredArticle, UserContext};

/// Removes articles present in the user's read history.
///
/// ## Algorithm
/// Uses the HashSet in UserContext.read_articles for O(1) lookups.
pub struct AlreadyReadFilter;

impl Filter for AlreadyReadFilter {
    fn name(&self) -> &str {
        "AlreadyReadFilter"
    }

    fn apply(&self, articles: Vec<ScoredArticle>, context: &UserContext) -> Result<Vec<ScoredArticle>> {
        let filtered: Vec<ScoredArticle> = articles
            .into_iter()
            .filter(|article| !context.has_read(article.article_id))
            .collect();
        Ok(filtered)
    }
}
