//! Filter to drop repeated articles, keeping the first (best ranked) one.

use crate::traits::Filter;
use anyhow::Result;
use sources::{ScoredArticle, UserContext};
use std::collections::HashSet;

pub struct DedupFilter;

impl Filter for DedupFilter {
    fn name(&self) -> &str {
        "DedupFilter"
    }

    fn apply(&self, articles: Vec<ScoredArticle>, _context: &UserContext) -> Result<Vec<ScoredArticle>> {
        let mut seen = HashSet::with_capacity(articles.len());
        Ok(articles
            .into_iter()
            .filter(|article| seen.insert(article.article_id))
            .collect())
    }
}
