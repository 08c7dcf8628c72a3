//! Core traits for the filtering pipeline.
//!
//! This module defines the Filter trait that allows composable,
//! extensible filters to be applied to scored article lists.

use anyhow::Result;
use sources::{ScoredArticle, UserContext};

/// Core trait for filtering ranked articles.
///
/// Filters take ownership of the list and must keep the relative order of
/// the articles they retain.
pub trait Filter: Send + Sync {
    /// Returns the name of this filter (for logging/debugging)
    fn name(&self) -> &str;

    /// Apply this filter to a ranked list.
    ///
    /// # Arguments
    /// * `articles` - The ranked articles to filter (takes ownership)
    /// * `context` - User context with the read history
    fn apply(&self, articles: Vec<ScoredArticle>, context: &UserContext) -> Result<Vec<ScoredArticle>>;
}
