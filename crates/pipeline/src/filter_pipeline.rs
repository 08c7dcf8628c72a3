//! The FilterPipeline orchestrates multiple filters.
//!
//! This module provides the main FilterPipeline struct that chains
//! multiple filters together using the builder pattern.

use crate::filters::{AlreadyReadFilter, DedupFilter};
use crate::traits::Filter;
use anyhow::Result;
use sources::{ScoredArticle, UserContext};

/// Chains multiple filters together into a processing pipeline.
///
/// ## Usage
/// ```ignore
/// let pipeline = FilterPipeline::new()
///     .add_filter(AlreadyReadFilter)
///     .add_filter(DedupFilter);
///
/// let filtered = pipeline.apply(blended, &context, k)?;
/// ```
pub struct FilterPipeline {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterPipeline {
    /// Create a new empty FilterPipeline.
    pub fn new() -> Self {
        Self { filters: Vec::new() }
    }

    /// The serving pipeline: drop read articles unless `allow_read`, then
    /// drop duplicates.
    pub fn standard(allow_read: bool) -> Self {
        let pipeline = Self::new();
        let pipeline = if allow_read {
            pipeline
        } else {
            pipeline.add_filter(AlreadyReadFilter)
        };
        pipeline.add_filter(DedupFilter)
    }

    /// Add a filter to the pipeline (builder pattern).
    pub fn add_filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Apply all filters in sequence, then keep the first `k` articles.
    pub fn apply(&self, articles: Vec<ScoredArticle>, context: &UserContext, k: usize) -> Result<Vec<ScoredArticle>> {
        let mut current = articles;
        for filter in &self.filters {
            tracing::debug!(
                "Applying filter: {} (input count: {})",
                filter.name(),
                current.len()
            );
            current = filter.apply(current, context)?;
            tracing::debug!(
                "Filter applied: {} (output count: {})",
                filter.name(),
                current.len()
            );
        }
        current.truncate(k);
        Ok(current)
    }
}

impl Default for FilterPipeline {
    fn default() -> Self {
        Self::new()
    }
}
