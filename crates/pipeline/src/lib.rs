//! Blending and filtering of scored news articles.
//!
//! This crate provides:
//! - HybridBlender for combining content and collaborative scores
//! - Filter trait and implementations for post-blend filtering
//! - FilterPipeline for composing filters
//!
//! ## Architecture
//! Scored lists are processed in stages:
//! 1. Each scorer's list is normalized to [0, 1] on its own
//! 2. HybridBlender combines them over the union of candidates
//! 3. Filters remove read and duplicate articles, then the list is cut to K
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{FilterPipeline, HybridBlender, Normalization};
//!
//! let blender = HybridBlender::new(0.5)?.with_normalization(Normalization::MinMax);
//! let blended = blender.blend(&content, &collaborative, pool_size);
//!
//! let pipeline = FilterPipeline::standard(false);
//! let recommendations = pipeline.apply(blended, &context, k)?;
//! ```

pub mod blender;
pub mod filter_pipeline;
pub mod filters;
pub mod traits;

// Re-export main types
pub use blender::{normalize, HybridBlender, Normalization};
pub use filter_pipeline::FilterPipeline;
pub use traits::Filter;
