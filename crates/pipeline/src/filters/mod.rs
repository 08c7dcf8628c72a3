//! Filter implementations for the recommendation pipeline.
//!
//! This module contains all the concrete filter implementations
//! that can be composed into a FilterPipeline.

pub mod already_read;
pub mod dedup;

// Re-export for convenience
pub use already_read::AlreadyReadFilter;
pub use dedup::DedupFilter;
