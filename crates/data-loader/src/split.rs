//! Temporal train/test split.
//!
//! Interactions strictly before the cutoff go to `train`, everything at or
//! after it goes to `test`. Users with no train history cannot be evaluated,
//! so their test interactions are dropped and counted.

use crate::error::{DataLoadError, Result};
use crate::types::{InteractionStore, Timestamp};
use serde::Serialize;
use tracing::{debug, info};

/// Result of splitting an InteractionStore at `t_split`
#[derive(Debug, Clone)]
pub struct TemporalSplit {
    pub train: InteractionStore,
    pub test: InteractionStore,
    pub t_split: Timestamp,
    /// Test-side interactions of users without any train history
    pub dropped_test_interactions: usize,
}

/// Sizes of both sides, for logs and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitSummary {
    pub t_split: Timestamp,
    pub train_interactions: usize,
    pub test_interactions: usize,
    pub train_users: usize,
    pub test_users: usize,
    pub dropped_test_interactions: usize,
}

impl TemporalSplit {
    /// Partition `store` at `t_split`.
    ///
    /// Fails if the store is empty or the cutoff would leave one side empty
    /// (`t_split <= min_ts` or `t_split > max_ts`).
    pub fn split(store: &InteractionStore, t_split: Timestamp) -> Result<Self> {
        let (min_ts, max_ts) = store
            .time_range()
            .ok_or_else(|| DataLoadError::DataIntegrity("cannot split an empty interaction store".to_string()))?;

        if t_split <= min_ts {
            return Err(DataLoadError::EmptySplit {
                t_split,
                min_ts,
                max_ts,
                side: "train",
            });
        }
        if t_split > max_ts {
            return Err(DataLoadError::EmptySplit {
                t_split,
                min_ts,
                max_ts,
                side: "test",
            });
        }

        let mut train = Vec::new();
        let mut test = Vec::new();
        let mut dropped_test_interactions = 0;

        for (user_id, interactions) in &store.user_interactions {
            let has_train = interactions.iter().any(|i| i.timestamp < t_split);
            for interaction in interactions {
                if interaction.timestamp < t_split {
                    train.push(*interaction);
                } else if has_train {
                    test.push(*interaction);
                } else {
                    dropped_test_interactions += 1;
                }
            }
            if !has_train {
                debug!(user_id, "Dropping user without train history");
            }
        }

        let split = Self {
            train: InteractionStore::from_aggregated(train),
            test: InteractionStore::from_aggregated(test),
            t_split,
            dropped_test_interactions,
        };

        let summary = split.summary();
        info!(
            t_split,
            train = summary.train_interactions,
            test = summary.test_interactions,
            dropped = summary.dropped_test_interactions,
            "Temporal split complete"
        );
        Ok(split)
    }

    /// Split at the timestamp quantile `fraction` of all interactions.
    ///
    /// The cutoff is the smallest timestamp that leaves roughly `fraction`
    /// of interactions on the train side, clamped so neither side is empty.
    pub fn at_fraction(store: &InteractionStore, fraction: f64) -> Result<Self> {
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(DataLoadError::InvalidValue {
                field: "split fraction".to_string(),
                value: fraction.to_string(),
            });
        }

        let mut timestamps: Vec<Timestamp> = store.iter().map(|i| i.timestamp).collect();
        if timestamps.is_empty() {
            return Err(DataLoadError::DataIntegrity(
                "cannot split an empty interaction store".to_string(),
            ));
        }
        timestamps.sort_unstable();
        let (min_ts, max_ts) = (timestamps[0], timestamps[timestamps.len() - 1]);
        // One distinct timestamp cannot feed both sides
        if min_ts == max_ts {
            return Err(DataLoadError::EmptySplit {
                t_split: min_ts,
                min_ts,
                max_ts,
                side: "train",
            });
        }

        let index = ((timestamps.len() as f64 * fraction).floor() as usize).clamp(1, timestamps.len() - 1);
        let mut t_split = timestamps[index];
        // All interactions before `index` share this timestamp: move the cutoff up
        if t_split == timestamps[0] {
            if let Some(next) = timestamps.iter().copied().find(|&t| t > t_split) {
                t_split = next;
            }
        }

        Self::split(store, t_split)
    }

    pub fn summary(&self) -> SplitSummary {
        SplitSummary {
            t_split: self.t_split,
            train_interactions: self.train.len(),
            test_interactions: self.test.len(),
            train_users: self.train.user_count(),
            test_users: self.test.user_count(),
            dropped_test_interactions: self.dropped_test_interactions,
        }
    }
}
