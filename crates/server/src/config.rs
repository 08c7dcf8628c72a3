//! Engine configuration.
//!
//! Every tunable of serving and training lives here: cold-start threshold,
//! blend weight, interaction weights, trainer hyperparameters. Loaded from an
//! optional JSON file, then overridden by builder calls (the CLI maps its
//! flags onto them).

use std::path::Path;
use std::time::Duration;

use data_loader::{Aggregation, InteractionWeights};
use pipeline::Normalization;
use serde::{Deserialize, Serialize};
use sources::{ProfileWeighting, TrainerParams};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// K when the request does not give one
    pub default_k: usize,
    /// Largest K a request may ask for
    pub max_k: usize,
    /// Users with fewer train interactions than this go to cold start
    pub cold_start_threshold: usize,
    /// Keep already-read articles in results
    pub allow_read: bool,
    /// Content weight of the hybrid blend
    pub blend_alpha: f32,
    pub normalization: Normalization,
    /// Candidates each scorer contributes before blending
    pub candidate_pool_size: usize,
    /// Latency budget of one serving request
    pub request_timeout_ms: u64,
    pub profile: ProfileWeighting,
    /// Per-day decay of the popularity ranking (0 = plain counts)
    pub popularity_decay: f64,
    pub trainer: TrainerParams,
    /// Users below this many train interactions are left out of CF training
    pub min_training_interactions: usize,
    pub interaction_weights: InteractionWeights,
    pub aggregation: Aggregation,
    pub recall_cutoffs: Vec<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_k: 5,
            max_k: 50,
            cold_start_threshold: 1,
            allow_read: false,
            blend_alpha: 0.5,
            normalization: Normalization::MinMax,
            candidate_pool_size: 100,
            request_timeout_ms: 500,
            profile: ProfileWeighting::default(),
            popularity_decay: 0.0,
            trainer: TrainerParams::default(),
            min_training_interactions: 1,
            interaction_weights: InteractionWeights::default(),
            aggregation: Aggregation::Sum,
            recall_cutoffs: vec![5, 10],
        }
    }
}

impl EngineConfig {
    /// Load and validate a JSON config file. Missing fields take defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| EngineError::Config(format!("Failed to parse config file {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_k == 0 {
            return Err(EngineError::Config("default_k must be greater than 0".into()));
        }
        if self.max_k < self.default_k {
            return Err(EngineError::Config(format!(
                "max_k ({}) must be at least default_k ({})",
                self.max_k, self.default_k
            )));
        }
        if !(0.0..=1.0).contains(&self.blend_alpha) {
            return Err(EngineError::Config(format!(
                "blend_alpha must be in [0, 1], got {}",
                self.blend_alpha
            )));
        }
        if self.candidate_pool_size == 0 {
            return Err(EngineError::Config("candidate_pool_size must be greater than 0".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(EngineError::Config("request_timeout_ms must be greater than 0".into()));
        }
        if !(self.popularity_decay.is_finite() && self.popularity_decay >= 0.0) {
            return Err(EngineError::Config(format!(
                "popularity_decay must be non-negative, got {}",
                self.popularity_decay
            )));
        }
        let weights = &self.interaction_weights;
        if [weights.view, weights.like, weights.comment]
            .iter()
            .any(|w| !(w.is_finite() && *w > 0.0))
        {
            return Err(EngineError::Config(format!(
                "interaction weights must be positive, got {:?}",
                weights
            )));
        }
        if self.recall_cutoffs.is_empty() || self.recall_cutoffs.contains(&0) {
            return Err(EngineError::Config(format!(
                "recall_cutoffs must be non-empty and positive, got {:?}",
                self.recall_cutoffs
            )));
        }
        // Evaluation asks every variant for the largest cutoff
        if let Some(&largest) = self.recall_cutoffs.iter().max() {
            if largest > self.max_k {
                return Err(EngineError::Config(format!(
                    "recall cutoff {} exceeds max_k ({})",
                    largest, self.max_k
                )));
            }
        }
        self.profile.validate()?;
        self.trainer.validate()?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn with_blend_alpha(mut self, blend_alpha: f32) -> Self {
        self.blend_alpha = blend_alpha;
        self
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn with_allow_read(mut self, allow_read: bool) -> Self {
        self.allow_read = allow_read;
        self
    }

    pub fn with_cold_start_threshold(mut self, threshold: usize) -> Self {
        self.cold_start_threshold = threshold;
        self
    }

    pub fn with_request_timeout_ms(mut self, request_timeout_ms: u64) -> Self {
        self.request_timeout_ms = request_timeout_ms;
        self
    }

    pub fn with_profile(mut self, profile: ProfileWeighting) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_trainer(mut self, trainer: TrainerParams) -> Self {
        self.trainer = trainer;
        self
    }

    pub fn with_popularity_decay(mut self, decay: f64) -> Self {
        self.popularity_decay = decay;
        self
    }

    pub fn with_recall_cutoffs(mut self, cutoffs: Vec<usize>) -> Self {
        self.recall_cutoffs = cutoffs;
        self
    }
}
