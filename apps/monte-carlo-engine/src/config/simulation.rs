//! Batch run configuration.

use serde::{Deserialize, Serialize};

use crate::simulation::{BatchConfig, ExecutionMode};

/// Batch run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Total trials the store should hold.
    #[serde(default = "default_target_trials")]
    pub target_trials: usize,
    /// `sequential` or `parallel`.
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Trials between store flushes.
    #[serde(default = "default_flush_every")]
    pub flush_every: usize,
    /// Worker threads for parallel mode (default: half the hardware threads).
    #[serde(default)]
    pub workers: Option<usize>,
    /// Seed for reproducible draws.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            target_trials: default_target_trials(),
            mode: ExecutionMode::default(),
            flush_every: default_flush_every(),
            workers: None,
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Driver configuration for this section.
    #[must_use]
    pub const fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            target: self.target_trials,
            mode: self.mode,
            flush_every: self.flush_every,
            workers: self.workers,
            seed: self.seed,
        }
    }
}

const fn default_target_trials() -> usize {
    10_000
}

const fn default_flush_every() -> usize {
    100
}
