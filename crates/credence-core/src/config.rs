//! Scoring and explainer settings
//!
//! `Default` reads `CREDENCE_*` environment variables so binaries pick up
//! deployment overrides without extra wiring.

use serde::{Deserialize, Serialize};

/// Contributors returned per attribution side.
pub const DEFAULT_TOP_K: usize = 5;
/// Background rows sampled from the reference set.
pub const DEFAULT_BACKGROUND_SIZE: usize = 50;
/// Feature orderings averaged by the permutation explainer.
pub const DEFAULT_PERMUTATIONS: usize = 8;

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .filter(|n| *n > 0)
}

/// Per-request scoring settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Contributors kept on each side of an attribution
    pub top_k: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            top_k: env_usize("CREDENCE_TOP_K").unwrap_or(DEFAULT_TOP_K),
        }
    }
}

impl ScoringConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

/// Settings for the explainer built at each activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainerConfig {
    /// Upper bound on background rows drawn from the reference set
    pub background_size: usize,
    /// Number of feature orderings averaged per background row
    pub permutations: usize,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            background_size: env_usize("CREDENCE_BACKGROUND_SIZE")
                .unwrap_or(DEFAULT_BACKGROUND_SIZE),
            permutations: env_usize("CREDENCE_PERMUTATIONS").unwrap_or(DEFAULT_PERMUTATIONS),
        }
    }
}

impl ExplainerConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config with explicit values, ignoring the environment
    pub fn new(background_size: usize, permutations: usize) -> Self {
        Self {
            background_size,
            permutations,
        }
    }
}
