//! Record definitions for published model versions
//!
//! Collections:
//! - artifacts: serialized predictors keyed by (version, model type)
//! - metadata: one `VersionMetadata` per version
//! - reference sets: the smoother's training split, one per version (optional)

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Decision threshold used when a version does not carry its own.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Neighbor count used when a version does not carry its own.
pub const DEFAULT_K: usize = 5;

/// Tag identifying one trained predictor inside a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelType {
    PrimaryClassifier,
    SecondaryClassifier,
    LinearBaseline,
}

impl ModelType {
    /// Every model type, in store-key order.
    pub const ALL: [ModelType; 3] = [
        ModelType::PrimaryClassifier,
        ModelType::SecondaryClassifier,
        ModelType::LinearBaseline,
    ];

    /// Wire/store tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::PrimaryClassifier => "primary-classifier",
            ModelType::SecondaryClassifier => "secondary-classifier",
            ModelType::LinearBaseline => "linear-baseline",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown model type: {}", s))
    }
}

/// Distance used by the calibration smoother's neighbor search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Manhattan,
    Chebyshev,
    Cosine,
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Manhattan => "manhattan",
            DistanceMetric::Chebyshev => "chebyshev",
            DistanceMetric::Cosine => "cosine",
        };
        f.write_str(name)
    }
}

/// Smoother hyperparameters fixed at training time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmootherParams {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default)]
    pub metric: DistanceMetric,
}

impl Default for SmootherParams {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            metric: DistanceMetric::default(),
        }
    }
}

fn default_k() -> usize {
    DEFAULT_K
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_model_types() -> Vec<ModelType> {
    ModelType::ALL.to_vec()
}

/// Metadata record published once per version.
///
/// `feature_names` is the binding contract for vectorization: scoring
/// inputs must follow exactly this order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionMetadata {
    /// Version identifier (exact-match key)
    pub version: String,
    /// When the training run produced this version
    pub created_at: DateTime<Utc>,
    /// Ordered feature names
    pub feature_names: Vec<String>,
    /// Evaluation metrics from the training run
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    /// Decision threshold on the smoothed probability
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Calibration smoother hyperparameters
    #[serde(default)]
    pub smoother: SmootherParams,
    /// Artifact set of this version
    #[serde(default = "default_model_types")]
    pub model_types: Vec<ModelType>,
}

impl VersionMetadata {
    /// Create a record with default threshold, smoother params and the full artifact set.
    pub fn new(version: impl Into<String>, feature_names: Vec<String>) -> Self {
        Self {
            version: version.into(),
            created_at: Utc::now(),
            feature_names,
            metrics: BTreeMap::new(),
            threshold: DEFAULT_THRESHOLD,
            smoother: SmootherParams::default(),
            model_types: default_model_types(),
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        self.metrics.insert(name.to_string(), value);
        self
    }

    pub fn with_smoother(mut self, params: SmootherParams) -> Self {
        self.smoother = params;
        self
    }

    pub fn with_model_types(mut self, model_types: Vec<ModelType>) -> Self {
        self.model_types = model_types;
        self
    }
}

/// Reference feature matrix plus the primary model's probabilities on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSet {
    pub features: Vec<Vec<f64>>,
    /// Empty until labelled by the primary model
    #[serde(default)]
    pub probabilities: Vec<f64>,
}

impl ReferenceSet {
    pub fn new(features: Vec<Vec<f64>>, probabilities: Vec<f64>) -> Self {
        Self {
            features,
            probabilities,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
