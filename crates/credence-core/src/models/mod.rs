//! Trained predictors behind a common interface.
//!
//! Primary and secondary classifiers are gradient-boosted tree ensembles; the
//! linear baseline is a logistic regression. Both serialize to JSON and are
//! stored as one artifact per (version, model type).

pub mod logistic;
pub mod tree;

use std::fmt;
use std::sync::Arc;

use credence_store::ModelType;

use crate::domain::ModelError;

pub use logistic::LogisticModel;
pub use tree::{BoostedClassifier, Tree, TreeEnsemble, TreeNode};

/// A binary classifier producing a positive-class (default) probability.
pub trait RiskModel: Send + Sync + fmt::Debug {
    fn model_type(&self) -> ModelType;

    /// Length of the feature vectors this model accepts.
    fn feature_count(&self) -> usize;

    /// Positive-class probability for one feature vector.
    fn predict_proba(&self, features: &[f64]) -> Result<f64, ModelError>;

    /// Artifact bytes accepted by [`decode_model`].
    fn to_bytes(&self) -> Result<Vec<u8>, ModelError>;
}

/// Shared handle to a loaded model.
pub type ModelHandle = Arc<dyn RiskModel>;

/// Decode an artifact according to its model-type tag.
pub fn decode_model(model_type: ModelType, bytes: &[u8]) -> Result<ModelHandle, ModelError> {
    match model_type {
        ModelType::PrimaryClassifier | ModelType::SecondaryClassifier => {
            let ensemble = TreeEnsemble::from_bytes(bytes)?;
            Ok(Arc::new(BoostedClassifier::new(model_type, ensemble)))
        }
        ModelType::LinearBaseline => Ok(Arc::new(LogisticModel::from_bytes(bytes)?)),
    }
}

pub(crate) fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

pub(crate) fn check_width(expected: usize, features: &[f64]) -> Result<(), ModelError> {
    if features.len() != expected {
        return Err(ModelError::DimensionMismatch {
            expected,
            actual: features.len(),
        });
    }
    Ok(())
}
