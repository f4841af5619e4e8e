//! Logistic-regression baseline.

use credence_store::ModelType;
use serde::{Deserialize, Serialize};

use super::{check_width, sigmoid, RiskModel};
use crate::domain::ModelError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    weights: Vec<f64>,
    intercept: f64,
}

impl LogisticModel {
    pub fn new(weights: Vec<f64>, intercept: f64) -> Result<Self, ModelError> {
        let model = Self { weights, intercept };
        model.validate()?;
        Ok(model)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let model: Self = serde_json::from_slice(bytes).map_err(ModelError::Decode)?;
        model.validate()?;
        Ok(model)
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.weights.is_empty() {
            return Err(ModelError::InvalidParameters(
                "logistic model has no weights".to_string(),
            ));
        }
        if !self.intercept.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err(ModelError::InvalidParameters(
                "logistic coefficients must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

impl RiskModel for LogisticModel {
    fn model_type(&self) -> ModelType {
        ModelType::LinearBaseline
    }

    fn feature_count(&self) -> usize {
        self.weights.len()
    }

    fn predict_proba(&self, features: &[f64]) -> Result<f64, ModelError> {
        check_width(self.weights.len(), features)?;
        let margin = self.intercept
            + self
                .weights
                .iter()
                .zip(features)
                .map(|(w, x)| w * x)
                .sum::<f64>();
        Ok(sigmoid(margin))
    }

    fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        serde_json::to_vec(self).map_err(ModelError::Encode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicts_through_sigmoid() {
        let model = LogisticModel::new(vec![2.0, -1.0], 0.5).unwrap();
        let p = model.predict_proba(&[1.0, 3.0]).unwrap();
        assert!((p - sigmoid(-0.5)).abs() < 1e-12);
    }

    #[test]
    fn rejects_empty_and_non_finite_weights() {
        assert!(LogisticModel::new(vec![], 0.0).is_err());
        assert!(LogisticModel::new(vec![f64::INFINITY], 0.0).is_err());
        assert!(LogisticModel::from_bytes(br#"{"weights":[],"intercept":0.0}"#).is_err());
    }

    #[test]
    fn width_mismatch() {
        let model = LogisticModel::new(vec![1.0], 0.0).unwrap();
        assert!(matches!(
            model.predict_proba(&[1.0, 2.0]),
            Err(ModelError::DimensionMismatch { .. })
        ));
    }
}
