//! Gradient-boosted tree ensembles with a binary logistic objective.
//!
//! Trees are stored as flat node arrays rooted at index 0. Children always
//! sit at higher indices than their parent, which makes evaluation a bounded
//! forward walk.

use credence_store::ModelType;
use serde::{Deserialize, Serialize};

use super::{check_width, sigmoid, RiskModel};
use crate::domain::ModelError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TreeNode {
    /// `features[feature] < threshold` goes left. NaN follows `missing_left`.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default)]
        missing_left: bool,
    },
    Leaf { value: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

impl Tree {
    pub fn new(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    fn validate(&self, tree: usize, feature_count: usize) -> Result<(), ModelError> {
        let malformed = |reason: String| ModelError::MalformedTree { tree, reason };

        if self.nodes.is_empty() {
            return Err(malformed("no nodes".to_string()));
        }
        for (index, node) in self.nodes.iter().enumerate() {
            match *node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if feature >= feature_count {
                        return Err(malformed(format!(
                            "node {index} splits on feature {feature} of {feature_count}"
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(malformed(format!("node {index} has a non-finite threshold")));
                    }
                    for child in [left, right] {
                        if child <= index || child >= self.nodes.len() {
                            return Err(malformed(format!(
                                "node {index} points at invalid child {child}"
                            )));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(malformed(format!("leaf {index} is not finite")));
                    }
                }
            }
        }
        Ok(())
    }

    /// Leaf value reached by `features`. Requires a validated tree.
    fn evaluate(&self, features: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes[index] {
                TreeNode::Leaf { value } => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    missing_left,
                } => {
                    let x = features[feature];
                    let go_left = if x.is_nan() { missing_left } else { x < threshold };
                    index = if go_left { left } else { right };
                }
            }
        }
    }
}

/// Validated ensemble parameters, as serialized in the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    feature_count: usize,
    #[serde(default)]
    base_score: f64,
    trees: Vec<Tree>,
}

impl TreeEnsemble {
    pub fn new(feature_count: usize, base_score: f64, trees: Vec<Tree>) -> Result<Self, ModelError> {
        let ensemble = Self {
            feature_count,
            base_score,
            trees,
        };
        ensemble.validate()?;
        Ok(ensemble)
    }

    /// Single-split ensemble on `feature`.
    pub fn stump(
        feature_count: usize,
        feature: usize,
        threshold: f64,
        left: f64,
        right: f64,
    ) -> Result<Self, ModelError> {
        let tree = Tree::new(vec![
            TreeNode::Split {
                feature,
                threshold,
                left: 1,
                right: 2,
                missing_left: false,
            },
            TreeNode::Leaf { value: left },
            TreeNode::Leaf { value: right },
        ]);
        Self::new(feature_count, 0.0, vec![tree])
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let ensemble: Self = serde_json::from_slice(bytes).map_err(ModelError::Decode)?;
        ensemble.validate()?;
        Ok(ensemble)
    }

    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Raw log-odds: base score plus one leaf per tree.
    pub fn margin(&self, features: &[f64]) -> Result<f64, ModelError> {
        check_width(self.feature_count, features)?;
        Ok(self.base_score + self.trees.iter().map(|t| t.evaluate(features)).sum::<f64>())
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.feature_count == 0 {
            return Err(ModelError::InvalidParameters(
                "ensemble must accept at least one feature".to_string(),
            ));
        }
        if !self.base_score.is_finite() {
            return Err(ModelError::InvalidParameters(
                "base_score is not finite".to_string(),
            ));
        }
        for (index, tree) in self.trees.iter().enumerate() {
            tree.validate(index, self.feature_count)?;
        }
        Ok(())
    }
}

/// Tree-ensemble classifier in the primary or secondary slot.
#[derive(Debug, Clone)]
pub struct BoostedClassifier {
    model_type: ModelType,
    ensemble: TreeEnsemble,
}

impl BoostedClassifier {
    pub fn new(model_type: ModelType, ensemble: TreeEnsemble) -> Self {
        Self {
            model_type,
            ensemble,
        }
    }

    pub fn ensemble(&self) -> &TreeEnsemble {
        &self.ensemble
    }
}

impl RiskModel for BoostedClassifier {
    fn model_type(&self) -> ModelType {
        self.model_type
    }

    fn feature_count(&self) -> usize {
        self.ensemble.feature_count
    }

    fn predict_proba(&self, features: &[f64]) -> Result<f64, ModelError> {
        Ok(sigmoid(self.ensemble.margin(features)?))
    }

    fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        serde_json::to_vec(&self.ensemble).map_err(ModelError::Encode)
    }
}
