//! Per-feature attributions for a single instance.
//!
//! The primary algorithm is a sampling estimate of Shapley values in
//! probability space: starting from a background row, features are switched
//! to the instance's values one at a time along a fixed set of orderings and
//! each change in model output is credited to the switched feature.
//! Contributions sum to `model_output - base_value`.
//!
//! When the primary explainer cannot be built or fails for an instance, a
//! magnitude heuristic takes over. It never fails.

use credence_store::ReferenceSet;
use tracing::{debug, warn};

use crate::config::ExplainerConfig;
use crate::domain::{AttributionError, Contributor, Explanation};
use crate::metrics::METRICS;
use crate::models::ModelHandle;
use crate::obs::emit_attribution_fallback;

/// Base value reported by the fallback heuristic.
pub const FALLBACK_BASE_VALUE: f64 = 0.5;

/// Deterministic permutation-sampling explainer bound to one model.
#[derive(Debug)]
pub struct PermutationExplainer {
    model: ModelHandle,
    background: Vec<Vec<f64>>,
    background_outputs: Vec<f64>,
    orderings: Vec<Vec<usize>>,
    base_value: f64,
}

impl PermutationExplainer {
    pub fn new(
        model: ModelHandle,
        background: Vec<Vec<f64>>,
        permutations: usize,
    ) -> Result<Self, AttributionError> {
        if background.is_empty() {
            return Err(AttributionError::EmptyBackground);
        }
        let width = model.feature_count();
        if let Some(row) = background.iter().find(|row| row.len() != width) {
            return Err(AttributionError::DimensionMismatch {
                expected: width,
                actual: row.len(),
            });
        }

        let background_outputs = background
            .iter()
            .map(|row| finite_output(&model, row))
            .collect::<Result<Vec<_>, _>>()?;
        let base_value = background_outputs.iter().sum::<f64>() / background_outputs.len() as f64;

        Ok(Self {
            orderings: feature_orderings(width, permutations),
            model,
            background,
            background_outputs,
            base_value,
        })
    }

    /// Mean model output over the background sample.
    pub fn base_value(&self) -> f64 {
        self.base_value
    }

    pub fn background_len(&self) -> usize {
        self.background.len()
    }

    pub fn orderings(&self) -> &[Vec<usize>] {
        &self.orderings
    }

    /// Model output for `x` and one attribution per feature.
    pub fn attributions(&self, x: &[f64]) -> Result<(f64, Vec<f64>), AttributionError> {
        let width = self.model.feature_count();
        if x.len() != width {
            return Err(AttributionError::DimensionMismatch {
                expected: width,
                actual: x.len(),
            });
        }
        let output = finite_output(&self.model, x)?;

        let mut totals = vec![0.0; width];
        for (row, &row_output) in self.background.iter().zip(&self.background_outputs) {
            for ordering in &self.orderings {
                let mut current = row.clone();
                let mut previous = row_output;
                for &feature in ordering {
                    if current[feature] == x[feature] {
                        continue;
                    }
                    current[feature] = x[feature];
                    let next = finite_output(&self.model, &current)?;
                    totals[feature] += next - previous;
                    previous = next;
                }
            }
        }

        let samples = (self.background.len() * self.orderings.len()) as f64;
        let values: Vec<f64> = totals.into_iter().map(|t| t / samples).collect();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AttributionError::NonFiniteOutput);
        }
        Ok((output, values))
    }
}

fn finite_output(model: &ModelHandle, row: &[f64]) -> Result<f64, AttributionError> {
    let p = model.predict_proba(row)?;
    if p.is_finite() {
        Ok(p)
    } else {
        Err(AttributionError::NonFiniteOutput)
    }
}

/// Identity, its reverse, then rotations and their reverses, up to `count`.
pub fn feature_orderings(width: usize, count: usize) -> Vec<Vec<usize>> {
    let count = count.max(1);
    let pairs = count.div_ceil(2);
    let identity: Vec<usize> = (0..width).collect();

    let mut orderings: Vec<Vec<usize>> = Vec::with_capacity(count);
    for pair in 0..pairs {
        let mut rotated = identity.clone();
        rotated.rotate_left(pair * width / pairs);
        let mut reversed = rotated.clone();
        reversed.reverse();
        for ordering in [rotated, reversed] {
            if orderings.len() < count && !orderings.contains(&ordering) {
                orderings.push(ordering);
            }
        }
    }
    orderings
}

/// Up to `size` rows taken with a fixed stride; a single all-zero row when
/// there is no reference set.
pub fn background_sample(
    reference: Option<&ReferenceSet>,
    width: usize,
    size: usize,
) -> Vec<Vec<f64>> {
    match reference {
        Some(reference) if !reference.is_empty() && size > 0 => {
            let stride = reference.len().div_ceil(size);
            reference
                .features
                .iter()
                .step_by(stride)
                .take(size)
                .cloned()
                .collect()
        }
        _ => vec![vec![0.0; width]],
    }
}

/// Explainer held by an active bundle: the primary algorithm when it could be
/// built, the heuristic otherwise.
#[derive(Debug)]
pub struct AttributionExplainer {
    primary: Option<PermutationExplainer>,
}

impl AttributionExplainer {
    /// Build the primary explainer for `model`, or fall back with a warning.
    pub fn build(
        model: &ModelHandle,
        reference: Option<&ReferenceSet>,
        config: &ExplainerConfig,
    ) -> Self {
        let background =
            background_sample(reference, model.feature_count(), config.background_size);
        match PermutationExplainer::new(model.clone(), background, config.permutations) {
            Ok(primary) => {
                debug!(
                    background = primary.background_len(),
                    orderings = primary.orderings().len(),
                    base_value = primary.base_value(),
                    "attribution explainer built"
                );
                Self {
                    primary: Some(primary),
                }
            }
            Err(e) => {
                warn!(error = %e, "attribution explainer unavailable; using heuristic");
                Self::heuristic()
            }
        }
    }

    /// Explainer that always uses the magnitude heuristic.
    pub fn heuristic() -> Self {
        Self { primary: None }
    }

    pub fn is_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub fn base_value(&self) -> f64 {
        self.primary
            .as_ref()
            .map_or(FALLBACK_BASE_VALUE, PermutationExplainer::base_value)
    }

    /// Top contributors for `x`. Never fails.
    pub fn explain_instance(&self, x: &[f64], feature_names: &[String], top_k: usize) -> Explanation {
        match self.primary.as_ref().map(|p| p.attributions(x)) {
            Some(Ok((_, values))) => {
                return rank_attributions(x, &values, feature_names, top_k, self.base_value());
            }
            Some(Err(e)) => emit_attribution_fallback(&e),
            None => emit_attribution_fallback(&"primary explainer unavailable"),
        }
        METRICS.inc_attribution_fallbacks();
        fallback_attribution(x, feature_names, top_k)
    }
}

fn feature_name(feature_names: &[String], index: usize) -> String {
    feature_names
        .get(index)
        .cloned()
        .unwrap_or_else(|| format!("feature_{index}"))
}

fn contributor(x: &[f64], feature_names: &[String], index: usize, attribution: f64) -> Contributor {
    Contributor {
        feature: feature_name(feature_names, index),
        attribution,
        feature_value: x[index],
    }
}

/// Split signed attributions into the top positive (descending) and top
/// negative (ascending) contributors. Ties keep feature order.
pub fn rank_attributions(
    x: &[f64],
    values: &[f64],
    feature_names: &[String],
    top_k: usize,
    base_value: f64,
) -> Explanation {
    let mut positive: Vec<usize> = (0..values.len()).filter(|&i| values[i] > 0.0).collect();
    positive.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    positive.truncate(top_k);

    let mut negative: Vec<usize> = (0..values.len()).filter(|&i| values[i] < 0.0).collect();
    negative.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    negative.truncate(top_k);

    Explanation {
        base_value,
        top_positive: positive
            .into_iter()
            .map(|i| contributor(x, feature_names, i, values[i]))
            .collect(),
        top_negative: negative
            .into_iter()
            .map(|i| contributor(x, feature_names, i, values[i]))
            .collect(),
    }
}

/// Magnitude heuristic: the `top_k` largest `|x[i]|` (ties by index), the
/// first `top_k / 2` reported as positive and the rest as negative, all with
/// zero attribution.
pub fn fallback_attribution(x: &[f64], feature_names: &[String], top_k: usize) -> Explanation {
    let mut ranked: Vec<usize> = (0..x.len()).collect();
    ranked.sort_by(|&a, &b| x[b].abs().total_cmp(&x[a].abs()));
    ranked.truncate(top_k);

    let split = (top_k / 2).min(ranked.len());
    let negative = ranked.split_off(split);

    Explanation {
        base_value: FALLBACK_BASE_VALUE,
        top_positive: ranked
            .into_iter()
            .map(|i| contributor(x, feature_names, i, 0.0))
            .collect(),
        top_negative: negative
            .into_iter()
            .map(|i| contributor(x, feature_names, i, 0.0))
            .collect(),
    }
}
