//! Nearest-neighbor calibration smoother.
//!
//! Re-estimates a model probability as the mean reference probability of the
//! k closest reference rows. The reference set is the training split and the
//! primary model's probabilities on it, so the output stays on the scale the
//! threshold was tuned for while damping isolated spikes.

use credence_store::{DistanceMetric, ReferenceSet, SmootherParams};
use tracing::warn;

use crate::domain::SmootherError;

#[derive(Debug, Clone)]
struct FittedReference {
    features: Vec<Vec<f64>>,
    probabilities: Vec<f64>,
}

/// kNN smoother with brute-force search.
#[derive(Debug, Clone)]
pub struct KnnSmoother {
    params: SmootherParams,
    reference: Option<FittedReference>,
}

impl KnnSmoother {
    /// Unfitted smoother; `smooth` is the identity until `fit` succeeds.
    pub fn new(params: SmootherParams) -> Self {
        Self {
            params,
            reference: None,
        }
    }

    /// Smoother fitted on a stored reference set.
    pub fn fitted(params: SmootherParams, reference: &ReferenceSet) -> Result<Self, SmootherError> {
        let mut smoother = Self::new(params);
        smoother.fit(reference.features.clone(), reference.probabilities.clone())?;
        Ok(smoother)
    }

    pub fn params(&self) -> SmootherParams {
        self.params
    }

    pub fn is_fitted(&self) -> bool {
        self.reference.is_some()
    }

    /// Number of reference rows, 0 when unfitted.
    pub fn reference_len(&self) -> usize {
        self.reference.as_ref().map_or(0, |r| r.features.len())
    }

    /// Width of the reference rows, if fitted.
    pub fn dimension(&self) -> Option<usize> {
        self.reference
            .as_ref()
            .and_then(|r| r.features.first())
            .map(Vec::len)
    }

    /// Index the reference rows. On error the smoother keeps its prior state.
    pub fn fit(
        &mut self,
        features: Vec<Vec<f64>>,
        probabilities: Vec<f64>,
    ) -> Result<(), SmootherError> {
        let Some(first) = features.first() else {
            return Err(SmootherError::EmptyReference);
        };
        let width = first.len();
        if width == 0 {
            return Err(SmootherError::EmptyReference);
        }
        if probabilities.len() != features.len() {
            return Err(SmootherError::DimensionMismatch {
                expected: features.len(),
                actual: probabilities.len(),
            });
        }
        for (row, values) in features.iter().enumerate() {
            if values.len() != width {
                return Err(SmootherError::DimensionMismatch {
                    expected: width,
                    actual: values.len(),
                });
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(SmootherError::NonFinite { row });
            }
        }
        if let Some((index, &value)) = probabilities
            .iter()
            .enumerate()
            .find(|(_, p)| !(0.0..=1.0).contains(*p))
        {
            return Err(SmootherError::InvalidProbability { index, value });
        }
        if self.params.k == 0 || self.params.k > features.len() {
            return Err(SmootherError::InvalidK {
                k: self.params.k,
                rows: features.len(),
            });
        }

        self.reference = Some(FittedReference {
            features,
            probabilities,
        });
        Ok(())
    }

    /// Indices of the k nearest reference rows, closest first.
    ///
    /// Equal distances are ordered by reference index.
    pub fn neighbors(&self, query: &[f64]) -> Result<Vec<usize>, SmootherError> {
        let reference = self.reference.as_ref().ok_or(SmootherError::NotFitted)?;
        let width = reference.features.first().map_or(0, Vec::len);
        if query.len() != width {
            return Err(SmootherError::DimensionMismatch {
                expected: width,
                actual: query.len(),
            });
        }

        let mut ranked: Vec<(f64, usize)> = reference
            .features
            .iter()
            .enumerate()
            .map(|(i, row)| (distance(self.params.metric, query, row), i))
            .collect();

        let by_distance =
            |a: &(f64, usize), b: &(f64, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
        let k = self.params.k;
        if k < ranked.len() {
            ranked.select_nth_unstable_by(k - 1, by_distance);
            ranked.truncate(k);
        }
        ranked.sort_by(by_distance);
        Ok(ranked.into_iter().map(|(_, i)| i).collect())
    }

    /// Smoothed probability for one instance.
    pub fn smooth_one(&self, query: &[f64], raw: f64) -> Result<f64, SmootherError> {
        let Some(reference) = &self.reference else {
            warn!("calibration smoother not fitted; returning raw probability");
            return Ok(raw);
        };
        let neighbors = self.neighbors(query)?;
        let total: f64 = neighbors.iter().map(|&i| reference.probabilities[i]).sum();
        Ok((total / neighbors.len() as f64).clamp(0.0, 1.0))
    }

    /// Smoothed probabilities for a batch of instances.
    pub fn smooth(&self, queries: &[Vec<f64>], raw: &[f64]) -> Result<Vec<f64>, SmootherError> {
        if queries.len() != raw.len() {
            return Err(SmootherError::DimensionMismatch {
                expected: queries.len(),
                actual: raw.len(),
            });
        }
        if !self.is_fitted() {
            warn!("calibration smoother not fitted; returning raw probabilities");
            return Ok(raw.to_vec());
        }
        queries
            .iter()
            .zip(raw)
            .map(|(query, &p)| self.smooth_one(query, p))
            .collect()
    }
}

fn distance(metric: DistanceMetric, a: &[f64], b: &[f64]) -> f64 {
    let pairs = a.iter().zip(b);
    match metric {
        DistanceMetric::Euclidean => pairs.map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt(),
        DistanceMetric::Manhattan => pairs.map(|(x, y)| (x - y).abs()).sum(),
        DistanceMetric::Chebyshev => pairs.map(|(x, y)| (x - y).abs()).fold(0.0, f64::max),
        DistanceMetric::Cosine => {
            let (dot, norm_a, norm_b) = pairs.fold((0.0, 0.0, 0.0), |(d, na, nb), (x, y)| {
                (d + x * y, na + x * x, nb + y * y)
            });
            let denom = (norm_a * norm_b).sqrt();
            // a zero vector has no direction; treat it as orthogonal
            if denom == 0.0 {
                1.0
            } else {
                1.0 - dot / denom
            }
        }
    }
}
