//! Scoring pipeline: predict, calibrate, explain, classify, narrate.
//!
//! Each request snapshots the active bundle once, so a concurrent activation
//! never mixes versions inside one result. Calibration and attribution
//! degrade instead of failing; only a missing model, a malformed feature
//! vector or a model error fail a request.

use std::sync::Arc;
use std::time::Instant;

use credence_narrative::{NarrativeRequest, NarrativeService};
use futures::future::join_all;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ScoringConfig;
use crate::domain::{
    Attribution, BatchScoringResult, Decision, Explanation, ReasonCode, ScoringError,
    ScoringResult, SmootherError,
};
use crate::metrics::METRICS;
use crate::obs::{emit_batch_completed, emit_calibration_passthrough, emit_score_completed, ScoreSpan};
use crate::registry::{ActiveBundle, ModelRegistry};
use crate::smoother::KnnSmoother;

pub type Result<T> = std::result::Result<T, ScoringError>;

/// CPU-bound part of one request.
struct Evaluation {
    raw: f64,
    smoothed: f64,
    decision: Decision,
    reason_codes: Vec<ReasonCode>,
    explanation: Option<Explanation>,
}

pub struct ScoringService {
    registry: Arc<ModelRegistry>,
    narrator: Arc<NarrativeService>,
    config: ScoringConfig,
}

impl ScoringService {
    pub fn new(
        registry: Arc<ModelRegistry>,
        narrator: Arc<NarrativeService>,
        config: ScoringConfig,
    ) -> Self {
        Self {
            registry,
            narrator,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Score one feature vector against the active version.
    pub async fn score(&self, features: &[f64], include_attributions: bool) -> Result<ScoringResult> {
        let started = Instant::now();
        let request_id = Uuid::new_v4();

        let Some(bundle) = self.registry.snapshot() else {
            return Err(record_failure(ScoringError::NoActiveModel));
        };
        let evaluation = self
            .evaluate(&bundle, &request_id, features, include_attributions)
            .map_err(record_failure)?;

        let narrative = self
            .narrator
            .explain(&NarrativeRequest {
                attribution: evaluation
                    .explanation
                    .as_ref()
                    .map(Explanation::summary)
                    .unwrap_or_default(),
                risk_score: evaluation.smoothed,
                decision: evaluation.decision.to_string(),
                fraud_detected: false,
            })
            .await;

        METRICS.inc_scores();
        emit_score_completed(
            bundle.version(),
            evaluation.raw,
            evaluation.smoothed,
            evaluation.decision.as_str(),
            started.elapsed().as_millis() as u64,
        );

        Ok(ScoringResult {
            request_id,
            raw_probability: evaluation.raw,
            smoothed_probability: evaluation.smoothed,
            decision: evaluation.decision,
            reason_codes: evaluation.reason_codes,
            attribution: evaluation
                .explanation
                .map(|explanation| Attribution::new(explanation, evaluation.raw)),
            narrative,
            model_version: bundle.version().to_string(),
            threshold: bundle.threshold(),
        })
    }

    /// Score every vector concurrently; failures are logged and dropped.
    pub async fn batch_score(
        &self,
        batch: &[Vec<f64>],
        include_attributions: bool,
    ) -> BatchScoringResult {
        let request_id = Uuid::new_v4();
        let outcomes = join_all(
            batch
                .iter()
                .map(|features| self.score(features, include_attributions)),
        )
        .await;

        let mut results = Vec::with_capacity(outcomes.len());
        let mut failed_count = 0;
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    failed_count += 1;
                    warn!(request_id = %request_id, index = index, error = %e, "batch instance failed");
                }
            }
        }

        let processed_count = results.len();
        emit_batch_completed(&request_id.to_string(), processed_count, failed_count);
        BatchScoringResult {
            request_id,
            results,
            processed_count,
            failed_count,
        }
    }

    fn evaluate(
        &self,
        bundle: &ActiveBundle,
        request_id: &Uuid,
        features: &[f64],
        include_attributions: bool,
    ) -> Result<Evaluation> {
        let _span = ScoreSpan::enter(&request_id.to_string(), bundle.version());

        let primary = bundle.primary().ok_or(ScoringError::NoActiveModel)?;
        let expected = bundle.feature_names().len();
        if features.len() != expected {
            return Err(ScoringError::InvalidFeatureVector {
                expected,
                actual: features.len(),
            });
        }

        let raw = primary.predict_proba(features)?;
        let smoothed = calibrate(bundle.smoother(), features, raw);
        let decision = Decision::from_probability(smoothed, bundle.threshold());
        let explanation = include_attributions.then(|| {
            bundle
                .explainer()
                .explain_instance(features, bundle.feature_names(), self.config.top_k)
        });
        let reason_codes = ReasonCode::derive(smoothed, explanation.as_ref());

        debug!(raw = raw, smoothed = smoothed, decision = %decision, "instance evaluated");
        Ok(Evaluation {
            raw,
            smoothed,
            decision,
            reason_codes,
            explanation,
        })
    }
}

/// Smoothed probability, or `raw` when calibration is unavailable.
fn calibrate(smoother: &KnnSmoother, features: &[f64], raw: f64) -> f64 {
    if !smoother.is_fitted() {
        METRICS.inc_calibration_passthroughs();
        emit_calibration_passthrough(&SmootherError::NotFitted);
        return raw;
    }
    match smoother.smooth_one(features, raw) {
        Ok(smoothed) => smoothed,
        Err(e) => {
            METRICS.inc_calibration_passthroughs();
            emit_calibration_passthrough(&e);
            raw
        }
    }
}

fn record_failure(e: ScoringError) -> ScoringError {
    METRICS.inc_score_failures();
    warn!(error = %e, "scoring failed");
    e
}
