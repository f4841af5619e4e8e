//! Structured observability hooks for model lifecycle and scoring events.
//!
//! This module provides:
//! - Request-scoped tracing spans via `ScoreSpan` RAII guard
//! - Emission functions for version activation, rollback, scoring and the
//!   degraded paths (calibration pass-through, attribution fallback)
//!
//! Events are emitted at `info!` level, degraded paths at `warn!`.
//! Verbosity follows `RUST_LOG`; see [`crate::telemetry::init_tracing`].

use tracing::{error, info, warn};

/// RAII guard that enters a request-scoped tracing span.
///
/// # Example
///
/// ```ignore
/// let _span = ScoreSpan::enter(&request_id.to_string(), "v3");
/// // every event below carries request_id and model_version
/// ```
pub struct ScoreSpan {
    _span: tracing::span::EnteredSpan,
}

impl ScoreSpan {
    /// Create and enter a span tagged with the request id and version.
    pub fn enter(request_id: &str, model_version: &str) -> Self {
        let span = tracing::info_span!(
            "credence.score",
            request_id = %request_id,
            model_version = %model_version
        );
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a version became active.
pub fn emit_version_activated(version: &str, previous: Option<&str>, calibrated: bool) {
    info!(
        event = "version.activated",
        version = %version,
        previous = previous.unwrap_or("none"),
        calibrated = calibrated,
    );
}

/// Emit event: activation failed; the previous bundle stays active.
pub fn emit_activation_failed(version: &str, error: &dyn std::fmt::Display) {
    warn!(event = "version.activation_failed", version = %version, error = %error);
}

/// Emit event: bootstrap activation failed; nothing is active.
pub fn emit_bootstrap_failed(error: &dyn std::fmt::Display) {
    error!(event = "version.bootstrap_failed", error = %error);
}

/// Emit event: rollback moved the active version.
pub fn emit_version_rolled_back(from: Option<&str>, to: &str) {
    info!(
        event = "version.rolled_back",
        from = from.unwrap_or("none"),
        to = %to,
    );
}

/// Emit event: one request scored.
pub fn emit_score_completed(
    model_version: &str,
    raw: f64,
    smoothed: f64,
    decision: &str,
    duration_ms: u64,
) {
    info!(
        event = "score.completed",
        model_version = %model_version,
        raw_probability = raw,
        smoothed_probability = smoothed,
        decision = %decision,
        duration_ms = duration_ms,
    );
}

/// Emit event: a batch finished.
pub fn emit_batch_completed(request_id: &str, processed: usize, failed: usize) {
    info!(
        event = "batch.completed",
        request_id = %request_id,
        processed = processed,
        failed = failed,
    );
}

/// Emit event: calibration unavailable, raw probability used (warning level).
pub fn emit_calibration_passthrough(reason: &dyn std::fmt::Display) {
    warn!(event = "calibration.passthrough", reason = %reason);
}

/// Emit event: primary attribution unavailable, heuristic used (warning level).
pub fn emit_attribution_fallback(reason: &dyn std::fmt::Display) {
    warn!(event = "attribution.fallback", reason = %reason);
}
