//! Global atomic counters for Credence observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a batch).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters; no allocations, no locking.
pub struct Metrics {
    scores_completed: AtomicU64,
    scores_failed: AtomicU64,
    activations: AtomicU64,
    calibration_passthroughs: AtomicU64,
    attribution_fallbacks: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            scores_completed: AtomicU64::new(0),
            scores_failed: AtomicU64::new(0),
            activations: AtomicU64::new(0),
            calibration_passthroughs: AtomicU64::new(0),
            attribution_fallbacks: AtomicU64::new(0),
        }
    }

    /// Increment the scores-completed counter by one.
    pub fn inc_scores(&self) {
        self.scores_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "scores_completed", "counter incremented");
    }

    /// Increment the scores-failed counter by one.
    pub fn inc_score_failures(&self) {
        self.scores_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "scores_failed", "counter incremented");
    }

    /// Increment the activations counter by one.
    pub fn inc_activations(&self) {
        self.activations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "activations", "counter incremented");
    }

    pub fn inc_calibration_passthroughs(&self) {
        self.calibration_passthroughs.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "calibration_passthroughs", "counter incremented");
    }

    pub fn inc_attribution_fallbacks(&self) {
        self.attribution_fallbacks.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "attribution_fallbacks", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries (end of a batch, process exit)
    /// rather than on every increment.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            scores_completed = self.scores_completed(),
            scores_failed = self.scores_failed(),
            activations = self.activations(),
            calibration_passthroughs = self.calibration_passthroughs(),
            attribution_fallbacks = self.attribution_fallbacks(),
        );
    }

    pub fn scores_completed(&self) -> u64 {
        self.scores_completed.load(Ordering::Relaxed)
    }

    pub fn scores_failed(&self) -> u64 {
        self.scores_failed.load(Ordering::Relaxed)
    }

    pub fn activations(&self) -> u64 {
        self.activations.load(Ordering::Relaxed)
    }

    pub fn calibration_passthroughs(&self) -> u64 {
        self.calibration_passthroughs.load(Ordering::Relaxed)
    }

    pub fn attribution_fallbacks(&self) -> u64 {
        self.attribution_fallbacks.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.scores_completed.store(0, Ordering::Relaxed);
        self.scores_failed.store(0, Ordering::Relaxed);
        self.activations.store(0, Ordering::Relaxed);
        self.calibration_passthroughs.store(0, Ordering::Relaxed);
        self.attribution_fallbacks.store(0, Ordering::Relaxed);
    }
}
