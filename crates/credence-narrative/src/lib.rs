//! Credence-Narrative: banker-facing explanations for credit decisions
//!
//! This crate turns a scored decision (smoothed risk, decision, top
//! attribution factors) into a short free-text rationale. The text comes from
//! an external chat-completions endpoint when one is configured and healthy,
//! and from a local deterministic template otherwise.
//!
//! ## Layer 2 - Enrichment
//!
//! Focus: never failing the caller. Timeouts, rate limits and empty replies
//! are retried with backoff, then absorbed by the template.

mod cache;
mod client;
mod config;
mod error;
mod service;
mod template;

pub use cache::{MemoryNarrativeCache, NarrativeCache};
pub use client::{ChatCompletionsClient, TextGenerator};
pub use config::NarrativeConfig;
pub use error::NarrativeError;
pub use service::NarrativeService;
pub use template::{build_prompt, cache_key, fallback_narrative, SYSTEM_PROMPT};

use serde::{Deserialize, Serialize};

/// Result type for narrative operations
pub type Result<T> = std::result::Result<T, NarrativeError>;

/// One attribution factor as seen by the narrative layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorSummary {
    pub feature: String,
    pub feature_value: f64,
}

/// Attribution factors ordered by influence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributionSummary {
    pub positive: Vec<FactorSummary>,
    pub negative: Vec<FactorSummary>,
}

/// Everything the narrative service is told about one decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeRequest {
    /// Empty when the caller did not compute attributions
    pub attribution: AttributionSummary,
    pub risk_score: f64,
    pub decision: String,
    pub fraud_detected: bool,
}
