//! Domain models for Credence.
//!
//! Canonical definitions for what the scoring path hands back to callers:
//! - `ScoringResult` / `BatchScoringResult`: per-request outputs
//! - `Decision`, `ReasonCode`: the classification and its justification
//! - `Explanation`, `Attribution`: per-feature contributions
//! - error enums for every component

pub mod error;
pub mod scoring;

pub use error::{AttributionError, ModelError, RegistryError, ScoringError, SmootherError};
pub use scoring::{
    Attribution, BatchScoringResult, Contributor, Decision, Explanation, ReasonCode,
    ScoringResult, VersionSummary, HIGH_RISK_CUTOFF, MEDIUM_RISK_CUTOFF,
};
