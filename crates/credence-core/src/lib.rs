//! Credence Core Library
//!
//! Model version lifecycle and the calibrated scoring pipeline for credit
//! risk:
//! - [`ModelRegistry`]: activate, roll back and list versions held in an
//!   [`credence_store::ArtifactStore`]
//! - [`ScoringService`]: predict, calibrate, explain, classify and narrate
//!   one feature vector or a batch
//! - [`KnnSmoother`] and [`AttributionExplainer`]: the calibration and
//!   attribution stages, rebuilt with every activation

pub mod config;
pub mod domain;
pub mod explain;
pub mod metrics;
pub mod models;
pub mod obs;
pub mod publish;
pub mod registry;
pub mod scoring;
pub mod smoother;
pub mod telemetry;

pub use config::{ExplainerConfig, ScoringConfig};

pub use domain::{
    Attribution, AttributionError, BatchScoringResult, Contributor, Decision, Explanation,
    ModelError, ReasonCode, RegistryError, ScoringError, ScoringResult, SmootherError,
    VersionSummary,
};

pub use explain::{fallback_attribution, AttributionExplainer, PermutationExplainer};
pub use models::{
    decode_model, BoostedClassifier, LogisticModel, ModelHandle, RiskModel, TreeEnsemble,
};
pub use publish::{label_reference, publish_version, PublishedVersion};
pub use registry::{ActiveBundle, ModelRegistry};
pub use scoring::ScoringService;
pub use smoother::KnnSmoother;

pub use credence_store::{
    ArtifactStore, DistanceMetric, ModelType, ReferenceSet, SmootherParams, VersionMetadata,
};

pub use metrics::METRICS;
pub use obs::{
    emit_activation_failed, emit_attribution_fallback, emit_batch_completed,
    emit_bootstrap_failed, emit_calibration_passthrough, emit_score_completed,
    emit_version_activated, emit_version_rolled_back, ScoreSpan,
};
pub use telemetry::init_tracing;

/// Credence version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
