//! Domain-level error taxonomy for Credence.

use credence_store::{ModelType, StorageError};

/// Errors produced while decoding or evaluating a model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("model decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("model encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("malformed tree {tree}: {reason}")]
    MalformedTree { tree: usize, reason: String },

    #[error("invalid model parameters: {0}")]
    InvalidParameters(String),

    #[error("{found} artifact cannot be decoded as {expected}")]
    WrongModelType {
        expected: ModelType,
        found: ModelType,
    },
}

/// Errors produced by the calibration smoother.
///
/// Never surfaced to scoring callers; the pipeline absorbs them as a
/// pass-through calibration.
#[derive(Debug, thiserror::Error)]
pub enum SmootherError {
    #[error("k must be in 1..={rows}, got {k}")]
    InvalidK { k: usize, rows: usize },

    #[error("reference set is empty")]
    EmptyReference,

    #[error("expected {expected} columns, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("reference probability {index} is {value}, outside [0, 1]")]
    InvalidProbability { index: usize, value: f64 },

    #[error("reference row {row} contains a non-finite value")]
    NonFinite { row: usize },

    #[error("smoother has not been fitted")]
    NotFitted,
}

/// Errors produced by the primary attribution algorithm.
///
/// Absorbed by the fallback heuristic.
#[derive(Debug, thiserror::Error)]
pub enum AttributionError {
    #[error("background sample is empty")]
    EmptyBackground,

    #[error("expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("model produced a non-finite output")]
    NonFiniteOutput,

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Model registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("version not found: {0}")]
    VersionNotFound(String),

    #[error("artifact {model_type} missing for version {version}")]
    ArtifactNotFound {
        version: String,
        model_type: ModelType,
    },

    #[error("invalid {model_type} artifact for version {version}: {source}")]
    InvalidArtifact {
        version: String,
        model_type: ModelType,
        #[source]
        source: ModelError,
    },

    #[error("invalid metadata for version {version}: {reason}")]
    InvalidMetadata { version: String, reason: String },

    #[error("invalid reference set for version {version}: {reason}")]
    InvalidReference { version: String, reason: String },

    #[error("no active version")]
    NoActiveVersion,

    #[error("rollback needs at least 2 versions, found {available}")]
    InsufficientHistory { available: usize },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl RegistryError {
    /// Whether retrying the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistryError::Storage(StorageError::Backend(_)))
    }
}

/// Scoring pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("no active model")]
    NoActiveModel,

    #[error("feature vector has {actual} values, active version expects {expected}")]
    InvalidFeatureVector { expected: usize, actual: usize },

    #[error("model error: {0}")]
    Model(#[from] ModelError),
}
