//! Credence-Store: Artifact Store Client for Credence
//!
//! This crate is the I/O boundary of the model registry. It owns the
//! key-addressed layout of everything a trained model version publishes.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: exact-match keying, immutability of published versions.
//!
//! ## Key Components
//!
//! - `ArtifactStore`: async get/put of model binaries, metadata and reference sets
//! - `VersionMetadata`: the per-version record (feature order, threshold, smoother params)
//! - `MemoryArtifactStore`: in-memory implementation for tests and embedding
//! - `FsArtifactStore`: filesystem-backed implementation

mod error;
pub mod fakes;
pub mod fs;
mod schema;
pub mod storage_traits;

pub use error::StorageError;
pub use fakes::MemoryArtifactStore;
pub use fs::FsArtifactStore;
pub use schema::{
    DistanceMetric, ModelType, ReferenceSet, SmootherParams, VersionMetadata, DEFAULT_K,
    DEFAULT_THRESHOLD,
};
pub use storage_traits::{validate_version_key, ArtifactStore, ContentDigest, StorageResult};
