//! Storage trait definitions for Credence
//!
//! `ArtifactStore` is the key-addressed boundary between the registry and
//! wherever trained versions live. Keys are exact-match: a version string and
//! a model type tag. There is no partial or fuzzy version matching.
//!
//! All methods are async and backend-agnostic. An in-memory fake is provided
//! via the `fakes` module and a filesystem backend via `fs`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StorageError;
use crate::schema::{ModelType, ReferenceSet, VersionMetadata};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// Content digest (SHA-256 hex string) of a stored artifact.
///
/// The inner field is private to guarantee the string is always valid
/// lowercase hex produced by `from_bytes` or validated via `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reject version keys that are empty or could escape a path-based layout.
pub fn validate_version_key(version: &str) -> StorageResult<()> {
    let bad = version.is_empty()
        || version == "."
        || version == ".."
        || version
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control());
    if bad {
        return Err(StorageError::InvalidKey {
            key: version.to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ArtifactStore
// ---------------------------------------------------------------------------

/// Key-addressed store of published model versions.
///
/// Guarantees:
/// - `put_artifact` returns the SHA-256 digest of the stored bytes.
/// - Published entries are immutable: re-putting identical content is a
///   no-op, different content fails with `StorageError::Immutable`.
/// - `get_*` returns `Ok(None)` for absent keys; errors are reserved for
///   backend failures.
/// - `list_versions` returns every metadata record in unspecified order.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store a serialized predictor for `(version, model_type)`.
    async fn put_artifact(
        &self,
        version: &str,
        model_type: ModelType,
        data: &[u8],
    ) -> StorageResult<ContentDigest>;

    /// Retrieve a serialized predictor.
    async fn get_artifact(
        &self,
        version: &str,
        model_type: ModelType,
    ) -> StorageResult<Option<Vec<u8>>>;

    /// Store the metadata record of a version.
    async fn put_metadata(&self, metadata: &VersionMetadata) -> StorageResult<()>;

    /// Retrieve the metadata record of a version.
    async fn get_metadata(&self, version: &str) -> StorageResult<Option<VersionMetadata>>;

    /// List the metadata records of every known version.
    async fn list_versions(&self) -> StorageResult<Vec<VersionMetadata>>;

    /// Store the smoother reference set of a version.
    async fn put_reference_set(&self, version: &str, reference: &ReferenceSet)
        -> StorageResult<()>;

    /// Retrieve the smoother reference set of a version.
    async fn get_reference_set(&self, version: &str) -> StorageResult<Option<ReferenceSet>>;
}
