//! Error types for credence-store

use thiserror::Error;

/// Errors that can occur at the artifact store boundary
#[derive(Error, Debug)]
pub enum StorageError {
    /// Version key is empty or would escape the store layout
    #[error("Invalid store key: {key:?}")]
    InvalidKey { key: String },

    /// Attempt to overwrite a published entry with different content
    #[error("{entry} for version {version} is immutable and differs from the stored copy")]
    Immutable { version: String, entry: String },

    /// Digest string is not 64-char hex
    #[error("Invalid digest: {digest}")]
    InvalidDigest { digest: String },

    /// Backend-specific failure (connection, quota, ...)
    #[error("Storage backend failed: {0}")]
    Backend(String),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
