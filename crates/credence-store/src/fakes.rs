//! In-memory artifact store
//!
//! `MemoryArtifactStore` satisfies the `ArtifactStore` contract without any
//! external dependencies. Used by tests and by callers embedding a small,
//! process-local set of versions.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::schema::{ModelType, ReferenceSet, VersionMetadata};
use crate::storage_traits::*;

#[derive(Debug, Default)]
struct Collections {
    artifacts: HashMap<(String, ModelType), Vec<u8>>,
    metadata: HashMap<String, VersionMetadata>,
    references: HashMap<String, ReferenceSet>,
}

/// In-memory store backed by one `HashMap` per logical collection.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    inner: Mutex<Collections>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove an artifact. Lets tests model a store that lost part of a version.
    pub fn remove_artifact(&self, version: &str, model_type: ModelType) -> bool {
        self.lock()
            .artifacts
            .remove(&(version.to_string(), model_type))
            .is_some()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put_artifact(
        &self,
        version: &str,
        model_type: ModelType,
        data: &[u8],
    ) -> StorageResult<ContentDigest> {
        validate_version_key(version)?;
        let digest = ContentDigest::from_bytes(data);
        let mut inner = self.lock();
        let key = (version.to_string(), model_type);
        if let Some(existing) = inner.artifacts.get(&key) {
            if ContentDigest::from_bytes(existing) != digest {
                return Err(StorageError::Immutable {
                    version: version.to_string(),
                    entry: model_type.to_string(),
                });
            }
            return Ok(digest);
        }
        inner.artifacts.insert(key, data.to_vec());
        Ok(digest)
    }

    async fn get_artifact(
        &self,
        version: &str,
        model_type: ModelType,
    ) -> StorageResult<Option<Vec<u8>>> {
        let inner = self.lock();
        Ok(inner
            .artifacts
            .get(&(version.to_string(), model_type))
            .cloned())
    }

    async fn put_metadata(&self, metadata: &VersionMetadata) -> StorageResult<()> {
        validate_version_key(&metadata.version)?;
        let mut inner = self.lock();
        if let Some(existing) = inner.metadata.get(&metadata.version) {
            if existing != metadata {
                return Err(StorageError::Immutable {
                    version: metadata.version.clone(),
                    entry: "metadata".to_string(),
                });
            }
            return Ok(());
        }
        inner
            .metadata
            .insert(metadata.version.clone(), metadata.clone());
        Ok(())
    }

    async fn get_metadata(&self, version: &str) -> StorageResult<Option<VersionMetadata>> {
        let inner = self.lock();
        Ok(inner.metadata.get(version).cloned())
    }

    async fn list_versions(&self) -> StorageResult<Vec<VersionMetadata>> {
        let inner = self.lock();
        Ok(inner.metadata.values().cloned().collect())
    }

    async fn put_reference_set(
        &self,
        version: &str,
        reference: &ReferenceSet,
    ) -> StorageResult<()> {
        validate_version_key(version)?;
        let mut inner = self.lock();
        if let Some(existing) = inner.references.get(version) {
            if existing != reference {
                return Err(StorageError::Immutable {
                    version: version.to_string(),
                    entry: "reference set".to_string(),
                });
            }
            return Ok(());
        }
        inner
            .references
            .insert(version.to_string(), reference.clone());
        Ok(())
    }

    async fn get_reference_set(&self, version: &str) -> StorageResult<Option<ReferenceSet>> {
        let inner = self.lock();
        Ok(inner.references.get(version).cloned())
    }
}
