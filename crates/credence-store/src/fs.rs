//! Filesystem-backed artifact store.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StorageError;
use crate::schema::{ModelType, ReferenceSet, VersionMetadata};
use crate::storage_traits::*;

const METADATA_FILE: &str = "metadata.json";
const REFERENCE_FILE: &str = "reference.json";

/// Filesystem store with one directory per version.
///
/// Layout: `<root>/versions/<version>/{metadata.json, <model-type>.json, reference.json}`
pub struct FsArtifactStore {
    versions_dir: PathBuf,
}

impl FsArtifactStore {
    /// Create a new `FsArtifactStore` rooted at `root`. Creates `root/versions/` if needed.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let versions_dir = root.as_ref().join("versions");
        fs::create_dir_all(&versions_dir)?;
        Ok(Self { versions_dir })
    }

    fn version_dir(&self, version: &str) -> StorageResult<PathBuf> {
        validate_version_key(version)?;
        Ok(self.versions_dir.join(version))
    }

    fn artifact_path(&self, version: &str, model_type: ModelType) -> StorageResult<PathBuf> {
        Ok(self
            .version_dir(version)?
            .join(format!("{}.json", model_type.as_str())))
    }

    /// Write `data` at `path` unless an identical file exists.
    ///
    /// Atomic: written to a temp file in the same directory, then renamed.
    fn write_immutable(
        &self,
        path: &Path,
        data: &[u8],
        version: &str,
        entry: &str,
    ) -> StorageResult<()> {
        if let Some(existing) = read_optional(path)? {
            if existing != data {
                return Err(StorageError::Immutable {
                    version: version.to_string(),
                    entry: entry.to_string(),
                });
            }
            return Ok(());
        }

        let dir = path
            .parent()
            .ok_or_else(|| StorageError::Backend(format!("no parent for {}", path.display())))?;
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(data)?;
        tmp.persist(path).map_err(|e| e.error)?;
        debug!(path = %path.display(), bytes = data.len(), "wrote store entry");
        Ok(())
    }
}

fn read_optional(path: &Path) -> StorageResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::Io(e)),
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put_artifact(
        &self,
        version: &str,
        model_type: ModelType,
        data: &[u8],
    ) -> StorageResult<ContentDigest> {
        let path = self.artifact_path(version, model_type)?;
        self.write_immutable(&path, data, version, model_type.as_str())?;
        Ok(ContentDigest::from_bytes(data))
    }

    async fn get_artifact(
        &self,
        version: &str,
        model_type: ModelType,
    ) -> StorageResult<Option<Vec<u8>>> {
        read_optional(&self.artifact_path(version, model_type)?)
    }

    async fn put_metadata(&self, metadata: &VersionMetadata) -> StorageResult<()> {
        let path = self.version_dir(&metadata.version)?.join(METADATA_FILE);
        let data = serde_json::to_vec_pretty(metadata)?;
        self.write_immutable(&path, &data, &metadata.version, "metadata")
    }

    async fn get_metadata(&self, version: &str) -> StorageResult<Option<VersionMetadata>> {
        let path = self.version_dir(version)?.join(METADATA_FILE);
        match read_optional(&path)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list_versions(&self) -> StorageResult<Vec<VersionMetadata>> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.versions_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            // Versions without metadata are still being published.
            if let Some(bytes) = read_optional(&entry.path().join(METADATA_FILE))? {
                records.push(serde_json::from_slice::<VersionMetadata>(&bytes)?);
            }
        }
        records.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(records)
    }

    async fn put_reference_set(
        &self,
        version: &str,
        reference: &ReferenceSet,
    ) -> StorageResult<()> {
        let path = self.version_dir(version)?.join(REFERENCE_FILE);
        let data = serde_json::to_vec(reference)?;
        self.write_immutable(&path, &data, version, "reference set")
    }

    async fn get_reference_set(&self, version: &str) -> StorageResult<Option<ReferenceSet>> {
        let path = self.version_dir(version)?.join(REFERENCE_FILE);
        match read_optional(&path)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
