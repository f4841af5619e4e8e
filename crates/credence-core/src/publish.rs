//! Publishing a trained version into the artifact store.
//!
//! Artifacts go in first, then the reference set, then the metadata record,
//! so a version only becomes listable once everything it names is stored.

use std::collections::BTreeMap;

use credence_store::{ArtifactStore, ContentDigest, ModelType, ReferenceSet, VersionMetadata};
use serde::Serialize;
use tracing::info;

use crate::domain::{ModelError, RegistryError};
use crate::models::ModelHandle;
use crate::registry::{check_reference_width, validate_metadata, Result};
use crate::smoother::KnnSmoother;

/// Outcome of a successful publish.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedVersion {
    pub version: String,
    pub digests: BTreeMap<ModelType, ContentDigest>,
    pub reference_rows: usize,
}

/// Reference set labelled with `model`'s probabilities on `features`.
pub fn label_reference(
    model: &ModelHandle,
    features: Vec<Vec<f64>>,
) -> std::result::Result<ReferenceSet, ModelError> {
    let probabilities = features
        .iter()
        .map(|row| model.predict_proba(row))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ReferenceSet::new(features, probabilities))
}

/// Validate and store one version.
///
/// `models` must hold every type in `metadata.model_types`, each accepting
/// exactly `feature_names.len()` features. Extra entries are ignored.
pub async fn publish_version(
    store: &dyn ArtifactStore,
    metadata: &VersionMetadata,
    models: &BTreeMap<ModelType, ModelHandle>,
    reference: Option<&ReferenceSet>,
) -> Result<PublishedVersion> {
    validate_metadata(metadata)?;
    let version = metadata.version.as_str();
    let width = metadata.feature_names.len();

    let mut artifacts = Vec::with_capacity(metadata.model_types.len());
    for &model_type in &metadata.model_types {
        let model = models
            .get(&model_type)
            .ok_or_else(|| RegistryError::ArtifactNotFound {
                version: version.to_string(),
                model_type,
            })?;
        let invalid = |source: ModelError| RegistryError::InvalidArtifact {
            version: version.to_string(),
            model_type,
            source,
        };

        if model.model_type() != model_type {
            return Err(invalid(ModelError::WrongModelType {
                expected: model_type,
                found: model.model_type(),
            }));
        }
        if model.feature_count() != width {
            return Err(invalid(ModelError::DimensionMismatch {
                expected: width,
                actual: model.feature_count(),
            }));
        }
        artifacts.push((model_type, model.to_bytes().map_err(invalid)?));
    }

    if let Some(reference) = reference {
        check_reference_width(metadata, reference)?;
        KnnSmoother::fitted(metadata.smoother, reference).map_err(|e| {
            RegistryError::InvalidReference {
                version: version.to_string(),
                reason: e.to_string(),
            }
        })?;
    }

    let mut digests = BTreeMap::new();
    for (model_type, bytes) in artifacts {
        let digest = store.put_artifact(version, model_type, &bytes).await?;
        digests.insert(model_type, digest);
    }
    if let Some(reference) = reference {
        store.put_reference_set(version, reference).await?;
    }
    store.put_metadata(metadata).await?;

    let reference_rows = reference.map_or(0, ReferenceSet::len);
    info!(
        version = %version,
        artifacts = digests.len(),
        reference_rows = reference_rows,
        "version published"
    );

    Ok(PublishedVersion {
        version: version.to_string(),
        digests,
        reference_rows,
    })
}
