//! Model registry: owns the active version and its fully loaded bundle.
//!
//! The active bundle lives behind `RwLock<Option<Arc<ActiveBundle>>>`.
//! Readers clone the `Arc` and drop the lock immediately, so a request keeps
//! one consistent version for its whole lifetime. Activations are serialized
//! by an async mutex and build the replacement bundle completely before a
//! single pointer swap; a failed activation leaves the previous bundle in
//! place.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use credence_store::{ArtifactStore, ModelType, ReferenceSet, VersionMetadata};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ExplainerConfig;
use crate::domain::{ModelError, RegistryError, VersionSummary};
use crate::explain::AttributionExplainer;
use crate::metrics::METRICS;
use crate::models::{decode_model, ModelHandle};
use crate::obs::{
    emit_activation_failed, emit_bootstrap_failed, emit_version_activated,
    emit_version_rolled_back,
};
use crate::smoother::KnnSmoother;

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Everything scoring needs from one version, loaded and validated.
#[derive(Debug)]
pub struct ActiveBundle {
    metadata: VersionMetadata,
    models: BTreeMap<ModelType, ModelHandle>,
    smoother: KnnSmoother,
    explainer: AttributionExplainer,
    activated_at: DateTime<Utc>,
}

impl ActiveBundle {
    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    pub fn metadata(&self) -> &VersionMetadata {
        &self.metadata
    }

    /// Column order every feature vector must follow.
    pub fn feature_names(&self) -> &[String] {
        &self.metadata.feature_names
    }

    pub fn threshold(&self) -> f64 {
        self.metadata.threshold
    }

    pub fn model(&self, model_type: ModelType) -> Option<&ModelHandle> {
        self.models.get(&model_type)
    }

    pub fn primary(&self) -> Option<&ModelHandle> {
        self.model(ModelType::PrimaryClassifier)
    }

    pub fn model_types(&self) -> impl Iterator<Item = ModelType> + '_ {
        self.models.keys().copied()
    }

    pub fn smoother(&self) -> &KnnSmoother {
        &self.smoother
    }

    pub fn explainer(&self) -> &AttributionExplainer {
        &self.explainer
    }

    pub fn activated_at(&self) -> DateTime<Utc> {
        self.activated_at
    }
}

/// Checks shared by activation and publishing.
pub(crate) fn validate_metadata(metadata: &VersionMetadata) -> Result<()> {
    let invalid = |reason: &str| RegistryError::InvalidMetadata {
        version: metadata.version.clone(),
        reason: reason.to_string(),
    };

    if metadata.feature_names.is_empty() {
        return Err(invalid("feature_names is empty"));
    }
    if !(0.0..=1.0).contains(&metadata.threshold) {
        return Err(invalid("threshold must be within [0, 1]"));
    }
    if !metadata.model_types.contains(&ModelType::PrimaryClassifier) {
        return Err(invalid("artifact set has no primary-classifier"));
    }
    Ok(())
}

/// Reference rows must match the version's feature width.
pub(crate) fn check_reference_width(metadata: &VersionMetadata, reference: &ReferenceSet) -> Result<()> {
    let width = metadata.feature_names.len();
    match reference.features.iter().find(|row| row.len() != width) {
        Some(row) => Err(RegistryError::InvalidReference {
            version: metadata.version.clone(),
            reason: format!("row has {} columns, expected {}", row.len(), width),
        }),
        None => Ok(()),
    }
}

/// Versions newest first; equal timestamps order by version id, descending.
fn newest_first(mut versions: Vec<VersionMetadata>) -> Vec<VersionMetadata> {
    versions.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.version.cmp(&a.version))
    });
    versions
}

/// Registry over an artifact store.
pub struct ModelRegistry {
    store: Arc<dyn ArtifactStore>,
    explainer_config: ExplainerConfig,
    active: RwLock<Option<Arc<ActiveBundle>>>,
    activation: Mutex<()>,
}

impl ModelRegistry {
    /// Registry with nothing active.
    pub fn new(store: Arc<dyn ArtifactStore>, explainer_config: ExplainerConfig) -> Self {
        Self {
            store,
            explainer_config,
            active: RwLock::new(None),
            activation: Mutex::new(()),
        }
    }

    /// Registry with the most recently created version activated.
    ///
    /// A failed activation is logged and leaves the registry empty; callers
    /// see `NoActiveVersion` until an explicit activation succeeds.
    pub async fn bootstrap(store: Arc<dyn ArtifactStore>, explainer_config: ExplainerConfig) -> Self {
        let registry = Self::new(store, explainer_config);
        match registry.activate_latest().await {
            Ok(Some(version)) => info!(version = %version, "registry bootstrapped"),
            Ok(None) => info!("no published versions; registry starts empty"),
            Err(e) => emit_bootstrap_failed(&e),
        }
        registry
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Current bundle, if any. The returned `Arc` stays valid across swaps.
    pub fn snapshot(&self) -> Option<Arc<ActiveBundle>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn active_version(&self) -> Option<String> {
        self.snapshot().map(|b| b.version().to_string())
    }

    /// Loaded model of `model_type` in the active version.
    ///
    /// `Ok(None)` when the type is not part of the active artifact set.
    pub fn get_active_model(&self, model_type: ModelType) -> Result<Option<ModelHandle>> {
        let bundle = self.snapshot().ok_or(RegistryError::NoActiveVersion)?;
        Ok(bundle.model(model_type).cloned())
    }

    /// Published versions, newest first.
    pub async fn list_versions(&self) -> Result<Vec<VersionSummary>> {
        let versions = newest_first(self.store.list_versions().await?);
        let active = self.active_version();
        Ok(versions
            .into_iter()
            .map(|m| VersionSummary {
                is_active: active.as_deref() == Some(m.version.as_str()),
                version: m.version,
                created_at: m.created_at,
                metrics: m.metrics,
            })
            .collect())
    }

    /// Load `version` and make it active.
    pub async fn activate_version(&self, version: &str) -> Result<String> {
        let _guard = self.activation.lock().await;
        self.activate_locked(version).await
    }

    /// Activate the previous version.
    ///
    /// The target is the second-newest version, or the newest one when the
    /// second-newest is already active.
    pub async fn rollback_to_previous(&self) -> Result<String> {
        let _guard = self.activation.lock().await;

        let versions = newest_first(self.store.list_versions().await?);
        if versions.len() < 2 {
            return Err(RegistryError::InsufficientHistory {
                available: versions.len(),
            });
        }

        let active = self.active_version();
        let target = if active.as_deref() == Some(versions[1].version.as_str()) {
            &versions[0]
        } else {
            &versions[1]
        };

        let version = self.activate_locked(&target.version).await?;
        emit_version_rolled_back(active.as_deref(), &version);
        Ok(version)
    }

    /// Activate the most recently created version, if there is one.
    pub async fn activate_latest(&self) -> Result<Option<String>> {
        let _guard = self.activation.lock().await;
        let versions = newest_first(self.store.list_versions().await?);
        match versions.first() {
            Some(latest) => self.activate_locked(&latest.version).await.map(Some),
            None => Ok(None),
        }
    }

    async fn activate_locked(&self, version: &str) -> Result<String> {
        let previous = self.active_version();
        if previous.as_deref() == Some(version) {
            debug!(version = %version, "version already active");
            return Ok(version.to_string());
        }

        let bundle = match self.load_bundle(version).await {
            Ok(bundle) => bundle,
            Err(e) => {
                emit_activation_failed(version, &e);
                return Err(e);
            }
        };

        let calibrated = bundle.smoother.is_fitted();
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(bundle));

        METRICS.inc_activations();
        emit_version_activated(version, previous.as_deref(), calibrated);
        Ok(version.to_string())
    }

    async fn load_bundle(&self, version: &str) -> Result<ActiveBundle> {
        let metadata = self
            .store
            .get_metadata(version)
            .await?
            .ok_or_else(|| RegistryError::VersionNotFound(version.to_string()))?;
        validate_metadata(&metadata)?;

        let width = metadata.feature_names.len();
        let mut models = BTreeMap::new();
        for &model_type in &metadata.model_types {
            let bytes = self
                .store
                .get_artifact(version, model_type)
                .await?
                .ok_or_else(|| RegistryError::ArtifactNotFound {
                    version: version.to_string(),
                    model_type,
                })?;
            let invalid = |source: ModelError| RegistryError::InvalidArtifact {
                version: version.to_string(),
                model_type,
                source,
            };

            let model = decode_model(model_type, &bytes).map_err(invalid)?;
            if model.feature_count() != width {
                return Err(invalid(ModelError::DimensionMismatch {
                    expected: width,
                    actual: model.feature_count(),
                }));
            }
            models.insert(model_type, model);
        }

        let primary = models
            .get(&ModelType::PrimaryClassifier)
            .cloned()
            .ok_or_else(|| RegistryError::InvalidMetadata {
                version: version.to_string(),
                reason: "artifact set has no primary-classifier".to_string(),
            })?;

        let reference = match self.store.get_reference_set(version).await? {
            Some(reference) => match check_reference_width(&metadata, &reference) {
                Ok(()) => Some(reference),
                Err(e) => {
                    warn!(error = %e, "ignoring reference set; calibration disabled");
                    None
                }
            },
            None => {
                info!(version = %version, "no reference set; calibration is pass-through");
                None
            }
        };

        let smoother = match &reference {
            Some(reference) => KnnSmoother::fitted(metadata.smoother, reference).unwrap_or_else(|e| {
                warn!(version = %version, error = %e, "smoother fit failed; calibration is pass-through");
                KnnSmoother::new(metadata.smoother)
            }),
            None => KnnSmoother::new(metadata.smoother),
        };
        let explainer = AttributionExplainer::build(&primary, reference.as_ref(), &self.explainer_config);

        Ok(ActiveBundle {
            metadata,
            models,
            smoother,
            explainer,
            activated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use credence_store::fakes::MemoryArtifactStore;

    fn metadata(version: &str, day: u32) -> VersionMetadata {
        VersionMetadata::new(version, vec!["a".to_string(), "b".to_string()])
            .with_created_at(Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap())
    }

    #[test]
    fn newest_first_orders_by_creation_then_id() {
        let sorted = newest_first(vec![
            metadata("v1", 1),
            metadata("v3", 3),
            metadata("v2b", 2),
            metadata("v2a", 2),
        ]);
        let ids: Vec<&str> = sorted.iter().map(|m| m.version.as_str()).collect();
        assert_eq!(ids, vec!["v3", "v2b", "v2a", "v1"]);
    }

    #[test]
    fn metadata_validation() {
        assert!(validate_metadata(&metadata("v1", 1)).is_ok());

        let no_features = VersionMetadata::new("v1", vec![]);
        assert!(matches!(
            validate_metadata(&no_features),
            Err(RegistryError::InvalidMetadata { .. })
        ));

        let bad_threshold = metadata("v1", 1).with_threshold(1.5);
        assert!(validate_metadata(&bad_threshold).is_err());

        let no_primary = metadata("v1", 1).with_model_types(vec![ModelType::LinearBaseline]);
        let err = validate_metadata(&no_primary).unwrap_err();
        assert!(err.to_string().contains("primary-classifier"));
    }

    #[test]
    fn reference_width_must_match() {
        let meta = metadata("v1", 1);
        let good = ReferenceSet::new(vec![vec![0.0, 1.0]], vec![0.5]);
        let bad = ReferenceSet::new(vec![vec![0.0, 1.0], vec![0.0]], vec![0.5, 0.5]);
        assert!(check_reference_width(&meta, &good).is_ok());
        assert!(matches!(
            check_reference_width(&meta, &bad),
            Err(RegistryError::InvalidReference { .. })
        ));
    }

    #[tokio::test]
    async fn empty_registry_has_no_active_model() {
        let store = Arc::new(MemoryArtifactStore::new());
        let registry = ModelRegistry::bootstrap(store, ExplainerConfig::new(10, 2)).await;
        assert!(registry.snapshot().is_none());
        assert!(matches!(
            registry.get_active_model(ModelType::PrimaryClassifier),
            Err(RegistryError::NoActiveVersion)
        ));
        assert!(registry.list_versions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_version_is_not_found() {
        let registry = ModelRegistry::new(
            Arc::new(MemoryArtifactStore::new()),
            ExplainerConfig::new(10, 2),
        );
        let err = registry.activate_version("v404").await.unwrap_err();
        assert!(matches!(err, RegistryError::VersionNotFound(v) if v == "v404"));
    }
}
