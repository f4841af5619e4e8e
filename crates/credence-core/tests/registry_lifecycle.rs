//! Registry lifecycle: activation, rollback, listing and the all-or-nothing
//! swap, against the in-memory and filesystem stores.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use credence_core::{
    label_reference, publish_version, BoostedClassifier, ExplainerConfig, LogisticModel,
    ModelHandle, ModelRegistry, ModelType, RegistryError, TreeEnsemble, VersionMetadata,
};
use credence_store::fakes::MemoryArtifactStore;
use credence_store::{ArtifactStore, FsArtifactStore};

fn feature_names() -> Vec<String> {
    vec!["dti".to_string(), "fico".to_string()]
}

fn models(leaf: f64) -> BTreeMap<ModelType, ModelHandle> {
    let mut models: BTreeMap<ModelType, ModelHandle> = BTreeMap::new();
    for model_type in [ModelType::PrimaryClassifier, ModelType::SecondaryClassifier] {
        let ensemble = TreeEnsemble::stump(2, 0, 0.5, -leaf, leaf).expect("stump");
        models.insert(model_type, Arc::new(BoostedClassifier::new(model_type, ensemble)));
    }
    models.insert(
        ModelType::LinearBaseline,
        Arc::new(LogisticModel::new(vec![leaf, -leaf], 0.0).expect("logistic")),
    );
    models
}

async fn publish(store: &dyn ArtifactStore, version: &str, day: u32, leaf: f64) {
    let models = models(leaf);
    let grid = (0..10).map(|i| vec![i as f64 / 10.0, 0.0]).collect();
    let reference =
        label_reference(&models[&ModelType::PrimaryClassifier], grid).expect("reference");
    let metadata = VersionMetadata::new(version, feature_names())
        .with_created_at(Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap())
        .with_metric("auc", 0.7 + day as f64 / 100.0);
    publish_version(store, &metadata, &models, Some(&reference))
        .await
        .expect("publish");
}

fn registry(store: Arc<dyn ArtifactStore>) -> ModelRegistry {
    ModelRegistry::new(store, ExplainerConfig::new(20, 4))
}

#[tokio::test]
async fn activate_loads_every_artifact() {
    let store = Arc::new(MemoryArtifactStore::new());
    publish(store.as_ref(), "v1", 1, 1.0).await;
    let registry = registry(store);

    let active = registry.activate_version("v1").await.expect("activate");
    assert_eq!(active, "v1");
    assert_eq!(registry.active_version().as_deref(), Some("v1"));

    let bundle = registry.snapshot().expect("bundle");
    assert_eq!(bundle.feature_names(), feature_names().as_slice());
    assert_eq!(bundle.model_types().count(), 3);
    assert!(bundle.smoother().is_fitted());
    assert!(bundle.explainer().is_primary());

    let linear = registry
        .get_active_model(ModelType::LinearBaseline)
        .expect("active")
        .expect("linear loaded");
    assert_eq!(linear.feature_count(), 2);
}

#[tokio::test]
async fn activating_twice_is_idempotent() {
    let store = Arc::new(MemoryArtifactStore::new());
    publish(store.as_ref(), "v1", 1, 1.0).await;
    let registry = registry(store);

    registry.activate_version("v1").await.expect("first");
    let first = registry.snapshot().expect("bundle");
    let again = registry.activate_version("v1").await.expect("second");

    assert_eq!(again, "v1");
    assert!(Arc::ptr_eq(&first, &registry.snapshot().expect("bundle")));
}

#[tokio::test]
async fn rollback_with_two_versions_lands_on_the_inactive_one() {
    let store = Arc::new(MemoryArtifactStore::new());
    publish(store.as_ref(), "v1", 1, 1.0).await;
    publish(store.as_ref(), "v2", 2, 2.0).await;
    let registry = registry(store);

    registry.activate_version("v2").await.expect("activate v2");
    assert_eq!(registry.rollback_to_previous().await.expect("rollback"), "v1");
    assert_eq!(registry.active_version().as_deref(), Some("v1"));

    // second-newest is active now, so rollback goes to the newest
    assert_eq!(registry.rollback_to_previous().await.expect("rollback"), "v2");
    assert_eq!(registry.active_version().as_deref(), Some("v2"));
}

#[tokio::test]
async fn rollback_from_nothing_active_targets_second_newest() {
    let store = Arc::new(MemoryArtifactStore::new());
    publish(store.as_ref(), "v1", 1, 1.0).await;
    publish(store.as_ref(), "v2", 2, 2.0).await;
    publish(store.as_ref(), "v3", 3, 3.0).await;
    let registry = registry(store);

    assert_eq!(registry.rollback_to_previous().await.expect("rollback"), "v2");
}

#[tokio::test]
async fn rollback_with_one_version_is_insufficient_history() {
    let store = Arc::new(MemoryArtifactStore::new());
    publish(store.as_ref(), "v1", 1, 1.0).await;
    let registry = registry(store);
    registry.activate_version("v1").await.expect("activate");

    let err = registry.rollback_to_previous().await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::InsufficientHistory { available: 1 }
    ));
    assert_eq!(registry.active_version().as_deref(), Some("v1"));
}

#[tokio::test]
async fn missing_artifact_leaves_previous_bundle_untouched() {
    let store = Arc::new(MemoryArtifactStore::new());
    publish(store.as_ref(), "v1", 1, 1.0).await;
    publish(store.as_ref(), "v2", 2, 2.0).await;
    assert!(store.remove_artifact("v2", ModelType::SecondaryClassifier));

    let registry = registry(store.clone());
    registry.activate_version("v1").await.expect("activate v1");
    let before = registry.snapshot().expect("bundle");

    let err = registry.activate_version("v2").await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::ArtifactNotFound {
            ref version,
            model_type: ModelType::SecondaryClassifier,
        } if version == "v2"
    ));
    assert!(!err.is_retryable());

    let after = registry.snapshot().expect("bundle");
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(after.version(), "v1");
}

#[tokio::test]
async fn undecodable_artifact_is_invalid() {
    let store = Arc::new(MemoryArtifactStore::new());
    publish(store.as_ref(), "v1", 1, 1.0).await;
    store
        .put_artifact("broken", ModelType::PrimaryClassifier, b"{\"trees\": 7}")
        .await
        .expect("put");
    store
        .put_metadata(
            &VersionMetadata::new("broken", feature_names())
                .with_model_types(vec![ModelType::PrimaryClassifier]),
        )
        .await
        .expect("put metadata");

    let registry = registry(store);
    registry.activate_version("v1").await.expect("activate v1");
    let err = registry.activate_version("broken").await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::InvalidArtifact {
            model_type: ModelType::PrimaryClassifier,
            ..
        }
    ));
    assert_eq!(registry.active_version().as_deref(), Some("v1"));
}

#[tokio::test]
async fn held_snapshot_survives_activation() {
    let store = Arc::new(MemoryArtifactStore::new());
    publish(store.as_ref(), "v1", 1, 1.0).await;
    publish(store.as_ref(), "v2", 2, 2.0).await;
    let registry = registry(store);

    registry.activate_version("v1").await.expect("v1");
    let held = registry.snapshot().expect("bundle");
    registry.activate_version("v2").await.expect("v2");

    assert_eq!(held.version(), "v1");
    assert_eq!(registry.active_version().as_deref(), Some("v2"));
}

#[tokio::test]
async fn list_versions_is_newest_first_with_live_active_flag() {
    let store = Arc::new(MemoryArtifactStore::new());
    publish(store.as_ref(), "v2", 2, 2.0).await;
    publish(store.as_ref(), "v1", 1, 1.0).await;
    publish(store.as_ref(), "v3", 3, 3.0).await;
    let registry = registry(store);

    let listed = registry.list_versions().await.expect("list");
    let ids: Vec<&str> = listed.iter().map(|v| v.version.as_str()).collect();
    assert_eq!(ids, vec!["v3", "v2", "v1"]);
    assert!(listed.iter().all(|v| !v.is_active));
    assert!((listed[0].metrics["auc"] - 0.73).abs() < 1e-12);

    registry.activate_version("v2").await.expect("activate");
    let listed = registry.list_versions().await.expect("list");
    let active: Vec<&str> = listed
        .iter()
        .filter(|v| v.is_active)
        .map(|v| v.version.as_str())
        .collect();
    assert_eq!(active, vec!["v2"]);
}

#[tokio::test]
async fn model_outside_artifact_set_is_none() {
    let store = Arc::new(MemoryArtifactStore::new());
    let metadata = VersionMetadata::new("slim", feature_names())
        .with_model_types(vec![ModelType::PrimaryClassifier]);
    publish_version(store.as_ref(), &metadata, &models(1.0), None)
        .await
        .expect("publish");

    let registry = registry(store);
    registry.activate_version("slim").await.expect("activate");
    assert!(registry
        .get_active_model(ModelType::SecondaryClassifier)
        .expect("active")
        .is_none());

    // no reference set: version still activates, calibration passes through
    let bundle = registry.snapshot().expect("bundle");
    assert!(!bundle.smoother().is_fitted());
}

#[tokio::test]
async fn bootstrap_activates_most_recent_version() {
    let store = Arc::new(MemoryArtifactStore::new());
    publish(store.as_ref(), "v1", 1, 1.0).await;
    publish(store.as_ref(), "v2", 2, 2.0).await;

    let registry = ModelRegistry::bootstrap(store, ExplainerConfig::new(20, 4)).await;
    assert_eq!(registry.active_version().as_deref(), Some("v2"));
}

#[tokio::test]
async fn bootstrap_failure_leaves_registry_empty() {
    let store = Arc::new(MemoryArtifactStore::new());
    publish(store.as_ref(), "v1", 1, 1.0).await;
    store.remove_artifact("v1", ModelType::LinearBaseline);

    let registry = ModelRegistry::bootstrap(store, ExplainerConfig::new(20, 4)).await;
    assert!(registry.active_version().is_none());
    assert!(matches!(
        registry.get_active_model(ModelType::PrimaryClassifier),
        Err(RegistryError::NoActiveVersion)
    ));
}

#[tokio::test]
async fn filesystem_store_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let store = FsArtifactStore::new(dir.path()).expect("fs store");
        publish(&store, "v1", 1, 1.0).await;
        publish(&store, "v2", 2, 2.0).await;
    }

    let reopened = FsArtifactStore::new(dir.path()).expect("reopen");
    let registry = registry(Arc::new(reopened));
    registry.activate_version("v1").await.expect("activate");
    let bundle = registry.snapshot().expect("bundle");
    assert!(bundle.smoother().is_fitted());
    assert_eq!(registry.rollback_to_previous().await.expect("rollback"), "v2");
}
