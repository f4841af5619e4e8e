//! Credence CLI
//!
//! The `credence` command manages model versions in a filesystem artifact
//! store and scores feature vectors against the active one.
//!
//! ## Commands
//!
//! - `versions`: List published versions, newest first
//! - `activate`: Load a version and make it active
//! - `rollback`: Return to the previous version
//! - `publish`: Store a version bundle from a directory
//! - `score`: Score one feature vector
//! - `batch-score`: Score a JSON array of feature vectors
//!
//! The active version is pinned in `<store-dir>/ACTIVE` so it survives
//! between invocations. Without a pin the newest version is used.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use credence_core::{
    decode_model, label_reference, publish_version, ExplainerConfig, ModelHandle, ModelRegistry,
    ModelType, ReferenceSet, ScoringConfig, ScoringService, VersionMetadata, METRICS,
};
use credence_narrative::{NarrativeConfig, NarrativeService};
use credence_store::{ArtifactStore, FsArtifactStore};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{warn, Level};

/// File under the store directory naming the active version.
const ACTIVE_FILE: &str = "ACTIVE";

#[derive(Parser)]
#[command(name = "credence")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Credit-risk model registry and scoring", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Artifact store directory
    #[arg(
        long,
        global = true,
        env = "CREDENCE_STORE_DIR",
        default_value = ".credence"
    )]
    store_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List published versions, newest first
    Versions,

    /// Load a version and make it active
    Activate {
        /// Version identifier
        version: String,
    },

    /// Activate the previous version
    Rollback,

    /// Publish a version bundle
    ///
    /// The directory holds `metadata.json`, one `<model-type>.json` per
    /// entry of `model_types`, and optionally `reference.json`. A reference
    /// set without probabilities is labelled with the primary classifier.
    Publish {
        /// Bundle directory
        bundle: PathBuf,
    },

    /// Score one feature vector
    Score {
        /// Comma-separated feature values, in metadata order
        #[arg(
            short,
            long,
            required = true,
            value_delimiter = ',',
            allow_hyphen_values = true
        )]
        features: Vec<f64>,

        /// Include per-feature attributions
        #[arg(long)]
        explain: bool,
    },

    /// Score a JSON file holding an array of feature vectors
    BatchScore {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Include per-feature attributions
        #[arg(long)]
        explain: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    credence_core::init_tracing(cli.json, level);

    let store_dir = cli.store_dir.as_path();
    match cli.command {
        Commands::Versions => cmd_versions(store_dir).await,
        Commands::Activate { version } => cmd_activate(store_dir, &version).await,
        Commands::Rollback => cmd_rollback(store_dir).await,
        Commands::Publish { bundle } => cmd_publish(store_dir, &bundle).await,
        Commands::Score { features, explain } => cmd_score(store_dir, &features, explain).await,
        Commands::BatchScore { input, explain } => {
            cmd_batch_score(store_dir, &input, explain).await
        }
    }
}

fn open_store(store_dir: &Path) -> Result<Arc<dyn ArtifactStore>> {
    let store = FsArtifactStore::new(store_dir)
        .with_context(|| format!("Failed to open artifact store at {:?}", store_dir))?;
    Ok(Arc::new(store))
}

/// Registry with the pinned version active, or the newest one without a pin.
async fn open_registry(store_dir: &Path) -> Result<Arc<ModelRegistry>> {
    let store = open_store(store_dir)?;
    let config = ExplainerConfig::from_env();

    let registry = match read_pin(store_dir)? {
        Some(version) => {
            let registry = ModelRegistry::new(store, config);
            if let Err(e) = registry.activate_version(&version).await {
                warn!(version = %version, error = %e, "pinned version failed to load");
            }
            registry
        }
        None => ModelRegistry::bootstrap(store, config).await,
    };
    Ok(Arc::new(registry))
}

fn read_pin(store_dir: &Path) -> Result<Option<String>> {
    let path = store_dir.join(ACTIVE_FILE);
    match std::fs::read_to_string(&path) {
        Ok(text) => Ok(Some(text.trim().to_string()).filter(|v| !v.is_empty())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", path)),
    }
}

fn write_pin(store_dir: &Path, version: &str) -> Result<()> {
    std::fs::create_dir_all(store_dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(store_dir)?;
    writeln!(tmp, "{}", version)?;
    tmp.persist(store_dir.join(ACTIVE_FILE))
        .context("Failed to pin active version")?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse {:?}", path))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// List versions
async fn cmd_versions(store_dir: &Path) -> Result<()> {
    let registry = open_registry(store_dir).await?;
    let versions = registry.list_versions().await?;

    if versions.is_empty() {
        println!("No versions published. Run 'credence publish <bundle>' first.");
        return Ok(());
    }

    for version in versions {
        let prefix = if version.is_active { "* " } else { "  " };
        let metrics: Vec<String> = version
            .metrics
            .iter()
            .map(|(name, value)| format!("{}={:.4}", name, value))
            .collect();
        println!(
            "{}{}  {}  {}",
            prefix,
            version.version,
            version.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            metrics.join(" ")
        );
    }

    Ok(())
}

/// Activate a version and pin it
async fn cmd_activate(store_dir: &Path, version: &str) -> Result<()> {
    let registry = ModelRegistry::new(open_store(store_dir)?, ExplainerConfig::from_env());
    registry
        .activate_version(version)
        .await
        .with_context(|| format!("Failed to activate version '{}'", version))?;
    write_pin(store_dir, version)?;

    println!("Activated version '{}'", version);
    Ok(())
}

/// Roll back and pin the result
async fn cmd_rollback(store_dir: &Path) -> Result<()> {
    let registry = open_registry(store_dir).await?;
    let from = registry.active_version();
    let version = registry
        .rollback_to_previous()
        .await
        .context("Rollback failed")?;
    write_pin(store_dir, &version)?;

    println!(
        "Rolled back from '{}' to '{}'",
        from.as_deref().unwrap_or("none"),
        version
    );
    Ok(())
}

/// Models and optional reference set named by a bundle directory.
struct Bundle {
    metadata: VersionMetadata,
    models: BTreeMap<ModelType, ModelHandle>,
    reference: Option<ReferenceSet>,
}

fn load_bundle(dir: &Path) -> Result<Bundle> {
    let metadata: VersionMetadata = read_json(&dir.join("metadata.json"))?;

    let mut models = BTreeMap::new();
    for &model_type in &metadata.model_types {
        let path = dir.join(format!("{}.json", model_type));
        let bytes = std::fs::read(&path).with_context(|| format!("Failed to read {:?}", path))?;
        let model = decode_model(model_type, &bytes)
            .with_context(|| format!("Invalid {} artifact {:?}", model_type, path))?;
        models.insert(model_type, model);
    }

    let reference_path = dir.join("reference.json");
    let reference = if reference_path.exists() {
        let reference: ReferenceSet = read_json(&reference_path)?;
        if reference.probabilities.is_empty() && !reference.is_empty() {
            let Some(primary) = models.get(&ModelType::PrimaryClassifier) else {
                bail!("bundle has no primary-classifier to label the reference set");
            };
            Some(label_reference(primary, reference.features)?)
        } else {
            Some(reference)
        }
    } else {
        None
    };

    Ok(Bundle {
        metadata,
        models,
        reference,
    })
}

/// Publish a bundle directory
async fn cmd_publish(store_dir: &Path, bundle_dir: &Path) -> Result<()> {
    let bundle = load_bundle(bundle_dir)?;
    let store = open_store(store_dir)?;

    let published = publish_version(
        store.as_ref(),
        &bundle.metadata,
        &bundle.models,
        bundle.reference.as_ref(),
    )
    .await
    .with_context(|| format!("Failed to publish version '{}'", bundle.metadata.version))?;

    println!("Published version '{}'", published.version);
    for (model_type, digest) in &published.digests {
        println!("  {:<22} {}", model_type, digest.short());
    }
    if published.reference_rows > 0 {
        println!("  reference set          {} rows", published.reference_rows);
    }
    Ok(())
}

fn scoring_service(registry: Arc<ModelRegistry>) -> ScoringService {
    let narrator = NarrativeService::from_config(&NarrativeConfig::from_env());
    ScoringService::new(registry, Arc::new(narrator), ScoringConfig::from_env())
}

/// Score one feature vector
async fn cmd_score(store_dir: &Path, features: &[f64], explain: bool) -> Result<()> {
    let service = scoring_service(open_registry(store_dir).await?);
    let result = service.score(features, explain).await?;
    print_json(&result)
}

/// Score a batch from a JSON file
async fn cmd_batch_score(store_dir: &Path, input: &Path, explain: bool) -> Result<()> {
    let batch: Vec<Vec<f64>> = read_json(input)?;
    let service = scoring_service(open_registry(store_dir).await?);
    if service.registry().active_version().is_none() {
        bail!("No active version. Run 'credence activate <version>' first.");
    }

    let outcome = service.batch_score(&batch, explain).await;
    METRICS.flush();
    print_json(&outcome)
}
