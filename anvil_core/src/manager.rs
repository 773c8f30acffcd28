//! Pipeline orchestration
//!
//! [`AssetManager`] runs upload, convert, validate and load for one bundle,
//! stopping at the first failing stage, and keeps track of robots the engine
//! has accepted.

use crate::config::{AnvilConfig, RetryConfig};
use crate::convert::{create_converter, ConversionStrategy, SceneConverter};
use crate::engine::EngineHandle;
use crate::error::{AnvilError, AnvilResult, ErrorKind};
use crate::params::ConversionConfig;
use crate::remote::{LoadResult, RemoteLoadClient};
use crate::store::{validate_bundle_name, AssetInfo, AssetStore, BundleSources, RobotBundle};
use crate::validate::{RobotInfo, SceneValidator, ValidationReport};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Everything needed to take one robot from source files to a loaded instance
#[derive(Debug, Clone, Default)]
pub struct BundleRequest {
    pub name: String,
    pub sources: BundleSources,
    /// Bundle configuration, stored in metadata and sent with the load request
    pub config: BTreeMap<String, Value>,
    /// Conversion overrides for this run
    pub conversion: ConversionConfig,
}

impl BundleRequest {
    pub fn new(name: impl Into<String>, sources: BundleSources) -> Self {
        Self {
            name: name.into(),
            sources,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Upload,
    Convert,
    Validate,
    Load,
    Complete,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Upload => "upload",
            PipelineStage::Convert => "convert",
            PipelineStage::Validate => "validate",
            PipelineStage::Load => "load",
            PipelineStage::Complete => "complete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&AnvilError> for StageError {
    fn from(err: &AnvilError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result of [`AssetManager::run_pipeline`]; `stage` is the last stage reached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub success: bool,
    pub stage: PipelineStage,
    pub error: Option<StageError>,
    pub document_path: Option<PathBuf>,
    pub load_result: Option<LoadResult>,
}

impl PipelineOutcome {
    fn failed(stage: PipelineStage, error: StageError) -> Self {
        Self {
            success: false,
            stage,
            error: Some(error),
            document_path: None,
            load_result: None,
        }
    }
}

/// How many times the load stage is attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }
}

/// A robot the engine accepted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedRobot {
    pub name: String,
    pub document_path: PathBuf,
    pub id: Option<String>,
    pub config: BTreeMap<String, Value>,
    pub loaded_at: DateTime<Utc>,
}

pub struct AssetManager {
    config: AnvilConfig,
    store: AssetStore,
    converter: Box<dyn SceneConverter>,
    validator: SceneValidator,
    client: RemoteLoadClient,
    retry: RetryPolicy,
    loaded: RwLock<HashMap<String, LoadedRobot>>,
}

impl AssetManager {
    /// Build a manager; without an engine handle the mock converter and basic validator are used
    pub fn new(config: AnvilConfig, engine: Option<Arc<EngineHandle>>) -> AnvilResult<Self> {
        let store = AssetStore::new(&config.asset_root);
        store.ensure_directories()?;

        let converter = create_converter(engine.clone());
        let validator = SceneValidator::for_engine(engine);
        let client = RemoteLoadClient::new(&config.remote)?;
        let retry = RetryPolicy::from(&config.retry);

        tracing::info!(
            "Asset manager ready (root: {}, converter: {}, endpoint: {})",
            store.root().display(),
            converter.strategy(),
            client.endpoint()
        );

        Ok(Self {
            config,
            store,
            converter,
            validator,
            client,
            retry,
            loaded: RwLock::new(HashMap::new()),
        })
    }

    /// Acquire the engine when configured, falling back to the mock strategy when it is unavailable
    pub fn connect(config: AnvilConfig) -> AnvilResult<Self> {
        let engine = match EngineHandle::acquire(&config.engine) {
            Ok(handle) => Some(Arc::new(handle)),
            Err(AnvilError::EngineUnavailable(reason)) => {
                tracing::debug!("Engine unavailable: {}", reason);
                None
            }
            Err(e) => return Err(e),
        };
        Self::new(config, engine)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &AnvilConfig {
        &self.config
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    pub fn strategy(&self) -> ConversionStrategy {
        self.converter.strategy()
    }

    pub fn upload(
        &self,
        name: &str,
        sources: &BundleSources,
        config: &BTreeMap<String, Value>,
    ) -> AnvilResult<RobotBundle> {
        self.store.upload_bundle(name, sources, config)
    }

    /// Convert an uploaded bundle into `scenes/<name>.usd`
    pub fn convert_bundle(&self, name: &str, overrides: &ConversionConfig) -> AnvilResult<PathBuf> {
        let bundle = self.store.bundle(name)?;
        let description = bundle
            .description_path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.store.bundle_dir(name).join(format!("{}.urdf", name)));

        for (key, value) in overrides.iter() {
            tracing::debug!("Conversion override for '{}': {} = {}", name, key, value);
        }
        let conversion = overrides.merged_over(&self.config.conversion);
        self.converter
            .convert(&description, &self.store.scene_path(name), name, &conversion)
    }

    pub fn validate(&self, document: &Path) -> bool {
        self.validator.validate(document)
    }

    pub fn validation_report(&self, document: &Path) -> ValidationReport {
        self.validator.report(document)
    }

    pub fn describe(&self, document: &Path) -> RobotInfo {
        self.validator.describe(document)
    }

    /// Ship a document to the engine, retrying per the configured policy
    pub fn load(&self, document: &Path, config: &BTreeMap<String, Value>) -> LoadResult {
        let mut attempt = 1;
        loop {
            let result = self.client.load(document, config);
            if result.success || attempt >= self.retry.max_attempts {
                return result;
            }
            tracing::warn!(
                "Load attempt {}/{} failed: {}",
                attempt,
                self.retry.max_attempts,
                result.error.as_deref().unwrap_or("unknown error")
            );
            std::thread::sleep(self.retry.backoff);
            attempt += 1;
        }
    }

    /// Upload, convert, validate and load one bundle
    pub fn run_pipeline(&self, request: &BundleRequest) -> PipelineOutcome {
        let name = request.name.as_str();
        tracing::info!("Starting pipeline for '{}'", name);

        if let Err(e) = self.upload(name, &request.sources, &request.config) {
            tracing::error!("Pipeline '{}' failed at upload: {}", name, e);
            return PipelineOutcome::failed(PipelineStage::Upload, StageError::from(&e));
        }

        let document = match self.convert_bundle(name, &request.conversion) {
            Ok(path) => path,
            Err(e) => {
                tracing::error!("Pipeline '{}' failed at convert: {}", name, e);
                return PipelineOutcome::failed(PipelineStage::Convert, StageError::from(&e));
            }
        };

        let report = self.validator.report(&document);
        if !report.valid {
            tracing::error!("Pipeline '{}' failed at validate: {:?}", name, report.errors);
            let mut outcome = PipelineOutcome::failed(
                PipelineStage::Validate,
                StageError {
                    kind: ErrorKind::ValidationFailed,
                    message: report.errors.join("; "),
                },
            );
            outcome.document_path = Some(document);
            return outcome;
        }

        let result = self.load(&document, &request.config);
        if !result.success {
            tracing::error!("Pipeline '{}' failed at load", name);
            return PipelineOutcome {
                success: false,
                stage: PipelineStage::Load,
                error: Some(StageError {
                    kind: ErrorKind::RemoteLoadFailed,
                    message: result.error.clone().unwrap_or_default(),
                }),
                document_path: Some(document),
                load_result: Some(result),
            };
        }

        self.loaded.write().insert(
            name.to_string(),
            LoadedRobot {
                name: name.to_string(),
                document_path: document.clone(),
                id: result.id.clone(),
                config: request.config.clone(),
                loaded_at: result.timestamp,
            },
        );
        tracing::info!("Pipeline for '{}' complete", name);

        PipelineOutcome {
            success: true,
            stage: PipelineStage::Complete,
            error: None,
            document_path: Some(document),
            load_result: Some(result),
        }
    }

    pub fn loaded_robots(&self) -> Vec<LoadedRobot> {
        let mut robots: Vec<LoadedRobot> = self.loaded.read().values().cloned().collect();
        robots.sort_by(|a, b| a.name.cmp(&b.name));
        robots
    }

    /// Replace a loaded robot's configuration wholesale (no merge)
    pub fn update_robot_config(
        &self,
        name: &str,
        config: BTreeMap<String, Value>,
    ) -> AnvilResult<()> {
        let mut loaded = self.loaded.write();
        let robot = loaded
            .get_mut(name)
            .ok_or_else(|| AnvilError::RobotNotLoaded(name.to_string()))?;

        self.store.replace_config(name, config.clone())?;
        robot.config = config;
        tracing::info!("Replaced configuration of '{}'", name);
        Ok(())
    }

    pub fn list_bundles(&self) -> AnvilResult<Vec<RobotBundle>> {
        self.store.list_bundles()
    }

    /// Remove a bundle together with its converted scene
    pub fn remove_bundle(&self, name: &str) -> bool {
        if let Err(e) = validate_bundle_name(name) {
            tracing::warn!("Not removing bundle: {}", e);
            return false;
        }
        self.loaded.write().remove(name);

        let scene = self.store.scene_path(name);
        if scene.is_file() {
            if let Err(e) = std::fs::remove_file(&scene) {
                tracing::warn!("Failed to remove scene {}: {}", scene.display(), e);
            }
        }
        self.store.remove_bundle(name)
    }

    pub fn inspect(&self, path: &Path) -> AssetInfo {
        self.store.inspect(path)
    }

    pub fn clear_cache(&self) -> AnvilResult<()> {
        self.store.clear_cache()
    }
}
