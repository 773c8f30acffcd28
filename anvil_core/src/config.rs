//! Configuration for the asset pipeline
//!
//! Values come from `anvil.toml`, then environment variables, then built-in
//! defaults. Environment variables always win.

use crate::error::{AnvilError, AnvilResult};
use crate::params::ConversionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default name of the configuration file looked up by [`AnvilConfig::discover`]
pub const CONFIG_FILE_NAME: &str = "anvil.toml";

/// Top level pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnvilConfig {
    /// Root of the on-disk asset hierarchy
    #[serde(default = "default_asset_root")]
    pub asset_root: PathBuf,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Deployment-wide overrides of the engine conversion defaults
    #[serde(default)]
    pub conversion: ConversionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Whether the in-process engine importer may be acquired
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_up_axis")]
    pub up_axis: String,
    #[serde(default = "default_meters_per_unit")]
    pub meters_per_unit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Simulation instance address: bare host, `host:port`, or full URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total load attempts made by the orchestrator (1 = no retry)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_asset_root() -> PathBuf {
    PathBuf::from("assets")
}

fn default_up_axis() -> String {
    "Z".to_string()
}

fn default_meters_per_unit() -> f64 {
    1.0
}

fn default_endpoint() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    1
}

fn default_backoff_ms() -> u64 {
    500
}

impl Default for AnvilConfig {
    fn default() -> Self {
        Self {
            asset_root: default_asset_root(),
            engine: EngineConfig::default(),
            remote: RemoteConfig::default(),
            retry: RetryConfig::default(),
            conversion: ConversionConfig::new(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            up_axis: default_up_axis(),
            meters_per_unit: default_meters_per_unit(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AnvilConfig {
    /// Load configuration from a TOML file and apply environment overrides
    pub fn load(path: &Path) -> AnvilResult<Self> {
        Self::load_with(path, env_var)
    }

    fn load_with(path: &Path, env: impl Fn(&str) -> Option<String>) -> AnvilResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AnvilError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut config: AnvilConfig = toml::from_str(&content)?;
        config.apply_overrides(env)?;
        Ok(config)
    }

    /// Use `anvil.toml` from the current directory if present, defaults otherwise
    pub fn discover() -> AnvilResult<Self> {
        let path = PathBuf::from(CONFIG_FILE_NAME);
        if path.exists() {
            tracing::debug!("Loading configuration from {}", path.display());
            return Self::load(&path);
        }

        let mut config = Self::default();
        config.apply_overrides(env_var)?;
        Ok(config)
    }

    /// Configuration rooted at `asset_root` with every other value defaulted
    pub fn with_root(asset_root: impl Into<PathBuf>) -> Self {
        Self {
            asset_root: asset_root.into(),
            ..Self::default()
        }
    }

    /// Environment values win over the file; `env` looks a variable up by name
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) -> AnvilResult<()> {
        if let Some(root) = env("ANVIL_ASSET_ROOT") {
            self.asset_root = PathBuf::from(root);
        }
        if let Some(endpoint) = env("ANVIL_ENGINE_ENDPOINT") {
            self.remote.endpoint = endpoint;
        }
        if let Some(enabled) = env("ANVIL_ENGINE_ENABLED") {
            self.engine.enabled = parse_flag("ANVIL_ENGINE_ENABLED", &enabled)?;
        }
        if let Some(timeout) = env("ANVIL_LOAD_TIMEOUT_SECS") {
            self.remote.timeout_secs = timeout.parse().map_err(|_| {
                AnvilError::Config(format!(
                    "ANVIL_LOAD_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                    timeout
                ))
            })?;
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_flag(name: &str, value: &str) -> AnvilResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AnvilError::Config(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}
