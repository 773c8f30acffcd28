//! Error types shared by every stage of the asset pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the asset store, converters, validator and load client
#[derive(Debug, Error)]
pub enum AnvilError {
    #[error("Asset not found: {}", .0.display())]
    AssetNotFound(PathBuf),

    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Invalid bundle name '{0}'")]
    InvalidBundleName(String),

    #[error("Duplicate asset file name '{0}' in bundle")]
    DuplicateAsset(String),

    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("Scene validation failed: {0}")]
    ValidationFailed(String),

    #[error("Remote load failed: {0}")]
    RemoteLoadFailed(String),

    #[error("Simulation engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Simulation engine handle has been released")]
    EngineReleased,

    #[error("Robot '{0}' is not loaded")]
    RobotNotLoaded(String),

    #[error("Scene parse error at line {line}: {message}")]
    SceneParse { line: usize, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Coarse classification of an [`AnvilError`], used when reporting stage failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AssetNotFound,
    SourceNotFound,
    ConversionFailed,
    ValidationFailed,
    RemoteLoadFailed,
    EngineUnavailable,
    InvalidInput,
    Io,
    Other,
}

impl AnvilError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnvilError::AssetNotFound(_) => ErrorKind::AssetNotFound,
            AnvilError::SourceNotFound(_) => ErrorKind::SourceNotFound,
            AnvilError::ConversionFailed(_) | AnvilError::SceneParse { .. } => {
                ErrorKind::ConversionFailed
            }
            AnvilError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            AnvilError::RemoteLoadFailed(_) => ErrorKind::RemoteLoadFailed,
            AnvilError::EngineUnavailable(_) | AnvilError::EngineReleased => {
                ErrorKind::EngineUnavailable
            }
            AnvilError::InvalidBundleName(_)
            | AnvilError::DuplicateAsset(_)
            | AnvilError::InvalidConfig { .. }
            | AnvilError::RobotNotLoaded(_) => ErrorKind::InvalidInput,
            AnvilError::Io(_) => ErrorKind::Io,
            AnvilError::Config(_) | AnvilError::Json(_) | AnvilError::Toml(_) => ErrorKind::Other,
        }
    }

    pub fn invalid_config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        AnvilError::InvalidConfig {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        AnvilError::SceneParse {
            line,
            message: message.into(),
        }
    }
}

/// Result type for pipeline operations
pub type AnvilResult<T> = Result<T, AnvilError>;
