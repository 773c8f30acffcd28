//! Simulation engine access
//!
//! The engine is an explicitly owned resource. An [`EngineHandle`] is acquired
//! once, shared by the converter and validator through an `Arc`, and released
//! either explicitly or when the last owner drops it. Nothing is kept in
//! process-wide state, so acquiring again after a release starts a fresh engine.

pub mod urdf_import;

use crate::config::EngineConfig;
use crate::error::{AnvilError, AnvilResult};
use crate::params::ImportSettings;
use crate::scene::SceneDocument;
use parking_lot::Mutex;
use std::path::Path;

pub use urdf_import::UrdfImportEngine;

/// Operations the pipeline needs from a simulation engine
pub trait SimulationEngine: Send {
    /// Engine identity used in logs
    fn name(&self) -> &str;

    /// Import a robot description into a scene rooted at `prim_name`
    ///
    /// On failure the returned string is the engine's diagnostic.
    fn import_robot(
        &mut self,
        urdf_path: &Path,
        prim_name: &str,
        settings: &ImportSettings,
    ) -> Result<SceneDocument, String>;

    /// Open a persisted scene document
    fn open_document(&mut self, path: &Path) -> Result<SceneDocument, String>;

    /// Release engine-side resources
    fn shutdown(&mut self) {}
}

/// Owned handle to one engine instance
///
/// Calls are serialized; the engine is not assumed to be re-entrant.
pub struct EngineHandle {
    name: String,
    engine: Mutex<Option<Box<dyn SimulationEngine>>>,
}

impl EngineHandle {
    /// Acquire the built-in engine described by `config`
    pub fn acquire(config: &EngineConfig) -> AnvilResult<Self> {
        if !config.enabled {
            return Err(AnvilError::EngineUnavailable(
                "engine disabled in configuration ([engine] enabled = false)".to_string(),
            ));
        }

        let engine = UrdfImportEngine::new(config.up_axis.clone(), config.meters_per_unit)?;
        Ok(Self::with_engine(Box::new(engine)))
    }

    /// Wrap a custom engine backend
    pub fn with_engine(engine: Box<dyn SimulationEngine>) -> Self {
        let name = engine.name().to_string();
        tracing::info!("Simulation engine '{}' acquired", name);
        Self {
            name,
            engine: Mutex::new(Some(engine)),
        }
    }

    /// Acquire, run `f`, and release before returning
    pub fn scoped<T>(config: &EngineConfig, f: impl FnOnce(&EngineHandle) -> T) -> AnvilResult<T> {
        let handle = Self::acquire(config)?;
        let result = f(&handle);
        handle.release();
        Ok(result)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the engine is still held by this handle
    pub fn is_active(&self) -> bool {
        self.engine.lock().is_some()
    }

    pub fn import_robot(
        &self,
        urdf_path: &Path,
        prim_name: &str,
        settings: &ImportSettings,
    ) -> AnvilResult<SceneDocument> {
        let mut guard = self.engine.lock();
        let engine = guard.as_mut().ok_or(AnvilError::EngineReleased)?;
        engine
            .import_robot(urdf_path, prim_name, settings)
            .map_err(AnvilError::ConversionFailed)
    }

    pub fn open_document(&self, path: &Path) -> AnvilResult<SceneDocument> {
        let mut guard = self.engine.lock();
        let engine = guard.as_mut().ok_or(AnvilError::EngineReleased)?;
        engine
            .open_document(path)
            .map_err(AnvilError::ValidationFailed)
    }

    /// Shut the engine down; later calls fail with [`AnvilError::EngineReleased`]
    pub fn release(&self) {
        if let Some(mut engine) = self.engine.lock().take() {
            engine.shutdown();
            tracing::info!("Simulation engine '{}' released", self.name);
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("name", &self.name)
            .field("active", &self.is_active())
            .finish()
    }
}
