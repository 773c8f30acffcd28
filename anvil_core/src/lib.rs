//! # ANVIL Core
//!
//! Robot asset pipeline for remote simulation engines.
//!
//! Takes a robot description (URDF plus meshes and textures) from raw files to
//! an instance loaded in a running simulation:
//!
//! - **Store**: named robot bundles on disk with JSON metadata
//! - **Convert**: URDF to an engine-native scene document, with a mock fallback
//! - **Validate**: structural checks on converted documents
//! - **Remote**: ships a document to the engine's load endpoint
//! - **Manager**: runs the stages in order and tracks loaded robots
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use anvil_core::{AnvilConfig, AssetManager, BundleRequest, BundleSources};
//!
//! let manager = AssetManager::connect(AnvilConfig::with_root("assets")).unwrap();
//! let request = BundleRequest::new("arm1", BundleSources::with_description("arm1.urdf"));
//! let outcome = manager.run_pipeline(&request);
//! println!("reached {} (success: {})", outcome.stage, outcome.success);
//! ```

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod manager;
pub mod params;
pub mod remote;
pub mod scene;
pub mod store;
pub mod validate;

// Re-export commonly used types for easy access
pub use config::AnvilConfig;
pub use convert::{create_converter, ConversionStrategy, SceneConverter};
pub use engine::{EngineHandle, SimulationEngine};
pub use error::{AnvilError, AnvilResult, ErrorKind};
pub use manager::{AssetManager, BundleRequest, PipelineOutcome, PipelineStage, RetryPolicy};
pub use params::{ConversionConfig, ImportSettings};
pub use remote::{LoadResult, RemoteLoadClient};
pub use scene::{NodeKind, SceneDocument, SceneNode};
pub use store::{AssetInfo, AssetKind, AssetStore, BundleSources, RobotBundle};
pub use validate::{RobotInfo, SceneValidator, ValidationReport};
