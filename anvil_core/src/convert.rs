//! URDF to scene conversion
//!
//! Two interchangeable strategies behind [`SceneConverter`]: the engine
//! importer, and a deterministic mock used when no engine is present. The
//! strategy is chosen once by [`create_converter`].

use crate::engine::EngineHandle;
use crate::error::{AnvilError, AnvilResult};
use crate::params::ConversionConfig;
use crate::scene::{Attribute, SceneDocument, SceneNode, Transform};
use crate::store::write_atomic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identity written into every engine-converted document
pub const CONVERTER_ID: &str = "anvil_urdf_to_scene";
pub const MOCK_CONVERTER_ID: &str = "anvil_mock_converter";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStrategy {
    Engine,
    Mock,
}

impl fmt::Display for ConversionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionStrategy::Engine => write!(f, "engine"),
            ConversionStrategy::Mock => write!(f, "mock"),
        }
    }
}

pub trait SceneConverter: Send + Sync {
    fn strategy(&self) -> ConversionStrategy;

    /// Convert `description` into a scene document at `output`
    ///
    /// Nothing is written unless conversion succeeds.
    fn convert(
        &self,
        description: &Path,
        output: &Path,
        name: &str,
        config: &ConversionConfig,
    ) -> AnvilResult<PathBuf>;
}

/// Pick the engine strategy when an engine handle is available
pub fn create_converter(engine: Option<Arc<EngineHandle>>) -> Box<dyn SceneConverter> {
    match engine {
        Some(handle) => {
            tracing::info!("Using engine converter ({})", handle.name());
            Box::new(EngineConverter::new(handle))
        }
        None => {
            tracing::info!("Simulation engine not available, using mock converter");
            Box::new(MockConverter)
        }
    }
}

fn require_source(description: &Path) -> AnvilResult<()> {
    if description.is_file() {
        Ok(())
    } else {
        tracing::error!("Robot description not found: {}", description.display());
        Err(AnvilError::SourceNotFound(description.to_path_buf()))
    }
}

fn persist(doc: &SceneDocument, output: &Path) -> AnvilResult<PathBuf> {
    write_atomic(output, doc.to_usda().as_bytes())?;
    Ok(output.to_path_buf())
}

pub struct EngineConverter {
    engine: Arc<EngineHandle>,
}

impl EngineConverter {
    pub fn new(engine: Arc<EngineHandle>) -> Self {
        Self { engine }
    }
}

impl SceneConverter for EngineConverter {
    fn strategy(&self) -> ConversionStrategy {
        ConversionStrategy::Engine
    }

    fn convert(
        &self,
        description: &Path,
        output: &Path,
        name: &str,
        config: &ConversionConfig,
    ) -> AnvilResult<PathBuf> {
        require_source(description)?;
        let settings = config.resolve()?;

        tracing::info!("Converting {} -> {}", description.display(), output.display());
        let mut doc = self.engine.import_robot(description, name, &settings)?;

        let source = description.to_string_lossy().to_string();
        let has_root = doc.set_root_metadata("comment", format!("Robot: {}", name))
            && doc.set_root_metadata("urdf_source", source)
            && doc.set_root_metadata("converter", CONVERTER_ID);
        if !has_root {
            return Err(AnvilError::ConversionFailed(format!(
                "engine produced no default root prim for '{}'",
                name
            )));
        }

        let path = persist(&doc, output)?;
        tracing::info!("Converted '{}' ({} prims)", name, doc.node_count());
        Ok(path)
    }
}

/// Deterministic stand-in producing a minimal articulation from the name alone
pub struct MockConverter;

impl MockConverter {
    pub fn document(name: &str) -> SceneDocument {
        let base = SceneNode::rigid_body("base_link").with_child(
            SceneNode::new("base_geometry", "Cylinder")
                .with_transform(Transform::from_translation(0.0, 0.0, 0.1))
                .with_attribute("radius", Attribute::double(0.1))
                .with_attribute("height", Attribute::double(0.2)),
        );

        let joint = |joint_name: &str, z: f64| {
            SceneNode::xform(joint_name)
                .with_api_schemas(&["PhysicsRevoluteJointAPI", "PhysxRevoluteJointAPI"])
                .with_transform(Transform::from_translation(0.0, 0.0, z))
        };

        let root = SceneNode::xform(name)
            .with_api_schemas(&["PhysicsArticulationRootAPI"])
            .with_child(base)
            .with_child(joint("joint_1", 0.2))
            .with_child(joint("joint_2", 0.4));

        let mut doc = SceneDocument::with_root(root);
        doc.doc = Some(format!("Mock scene for {}", name));
        doc.set_root_metadata("comment", format!("Robot: {}", name));
        doc.set_root_metadata("converter", MOCK_CONVERTER_ID);
        doc
    }
}

impl SceneConverter for MockConverter {
    fn strategy(&self) -> ConversionStrategy {
        ConversionStrategy::Mock
    }

    fn convert(
        &self,
        description: &Path,
        output: &Path,
        name: &str,
        _config: &ConversionConfig,
    ) -> AnvilResult<PathBuf> {
        require_source(description)?;
        if output.exists() {
            tracing::debug!("Mock conversion replaces {}", output.display());
        }
        let path = persist(&Self::document(name), output)?;
        tracing::info!("Mock-converted '{}' -> {}", name, path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::scene::{parse_document, NodeKind};
    use std::fs;
    use tempfile::TempDir;

    const SIMPLE_URDF: &str = r#"<robot name="simple">
    <link name="base"/>
    <link name="arm"/>
    <joint name="j1" type="continuous">
        <parent link="base"/>
        <child link="arm"/>
        <origin xyz="0 0 0.5" rpy="0 0 0"/>
        <axis xyz="0 1 0"/>
    </joint>
</robot>"#;

    fn engine_handle() -> Arc<EngineHandle> {
        let config = EngineConfig {
            enabled: true,
            ..EngineConfig::default()
        };
        Arc::new(EngineHandle::acquire(&config).unwrap())
    }

    #[test]
    fn test_mock_document_shape() {
        let doc = MockConverter::document("arm1");
        assert_eq!(doc.roots.len(), 1);
        assert!(doc.has_default_root());
        assert_eq!(doc.nodes_of_kind(NodeKind::RigidBody).len(), 1);
        assert_eq!(doc.nodes_of_kind(NodeKind::Joint).len(), 2);
        assert_eq!(
            doc.find("/arm1/joint_2").unwrap().transform.unwrap().translation,
            [0.0, 0.0, 0.4]
        );
    }

    #[test]
    fn test_mock_conversion_is_reproducible() {
        let temp_dir = TempDir::new().unwrap();
        let urdf = temp_dir.path().join("arm1.urdf");
        fs::write(&urdf, SIMPLE_URDF).unwrap();
        let first = temp_dir.path().join("a/arm1.usd");
        let second = temp_dir.path().join("b/arm1.usd");

        let converter = create_converter(None);
        assert_eq!(converter.strategy(), ConversionStrategy::Mock);
        converter
            .convert(&urdf, &first, "arm1", &ConversionConfig::new())
            .unwrap();
        converter
            .convert(&urdf, &second, "arm1", &ConversionConfig::new())
            .unwrap();

        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
        let parsed = parse_document(&fs::read_to_string(&first).unwrap()).unwrap();
        assert_eq!(parsed, MockConverter::document("arm1"));
    }

    #[test]
    fn test_mock_conversion_replaces_engine_output() {
        let temp_dir = TempDir::new().unwrap();
        let urdf = temp_dir.path().join("simple.urdf");
        fs::write(&urdf, SIMPLE_URDF).unwrap();
        let output = temp_dir.path().join("scenes/simple.usd");

        EngineConverter::new(engine_handle())
            .convert(&urdf, &output, "simple", &ConversionConfig::new())
            .unwrap();
        let engine_output = fs::read_to_string(&output).unwrap();

        MockConverter
            .convert(&urdf, &output, "simple", &ConversionConfig::new())
            .unwrap();
        let mock_output = fs::read_to_string(&output).unwrap();

        assert_ne!(engine_output, mock_output);
        assert_eq!(mock_output, MockConverter::document("simple").to_usda());
    }

    #[test]
    fn test_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("scenes/ghost.usd");
        let err = MockConverter
            .convert(
                &temp_dir.path().join("ghost.urdf"),
                &output,
                "ghost",
                &ConversionConfig::new(),
            )
            .unwrap_err();
        assert!(matches!(err, AnvilError::SourceNotFound(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_engine_conversion_writes_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let urdf = temp_dir.path().join("simple.urdf");
        fs::write(&urdf, SIMPLE_URDF).unwrap();
        let output = temp_dir.path().join("scenes/simple.usd");

        let converter = create_converter(Some(engine_handle()));
        assert_eq!(converter.strategy(), ConversionStrategy::Engine);
        converter
            .convert(&urdf, &output, "simple", &ConversionConfig::new())
            .unwrap();

        let doc = parse_document(&fs::read_to_string(&output).unwrap()).unwrap();
        let root = doc.default_root().unwrap();
        assert_eq!(root.comment.as_deref(), Some("Robot: simple"));
        assert_eq!(root.custom_data["converter"], CONVERTER_ID);
        assert_eq!(root.custom_data["urdf_source"], urdf.to_string_lossy());
        assert_eq!(doc.find("/simple/j1").unwrap().type_name, "PhysicsRevoluteJoint");
    }

    #[test]
    fn test_engine_failure_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let urdf = temp_dir.path().join("empty.urdf");
        fs::write(&urdf, "<robot name=\"empty\"></robot>").unwrap();
        let output = temp_dir.path().join("scenes/empty.usd");

        let err = EngineConverter::new(engine_handle())
            .convert(&urdf, &output, "empty", &ConversionConfig::new())
            .unwrap_err();
        assert!(matches!(err, AnvilError::ConversionFailed(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_bad_config_value_fails_before_import() {
        let temp_dir = TempDir::new().unwrap();
        let urdf = temp_dir.path().join("simple.urdf");
        fs::write(&urdf, SIMPLE_URDF).unwrap();

        let mut config = ConversionConfig::new();
        config.set("fix_base", "yes").unwrap();
        let err = EngineConverter::new(engine_handle())
            .convert(&urdf, &temp_dir.path().join("out.usd"), "simple", &config)
            .unwrap_err();
        assert!(matches!(err, AnvilError::InvalidConfig { .. }));
    }
}
