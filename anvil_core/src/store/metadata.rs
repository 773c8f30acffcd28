use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const METADATA_FILE_NAME: &str = "metadata.json";

/// Persisted record of one uploaded bundle (`robots/<name>/metadata.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotBundle {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: BundleAssets,
    /// Bundle configuration exactly as supplied at upload
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
}

/// Destination paths of the files copied into a bundle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleAssets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urdf: Option<PathBuf>,
    #[serde(default)]
    pub meshes: Vec<PathBuf>,
    #[serde(default)]
    pub textures: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PathBuf>,
}

impl RobotBundle {
    /// Record for a bundle directory without readable metadata
    pub fn minimal(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uploaded_at: None,
            assets: BundleAssets::default(),
            config: BTreeMap::new(),
        }
    }

    pub fn description_path(&self) -> Option<&Path> {
        self.assets.urdf.as_deref()
    }
}

/// Source files declared for an upload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleSources {
    pub description: Option<PathBuf>,
    #[serde(default)]
    pub meshes: Vec<PathBuf>,
    #[serde(default)]
    pub textures: Vec<PathBuf>,
}

impl BundleSources {
    pub fn with_description(path: impl Into<PathBuf>) -> Self {
        Self {
            description: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn mesh(mut self, path: impl Into<PathBuf>) -> Self {
        self.meshes.push(path.into());
        self
    }

    pub fn texture(mut self, path: impl Into<PathBuf>) -> Self {
        self.textures.push(path.into());
        self
    }

    /// Every declared file, description first
    pub fn all(&self) -> impl Iterator<Item = &PathBuf> {
        self.description
            .iter()
            .chain(self.meshes.iter())
            .chain(self.textures.iter())
    }
}

/// Asset type inferred from a file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Description,
    Mesh,
    Texture,
    Scene,
    Other,
}

impl AssetKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("urdf" | "xacro") => AssetKind::Description,
            Some("dae" | "stl" | "obj" | "ply" | "gltf" | "glb") => AssetKind::Mesh,
            Some("png" | "jpg" | "jpeg" | "tga" | "dds") => AssetKind::Texture,
            Some("usd" | "usda" | "usdc") => AssetKind::Scene,
            _ => AssetKind::Other,
        }
    }
}

/// Read-only snapshot of a single file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub path: PathBuf,
    pub exists: bool,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub kind: AssetKind,
}

impl AssetInfo {
    pub fn of(path: &Path) -> Self {
        let kind = AssetKind::from_path(path);
        match std::fs::metadata(path) {
            Ok(meta) => Self {
                path: path.to_path_buf(),
                exists: true,
                size: meta.len(),
                modified: meta.modified().ok().map(to_utc),
                kind,
            },
            Err(_) => Self {
                path: path.to_path_buf(),
                exists: false,
                size: 0,
                modified: None,
                kind,
            },
        }
    }
}

pub(crate) fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(AssetKind::from_path(Path::new("arm.URDF")), AssetKind::Description);
        assert_eq!(AssetKind::from_path(Path::new("link.stl")), AssetKind::Mesh);
        assert_eq!(AssetKind::from_path(Path::new("skin.jpeg")), AssetKind::Texture);
        assert_eq!(AssetKind::from_path(Path::new("scenes/arm1.usd")), AssetKind::Scene);
        assert_eq!(AssetKind::from_path(Path::new("README")), AssetKind::Other);
    }

    #[test]
    fn test_missing_path_info() {
        let info = AssetInfo::of(Path::new("/definitely/not/here.stl"));
        assert!(!info.exists);
        assert_eq!(info.size, 0);
        assert_eq!(info.kind, AssetKind::Mesh);
        assert!(info.modified.is_none());
    }

    #[test]
    fn test_metadata_schema_field_names() {
        let mut bundle = RobotBundle::minimal("arm1");
        bundle.assets.urdf = Some(PathBuf::from("robots/arm1/arm1.urdf"));
        bundle.config.insert("payload".to_string(), Value::from(3));

        let json = serde_json::to_value(&bundle).unwrap();
        assert_eq!(json["name"], "arm1");
        assert_eq!(json["assets"]["urdf"], "robots/arm1/arm1.urdf");
        assert_eq!(json["assets"]["meshes"], serde_json::json!([]));
        assert_eq!(json["config"]["payload"], 3);
    }

    #[test]
    fn test_partial_metadata_deserializes() {
        let bundle: RobotBundle = serde_json::from_str(r#"{"name": "arm2"}"#).unwrap();
        assert_eq!(bundle, RobotBundle::minimal("arm2"));
    }
}
