//! On-disk asset store
//!
//! Layout under the configured root:
//!
//! ```text
//! robots/<name>/{<name>.urdf, meshes/*, textures/*, metadata.json}
//! meshes/  textures/  materials/
//! scenes/<name>.usd
//! cache/
//! ```
//!
//! Uploads are staged under `cache/.staging` and moved into place only after
//! every file has been copied and the metadata written.

pub mod metadata;

pub use metadata::{AssetInfo, AssetKind, BundleAssets, BundleSources, RobotBundle};

use crate::error::{AnvilError, AnvilResult};
use chrono::Utc;
use metadata::METADATA_FILE_NAME;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

const SUBDIRECTORIES: [&str; 6] = ["robots", "meshes", "textures", "materials", "scenes", "cache"];
const STAGING_DIR: &str = ".staging";
pub const SCENE_EXTENSION: &str = "usd";

#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn robots_dir(&self) -> PathBuf {
        self.root.join("robots")
    }

    pub fn scenes_dir(&self) -> PathBuf {
        self.root.join("scenes")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn bundle_dir(&self, name: &str) -> PathBuf {
        self.robots_dir().join(name)
    }

    /// Where the converted scene for a bundle lives
    pub fn scene_path(&self, name: &str) -> PathBuf {
        self.scenes_dir().join(format!("{}.{}", name, SCENE_EXTENSION))
    }

    /// Create the directory taxonomy; existing content is left alone
    pub fn ensure_directories(&self) -> AnvilResult<()> {
        for dir in SUBDIRECTORIES {
            fs::create_dir_all(self.root.join(dir))?;
        }
        Ok(())
    }

    /// Copy a bundle's files into `robots/<name>` and record its metadata
    ///
    /// Either the whole bundle lands or nothing does. An existing bundle with
    /// the same name is replaced.
    pub fn upload_bundle(
        &self,
        name: &str,
        sources: &BundleSources,
        config: &BTreeMap<String, Value>,
    ) -> AnvilResult<RobotBundle> {
        validate_bundle_name(name)?;

        for source in sources.all() {
            if !source.is_file() {
                tracing::error!("Bundle '{}': source file missing: {}", name, source.display());
                return Err(AnvilError::AssetNotFound(source.clone()));
            }
        }
        check_unique_file_names(&sources.meshes)?;
        check_unique_file_names(&sources.textures)?;

        self.ensure_directories()?;

        let staging_root = self.cache_dir().join(STAGING_DIR);
        let token = uuid::Uuid::new_v4();
        let staging = staging_root.join(format!("{}-{}", name, token));

        match self.stage_bundle(&staging, name, sources, config) {
            Ok(bundle) => {
                let target = self.bundle_dir(name);
                let aside = staging_root.join(format!("{}-{}.old", name, token));
                if let Err(e) = replace_dir(&staging, &target, &aside) {
                    let _ = fs::remove_dir_all(&staging);
                    return Err(e.into());
                }
                tracing::info!(
                    "Uploaded bundle '{}' ({} meshes, {} textures)",
                    name,
                    bundle.assets.meshes.len(),
                    bundle.assets.textures.len()
                );
                Ok(bundle)
            }
            Err(e) => {
                tracing::error!("Upload of bundle '{}' failed: {}", name, e);
                let _ = fs::remove_dir_all(&staging);
                Err(e)
            }
        }
    }

    fn stage_bundle(
        &self,
        staging: &Path,
        name: &str,
        sources: &BundleSources,
        config: &BTreeMap<String, Value>,
    ) -> AnvilResult<RobotBundle> {
        let target = self.bundle_dir(name);
        fs::create_dir_all(staging)?;

        let mut assets = BundleAssets::default();

        if let Some(description) = &sources.description {
            let file_name = format!("{}.urdf", name);
            fs::copy(description, staging.join(&file_name))?;
            assets.urdf = Some(target.join(file_name));
        }

        assets.meshes = copy_into(&sources.meshes, staging, &target, "meshes")?;
        assets.textures = copy_into(&sources.textures, staging, &target, "textures")?;
        assets.metadata = Some(target.join(METADATA_FILE_NAME));

        let bundle = RobotBundle {
            name: name.to_string(),
            uploaded_at: Some(Utc::now()),
            assets,
            config: config.clone(),
        };

        let json = serde_json::to_string_pretty(&bundle)?;
        fs::write(staging.join(METADATA_FILE_NAME), json)?;
        Ok(bundle)
    }

    /// Metadata for every bundle directory, sorted by name
    pub fn list_bundles(&self) -> AnvilResult<Vec<RobotBundle>> {
        let robots = self.robots_dir();
        if !robots.exists() {
            return Ok(Vec::new());
        }

        let mut bundles = Vec::new();
        for entry in fs::read_dir(&robots)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            bundles.push(self.read_bundle(&name, &entry.path()));
        }

        bundles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(bundles)
    }

    /// Metadata of one bundle
    pub fn bundle(&self, name: &str) -> AnvilResult<RobotBundle> {
        validate_bundle_name(name)?;
        let dir = self.bundle_dir(name);
        if !dir.is_dir() {
            return Err(AnvilError::AssetNotFound(dir));
        }
        Ok(self.read_bundle(name, &dir))
    }

    fn read_bundle(&self, name: &str, dir: &Path) -> RobotBundle {
        let path = dir.join(METADATA_FILE_NAME);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => {
                tracing::debug!("Bundle '{}' has no metadata file", name);
                return RobotBundle::minimal(name);
            }
        };

        match serde_json::from_str::<RobotBundle>(&content) {
            Ok(bundle) => bundle,
            Err(e) => {
                tracing::warn!("Malformed metadata for bundle '{}': {}", name, e);
                RobotBundle::minimal(name)
            }
        }
    }

    /// Overwrite the `config` field of a bundle's metadata
    pub fn replace_config(
        &self,
        name: &str,
        config: BTreeMap<String, Value>,
    ) -> AnvilResult<RobotBundle> {
        let mut bundle = self.bundle(name)?;
        bundle.config = config;
        let json = serde_json::to_string_pretty(&bundle)?;
        write_atomic(&self.bundle_dir(name).join(METADATA_FILE_NAME), json.as_bytes())?;
        Ok(bundle)
    }

    /// Delete a bundle directory; returns whether it existed
    pub fn remove_bundle(&self, name: &str) -> bool {
        if let Err(e) = validate_bundle_name(name) {
            tracing::warn!("Not removing bundle: {}", e);
            return false;
        }

        let dir = self.bundle_dir(name);
        if !dir.exists() {
            tracing::info!("Bundle '{}' does not exist, nothing to remove", name);
            return false;
        }

        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::info!("Removed bundle '{}'", name);
                true
            }
            Err(e) => {
                tracing::error!("Failed to remove bundle '{}': {}", name, e);
                false
            }
        }
    }

    pub fn inspect(&self, path: &Path) -> AssetInfo {
        AssetInfo::of(path)
    }

    /// Empty the cache directory, including abandoned staging areas
    pub fn clear_cache(&self) -> AnvilResult<()> {
        let cache = self.cache_dir();
        if cache.exists() {
            fs::remove_dir_all(&cache)?;
        }
        fs::create_dir_all(&cache)?;
        tracing::info!("Cleared cache at {}", cache.display());
        Ok(())
    }
}

/// Bundle names become directory names, so they must be a single safe path component
pub fn validate_bundle_name(name: &str) -> AnvilResult<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(AnvilError::InvalidBundleName(name.to_string()))
    }
}

fn check_unique_file_names(paths: &[PathBuf]) -> AnvilResult<()> {
    let mut seen = HashSet::new();
    for path in paths {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| AnvilError::AssetNotFound(path.clone()))?;
        if !seen.insert(file_name.clone()) {
            return Err(AnvilError::DuplicateAsset(file_name));
        }
    }
    Ok(())
}

/// Copy `files` into `staging/<subdir>`, returning their final paths under `target`
fn copy_into(
    files: &[PathBuf],
    staging: &Path,
    target: &Path,
    subdir: &str,
) -> AnvilResult<Vec<PathBuf>> {
    if files.is_empty() {
        return Ok(Vec::new());
    }

    let staged_dir = staging.join(subdir);
    fs::create_dir_all(&staged_dir)?;

    let mut destinations = Vec::with_capacity(files.len());
    for file in files {
        let file_name = file
            .file_name()
            .ok_or_else(|| AnvilError::AssetNotFound(file.clone()))?;
        fs::copy(file, staged_dir.join(file_name))?;
        destinations.push(target.join(subdir).join(file_name));
    }
    Ok(destinations)
}

/// Move `from` to `to`, parking any existing `to` at `aside` until the move succeeds
fn replace_dir(from: &Path, to: &Path, aside: &Path) -> std::io::Result<()> {
    if !to.exists() {
        return fs::rename(from, to);
    }

    fs::rename(to, aside)?;
    if let Err(e) = fs::rename(from, to) {
        if let Err(restore) = fs::rename(aside, to) {
            tracing::error!(
                "Failed to restore {} from {}: {}",
                to.display(),
                aside.display(),
                restore
            );
        }
        return Err(e);
    }

    if let Err(e) = fs::remove_dir_all(aside) {
        tracing::warn!("Failed to remove old bundle copy {}: {}", aside.display(), e);
    }
    Ok(())
}

/// Write through a sibling temp file and rename into place
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    if let Err(e) = fs::write(&tmp, contents) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}
