//! Scene document validation

use crate::engine::EngineHandle;
use crate::error::AnvilResult;
use crate::scene::usda::{FORMAT_MARKER, NODE_MARKER};
use crate::scene::{parse_document, NodeKind, SceneDocument};
use crate::store::metadata::to_utc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of checking one scene document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub path: PathBuf,
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.valid = false;
        self.errors.push(error.into());
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

/// Summary extracted from a scene document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RobotInfo {
    pub name: String,
    pub joints: Vec<String>,
    pub links: Vec<String>,
    pub materials: Vec<String>,
    pub file_size: u64,
    pub created: Option<DateTime<Utc>>,
}

enum Mode {
    Engine(Arc<EngineHandle>),
    Basic,
}

pub struct SceneValidator {
    mode: Mode,
}

impl SceneValidator {
    /// Validate by opening documents through the engine
    pub fn engine(handle: Arc<EngineHandle>) -> Self {
        Self {
            mode: Mode::Engine(handle),
        }
    }

    /// Marker-based structural check used without an engine
    pub fn basic() -> Self {
        Self { mode: Mode::Basic }
    }

    pub fn for_engine(handle: Option<Arc<EngineHandle>>) -> Self {
        handle.map(Self::engine).unwrap_or_else(Self::basic)
    }

    pub fn is_engine_backed(&self) -> bool {
        matches!(self.mode, Mode::Engine(_))
    }

    pub fn validate(&self, path: &Path) -> bool {
        let report = self.report(path);
        if report.valid {
            tracing::info!("Scene {} is valid", path.display());
        } else {
            for error in &report.errors {
                tracing::warn!("Scene {} invalid: {}", path.display(), error);
            }
        }
        report.valid
    }

    pub fn report(&self, path: &Path) -> ValidationReport {
        let mut report = ValidationReport::new(path);

        if !path.exists() {
            report.add_error(format!("Scene document not found: {}", path.display()));
            return report;
        }

        match &self.mode {
            Mode::Engine(handle) => match handle.open_document(path) {
                Ok(doc) => {
                    if !doc.has_default_root() {
                        report.add_error("Document has no default root prim");
                    }
                    structure_warnings(&doc, &mut report);
                }
                Err(e) => report.add_error(format!("Engine could not open document: {}", e)),
            },
            Mode::Basic => {
                let content = match fs::read_to_string(path) {
                    Ok(content) => content,
                    Err(e) => {
                        report.add_error(format!("Failed to read document: {}", e));
                        return report;
                    }
                };

                if !content.contains(FORMAT_MARKER) {
                    report.add_error(format!("Missing format marker '{}'", FORMAT_MARKER));
                }
                if !content.contains(NODE_MARKER) {
                    report.add_error(format!("No '{}' node found", NODE_MARKER));
                }

                // semantic problems only warn here
                match parse_document(&content) {
                    Ok(doc) => structure_warnings(&doc, &mut report),
                    Err(e) if report.valid => {
                        report.add_warning(format!("Detailed checks skipped: {}", e))
                    }
                    Err(_) => {}
                }
            }
        }

        report
    }

    /// Best-effort summary; unreadable parts are left at their zero value
    pub fn describe(&self, path: &Path) -> RobotInfo {
        let mut info = RobotInfo::default();

        match fs::metadata(path) {
            Ok(meta) => {
                info.file_size = meta.len();
                info.created = meta.created().or_else(|_| meta.modified()).ok().map(to_utc);
            }
            Err(e) => tracing::warn!("Cannot stat {}: {}", path.display(), e),
        }

        match self.open(path) {
            Ok(doc) => {
                info.name = doc
                    .default_root()
                    .or_else(|| doc.roots.first())
                    .map(|root| root.name.clone())
                    .unwrap_or_default();
                info.joints = names_of(&doc, NodeKind::Joint);
                info.links = names_of(&doc, NodeKind::RigidBody);
                info.materials = names_of(&doc, NodeKind::Material);
            }
            Err(e) => tracing::warn!("Cannot read scene {}: {}", path.display(), e),
        }

        info
    }

    fn open(&self, path: &Path) -> AnvilResult<SceneDocument> {
        match &self.mode {
            Mode::Engine(handle) => handle.open_document(path),
            Mode::Basic => parse_document(&fs::read_to_string(path)?),
        }
    }
}

fn names_of(doc: &SceneDocument, kind: NodeKind) -> Vec<String> {
    doc.nodes_of_kind(kind)
        .into_iter()
        .map(|n| n.name.clone())
        .collect()
}

fn structure_warnings(doc: &SceneDocument, report: &mut ValidationReport) {
    if doc.nodes_of_kind(NodeKind::RigidBody).is_empty() {
        report.add_warning("No rigid bodies in document");
    }
    if doc.nodes_of_kind(NodeKind::Joint).is_empty() {
        report.add_warning("No joints in document");
    }
    for (path, node) in doc.walk() {
        let unresolved = node
            .attribute("anvil:unresolved")
            .and_then(|a| a.as_bool())
            .unwrap_or(false);
        if unresolved {
            let source = node
                .attribute("anvil:meshSource")
                .and_then(|a| a.as_text())
                .unwrap_or_default();
            report.add_warning(format!("Unresolved mesh '{}' at {}", source, path));
        }
    }
}
