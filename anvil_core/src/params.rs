//! Conversion parameters
//!
//! A key-value store of importer options. Keys that are not set fall back to
//! the engine-recommended defaults, never to empty or zero values.

use crate::error::{AnvilError, AnvilResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const MERGE_FIXED_JOINTS: &str = "merge_fixed_joints";
pub const FIX_BASE: &str = "fix_base";
pub const IMPORT_INERTIA_TENSOR: &str = "import_inertia_tensor";
pub const SELF_COLLISION: &str = "self_collision";
pub const CREATE_PHYSICS_SCENE: &str = "create_physics_scene";
pub const DEFAULT_DRIVE_TYPE: &str = "default_drive_type";
pub const DEFAULT_DRIVE_STRENGTH: &str = "default_drive_strength";
pub const DEFAULT_POSITION_DAMPING: &str = "default_position_damping";

/// Every key the importer understands
pub const KNOWN_KEYS: [&str; 8] = [
    MERGE_FIXED_JOINTS,
    FIX_BASE,
    IMPORT_INERTIA_TENSOR,
    SELF_COLLISION,
    CREATE_PHYSICS_SCENE,
    DEFAULT_DRIVE_TYPE,
    DEFAULT_DRIVE_STRENGTH,
    DEFAULT_POSITION_DAMPING,
];

/// Key-value conversion options - BTreeMap keeps serialized output sorted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversionConfig {
    params: BTreeMap<String, Value>,
}

impl ConversionConfig {
    /// Empty configuration (every key resolves to its default)
    pub fn new() -> Self {
        Self::default()
    }

    /// The engine-recommended default table
    pub fn engine_defaults() -> Self {
        let mut params = BTreeMap::new();
        params.insert(MERGE_FIXED_JOINTS.to_string(), Value::from(false));
        params.insert(FIX_BASE.to_string(), Value::from(true));
        params.insert(IMPORT_INERTIA_TENSOR.to_string(), Value::from(true));
        params.insert(SELF_COLLISION.to_string(), Value::from(false));
        params.insert(CREATE_PHYSICS_SCENE.to_string(), Value::from(true));
        params.insert(DEFAULT_DRIVE_TYPE.to_string(), Value::from("position"));
        params.insert(DEFAULT_DRIVE_STRENGTH.to_string(), Value::from(1e7));
        params.insert(DEFAULT_POSITION_DAMPING.to_string(), Value::from(1e5));
        Self { params }
    }

    pub fn from_map(params: BTreeMap<String, Value>) -> Self {
        Self { params }
    }

    /// Set a parameter value
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> AnvilResult<()> {
        let value = serde_json::to_value(value)?;
        self.params.insert(key.to_string(), value);
        Ok(())
    }

    /// Set a parameter from a `key=value` assignment
    pub fn set_assignment(&mut self, assignment: &str) -> AnvilResult<()> {
        let (key, value) = parse_assignment(assignment)?;
        self.params.insert(key, value);
        Ok(())
    }

    /// Get a raw parameter value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Get a boolean parameter; a value of another type is an error
    pub fn get_bool(&self, key: &str) -> AnvilResult<Option<bool>> {
        match self.params.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(AnvilError::invalid_config(
                key,
                format!("expected a boolean, got {}", other),
            )),
        }
    }

    /// Get a numeric parameter; integers are widened
    pub fn get_f64(&self, key: &str) -> AnvilResult<Option<f64>> {
        match self.params.get(key) {
            None => Ok(None),
            Some(value) => value.as_f64().map(Some).ok_or_else(|| {
                AnvilError::invalid_config(key, format!("expected a number, got {}", value))
            }),
        }
    }

    pub fn get_str(&self, key: &str) -> AnvilResult<Option<&str>> {
        match self.params.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(AnvilError::invalid_config(
                key,
                format!("expected a string, got {}", other),
            )),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.params.iter()
    }

    /// Layer `self` over `base`; keys present in `self` win
    pub fn merged_over(&self, base: &ConversionConfig) -> ConversionConfig {
        let mut params = base.params.clone();
        for (key, value) in &self.params {
            params.insert(key.clone(), value.clone());
        }
        ConversionConfig { params }
    }

    /// Merge over the engine defaults and produce typed importer settings
    pub fn resolve(&self) -> AnvilResult<ImportSettings> {
        for key in self.params.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                tracing::debug!("Ignoring unknown conversion option '{}'", key);
            }
        }

        let merged = self.merged_over(&Self::engine_defaults());
        let defaults = ImportSettings::default();

        let drive_type = match merged.get_str(DEFAULT_DRIVE_TYPE)? {
            Some(s) => s.parse()?,
            None => defaults.drive_type,
        };

        Ok(ImportSettings {
            merge_fixed_joints: merged
                .get_bool(MERGE_FIXED_JOINTS)?
                .unwrap_or(defaults.merge_fixed_joints),
            fix_base: merged.get_bool(FIX_BASE)?.unwrap_or(defaults.fix_base),
            import_inertia_tensor: merged
                .get_bool(IMPORT_INERTIA_TENSOR)?
                .unwrap_or(defaults.import_inertia_tensor),
            self_collision: merged
                .get_bool(SELF_COLLISION)?
                .unwrap_or(defaults.self_collision),
            create_physics_scene: merged
                .get_bool(CREATE_PHYSICS_SCENE)?
                .unwrap_or(defaults.create_physics_scene),
            drive_type,
            drive_strength: non_negative(
                DEFAULT_DRIVE_STRENGTH,
                merged.get_f64(DEFAULT_DRIVE_STRENGTH)?,
                defaults.drive_strength,
            )?,
            position_damping: non_negative(
                DEFAULT_POSITION_DAMPING,
                merged.get_f64(DEFAULT_POSITION_DAMPING)?,
                defaults.position_damping,
            )?,
        })
    }
}

fn non_negative(key: &str, value: Option<f64>, default: f64) -> AnvilResult<f64> {
    match value {
        None => Ok(default),
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        Some(v) => Err(AnvilError::invalid_config(
            key,
            format!("must be a finite non-negative number, got {}", v),
        )),
    }
}

/// Split `key=value`; the value is read as JSON when it parses, as a string otherwise
pub fn parse_assignment(assignment: &str) -> AnvilResult<(String, Value)> {
    let (key, raw) = assignment.split_once('=').ok_or_else(|| {
        AnvilError::invalid_config(assignment, "expected key=value")
    })?;

    let key = key.trim();
    if key.is_empty() {
        return Err(AnvilError::invalid_config(assignment, "empty key"));
    }

    let raw = raw.trim();
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

/// Joint drive mode applied to every imported joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveType {
    Position,
    Velocity,
}

impl FromStr for DriveType {
    type Err = AnvilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "position" => Ok(DriveType::Position),
            "velocity" => Ok(DriveType::Velocity),
            other => Err(AnvilError::invalid_config(
                DEFAULT_DRIVE_TYPE,
                format!("unknown drive type '{}' (expected position or velocity)", other),
            )),
        }
    }
}

impl fmt::Display for DriveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveType::Position => write!(f, "position"),
            DriveType::Velocity => write!(f, "velocity"),
        }
    }
}

/// Typed importer settings produced by [`ConversionConfig::resolve`]
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSettings {
    pub merge_fixed_joints: bool,
    pub fix_base: bool,
    pub import_inertia_tensor: bool,
    pub self_collision: bool,
    pub create_physics_scene: bool,
    pub drive_type: DriveType,
    pub drive_strength: f64,
    pub position_damping: f64,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            merge_fixed_joints: false,
            fix_base: true,
            import_inertia_tensor: true,
            self_collision: false,
            create_physics_scene: true,
            drive_type: DriveType::Position,
            drive_strength: 1e7,
            position_damping: 1e5,
        }
    }
}

impl ImportSettings {
    /// Drive (stiffness, damping) pair for the configured drive type
    pub fn drive_gains(&self) -> (f64, f64) {
        match self.drive_type {
            DriveType::Position => (self.drive_strength, self.position_damping),
            DriveType::Velocity => (0.0, self.drive_strength),
        }
    }
}
