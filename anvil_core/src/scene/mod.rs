//! Scene documents
//!
//! In-memory form of the engine-native scene description: a tree of named
//! prims under a designated default root. [`usda`] reads and writes the ASCII
//! text form.

pub mod usda;

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use usda::{parse_document, write_document};

/// Role of a node in the scene graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Xform,
    RigidBody,
    Joint,
    Geometry,
    Light,
    Material,
    PhysicsScene,
}

impl NodeKind {
    /// Derive the kind from the prim type and its applied API schemas
    pub fn classify(type_name: &str, api_schemas: &[String]) -> Self {
        if type_name.starts_with("Physics") && type_name.ends_with("Joint") {
            return NodeKind::Joint;
        }
        if type_name == "PhysicsScene" {
            return NodeKind::PhysicsScene;
        }
        if type_name == "Material" {
            return NodeKind::Material;
        }
        if type_name.ends_with("Light") {
            return NodeKind::Light;
        }
        if matches!(type_name, "Cube" | "Sphere" | "Cylinder" | "Capsule" | "Cone" | "Mesh") {
            return NodeKind::Geometry;
        }
        if api_schemas
            .iter()
            .any(|s| s.starts_with("Physics") && s.ends_with("JointAPI"))
        {
            return NodeKind::Joint;
        }
        if api_schemas.iter().any(|s| s == "PhysicsRigidBodyAPI") {
            return NodeKind::RigidBody;
        }
        NodeKind::Xform
    }
}

/// Local transform of a node (translation + unit quaternion in w, x, y, z order)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: [f64; 3],
    pub orientation: [f64; 4],
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            translation: [0.0; 3],
            orientation: [1.0, 0.0, 0.0, 0.0],
        }
    }

    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            translation: [x, y, z],
            ..Self::identity()
        }
    }

    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        let t = iso.translation.vector;
        let q = iso.rotation.quaternion();
        Self {
            translation: [t.x, t.y, t.z],
            orientation: [q.w, q.i, q.j, q.k],
        }
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        let [x, y, z] = self.translation;
        let [w, i, j, k] = self.orientation;
        Isometry3::from_parts(
            Translation3::new(x, y, z),
            UnitQuaternion::from_quaternion(Quaternion::new(w, i, j, k)),
        )
    }

    pub fn has_rotation(&self) -> bool {
        let [w, x, y, z] = self.orientation;
        !(x.abs() < 1e-12 && y.abs() < 1e-12 && z.abs() < 1e-12 && (w - 1.0).abs() < 1e-12)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Typed attribute value, kept in the text form it is written with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Declaration type, e.g. `double`, `uniform token`, `rel`
    pub type_name: String,
    /// Value exactly as it appears after `=`
    pub value: String,
}

impl Attribute {
    pub fn new(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            value: value.into(),
        }
    }

    pub fn double(v: f64) -> Self {
        Self::new("double", format_number(v))
    }

    pub fn float(v: f64) -> Self {
        Self::new("float", format_number(v))
    }

    pub fn boolean(v: bool) -> Self {
        Self::new("bool", if v { "1" } else { "0" })
    }

    pub fn token(v: &str) -> Self {
        Self::new("uniform token", quote(v))
    }

    pub fn string(v: &str) -> Self {
        Self::new("string", quote(v))
    }

    pub fn asset(path: &str) -> Self {
        Self::new("asset", format!("@{}@", path))
    }

    pub fn relationship(target: &str) -> Self {
        Self::new("rel", format!("<{}>", target))
    }

    pub fn double3(v: [f64; 3]) -> Self {
        Self::new("double3", format_tuple(&v))
    }

    pub fn float3(v: [f64; 3]) -> Self {
        Self::new("float3", format_tuple(&v))
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.value.trim().parse().ok()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value.trim() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        }
    }

    /// Unquoted string, token, asset path or relationship target
    pub fn as_text(&self) -> Option<String> {
        let v = self.value.trim();
        if v.len() >= 2 {
            let (first, last) = (v.as_bytes()[0], v.as_bytes()[v.len() - 1]);
            match (first, last) {
                (b'"', b'"') => return Some(unescape(&v[1..v.len() - 1])),
                (b'@', b'@') | (b'<', b'>') => return Some(v[1..v.len() - 1].to_string()),
                _ => {}
            }
        }
        None
    }

    pub fn as_tuple(&self) -> Option<Vec<f64>> {
        parse_tuple(&self.value)
    }
}

/// A prim in the scene graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    pub name: String,
    /// Prim type, e.g. `Xform`, `Cylinder`, `PhysicsRevoluteJoint`
    pub type_name: String,
    pub kind: NodeKind,
    pub api_schemas: Vec<String>,
    pub transform: Option<Transform>,
    pub attributes: BTreeMap<String, Attribute>,
    pub comment: Option<String>,
    pub custom_data: BTreeMap<String, String>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            name: sanitize_prim_name(&name.into()),
            kind: NodeKind::classify(&type_name, &[]),
            type_name,
            api_schemas: Vec::new(),
            transform: None,
            attributes: BTreeMap::new(),
            comment: None,
            custom_data: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Plain transform node
    pub fn xform(name: impl Into<String>) -> Self {
        Self::new(name, "Xform")
    }

    /// Transform node carrying the rigid body API
    pub fn rigid_body(name: impl Into<String>) -> Self {
        Self::xform(name).with_api_schemas(&["PhysicsRigidBodyAPI", "PhysxRigidBodyAPI"])
    }

    pub fn with_api_schemas(mut self, schemas: &[&str]) -> Self {
        self.api_schemas = schemas.iter().map(|s| s.to_string()).collect();
        self.kind = NodeKind::classify(&self.type_name, &self.api_schemas);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_attribute(mut self, name: &str, attribute: Attribute) -> Self {
        self.attributes.insert(name.to_string(), attribute);
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn child(&self, name: &str) -> Option<&SceneNode> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// A complete scene document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    /// Name of the root prim the engine opens by default
    pub default_prim: Option<String>,
    pub up_axis: String,
    pub meters_per_unit: f64,
    pub doc: Option<String>,
    pub roots: Vec<SceneNode>,
}

impl SceneDocument {
    /// Document whose single root is also the default prim
    pub fn with_root(root: SceneNode) -> Self {
        Self {
            default_prim: Some(root.name.clone()),
            up_axis: "Z".to_string(),
            meters_per_unit: 1.0,
            doc: None,
            roots: vec![root],
        }
    }

    pub fn empty() -> Self {
        Self {
            default_prim: None,
            up_axis: "Z".to_string(),
            meters_per_unit: 1.0,
            doc: None,
            roots: Vec::new(),
        }
    }

    /// The default root, if exactly one top-level prim carries its name
    pub fn default_root(&self) -> Option<&SceneNode> {
        let name = self.default_prim.as_deref()?;
        let mut matches = self.roots.iter().filter(|r| r.name == name);
        let root = matches.next()?;
        if matches.next().is_some() {
            return None;
        }
        Some(root)
    }

    pub fn default_root_mut(&mut self) -> Option<&mut SceneNode> {
        let name = self.default_prim.clone()?;
        self.roots.iter_mut().find(|r| r.name == name)
    }

    pub fn has_default_root(&self) -> bool {
        self.default_root().is_some()
    }

    /// Attach metadata to the default root; `comment` is prim metadata, other keys go to customData
    pub fn set_root_metadata(&mut self, key: &str, value: impl Into<String>) -> bool {
        let Some(root) = self.default_root_mut() else {
            return false;
        };
        let value = value.into();
        if key == "comment" {
            root.comment = Some(value);
        } else {
            root.custom_data.insert(key.to_string(), value);
        }
        true
    }

    /// Look up a node by absolute path, e.g. `/arm1/base_link`
    pub fn find(&self, path: &str) -> Option<&SceneNode> {
        let mut parts = path.trim_start_matches('/').split('/').filter(|p| !p.is_empty());
        let first = parts.next()?;
        let mut node = self.roots.iter().find(|r| r.name == first)?;
        for part in parts {
            node = node.child(part)?;
        }
        Some(node)
    }

    /// Depth-first traversal yielding `(path, node)` pairs
    pub fn walk(&self) -> Vec<(String, &SceneNode)> {
        let mut out = Vec::new();
        for root in &self.roots {
            walk_node(root, "", &mut out);
        }
        out
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<&SceneNode> {
        self.walk()
            .into_iter()
            .filter(|(_, n)| n.kind == kind)
            .map(|(_, n)| n)
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.walk().len()
    }

    pub fn to_usda(&self) -> String {
        write_document(self)
    }
}

fn walk_node<'a>(node: &'a SceneNode, prefix: &str, out: &mut Vec<(String, &'a SceneNode)>) {
    let path = format!("{}/{}", prefix, node.name);
    out.push((path.clone(), node));
    for child in &node.children {
        walk_node(child, &path, out);
    }
}

impl fmt::Display for SceneDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&write_document(self))
    }
}

/// Make a name usable as a prim identifier (`[A-Za-z_][A-Za-z0-9_]*`)
pub fn sanitize_prim_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

pub(crate) fn format_number(v: f64) -> String {
    if v == 0.0 {
        // avoid "-0"
        return "0".to_string();
    }
    format!("{}", v)
}

pub(crate) fn format_tuple(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format_number(*v)).collect();
    format!("({})", parts.join(", "))
}

pub(crate) fn parse_tuple(raw: &str) -> Option<Vec<f64>> {
    let inner = raw.trim().strip_prefix('(')?.strip_suffix(')')?;
    inner
        .split(',')
        .map(|p| p.trim().parse::<f64>().ok())
        .collect()
}

pub(crate) fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

pub(crate) fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> SceneDocument {
        let root = SceneNode::xform("arm1")
            .with_child(
                SceneNode::rigid_body("base_link")
                    .with_child(SceneNode::new("base_geometry", "Cylinder")),
            )
            .with_child(
                SceneNode::xform("joint_1").with_api_schemas(&["PhysicsRevoluteJointAPI"]),
            );
        SceneDocument::with_root(root)
    }

    #[test]
    fn test_classify() {
        assert_eq!(NodeKind::classify("PhysicsRevoluteJoint", &[]), NodeKind::Joint);
        assert_eq!(NodeKind::classify("Cylinder", &[]), NodeKind::Geometry);
        assert_eq!(NodeKind::classify("DistantLight", &[]), NodeKind::Light);
        assert_eq!(NodeKind::classify("PhysicsScene", &[]), NodeKind::PhysicsScene);
        assert_eq!(
            NodeKind::classify("Xform", &["PhysicsRigidBodyAPI".to_string()]),
            NodeKind::RigidBody
        );
        assert_eq!(NodeKind::classify("Xform", &[]), NodeKind::Xform);
    }

    #[test]
    fn test_default_root_and_find() {
        let doc = sample();
        assert!(doc.has_default_root());
        assert_eq!(doc.default_root().unwrap().name, "arm1");
        assert_eq!(
            doc.find("/arm1/base_link/base_geometry").unwrap().kind,
            NodeKind::Geometry
        );
        assert!(doc.find("/arm1/missing").is_none());
    }

    #[test]
    fn test_duplicate_default_root_is_not_a_root() {
        let mut doc = sample();
        doc.roots.push(SceneNode::xform("arm1"));
        assert!(!doc.has_default_root());

        let mut doc = sample();
        doc.default_prim = None;
        assert!(!doc.has_default_root());
    }

    #[test]
    fn test_walk_order_and_kinds() {
        let doc = sample();
        let paths: Vec<String> = doc.walk().into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            paths,
            vec![
                "/arm1",
                "/arm1/base_link",
                "/arm1/base_link/base_geometry",
                "/arm1/joint_1"
            ]
        );
        assert_eq!(doc.nodes_of_kind(NodeKind::RigidBody).len(), 1);
        assert_eq!(doc.nodes_of_kind(NodeKind::Joint).len(), 1);
    }

    #[test]
    fn test_set_root_metadata() {
        let mut doc = sample();
        assert!(doc.set_root_metadata("comment", "Robot: arm1"));
        assert!(doc.set_root_metadata("converter", "test"));
        let root = doc.default_root().unwrap();
        assert_eq!(root.comment.as_deref(), Some("Robot: arm1"));
        assert_eq!(root.custom_data["converter"], "test");

        assert!(!SceneDocument::empty().set_root_metadata("comment", "x"));
    }

    #[test]
    fn test_sanitize_prim_name() {
        assert_eq!(sanitize_prim_name("arm1"), "arm1");
        assert_eq!(sanitize_prim_name("ur5-e arm"), "ur5_e_arm");
        assert_eq!(sanitize_prim_name("6dof"), "_6dof");
        assert_eq!(sanitize_prim_name(""), "_");
    }

    #[test]
    fn test_transform_isometry_conversion() {
        let iso = Isometry3::from_parts(
            Translation3::new(0.1, 0.2, 0.3),
            UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2),
        );
        let transform = Transform::from_isometry(&iso);
        assert!(transform.has_rotation());
        let back = transform.to_isometry();
        assert_relative_eq!(back.translation.vector, iso.translation.vector, epsilon = 1e-12);
        assert_relative_eq!(back.rotation.angle(), iso.rotation.angle(), epsilon = 1e-12);
        assert!(!Transform::from_translation(1.0, 0.0, 0.0).has_rotation());
    }

    #[test]
    fn test_attribute_accessors() {
        assert_eq!(Attribute::double(0.25).as_f64(), Some(0.25));
        assert_eq!(Attribute::boolean(true).as_bool(), Some(true));
        assert_eq!(Attribute::string("a \"b\"").as_text().unwrap(), "a \"b\"");
        assert_eq!(Attribute::asset("meshes/a.stl").as_text().unwrap(), "meshes/a.stl");
        assert_eq!(Attribute::relationship("/arm1/base").as_text().unwrap(), "/arm1/base");
        assert_eq!(Attribute::double3([0.0, 1.0, -2.5]).as_tuple().unwrap(), vec![0.0, 1.0, -2.5]);
    }
}
