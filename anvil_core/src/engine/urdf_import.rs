//! In-process URDF importer
//!
//! Builds an articulation scene from a URDF description: one rigid body per
//! link placed at its kinematic-chain pose, geometry children for visuals and
//! collisions, and one joint prim per URDF joint with drive gains applied.

use super::SimulationEngine;
use crate::error::{AnvilError, AnvilResult};
use crate::params::ImportSettings;
use crate::scene::{
    parse_document, sanitize_prim_name, Attribute, SceneDocument, SceneNode, Transform,
};
use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use urdf_rs::{Geometry, JointType, Pose, Robot as URDFRobot};

const STANDARD_GRAVITY: f64 = 9.81;

pub struct UrdfImportEngine {
    up_axis: String,
    meters_per_unit: f64,
}

impl UrdfImportEngine {
    pub fn new(up_axis: impl Into<String>, meters_per_unit: f64) -> AnvilResult<Self> {
        let up_axis = up_axis.into().to_ascii_uppercase();
        if up_axis != "Y" && up_axis != "Z" {
            return Err(AnvilError::Config(format!(
                "up_axis must be Y or Z, got '{}'",
                up_axis
            )));
        }
        if !(meters_per_unit.is_finite() && meters_per_unit > 0.0) {
            return Err(AnvilError::Config(format!(
                "meters_per_unit must be positive, got {}",
                meters_per_unit
            )));
        }
        Ok(Self {
            up_axis,
            meters_per_unit,
        })
    }

    fn gravity_direction(&self) -> [f64; 3] {
        if self.up_axis == "Y" {
            [0.0, -1.0, 0.0]
        } else {
            [0.0, 0.0, -1.0]
        }
    }
}

impl SimulationEngine for UrdfImportEngine {
    fn name(&self) -> &str {
        "urdf-import"
    }

    fn import_robot(
        &mut self,
        urdf_path: &Path,
        prim_name: &str,
        settings: &ImportSettings,
    ) -> Result<SceneDocument, String> {
        let urdf = urdf_rs::read_file(urdf_path)
            .map_err(|e| format!("Failed to parse URDF {}: {}", urdf_path.display(), e))?;

        let base_dir = urdf_path.parent().unwrap_or_else(|| Path::new("."));
        let mut doc = ArticulationBuilder::new(&urdf, base_dir, prim_name, settings).build()?;

        if settings.create_physics_scene {
            let scene = SceneNode::new("physicsScene", "PhysicsScene")
                .with_attribute(
                    "physics:gravityDirection",
                    Attribute::new("vector3f", format_vec(self.gravity_direction())),
                )
                .with_attribute(
                    "physics:gravityMagnitude",
                    Attribute::float(STANDARD_GRAVITY / self.meters_per_unit),
                );
            if let Some(root) = doc.default_root_mut() {
                root.children.push(scene);
            }
        }

        doc.up_axis = self.up_axis.clone();
        doc.meters_per_unit = self.meters_per_unit;

        tracing::debug!(
            "Imported URDF '{}' ({} links, {} joints) as /{}",
            urdf.name,
            urdf.links.len(),
            urdf.joints.len(),
            prim_name
        );
        Ok(doc)
    }

    fn open_document(&mut self, path: &Path) -> Result<SceneDocument, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
        parse_document(&content).map_err(|e| e.to_string())
    }
}

fn format_vec(v: [f64; 3]) -> String {
    Attribute::double3(v).value
}

fn pose_to_isometry(pose: &Pose) -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::new(pose.xyz[0], pose.xyz[1], pose.xyz[2]),
        UnitQuaternion::from_euler_angles(pose.rpy[0], pose.rpy[1], pose.rpy[2]),
    )
}

struct ArticulationBuilder<'a> {
    urdf: &'a URDFRobot,
    base_dir: &'a Path,
    root_name: String,
    settings: &'a ImportSettings,
    /// World pose of every link
    poses: HashMap<&'a str, Isometry3<f64>>,
    /// Link that owns the rigid body a link's geometry ends up on
    body_of: HashMap<&'a str, &'a str>,
    /// Prim name chosen for each body link and joint
    prim_names: HashMap<String, String>,
    used_names: HashSet<String>,
}

impl<'a> ArticulationBuilder<'a> {
    fn new(
        urdf: &'a URDFRobot,
        base_dir: &'a Path,
        prim_name: &str,
        settings: &'a ImportSettings,
    ) -> Self {
        Self {
            urdf,
            base_dir,
            root_name: sanitize_prim_name(prim_name),
            settings,
            poses: HashMap::new(),
            body_of: HashMap::new(),
            prim_names: HashMap::new(),
            used_names: HashSet::new(),
        }
    }

    fn build(mut self) -> Result<SceneDocument, String> {
        let urdf = self.urdf;
        if urdf.links.is_empty() {
            return Err(format!("URDF robot '{}' defines no links", urdf.name));
        }

        let root_link = self.find_root_link()?;
        self.resolve_poses(root_link)?;
        self.resolve_bodies(root_link);

        let mut root = SceneNode::xform(self.root_name.clone())
            .with_api_schemas(&["PhysicsArticulationRootAPI", "PhysxArticulationAPI"])
            .with_attribute(
                "physxArticulation:enabledSelfCollisions",
                Attribute::boolean(self.settings.self_collision),
            );

        // reserve names in URDF order so links keep their own names where possible
        self.used_names.insert("physicsScene".to_string());
        for link in &urdf.links {
            if self.body_of[link.name.as_str()] == link.name.as_str() {
                let name = self.unique_name(&link.name);
                self.prim_names.insert(format!("link:{}", link.name), name);
            }
        }

        for link in &urdf.links {
            if self.body_of[link.name.as_str()] == link.name.as_str() {
                let body = self.build_body(link.name.as_str());
                root.children.push(body);
            }
        }

        for joint in &urdf.joints {
            if self.is_merged(joint) {
                continue;
            }
            let node = self.build_joint(joint);
            root.children.push(node);
        }

        if self.settings.fix_base {
            let name = self.unique_name("root_joint");
            let body = self.body_path(root_link);
            root.children.push(
                SceneNode::new(name, "PhysicsFixedJoint")
                    .with_attribute("physics:body1", Attribute::relationship(&body)),
            );
        }

        Ok(SceneDocument::with_root(root))
    }

    fn find_root_link(&self) -> Result<&'a str, String> {
        let children: HashSet<&str> = self
            .urdf
            .joints
            .iter()
            .map(|j| j.child.link.as_str())
            .collect();

        let roots: Vec<&'a str> = self
            .urdf
            .links
            .iter()
            .map(|l| l.name.as_str())
            .filter(|name| !children.contains(name))
            .collect();

        match roots.as_slice() {
            [] => Err("URDF has no root link (joint graph is cyclic)".to_string()),
            [root] => Ok(*root),
            many => Err(format!(
                "URDF has {} disconnected root links: {}",
                many.len(),
                many.join(", ")
            )),
        }
    }

    fn resolve_poses(&mut self, root_link: &'a str) -> Result<(), String> {
        let urdf = self.urdf;
        let link_names: HashSet<&str> = urdf.links.iter().map(|l| l.name.as_str()).collect();
        for joint in &urdf.joints {
            for link in [&joint.parent.link, &joint.child.link] {
                if !link_names.contains(link.as_str()) {
                    return Err(format!(
                        "Joint '{}' references unknown link '{}'",
                        joint.name, link
                    ));
                }
            }
        }

        self.poses.insert(root_link, Isometry3::identity());
        let mut queue = VecDeque::from([root_link]);
        while let Some(parent) = queue.pop_front() {
            let parent_pose = self.poses[parent];
            for joint in urdf.joints.iter().filter(|j| j.parent.link == parent) {
                let child = joint.child.link.as_str();
                if self.poses.contains_key(child) {
                    return Err(format!("Link '{}' has more than one parent joint", child));
                }
                self.poses
                    .insert(child, parent_pose * pose_to_isometry(&joint.origin));
                queue.push_back(child);
            }
        }

        if let Some(orphan) = urdf
            .links
            .iter()
            .find(|l| !self.poses.contains_key(l.name.as_str()))
        {
            return Err(format!(
                "Link '{}' is not connected to root link '{}'",
                orphan.name, root_link
            ));
        }
        Ok(())
    }

    fn resolve_bodies(&mut self, root_link: &'a str) {
        let urdf = self.urdf;
        self.body_of.insert(root_link, root_link);
        let mut queue = VecDeque::from([root_link]);
        while let Some(parent) = queue.pop_front() {
            let parent_body = self.body_of[parent];
            for joint in urdf.joints.iter().filter(|j| j.parent.link == parent) {
                let child = joint.child.link.as_str();
                let body = if self.is_merged(joint) { parent_body } else { child };
                self.body_of.insert(child, body);
                queue.push_back(child);
            }
        }
    }

    fn is_merged(&self, joint: &urdf_rs::Joint) -> bool {
        self.settings.merge_fixed_joints && matches!(joint.joint_type, JointType::Fixed)
    }

    fn unique_name(&mut self, base: &str) -> String {
        let base = sanitize_prim_name(base);
        let mut candidate = base.clone();
        let mut suffix = 1;
        while !self.used_names.insert(candidate.clone()) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        candidate
    }

    fn body_path(&self, link: &str) -> String {
        let body = self.body_of.get(link).copied().unwrap_or(link);
        let prim = self
            .prim_names
            .get(&format!("link:{}", body))
            .cloned()
            .unwrap_or_else(|| sanitize_prim_name(body));
        format!("/{}/{}", self.root_name, prim)
    }

    fn build_body(&self, body_link: &'a str) -> SceneNode {
        let body_pose = self.poses[body_link];
        let name = self.prim_names[&format!("link:{}", body_link)].clone();
        let mut node =
            SceneNode::rigid_body(name).with_transform(Transform::from_isometry(&body_pose));

        let mut total_mass = 0.0;

        for link in self
            .urdf
            .links
            .iter()
            .filter(|l| self.body_of[l.name.as_str()] == body_link)
        {
            let offset = body_pose.inverse() * self.poses[link.name.as_str()];
            let prefix = if link.name == body_link {
                String::new()
            } else {
                format!("{}_", sanitize_prim_name(&link.name))
            };

            for (i, visual) in link.visual.iter().enumerate() {
                let pose = offset * pose_to_isometry(&visual.origin);
                let geometry = self
                    .geometry_node(format!("{}visual_{}", prefix, i), &visual.geometry)
                    .with_transform(Transform::from_isometry(&pose));
                node.children.push(geometry);
            }

            for (i, collision) in link.collision.iter().enumerate() {
                let pose = offset * pose_to_isometry(&collision.origin);
                let geometry = self
                    .geometry_node(format!("{}collision_{}", prefix, i), &collision.geometry)
                    .with_api_schemas(&["PhysicsCollisionAPI", "PhysxCollisionAPI"])
                    .with_transform(Transform::from_isometry(&pose))
                    .with_attribute("purpose", Attribute::token("guide"));
                node.children.push(geometry);
            }

            let mass = link.inertial.mass.value;
            if mass.is_finite() && mass > 0.0 {
                total_mass += mass;
            }
        }

        if self.settings.import_inertia_tensor {
            let link = self.urdf.links.iter().find(|l| l.name == body_link);
            if let Some(link) = link {
                let inertial = &link.inertial;
                if total_mass > 0.0 {
                    node.api_schemas.push("PhysicsMassAPI".to_string());
                    node.attributes
                        .insert("physics:mass".to_string(), Attribute::float(total_mass));
                    node.attributes.insert(
                        "physics:centerOfMass".to_string(),
                        Attribute::new(
                            "point3f",
                            format_vec([
                                inertial.origin.xyz[0],
                                inertial.origin.xyz[1],
                                inertial.origin.xyz[2],
                            ]),
                        ),
                    );
                    node.attributes.insert(
                        "physics:diagonalInertia".to_string(),
                        Attribute::float3([
                            inertial.inertia.ixx,
                            inertial.inertia.iyy,
                            inertial.inertia.izz,
                        ]),
                    );
                }
            }
        }

        node
    }

    fn geometry_node(&self, name: String, geometry: &Geometry) -> SceneNode {
        match geometry {
            Geometry::Box { size } => SceneNode::new(name, "Cube")
                .with_attribute("size", Attribute::double(1.0))
                .with_attribute("anvil:boxSize", Attribute::double3([size[0], size[1], size[2]])),
            Geometry::Cylinder { radius, length } => SceneNode::new(name, "Cylinder")
                .with_attribute("radius", Attribute::double(*radius))
                .with_attribute("height", Attribute::double(*length))
                .with_attribute("axis", Attribute::token("Z")),
            Geometry::Capsule { radius, length } => SceneNode::new(name, "Capsule")
                .with_attribute("radius", Attribute::double(*radius))
                .with_attribute("height", Attribute::double(*length))
                .with_attribute("axis", Attribute::token("Z")),
            Geometry::Sphere { radius } => {
                SceneNode::new(name, "Sphere").with_attribute("radius", Attribute::double(*radius))
            }
            Geometry::Mesh { filename, scale } => {
                let scale = scale
                    .as_ref()
                    .map(|s| [s[0], s[1], s[2]])
                    .unwrap_or([1.0, 1.0, 1.0]);
                let mut node = SceneNode::new(name, "Mesh")
                    .with_attribute("anvil:scale", Attribute::float3(scale));
                match resolve_mesh_path(self.base_dir, filename) {
                    Some(path) => {
                        node = node.with_attribute(
                            "anvil:meshSource",
                            Attribute::asset(&path.to_string_lossy()),
                        );
                    }
                    None => {
                        tracing::warn!("Mesh '{}' could not be resolved", filename);
                        node = node
                            .with_attribute("anvil:meshSource", Attribute::asset(filename))
                            .with_attribute("anvil:unresolved", Attribute::boolean(true));
                    }
                }
                node
            }
        }
    }

    fn build_joint(&mut self, joint: &'a urdf_rs::Joint) -> SceneNode {
        let (type_name, drive) = match joint.joint_type {
            JointType::Revolute | JointType::Continuous => {
                ("PhysicsRevoluteJoint", Some("angular"))
            }
            JointType::Prismatic => ("PhysicsPrismaticJoint", Some("linear")),
            JointType::Fixed => ("PhysicsFixedJoint", None),
            JointType::Spherical => ("PhysicsSphericalJoint", None),
            JointType::Floating | JointType::Planar => ("PhysicsJoint", None),
        };

        let name = self.unique_name(&joint.name);
        let frame = self.poses[joint.parent.link.as_str()] * pose_to_isometry(&joint.origin);

        let mut node = SceneNode::new(name, type_name)
            .with_transform(Transform::from_isometry(&frame))
            .with_attribute(
                "physics:body0",
                Attribute::relationship(&self.body_path(&joint.parent.link)),
            )
            .with_attribute(
                "physics:body1",
                Attribute::relationship(&self.body_path(&joint.child.link)),
            );
        node.comment = Some(format!("URDF joint: {}", joint.name));

        let axis = [joint.axis.xyz[0], joint.axis.xyz[1], joint.axis.xyz[2]];
        let Some(drive) = drive else {
            return node;
        };

        node = node.with_attribute("anvil:axis", Attribute::double3(axis));
        if let Some(token) = principal_axis(axis) {
            node = node.with_attribute("physics:axis", Attribute::token(token));
        }

        let limit = &joint.limit;
        match joint.joint_type {
            JointType::Revolute => {
                let lower = limit.lower.to_degrees();
                let upper = limit.upper.to_degrees();
                node = node
                    .with_attribute("physics:lowerLimit", Attribute::float(lower))
                    .with_attribute("physics:upperLimit", Attribute::float(upper));
            }
            JointType::Prismatic => {
                node = node
                    .with_attribute("physics:lowerLimit", Attribute::float(limit.lower))
                    .with_attribute("physics:upperLimit", Attribute::float(limit.upper));
            }
            _ => {}
        }

        let (stiffness, damping) = self.settings.drive_gains();
        node.api_schemas.push(format!("PhysicsDriveAPI:{}", drive));
        node = node
            .with_attribute(
                &format!("drive:{}:physics:type", drive),
                Attribute::token("force"),
            )
            .with_attribute(
                &format!("drive:{}:physics:stiffness", drive),
                Attribute::float(stiffness),
            )
            .with_attribute(
                &format!("drive:{}:physics:damping", drive),
                Attribute::float(damping),
            );
        if limit.effort > 0.0 {
            node = node.with_attribute(
                &format!("drive:{}:physics:maxForce", drive),
                Attribute::float(limit.effort),
            );
        }
        node
    }
}

fn principal_axis(axis: [f64; 3]) -> Option<&'static str> {
    const EPS: f64 = 1e-9;
    match axis {
        [x, y, z] if y.abs() < EPS && z.abs() < EPS && (x.abs() - 1.0).abs() < EPS => Some("X"),
        [x, y, z] if x.abs() < EPS && z.abs() < EPS && (y.abs() - 1.0).abs() < EPS => Some("Y"),
        [x, y, z] if x.abs() < EPS && y.abs() < EPS && (z.abs() - 1.0).abs() < EPS => Some("Z"),
        _ => None,
    }
}

/// Locate a mesh referenced from a URDF relative to the description's directory
///
/// `package://pkg/path` and plain relative references are tried as given and
/// then under the bundle's `meshes/` directory by file name.
pub fn resolve_mesh_path(base_dir: &Path, reference: &str) -> Option<PathBuf> {
    let relative = if let Some(stripped) = reference.strip_prefix("file://") {
        let path = PathBuf::from(stripped);
        if path.exists() {
            return Some(path);
        }
        stripped.trim_start_matches('/').to_string()
    } else if let Some(stripped) = reference.strip_prefix("package://") {
        // drop the package name
        stripped
            .split_once('/')
            .map(|(_, rest)| rest.to_string())
            .unwrap_or_else(|| stripped.to_string())
    } else {
        reference.to_string()
    };

    let direct = base_dir.join(&relative);
    if direct.exists() {
        return Some(direct);
    }

    let file_name = Path::new(&relative).file_name()?;
    let bundled = base_dir.join("meshes").join(file_name);
    bundled.exists().then_some(bundled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::DriveType;
    use crate::scene::NodeKind;
    use approx::assert_relative_eq;
    use std::fs;
    use tempfile::TempDir;

    const TWO_LINK_ARM: &str = r#"<?xml version="1.0"?>
<robot name="two_link_arm">
    <link name="base_link">
        <inertial>
            <mass value="2.0"/>
            <inertia ixx="0.1" ixy="0" ixz="0" iyy="0.2" iyz="0" izz="0.3"/>
        </inertial>
        <visual>
            <geometry><cylinder radius="0.1" length="0.2"/></geometry>
        </visual>
        <collision>
            <geometry><cylinder radius="0.1" length="0.2"/></geometry>
        </collision>
    </link>
    <link name="upper_arm">
        <visual>
            <geometry><mesh filename="package://arm_description/meshes/upper_arm.stl"/></geometry>
        </visual>
    </link>
    <link name="tool0"/>
    <joint name="shoulder" type="revolute">
        <parent link="base_link"/>
        <child link="upper_arm"/>
        <origin xyz="0 0 0.2" rpy="0 0 0"/>
        <axis xyz="0 0 1"/>
        <limit lower="-1.5707963267948966" upper="1.5707963267948966" effort="50" velocity="1"/>
    </joint>
    <joint name="tool_mount" type="fixed">
        <parent link="upper_arm"/>
        <child link="tool0"/>
        <origin xyz="0 0 0.4" rpy="0 0 0"/>
    </joint>
</robot>"#;

    fn write_arm(dir: &Path) -> PathBuf {
        let path = dir.join("arm.urdf");
        fs::write(&path, TWO_LINK_ARM).unwrap();
        fs::create_dir_all(dir.join("meshes")).unwrap();
        fs::write(dir.join("meshes/upper_arm.stl"), b"solid upper_arm\nendsolid\n").unwrap();
        path
    }

    fn engine() -> UrdfImportEngine {
        UrdfImportEngine::new("Z", 1.0).unwrap()
    }

    #[test]
    fn test_import_builds_articulation() {
        let temp_dir = TempDir::new().unwrap();
        let urdf = write_arm(temp_dir.path());

        let doc = engine()
            .import_robot(&urdf, "arm1", &ImportSettings::default())
            .unwrap();

        assert_eq!(doc.default_prim.as_deref(), Some("arm1"));
        let bodies = doc.nodes_of_kind(NodeKind::RigidBody);
        assert_eq!(bodies.len(), 3);

        // shoulder + tool_mount + root_joint
        assert_eq!(doc.nodes_of_kind(NodeKind::Joint).len(), 3);
        assert!(doc.find("/arm1/physicsScene").is_some());

        let tool = doc.find("/arm1/tool0").unwrap();
        assert_relative_eq!(tool.transform.unwrap().translation[2], 0.6, epsilon = 1e-12);

        let shoulder = doc.find("/arm1/shoulder").unwrap();
        assert_eq!(shoulder.type_name, "PhysicsRevoluteJoint");
        assert_eq!(
            shoulder.attribute("physics:body0").unwrap().as_text().unwrap(),
            "/arm1/base_link"
        );
        assert_eq!(shoulder.attribute("physics:axis").unwrap().as_text().unwrap(), "Z");
        assert_relative_eq!(
            shoulder.attribute("physics:upperLimit").unwrap().as_f64().unwrap(),
            90.0,
            epsilon = 1e-9
        );
        assert_eq!(
            shoulder
                .attribute("drive:angular:physics:stiffness")
                .unwrap()
                .as_f64(),
            Some(1e7)
        );

        let base = doc.find("/arm1/base_link").unwrap();
        assert_eq!(base.attribute("physics:mass").unwrap().as_f64(), Some(2.0));
    }

    #[test]
    fn test_mesh_reference_resolves_into_bundle() {
        let temp_dir = TempDir::new().unwrap();
        let urdf = write_arm(temp_dir.path());

        let doc = engine()
            .import_robot(&urdf, "arm1", &ImportSettings::default())
            .unwrap();
        let visual = doc.find("/arm1/upper_arm/visual_0").unwrap();
        let source = visual.attribute("anvil:meshSource").unwrap().as_text().unwrap();
        assert!(source.ends_with("meshes/upper_arm.stl"));
        assert!(visual.attribute("anvil:unresolved").is_none());
    }

    #[test]
    fn test_merge_fixed_joints_folds_child_link() {
        let temp_dir = TempDir::new().unwrap();
        let urdf = write_arm(temp_dir.path());
        let settings = ImportSettings {
            merge_fixed_joints: true,
            fix_base: false,
            create_physics_scene: false,
            ..ImportSettings::default()
        };

        let doc = engine().import_robot(&urdf, "arm1", &settings).unwrap();
        assert_eq!(doc.nodes_of_kind(NodeKind::RigidBody).len(), 2);
        assert!(doc.find("/arm1/tool0").is_none());
        assert!(doc.find("/arm1/tool_mount").is_none());
        assert!(doc.find("/arm1/root_joint").is_none());
        assert!(doc.find("/arm1/physicsScene").is_none());
    }

    #[test]
    fn test_velocity_drive_gains() {
        let temp_dir = TempDir::new().unwrap();
        let urdf = write_arm(temp_dir.path());
        let settings = ImportSettings {
            drive_type: DriveType::Velocity,
            ..ImportSettings::default()
        };

        let doc = engine().import_robot(&urdf, "arm1", &settings).unwrap();
        let shoulder = doc.find("/arm1/shoulder").unwrap();
        assert_eq!(
            shoulder.attribute("drive:angular:physics:stiffness").unwrap().as_f64(),
            Some(0.0)
        );
        assert_eq!(
            shoulder.attribute("drive:angular:physics:damping").unwrap().as_f64(),
            Some(1e7)
        );
    }

    #[test]
    fn test_invalid_urdf_is_rejected_with_diagnostic() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.urdf");
        fs::write(&path, "<robot name=\"x\"><link name=").unwrap();

        let err = engine()
            .import_robot(&path, "x", &ImportSettings::default())
            .unwrap_err();
        assert!(err.contains("Failed to parse URDF"));
    }

    #[test]
    fn test_unknown_joint_link_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad_joint.urdf");
        fs::write(
            &path,
            r#"<robot name="bad">
    <link name="a"/>
    <joint name="j" type="fixed"><parent link="a"/><child link="ghost"/></joint>
</robot>"#,
        )
        .unwrap();

        let err = engine()
            .import_robot(&path, "bad", &ImportSettings::default())
            .unwrap_err();
        assert!(err.contains("ghost"));
    }

    #[test]
    fn test_invalid_up_axis() {
        assert!(UrdfImportEngine::new("X", 1.0).is_err());
        assert!(UrdfImportEngine::new("y", 1.0).is_ok());
        assert!(UrdfImportEngine::new("Z", 0.0).is_err());
    }

    #[test]
    fn test_principal_axis() {
        assert_eq!(principal_axis([0.0, 0.0, 1.0]), Some("Z"));
        assert_eq!(principal_axis([-1.0, 0.0, 0.0]), Some("X"));
        assert_eq!(principal_axis([0.0, 0.7, 0.7]), None);
    }
}
