// End-to-end pipeline tests: upload -> convert -> validate -> load
mod common;

use anvil_core::config::EngineConfig;
use anvil_core::manager::RetryPolicy;
use anvil_core::{
    AnvilConfig, AssetManager, BundleRequest, BundleSources, ConversionStrategy, EngineHandle,
    ErrorKind, NodeKind, PipelineStage, SceneValidator,
};
use common::{spawn_stub, spawn_stub_sequence, write_arm_sources};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn mock_manager(root: &Path, endpoint: &str) -> AssetManager {
    let mut config = AnvilConfig::with_root(root);
    config.remote.endpoint = endpoint.to_string();
    config.remote.timeout_secs = 5;
    AssetManager::new(config, None).unwrap()
}

#[test]
fn test_end_to_end_mock_pipeline() {
    let src = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let (urdf, _) = write_arm_sources(src.path());
    let stub = spawn_stub(200, r#"{"id": "sim-42"}"#);
    let manager = mock_manager(root.path(), &stub.url());
    assert_eq!(manager.strategy(), ConversionStrategy::Mock);

    let mut request = BundleRequest::new("arm1", BundleSources::with_description(&urdf));
    request.config.insert("color".to_string(), json!("red"));
    request.config.insert("payload_kg".to_string(), json!(2));

    let outcome = manager.run_pipeline(&request);

    assert!(outcome.success, "pipeline failed: {:?}", outcome.error);
    assert_eq!(outcome.stage, PipelineStage::Complete);
    assert!(outcome.error.is_none());
    let scene = root.path().join("scenes/arm1.usd");
    assert_eq!(outcome.document_path.as_deref(), Some(scene.as_path()));
    let load = outcome.load_result.unwrap();
    assert!(load.success);
    assert_eq!(load.id.as_deref(), Some("sim-42"));

    assert!(manager.validate(&scene));
    let info = manager.describe(&scene);
    assert_eq!(info.name, "arm1");
    assert_eq!(info.joints.len(), 2);

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["usd_path"], scene.to_string_lossy().to_string());
    assert_eq!(requests[0]["robot_config"]["color"], "red");

    let bundles = manager.list_bundles().unwrap();
    assert_eq!(bundles.len(), 1);
    assert_eq!(bundles[0].name, "arm1");
    assert!(bundles[0].assets.meshes.is_empty());
    assert!(bundles[0].assets.textures.is_empty());

    let loaded = manager.loaded_robots();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id.as_deref(), Some("sim-42"));

    assert!(!manager.remove_bundle("nonexistent"));
    assert!(manager.remove_bundle("arm1"));
    assert!(manager.list_bundles().unwrap().is_empty());
    assert!(manager.loaded_robots().is_empty());
    assert!(!scene.exists());
}

#[test]
fn test_update_robot_config_replaces_wholesale() {
    let src = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let (urdf, _) = write_arm_sources(src.path());
    let stub = spawn_stub(200, r#"{"id": "sim-7"}"#);
    let manager = mock_manager(root.path(), &stub.url());

    let mut request = BundleRequest::new("arm1", BundleSources::with_description(&urdf));
    request.config.insert("color".to_string(), json!("red"));
    request.config.insert("payload_kg".to_string(), json!(2));
    assert!(manager.run_pipeline(&request).success);

    let mut replacement = BTreeMap::new();
    replacement.insert("payload_kg".to_string(), json!(5));
    manager.update_robot_config("arm1", replacement.clone()).unwrap();

    // "color" is gone: replace, not merge
    assert_eq!(manager.loaded_robots()[0].config, replacement);
    let metadata: Value = serde_json::from_str(
        &fs::read_to_string(root.path().join("robots/arm1/metadata.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(metadata["config"], json!({"payload_kg": 5}));
}

#[test]
fn test_listed_meshes_match_upload() {
    let src = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let (urdf, mesh) = write_arm_sources(src.path());
    let extra: Vec<_> = (0..2)
        .map(|i| {
            let path = src.path().join(format!("link_{}.dae", i));
            fs::write(&path, "<COLLADA/>").unwrap();
            path
        })
        .collect();
    let manager = mock_manager(root.path(), "http://127.0.0.1:9");

    let sources = BundleSources::with_description(&urdf)
        .mesh(&mesh)
        .mesh(&extra[0])
        .mesh(&extra[1]);
    manager.upload("arm1", &sources, &BTreeMap::new()).unwrap();

    let bundles = manager.list_bundles().unwrap();
    let meshes = &bundles[0].assets.meshes;
    assert_eq!(meshes.len(), 3);
    assert!(meshes.iter().all(|m| m.is_file()));
    assert!(meshes[0].ends_with("robots/arm1/meshes/forearm.stl"));
}

#[test]
fn test_failed_upload_leaves_no_partial_state() {
    let src = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let (_, mesh) = write_arm_sources(src.path());
    let manager = mock_manager(root.path(), "http://127.0.0.1:9");

    let request = BundleRequest::new(
        "arm1",
        BundleSources::with_description(src.path().join("missing.urdf")).mesh(&mesh),
    );
    let outcome = manager.run_pipeline(&request);

    assert!(!outcome.success);
    assert_eq!(outcome.stage, PipelineStage::Upload);
    assert_eq!(outcome.error.unwrap().kind, ErrorKind::AssetNotFound);
    assert!(!root.path().join("robots/arm1").exists());
    assert_eq!(fs::read_dir(root.path().join("robots")).unwrap().count(), 0);
    let staging = root.path().join("cache/.staging");
    assert!(!staging.exists() || fs::read_dir(&staging).unwrap().count() == 0);
}

#[test]
fn test_load_retry_is_opt_in() {
    let src = TempDir::new().unwrap();
    let (urdf, _) = write_arm_sources(src.path());
    let request = BundleRequest::new("arm1", BundleSources::with_description(&urdf));

    // default policy: a single attempt
    let root = TempDir::new().unwrap();
    let stub = spawn_stub_sequence(vec![(503, "engine busy"), (200, r#"{"id": "late"}"#)]);
    let outcome = mock_manager(root.path(), &stub.url()).run_pipeline(&request);
    assert!(!outcome.success);
    assert_eq!(outcome.stage, PipelineStage::Load);
    assert_eq!(outcome.error.unwrap().message, "engine busy");
    assert_eq!(stub.requests().len(), 1);

    let root = TempDir::new().unwrap();
    let stub = spawn_stub_sequence(vec![(503, "engine busy"), (200, r#"{"robot_id": "r-1"}"#)]);
    let manager = mock_manager(root.path(), &stub.url()).with_retry(RetryPolicy {
        max_attempts: 3,
        backoff: Duration::from_millis(10),
    });
    let outcome = manager.run_pipeline(&request);
    assert!(outcome.success);
    assert_eq!(outcome.load_result.unwrap().id.as_deref(), Some("r-1"));
    assert_eq!(stub.requests().len(), 2);
}

#[test]
fn test_engine_backed_pipeline() {
    let src = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let (urdf, mesh) = write_arm_sources(src.path());
    let stub = spawn_stub(200, r#"{"prim_path": "/World/arm2"}"#);

    let engine_config = EngineConfig {
        enabled: true,
        ..EngineConfig::default()
    };
    let engine = Arc::new(EngineHandle::acquire(&engine_config).unwrap());
    let mut config = AnvilConfig::with_root(root.path());
    config.remote.endpoint = stub.url();
    let manager = AssetManager::new(config, Some(engine.clone())).unwrap();
    assert_eq!(manager.strategy(), ConversionStrategy::Engine);

    let request = BundleRequest::new("arm2", BundleSources::with_description(&urdf).mesh(&mesh));
    let outcome = manager.run_pipeline(&request);
    assert!(outcome.success, "pipeline failed: {:?}", outcome.error);
    assert_eq!(outcome.load_result.unwrap().id.as_deref(), Some("/World/arm2"));

    let scene = outcome.document_path.unwrap();
    let doc = engine.open_document(&scene).unwrap();
    let elbow = doc.find("/arm2/elbow").unwrap();
    assert_eq!(elbow.kind, NodeKind::Joint);
    assert_eq!(elbow.type_name, "PhysicsRevoluteJoint");

    // mesh reference resolves to the copy inside the bundle
    let visual = doc.find("/arm2/forearm/visual_0").unwrap();
    assert!(visual.attribute("anvil:unresolved").is_none());

    let report = manager.validation_report(&scene);
    assert!(report.valid);
    assert!(report.warnings.is_empty());

    // a basic validator accepts engine output too
    assert!(SceneValidator::basic().validate(&scene));

    engine.release();
    assert!(!manager.validate(&scene));
}

#[test]
fn test_concurrent_uploads_of_different_bundles() {
    let src = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let (urdf, mesh) = write_arm_sources(src.path());
    let manager = Arc::new(mock_manager(root.path(), "http://127.0.0.1:9"));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let manager = manager.clone();
            let urdf = urdf.clone();
            let mesh = mesh.clone();
            std::thread::spawn(move || {
                let name = format!("arm{}", i);
                let sources = BundleSources::with_description(&urdf).mesh(&mesh);
                manager.upload(&name, &sources, &BTreeMap::new()).unwrap();
                manager
                    .convert_bundle(&name, &Default::default())
                    .unwrap()
            })
        })
        .collect();

    let scenes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let names: Vec<String> = manager
        .list_bundles()
        .unwrap()
        .into_iter()
        .map(|b| b.name)
        .collect();
    assert_eq!(names, vec!["arm0", "arm1", "arm2", "arm3"]);
    for scene in &scenes {
        assert!(manager.validate(scene));
    }
}
