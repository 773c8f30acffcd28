// Stub simulation engine endpoint shared by the integration tests
#![allow(dead_code)]

use axum::{body::Bytes, http::StatusCode, routing::post, Router};
use parking_lot::Mutex;
use serde_json::Value;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};

pub const ARM_URDF: &str = r#"<?xml version="1.0"?>
<robot name="arm">
    <link name="base_link">
        <visual>
            <geometry><cylinder radius="0.1" length="0.2"/></geometry>
        </visual>
    </link>
    <link name="forearm">
        <visual>
            <geometry><mesh filename="meshes/forearm.stl"/></geometry>
        </visual>
    </link>
    <joint name="elbow" type="revolute">
        <parent link="base_link"/>
        <child link="forearm"/>
        <origin xyz="0 0 0.3" rpy="0 0 0"/>
        <axis xyz="0 1 0"/>
        <limit lower="-2.0" upper="2.0" effort="20" velocity="1"/>
    </joint>
</robot>"#;

pub struct StubEngine {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl StubEngine {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// JSON bodies received so far
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().clone()
    }
}

/// Serve `/load-robot` answering every request with `status` and `body`
pub fn spawn_stub(status: u16, body: &'static str) -> StubEngine {
    spawn_stub_sequence(vec![(status, body)])
}

/// Answer requests with `responses` in order; the last response repeats
pub fn spawn_stub_sequence(responses: Vec<(u16, &'static str)>) -> StubEngine {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = requests.clone();
    let responses = Arc::new(responses);

    let handler = move |body: Bytes| {
        let recorded = recorded.clone();
        let responses = responses.clone();
        async move {
            let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
            let index = {
                let mut requests = recorded.lock();
                requests.push(json);
                requests.len() - 1
            };
            let (status, body) = responses[index.min(responses.len() - 1)];
            (
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                body.to_string(),
            )
        }
    };
    let app = Router::new().route("/load-robot", post(handler));

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });

    StubEngine {
        addr: rx.recv().unwrap(),
        requests,
    }
}

/// Address with nothing listening on it
pub fn closed_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Write the sample arm description plus its mesh into `dir`
pub fn write_arm_sources(dir: &Path) -> (PathBuf, PathBuf) {
    let urdf = dir.join("arm.urdf");
    let mesh = dir.join("forearm.stl");
    fs::write(&urdf, ARM_URDF).unwrap();
    fs::write(&mesh, b"solid forearm\nendsolid forearm\n").unwrap();
    (urdf, mesh)
}
