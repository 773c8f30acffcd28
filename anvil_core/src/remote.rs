//! Client for the simulation engine's robot load endpoint
//!
//! One blocking request per call with a bounded timeout. Every outcome,
//! including transport failures, comes back as a [`LoadResult`]; nothing is
//! retried here.

use crate::config::RemoteConfig;
use crate::error::{AnvilError, AnvilResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

const LOAD_PATH: &str = "/load-robot";
const DEFAULT_PORT: u16 = 8000;
const LOAD_ACTION: &str = "load_robot";

/// Keys checked, in order, for the engine-assigned identifier
const ID_KEYS: [&str; 3] = ["id", "robot_id", "prim_path"];

/// Body of `POST /load-robot`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadRequest {
    pub action: String,
    pub usd_path: String,
    pub robot_config: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl LoadRequest {
    pub fn new(document_path: &Path, robot_config: &BTreeMap<String, Value>) -> Self {
        Self {
            action: LOAD_ACTION.to_string(),
            usd_path: document_path.to_string_lossy().to_string(),
            robot_config: robot_config.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of one load attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadResult {
    pub success: bool,
    pub id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
    /// HTTP status, when a response was received
    pub status: Option<u16>,
    /// Parsed success body
    pub response: Option<Value>,
}

impl LoadResult {
    fn succeeded(status: u16, response: Value) -> Self {
        Self {
            success: true,
            id: extract_id(&response),
            timestamp: Utc::now(),
            error: None,
            status: Some(status),
            response: Some(response),
        }
    }

    fn failed(status: Option<u16>, error: String) -> Self {
        Self {
            success: false,
            id: None,
            timestamp: Utc::now(),
            error: Some(error),
            status,
            response: None,
        }
    }
}

fn extract_id(response: &Value) -> Option<String> {
    ID_KEYS.iter().find_map(|key| match response.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Expand a bare host, `host:port` or base URL into the full load URL
pub fn normalize_endpoint(addr: &str) -> String {
    let addr = addr.trim().trim_end_matches('/');
    let addr = addr.strip_suffix(LOAD_PATH).unwrap_or(addr);

    if addr.starts_with("http://") || addr.starts_with("https://") {
        format!("{}{}", addr, LOAD_PATH)
    } else {
        let host = if addr.contains(':') {
            addr.to_string()
        } else {
            format!("{}:{}", addr, DEFAULT_PORT)
        };
        format!("http://{}{}", host, LOAD_PATH)
    }
}

#[derive(Debug, Clone)]
pub struct RemoteLoadClient {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl RemoteLoadClient {
    pub fn new(config: &RemoteConfig) -> AnvilResult<Self> {
        Self::with_endpoint(&config.endpoint, config.timeout())
    }

    pub fn with_endpoint(endpoint: &str, timeout: Duration) -> AnvilResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AnvilError::RemoteLoadFailed(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            endpoint: normalize_endpoint(endpoint),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Ask the engine to load `document_path`
    pub fn load(&self, document_path: &Path, robot_config: &BTreeMap<String, Value>) -> LoadResult {
        let request = LoadRequest::new(document_path, robot_config);
        tracing::info!("Loading {} via {}", request.usd_path, self.endpoint);

        let response = match self.client.post(&self.endpoint).json(&request).send() {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Load request to {} failed: {}", self.endpoint, e);
                return LoadResult::failed(None, format!("transport error: {}", e));
            }
        };

        let status = response.status();
        let body = match response.text() {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Failed to read load response: {}", e);
                return LoadResult::failed(
                    Some(status.as_u16()),
                    format!("failed to read response body: {}", e),
                );
            }
        };

        if !status.is_success() {
            tracing::error!("Engine rejected load with status {}: {}", status, body);
            let error = if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                body
            };
            return LoadResult::failed(Some(status.as_u16()), error);
        }

        match serde_json::from_str::<Value>(&body) {
            Ok(json) => {
                let result = LoadResult::succeeded(status.as_u16(), json);
                tracing::info!(
                    "Engine loaded robot (id: {})",
                    result.id.as_deref().unwrap_or("none")
                );
                result
            }
            Err(e) => {
                tracing::error!("Engine returned a non-JSON success body: {}", e);
                LoadResult::failed(
                    Some(status.as_u16()),
                    format!("invalid JSON in success response: {}", e),
                )
            }
        }
    }
}
