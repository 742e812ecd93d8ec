//! Test helpers: a fake IO-Link master and isolated Zenoh sessions.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use iolink_bridge::config::{DeviceConfig, IolinkConfig, UnitConfig};
use iolink_common::ZenohConfig;

/// A request the fake master received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

/// How the fake master answers.
#[derive(Debug, Clone)]
pub enum Reply {
    /// `{"data":{"value":<hex>}}` for pdin, `{"cid":4711,"code":200}` otherwise.
    Ok(String),
    Status(u16),
    Body(String),
    Delay(Duration),
}

#[derive(Clone)]
struct MasterState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    reply: Arc<Mutex<Reply>>,
}

/// An HTTP server answering like an IO-Link master.
pub struct FakeMaster {
    pub addr: SocketAddr,
    state: MasterState,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeMaster {
    pub async fn start() -> Self {
        let state = MasterState {
            requests: Arc::new(Mutex::new(Vec::new())),
            reply: Arc::new(Mutex::new(Reply::Ok("0x00C8".to_string()))),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake master");
        let addr = listener.local_addr().expect("local addr");

        let app = Router::new().fallback(handle).with_state(state.clone());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake master");
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.state.reply.lock().unwrap() = reply;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for FakeMaster {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle(
    State(state): State<MasterState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let path = uri
        .path()
        .replace("%5B", "[")
        .replace("%5D", "]")
        .replace("%5b", "[")
        .replace("%5d", "]");

    state.requests.lock().unwrap().push(RecordedRequest {
        method,
        path: path.clone(),
        body: serde_json::from_slice(&body).ok(),
    });

    let reply = state.reply.lock().unwrap().clone();
    match reply {
        Reply::Ok(value) => ok_body(&path, &value).into_response(),
        Reply::Status(code) => StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        Reply::Body(body) => body.into_response(),
        Reply::Delay(delay) => {
            tokio::time::sleep(delay).await;
            ok_body(&path, "0x00C8").into_response()
        }
    }
}

fn ok_body(path: &str, value: &str) -> String {
    if path.ends_with("/pdin/getdata") {
        serde_json::json!({ "cid": 4711, "data": { "value": value }, "code": 200 }).to_string()
    } else {
        serde_json::json!({ "cid": 4711, "code": 200 }).to_string()
    }
}

/// Bridge config addressing the fake master at `127.0.0.1:<port>`.
///
/// Channels are placed under `prefix` so concurrent tests do not see each
/// other's events.
pub fn local_config(prefix: &str, http_port: u16) -> IolinkConfig {
    let mut config = IolinkConfig {
        key_prefix: prefix.to_string(),
        http_port: Some(http_port),
        request_timeout_ms: 1000,
        unit: UnitConfig {
            name: "unit1".to_string(),
            subnet: 0,
            network_prefix: "127.0".to_string(),
            default_host: "1".to_string(),
        },
        devices: vec![DeviceConfig::new("htr_a", "1")],
        ..Default::default()
    };
    config.channels.aggregate = format!("{}/instruments_ti", prefix);
    config.channels.device = format!("{}/instrument/{{device}}", prefix);
    config.channels.unit_device = format!("{}/instrument/{{unit}}/{{device}}/temperature", prefix);
    config.commands.key_expr = format!("{}/instrument/*/iolink/*", prefix);
    config
}

/// Generate a unique test prefix to avoid test interference.
pub fn unique_prefix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test_{}", nanos)
}

pub fn isolated_zenoh() -> ZenohConfig {
    ZenohConfig {
        multicast_scouting: false,
        ..Default::default()
    }
}
