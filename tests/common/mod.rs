//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use request_shield::clock::ManualClock;
use request_shield::config::ShieldConfig;
use request_shield::observability::{EventSink, EventType, SecurityEvent};
use request_shield::{HttpServer, Shutdown};

/// Collects every emitted event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SecurityEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event_type: EventType) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &SecurityEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Defaults with the log directory pointed at `log_dir`.
pub fn test_config(log_dir: &Path) -> ShieldConfig {
    let mut config = ShieldConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.logs.dir = log_dir.to_path_buf();
    config
}

/// Server on a manual clock with a recording sink.
pub fn build_server(config: ShieldConfig) -> (HttpServer, Arc<RecordingSink>, Arc<ManualClock>) {
    let sink = Arc::new(RecordingSink::default());
    let clock = ManualClock::shared();
    let server = HttpServer::with_clock(config, sink.clone(), clock.clone());
    (server, sink, clock)
}

/// Request attributed to `ip` via `X-Forwarded-For`.
pub fn request_from(ip: &str, method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", ip)
        .header("user-agent", "Mozilla/5.0 (integration test)")
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(ip: &str, method: &str, uri: &str, body: &Value) -> Request<Body> {
    let bytes = serde_json::to_vec(body).unwrap();
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", ip)
        .header("content-type", "application/json")
        .header("content-length", bytes.len())
        .body(Body::from(bytes))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Serve `server` on an ephemeral port. Returns the address, the shutdown
/// coordinator and the server task.
pub async fn start_server(
    server: HttpServer,
) -> (SocketAddr, Shutdown, JoinHandle<Result<(), std::io::Error>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.clone()));
    (addr, shutdown, handle)
}

/// HTTP client that ignores proxy settings from the environment.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
