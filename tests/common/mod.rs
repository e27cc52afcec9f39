//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use api_gateway::config::GatewayConfig;
use api_gateway::http::{Gateway, HttpServer};
use api_gateway::lifecycle::Shutdown;
use api_gateway::observability::MemorySink;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Handle to a running mock backend.
pub struct MockBackend {
    pub addr: SocketAddr,
    pub name: &'static str,
    pub healthy: Arc<AtomicBool>,
}

impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

#[derive(Clone)]
struct BackendState {
    name: &'static str,
    healthy: Arc<AtomicBool>,
}

async fn health(State(state): State<BackendState>) -> (StatusCode, Json<Value>) {
    if state.healthy.load(Ordering::SeqCst) {
        (StatusCode::OK, Json(json!({ "status": "healthy", "backend": state.name })))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "unhealthy" })))
    }
}

/// Echo what arrived so tests can check what the gateway forwarded.
async fn echo(
    State(state): State<BackendState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, [(&'static str, &'static str); 1], Json<Value>) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    if uri.path() == "/api/slow" {
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    }
    let status = if uri.path() == "/api/teapot" {
        StatusCode::IM_A_TEAPOT
    } else {
        StatusCode::OK
    };

    (
        status,
        [("x-served-by", state.name)],
        Json(json!({
            "backend": state.name,
            "method": method.to_string(),
            "path": uri.path(),
            "query": uri.query().unwrap_or_default(),
            "body": String::from_utf8_lossy(&body),
            "x_forwarded_for": header("x-forwarded-for"),
            "x_request_id": header("x-request-id"),
            "x_custom": header("x-custom"),
        })),
    )
}

/// Start a mock backend on an ephemeral port.
pub async fn start_mock_backend(name: &'static str) -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let healthy = Arc::new(AtomicBool::new(true));

    let app = Router::new()
        .route("/health", get(health))
        .fallback(echo)
        .with_state(BackendState {
            name,
            healthy: healthy.clone(),
        });

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockBackend { addr, name, healthy }
}

/// A raw backend that answers every connection with response headers and
/// a truncated body, then holds the socket open without writing more.
pub async fn start_stalling_backend() -> SocketAddr {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nabc")
                    .await;
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                drop(socket);
            });
        }
    });
    addr
}

/// An address with nothing listening on it.
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Config pointing at `backends` with active health checks off.
pub fn config_for(backends: &[&MockBackend]) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.backends = backends.iter().map(|b| b.url()).collect();
    config.health_check.enabled = false;
    config.observability.metrics_enabled = false;
    config
}

/// A gateway running on an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub gateway: Arc<Gateway>,
    pub log: Arc<MemorySink>,
    pub shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let log = Arc::new(MemorySink::new());
    let server = HttpServer::with_sink(config, log.clone()).unwrap();
    let gateway = server.gateway();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestGateway {
        addr,
        gateway,
        log,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Wait until the access log holds `n` entries. The entry is written just
/// before the response is handed back, so it may trail the client slightly.
pub async fn wait_for_entries(log: &MemorySink, n: usize) {
    for _ in 0..100 {
        if log.len() >= n {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
