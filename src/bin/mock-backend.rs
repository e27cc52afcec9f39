//! Test backend for exercising the gateway locally.
//!
//! Every JSON response names the backend so round-robin behaviour is
//! visible from the client side.

use axum::{
    extract::{Query, State},
    http::{Method, StatusCode, Uri},
    routing::{any, get},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use clap::Parser;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "mock-backend")]
#[command(about = "Mock upstream server for the API gateway")]
struct Cli {
    #[arg(short, long, default_value_t = 8081)]
    port: u16,

    #[arg(short, long, default_value = "Backend-1")]
    name: String,

    /// Answer /health with 503.
    #[arg(long)]
    unhealthy: bool,
}

struct Backend {
    name: String,
    healthy: bool,
}

#[derive(Serialize)]
struct ApiResponse {
    status: &'static str,
    message: &'static str,
    backend: String,
    timestamp: String,
    path: String,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    echo: Option<Value>,
}

impl ApiResponse {
    fn new(backend: &Backend, message: &'static str, method: &Method, uri: &Uri) -> Self {
        Self {
            status: "ok",
            message,
            backend: backend.name.clone(),
            timestamp: now(),
            path: uri.path().to_string(),
            method: method.to_string(),
            echo: None,
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

async fn health(State(backend): State<Arc<Backend>>) -> (StatusCode, Json<Value>) {
    if backend.healthy {
        (StatusCode::OK, Json(json!({ "status": "healthy", "backend": backend.name })))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "unhealthy" })))
    }
}

async fn echo(
    State(backend): State<Arc<Backend>>,
    method: Method,
    uri: Uri,
    body: String,
) -> Json<ApiResponse> {
    let mut response = ApiResponse::new(&backend, "Echo response", &method, &uri);
    response.echo = Some(serde_json::from_str(&body).unwrap_or(Value::String(body)));
    Json(response)
}

async fn user(
    State(backend): State<Arc<Backend>>,
    Query(params): Query<HashMap<String, String>>,
    method: Method,
    uri: Uri,
) -> Json<ApiResponse> {
    let id = params.get("id").cloned().unwrap_or_else(|| "123".to_string());
    let mut response = ApiResponse::new(&backend, "User data", &method, &uri);
    response.echo = Some(json!({
        "id": id,
        "name": "Test User",
        "email": "user@example.com",
    }));
    Json(response)
}

async fn data(State(backend): State<Arc<Backend>>) -> Json<Value> {
    let records: Vec<Value> = ["first", "second", "third"]
        .iter()
        .enumerate()
        .map(|(i, value)| json!({ "id": i + 1, "value": value, "backend": backend.name }))
        .collect();

    Json(json!({
        "status": "ok",
        "backend": backend.name,
        "timestamp": now(),
        "data": records,
    }))
}

async fn slow(State(backend): State<Arc<Backend>>, method: Method, uri: Uri) -> Json<ApiResponse> {
    tokio::time::sleep(Duration::from_millis(500)).await;
    Json(ApiResponse::new(&backend, "Slow response", &method, &uri))
}

async fn root(State(backend): State<Arc<Backend>>, method: Method, uri: Uri) -> Json<ApiResponse> {
    Json(ApiResponse::new(&backend, "Welcome to backend", &method, &uri))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let state = Arc::new(Backend {
        name: cli.name.clone(),
        healthy: !cli.unhealthy,
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/echo", any(echo))
        .route("/api/user", any(user))
        .route("/api/data", any(data))
        .route("/api/slow", any(slow))
        .fallback(root)
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], cli.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(backend = %cli.name, address = %addr, "Mock backend listening");

    axum::serve(listener, app).await?;
    Ok(())
}
