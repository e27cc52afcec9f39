//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing)
//! - Serve `GET /health` locally, dispatch everything else
//! - Spawn background tasks (health monitor, bucket eviction)
//! - Graceful shutdown

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::health::HealthMonitor;
use crate::http::dispatcher::Gateway;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::load_balancer::BackendPool;
use crate::observability::access_log::{AccessLogError, FileSink, LogSink};
use crate::security::RateLimiter;

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    AccessLog(#[from] AccessLogError),

    #[error("invalid backend configuration: {0}")]
    Backends(String),
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub status: String,
    pub healthy_backends: usize,
    pub total_backends: usize,
    pub timestamp: String,
}

impl HealthSummary {
    pub fn from_pool(pool: &BackendPool) -> Self {
        let healthy = pool.healthy_count();
        Self {
            status: if healthy > 0 { "ok" } else { "unavailable" }.to_string(),
            healthy_backends: healthy,
            total_backends: pool.len(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    gateway: Arc<Gateway>,
}

impl HttpServer {
    /// Create a server that appends the access log to the configured file.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let sink = FileSink::open(&config.access_log.path)?;
        Self::with_sink(config, Arc::new(sink))
    }

    /// Create a server with an explicit access log sink.
    pub fn with_sink(config: GatewayConfig, sink: Arc<dyn LogSink>) -> Result<Self, ServerError> {
        let gateway = Arc::new(Gateway::new(&config, sink).map_err(ServerError::Backends)?);
        let router = Self::build_router(gateway.clone());
        Ok(Self {
            router,
            config,
            gateway,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(gateway: Arc<Gateway>) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .fallback(proxy_handler)
            .with_state(gateway)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer()),
            )
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = ?self.config.backends,
            "HTTP server starting"
        );

        if self.config.health_check.enabled {
            let monitor = HealthMonitor::new(
                self.gateway.pool().clone(),
                self.config.health_check.clone(),
            );
            let monitor_shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                monitor.run(monitor_shutdown).await;
            });
        }

        if self.config.rate_limit.idle_eviction_secs > 0 {
            let limiter = self.gateway.rate_limiter().clone();
            let max_idle = Duration::from_secs(self.config.rate_limit.idle_eviction_secs);
            tokio::spawn(sweep_idle_buckets(limiter, max_idle, shutdown.resubscribe()));
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Shared gateway state.
    pub fn gateway(&self) -> Arc<Gateway> {
        self.gateway.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Gateway liveness summary. Never authenticated or rate limited.
async fn health_handler(State(gateway): State<Arc<Gateway>>) -> Json<HealthSummary> {
    Json(HealthSummary::from_pool(gateway.pool()))
}

/// Every other route goes through the dispatcher.
async fn proxy_handler(
    State(gateway): State<Arc<Gateway>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    gateway.dispatch(peer, request).await
}

async fn sweep_idle_buckets(
    limiter: Arc<RateLimiter>,
    max_idle: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(max_idle);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = limiter.evict_idle(max_idle, Instant::now());
                if removed > 0 {
                    tracing::debug!(removed, remaining = limiter.tracked_identities(), "Evicted idle rate limit buckets");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}
