//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every backend's health path
//! - Probe backends concurrently, each with its own timeout
//! - Update backend liveness and report transitions

use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::state::Transition;
use crate::load_balancer::{Backend, BackendPool};
use crate::observability::metrics;

/// Why a probe failed. Never surfaced to clients.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to build probe request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("connection error: {0}")]
    Connect(#[from] hyper_util::client::legacy::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("non-success status {0}")]
    Status(u16),
}

/// Background task that keeps backend liveness current.
#[derive(Clone)]
pub struct HealthMonitor {
    pool: Arc<BackendPool>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(pool: Arc<BackendPool>, config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            pool,
            config,
            client,
        }
    }

    /// Probe all backends every interval until shutdown is signalled.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            timeout = self.config.timeout_secs,
            path = %self.config.path,
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Dropping an unfinished round aborts its probe tasks.
                    tokio::select! {
                        _ = self.check_all() => {}
                        _ = shutdown.recv() => {
                            tracing::info!("Health monitor received shutdown signal during probe round");
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every backend concurrently and apply the results.
    pub async fn check_all(&self) -> Vec<(String, Transition)> {
        let mut probes = JoinSet::new();
        for backend in self.pool.backends() {
            let monitor = self.clone();
            let backend = backend.clone();
            probes.spawn(async move {
                let transition = monitor.check_backend(&backend).await;
                (backend.address().to_string(), transition)
            });
        }

        let mut transitions = Vec::new();
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok((address, Some(transition))) => transitions.push((address, transition)),
                Ok((_, None)) => {}
                Err(e) => tracing::error!(error = %e, "Health probe task failed"),
            }
        }
        transitions
    }

    /// Probe one backend and update its liveness. Returns the transition,
    /// if any; repeated identical outcomes return `None`.
    pub async fn check_backend(&self, backend: &Backend) -> Option<Transition> {
        let result = self.probe(backend).await;
        if let Err(e) = &result {
            tracing::debug!(addr = %backend.address(), error = %e, "Health probe failed");
        }

        let transition = backend.set_alive(result.is_ok());
        match (transition, &result) {
            (Some(Transition::Failed), Err(e)) => {
                tracing::warn!(addr = %backend.address(), error = %e, "Backend is now unhealthy");
            }
            (Some(Transition::Recovered), _) => {
                tracing::info!(addr = %backend.address(), "Backend is now healthy");
            }
            _ => {}
        }

        metrics::record_backend_health(backend.address(), backend.is_alive());
        transition
    }

    /// Issue one bounded `GET <backend><path>`; any 2xx is a pass.
    pub async fn probe(&self, backend: &Backend) -> Result<(), ProbeError> {
        let uri = format!("{}{}", backend.address(), self.config.path);
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .header("user-agent", "api-gateway-health-check")
            .body(Body::empty())?;

        let timeout = self.config.timeout();
        let response = time::timeout(timeout, self.client.request(request))
            .await
            .map_err(|_| ProbeError::Timeout(timeout))??;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProbeError::Status(response.status().as_u16()))
        }
    }
}
