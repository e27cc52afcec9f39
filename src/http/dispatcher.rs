//! Request pipeline.
//!
//! ```text
//! received → authenticated → rate-checked → routed → proxied → logged → responded
//! ```
//!
//! Each failing stage terminates the request; later stages never run. Every
//! request produces exactly one access log entry, including requests whose
//! client disconnects mid-flight (see [`PendingEntry`]).

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::forward::Upstream;
use crate::http::request::request_id;
use crate::load_balancer::BackendPool;
use crate::observability::access_log::{LogSink, PendingEntry, RequestLogger};
use crate::observability::metrics;
use crate::security::{ApiKeys, Credential, RateLimiter};

/// The gateway core: shared state composed per request.
pub struct Gateway {
    pool: Arc<BackendPool>,
    limiter: Arc<RateLimiter>,
    api_keys: ApiKeys,
    logger: RequestLogger,
    upstream: Upstream,
    ip_limit: u32,
    key_limit: u32,
}

impl Gateway {
    /// Build the gateway from a validated configuration.
    pub fn new(config: &GatewayConfig, sink: Arc<dyn LogSink>) -> Result<Self, String> {
        Ok(Self {
            pool: Arc::new(BackendPool::from_addresses(&config.backends)?),
            limiter: Arc::new(RateLimiter::new()),
            api_keys: ApiKeys::new(config.auth.api_keys.iter().cloned()),
            logger: RequestLogger::new(sink),
            upstream: Upstream::new(&config.timeouts),
            ip_limit: config.rate_limit.per_ip_per_minute,
            key_limit: config.rate_limit.per_key_per_minute,
        })
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Run one request through the pipeline and log the outcome.
    pub async fn dispatch(&self, peer: SocketAddr, request: Request<Body>) -> Response<Body> {
        let client_ip = peer.ip();
        let method = request.method().to_string();
        let mut entry = self.logger.begin(
            request_id(request.headers()),
            method.clone(),
            request.uri().path().to_string(),
            client_ip.to_string(),
        );

        tracing::debug!(
            method = %method,
            path = %request.uri().path(),
            client_ip = %client_ip,
            "Dispatching request"
        );

        match self.process(client_ip, request, &mut entry).await {
            Ok(response) => {
                let status = response.status().as_u16();
                metrics::record_request(&method, status, entry.backend(), entry.started());
                entry.finish(status, None);
                response
            }
            Err(err) => {
                let status = err.status_code().as_u16();
                if err.status_code().is_server_error() {
                    tracing::warn!(client_ip = %client_ip, status, error = %err, "Request failed");
                } else {
                    tracing::debug!(client_ip = %client_ip, status, error = %err, "Request rejected");
                }
                metrics::record_request(&method, status, entry.backend(), entry.started());
                entry.finish(status, Some(&err.reason()));
                err.into_response()
            }
        }
    }

    async fn process(
        &self,
        client_ip: IpAddr,
        request: Request<Body>,
        entry: &mut PendingEntry,
    ) -> Result<Response<Body>, GatewayError> {
        let credential = self.api_keys.authenticate(request.headers());
        entry.set_api_key(credential.key());
        if let Credential::Rejected(_) = credential {
            return Err(GatewayError::Unauthorized);
        }

        let ip = client_ip.to_string();
        self.limiter
            .check_at(&ip, credential.key(), self.ip_limit, self.key_limit, Instant::now())
            .map_err(|scope| {
                metrics::record_rate_limited(scope.as_str());
                GatewayError::RateLimited(scope)
            })?;

        let backend = self.pool.next().ok_or(GatewayError::NoHealthyBackend)?;
        entry.set_backend(backend.address());

        self.upstream.forward(&backend, client_ip, request).await
    }
}
