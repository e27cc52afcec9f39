//! Upstream forwarding.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the selected backend
//! - Preserve method, path, query, end-to-end headers and body (streamed)
//! - Bound the wait for response headers with the upstream deadline
//! - Bound every body read, in both directions, with the read deadline
//! - Relay the backend response unmodified apart from hop-by-hop headers
//!
//! # Design Decisions
//! - No retry and no reselection: a failed forward is a 502/504 for this request
//! - Forward failures never change backend liveness
//! - Dropping the returned future abandons the upstream call

use axum::body::Body;
use axum::http::uri::PathAndQuery;
use axum::http::{Request, Response, Uri, Version};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::net::IpAddr;
use std::time::Duration;
use tokio::time;
use tower_http::timeout::TimeoutBody;

use crate::config::TimeoutConfig;
use crate::error::GatewayError;
use crate::load_balancer::Backend;
use crate::security::headers::{append_forwarded_for, strip_hop_by_hop};

/// HTTP client used to reach backends.
#[derive(Clone)]
pub struct Upstream {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
    read_timeout: Duration,
}

impl Upstream {
    pub fn new(config: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_secs)));

        Self {
            client: Client::builder(TokioExecutor::new()).build(connector),
            timeout: Duration::from_secs(config.upstream_secs),
            read_timeout: Duration::from_secs(config.read_secs),
        }
    }

    /// Forward `request` to `backend` and return its response.
    pub async fn forward(
        &self,
        backend: &Backend,
        client_ip: IpAddr,
        request: Request<Body>,
    ) -> Result<Response<Body>, GatewayError> {
        let (mut parts, body) = request.into_parts();

        parts.uri = backend_uri(backend, &parts.uri)?;
        parts.version = Version::HTTP_11;
        strip_hop_by_hop(&mut parts.headers);
        append_forwarded_for(&mut parts.headers, client_ip);

        let body = Body::new(TimeoutBody::new(self.read_timeout, body));
        let outbound = Request::from_parts(parts, body);
        let response = match time::timeout(self.timeout, self.client.request(outbound)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(GatewayError::Upstream(e.to_string())),
            Err(_) => return Err(GatewayError::UpstreamTimeout(self.timeout)),
        };

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        // A stalled body errors out, which aborts the client connection.
        let body = TimeoutBody::new(self.read_timeout, body);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// Backend scheme and authority with the original path and query.
fn backend_uri(backend: &Backend, original: &Uri) -> Result<Uri, GatewayError> {
    let path_and_query = original
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    Uri::builder()
        .scheme(backend.scheme())
        .authority(backend.authority().clone())
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| GatewayError::RequestBuild(e.to_string()))
}
