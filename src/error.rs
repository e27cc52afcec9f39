//! Gateway error types.
//!
//! Every failure on the request path terminates at the stage that detected
//! it. The client only ever sees the status code and a fixed message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::time::Duration;
use thiserror::Error;

use crate::security::LimitScope;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("invalid API key")]
    Unauthorized,

    #[error("rate limit exceeded ({0})")]
    RateLimited(LimitScope),

    #[error("no healthy backends available")]
    NoHealthyBackend,

    #[error("upstream timed out after {0:?}")]
    UpstreamTimeout(Duration),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("failed to build upstream request: {0}")]
    RequestBuild(String),
}

impl GatewayError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::NoHealthyBackend => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::RequestBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Reason recorded in the access log.
    pub fn reason(&self) -> String {
        self.to_string()
    }

    const fn client_message(&self) -> &'static str {
        match self {
            Self::Unauthorized => "Unauthorized: invalid API key",
            Self::RateLimited(_) => "Rate limit exceeded",
            Self::NoHealthyBackend => "Service unavailable",
            Self::UpstreamTimeout(_) => "Gateway timeout",
            Self::Upstream(_) => "Bad gateway",
            Self::RequestBuild(_) => "Internal server error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status_code(), self.client_message()).into_response()
    }
}
