//! API gateway library: authentication, rate limiting, health-aware load
//! balancing and request auditing in front of a pool of backends.

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::{Gateway, HttpServer};
pub use lifecycle::Shutdown;
