//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → auth.rs (X-API-Key whitelist, optional key)
//!     → rate_limit.rs (per-IP, then per-key token buckets)
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-For)
//!     → Pass to load balancer
//! ```
//!
//! # Design Decisions
//! - Fail closed: a present but unknown key is rejected
//! - Denied requests are answered immediately, never queued
//! - No shared state across gateway instances

pub mod auth;
pub mod headers;
pub mod rate_limit;
pub mod token_bucket;

pub use auth::{ApiKeys, Credential, API_KEY_HEADER};
pub use rate_limit::{LimitScope, RateLimiter};
pub use token_bucket::TokenBucket;
