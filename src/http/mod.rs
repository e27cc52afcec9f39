//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, /health)
//!     → request.rs (assign X-Request-ID)
//!     → dispatcher.rs (auth → rate limit → load balancer → forward → log)
//!     → forward.rs (rewrite URI, call backend, relay response)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod forward;
pub mod request;
pub mod server;

pub use dispatcher::Gateway;
pub use request::X_REQUEST_ID;
pub use server::{HealthSummary, HttpServer, ServerError};
