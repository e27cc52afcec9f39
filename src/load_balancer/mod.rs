//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request admitted (auth + rate limit passed)
//!     → pool.rs (ordered backends)
//!     → round_robin.rs (rotate through live backends)
//!     → backend.rs (address + liveness)
//!     → Return backend or None (caller answers 503)
//! ```
//!
//! # Design Decisions
//! - Liveness is written only by the health monitor
//! - Each backend's flag has its own lock; the cursor is a single atomic
//! - Dead backends are skipped, never removed

pub mod backend;
pub mod pool;
pub mod round_robin;

use std::fmt::Debug;
use std::sync::Arc;

pub use backend::Backend;
pub use pool::BackendPool;
pub use round_robin::RoundRobin;

/// A backend selection strategy.
pub trait LoadBalancer: Send + Sync + Debug {
    /// Pick the next backend, or `None` if no candidate is available.
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>>;
}
