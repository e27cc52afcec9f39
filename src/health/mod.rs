//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each backend concurrently (GET /health, bounded timeout)
//!     → Update liveness (state.rs)
//!
//! State machine (state.rs):
//!     Alive ←→ Dead
//! ```
//!
//! # Design Decisions
//! - One failed probe marks a backend dead; one success revives it
//! - Proxy failures do not touch liveness
//! - Health state is per-backend, not per-pool

pub mod active;
pub mod state;

pub use active::{HealthMonitor, ProbeError};
pub use state::{Liveness, Transition};
