//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured diagnostic events via tracing)
//!     → access_log.rs (one audit entry per request)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (diagnostics), access log file, Prometheus scrape
//! ```
//!
//! # Design Decisions
//! - The audit log is separate from diagnostics and always on
//! - Request ID flows through logs and is propagated to backends
//! - Metrics are cheap (atomic increments)

pub mod access_log;
pub mod logging;
pub mod metrics;

pub use access_log::{FileSink, LogEntry, LogSink, MemorySink, PendingEntry, RequestLogger};
