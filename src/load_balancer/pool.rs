//! Backend pool management.
//!
//! # Responsibilities
//! - Own the ordered list of backends (registration order)
//! - Apply the load balancing algorithm to select a backend
//! - Summarise liveness for the gateway health endpoint

use std::sync::Arc;
use url::Url;

use crate::config::validation::parse_backend_url;
use crate::load_balancer::{backend::Backend, round_robin::RoundRobin, LoadBalancer};

/// Manages the backend pool and load balancing.
#[derive(Debug)]
pub struct BackendPool {
    backends: Vec<Arc<Backend>>,
    balancer: Box<dyn LoadBalancer>,
}

impl BackendPool {
    /// Create a round-robin pool from already parsed base URLs.
    pub fn new(urls: impl IntoIterator<Item = Url>) -> Result<Self, String> {
        let backends = urls
            .into_iter()
            .map(|url| Backend::new(url).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            backends,
            balancer: Box::new(RoundRobin::new()),
        })
    }

    /// Create a pool from configured address strings.
    pub fn from_addresses(addresses: &[String]) -> Result<Self, String> {
        let urls = addresses
            .iter()
            .map(|a| parse_backend_url(a).map_err(|e| format!("invalid backend '{a}': {e}")))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(urls)
    }

    /// Select the next live backend, or `None` if every backend is dead.
    pub fn next(&self) -> Option<Arc<Backend>> {
        let selected = self.balancer.next_server(&self.backends);
        if selected.is_none() {
            tracing::debug!(backend_count = self.backends.len(), "No healthy backends found in pool");
            for b in &self.backends {
                tracing::debug!(addr = %b.address(), alive = b.is_alive(), "Backend status");
            }
        }
        selected
    }

    /// All backends in registration order (for health checking).
    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// Look up a backend by its configured address.
    pub fn get(&self, address: &str) -> Option<&Arc<Backend>> {
        self.backends.iter().find(|b| b.address() == address)
    }

    pub fn healthy_count(&self) -> usize {
        self.backends.iter().filter(|b| b.is_alive()).count()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
