//! Liveness-aware round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{backend::Backend, LoadBalancer};

/// Round-robin selector.
///
/// Scans at most `len` positions from the cursor and picks the first live
/// backend; the cursor then moves to one past that backend. The scan and
/// the cursor update are published with a single compare-exchange, so a
/// concurrent selection is never lost or applied twice.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cursor position.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        let len = backends.len();
        if len == 0 {
            return None;
        }

        let mut start = self.cursor.load(Ordering::Acquire);
        loop {
            let index = (0..len)
                .map(|i| (start + i) % len)
                .find(|&i| backends[i].is_alive())?;

            match self.cursor.compare_exchange_weak(
                start,
                (index + 1) % len,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(backends[index].clone()),
                Err(actual) => start = actual,
            }
        }
    }
}
