//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server, identified by its base URL
//! - Track liveness behind a lock scoped to this backend only

use axum::http::uri::{Authority, Scheme};
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};
use url::Url;

use crate::health::state::{Liveness, Transition};

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    /// Base URL as configured, e.g. `http://127.0.0.1:8081`.
    address: String,
    /// Parsed base URL.
    url: Url,
    /// Pre-parsed authority for request rewriting.
    authority: Authority,
    /// Liveness flag and last transition time.
    liveness: RwLock<Liveness>,
}

impl Backend {
    /// Create a live backend from its base URL.
    pub fn new(url: Url) -> Result<Self, String> {
        let host = url.host_str().ok_or_else(|| format!("backend '{url}' has no host"))?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority = Authority::from_str(&authority).map_err(|e| e.to_string())?;

        Ok(Self {
            address: url.as_str().trim_end_matches('/').to_string(),
            url,
            authority,
            liveness: RwLock::new(Liveness::new_alive()),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn scheme(&self) -> Scheme {
        Scheme::HTTP
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Return true if the backend is currently believed to be alive.
    pub fn is_alive(&self) -> bool {
        self.liveness.read().unwrap_or_else(PoisonError::into_inner).alive
    }

    /// Snapshot of liveness and the time of the last transition.
    pub fn liveness(&self) -> Liveness {
        *self.liveness.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn last_transition(&self) -> DateTime<Utc> {
        self.liveness().since
    }

    /// Record an observation; returns the transition if the flag changed.
    pub fn set_alive(&self, alive: bool) -> Option<Transition> {
        self.liveness
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(alive)
    }
}
