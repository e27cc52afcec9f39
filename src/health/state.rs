//! Backend liveness state machine.
//!
//! # States
//! - Alive: backend receives traffic (initial state)
//! - Dead: backend excluded from load balancing
//!
//! # State Transitions
//! ```text
//! Alive → Dead: a single failed probe
//! Dead → Alive: a single successful probe
//! ```
//!
//! Self-transitions are silent; only real changes produce a [`Transition`].

use chrono::{DateTime, Utc};
use std::fmt;

/// Current believed availability of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    pub alive: bool,
    /// When `alive` last changed (or when the backend was registered).
    pub since: DateTime<Utc>,
}

impl Liveness {
    pub fn new_alive() -> Self {
        Self {
            alive: true,
            since: Utc::now(),
        }
    }

    /// Apply an observation. Returns the transition if the state changed.
    pub fn observe(&mut self, alive: bool) -> Option<Transition> {
        if self.alive == alive {
            return None;
        }
        self.alive = alive;
        self.since = Utc::now();
        Some(if alive { Transition::Recovered } else { Transition::Failed })
    }
}

/// A change in liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// alive → dead
    Failed,
    /// dead → alive
    Recovered,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Failed => f.write_str("alive -> dead"),
            Transition::Recovered => f.write_str("dead -> alive"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_changes_are_reported() {
        let mut state = Liveness::new_alive();
        let registered = state.since;

        assert_eq!(state.observe(true), None);
        assert_eq!(state.since, registered);

        assert_eq!(state.observe(false), Some(Transition::Failed));
        assert_eq!(state.observe(false), None);
        assert!(!state.alive);

        assert_eq!(state.observe(true), Some(Transition::Recovered));
        assert!(state.alive);
        assert!(state.since >= registered);
    }
}
