//! Timeout-based fault detection
//!
//! A node goes offline once its last successful exchange is older than the
//! timeout. The check only ever turns `active` off; turning it back on is
//! the job of the next successful exchange, never of the clock.

use crate::client::{ClientState, NodeClient};
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Active,
    Offline,
}

impl NodeStatus {
    pub fn from_active(active: bool) -> Self {
        if active {
            NodeStatus::Active
        } else {
            NodeStatus::Offline
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Active => f.write_str("ACTIVE"),
            NodeStatus::Offline => f.write_str("OFFLINE"),
        }
    }
}

/// Apply the timeout rule to one state at `now`.
pub fn check_fault(state: &mut ClientState, now: Instant, timeout: Duration) -> NodeStatus {
    if now.saturating_duration_since(state.last_successful_send) > timeout {
        state.active = false;
    }
    NodeStatus::from_active(state.active)
}

#[derive(Debug, Clone, Copy)]
pub struct FaultDetector {
    timeout: Duration,
}

impl FaultDetector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn check(&self, client: &NodeClient) -> NodeStatus {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: &NodeClient, now: Instant) -> NodeStatus {
        client.with_state(|state| check_fault(state, now, self.timeout))
    }
}
