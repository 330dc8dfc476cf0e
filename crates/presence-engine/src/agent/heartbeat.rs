//! # Telephony Heartbeat Tracking
//!
//! The telephony system is the authority on agent liveness. Every event it
//! sends for an agent counts as a heartbeat; an agent that stays silent for
//! longer than the configured timeout is reported by [`HeartbeatMonitor::expired`]
//! so the engine can force it `OFFLINE`.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use super::types::AgentId;

/// Last-seen table for logged-in agents
pub struct HeartbeatMonitor {
    last_seen: Mutex<HashMap<AgentId, Instant>>,
    timeout: Duration,
}

impl HeartbeatMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_seen: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Record liveness for an agent
    pub fn record(&self, agent_id: &AgentId) {
        self.record_at(agent_id, Instant::now());
    }

    pub fn record_at(&self, agent_id: &AgentId, at: Instant) {
        self.last_seen.lock().insert(agent_id.clone(), at);
    }

    /// Stop tracking an agent (logout, forced offline)
    pub fn forget(&self, agent_id: &AgentId) {
        self.last_seen.lock().remove(agent_id);
    }

    pub fn is_tracked(&self, agent_id: &AgentId) -> bool {
        self.last_seen.lock().contains_key(agent_id)
    }

    /// Remove and return every agent silent for longer than the timeout
    pub fn expired(&self, now: Instant) -> Vec<AgentId> {
        let mut last_seen = self.last_seen.lock();
        let expired: Vec<AgentId> = last_seen
            .iter()
            .filter(|(_, seen)| now.saturating_duration_since(**seen) > self.timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for agent_id in &expired {
            last_seen.remove(agent_id);
            debug!("💔 Heartbeat expired for agent {}", agent_id);
        }
        expired
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
