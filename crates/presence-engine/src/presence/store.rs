//! Presence data storage

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::agent::{Agent, AgentId};
use crate::channel::ChannelId;
use crate::error::{PresenceError, Result};
use crate::presence::state::PresenceState;

/// In-memory presence store
///
/// Each agent maps to an immutable [`Agent`] snapshot behind an `Arc`.
/// Writers replace the whole snapshot, readers clone the `Arc`, so a reader
/// can never observe half of an update. The reconciler is the only writer.
pub struct PresenceStore {
    agents: DashMap<AgentId, Arc<Agent>>,
}

impl PresenceStore {
    pub fn new() -> Self {
        Self {
            agents: DashMap::new(),
        }
    }

    /// Insert a newly enrolled agent
    pub fn insert(&self, agent: Agent) -> Result<Arc<Agent>> {
        use dashmap::mapref::entry::Entry;

        match self.agents.entry(agent.id.clone()) {
            Entry::Occupied(_) => Err(PresenceError::AgentAlreadyEnrolled(agent.id.0)),
            Entry::Vacant(slot) => {
                let agent = Arc::new(agent);
                slot.insert(agent.clone());
                Ok(agent)
            }
        }
    }

    /// Last committed presence state
    pub fn get(&self, agent_id: &AgentId) -> Result<PresenceState> {
        self.snapshot(agent_id).map(|agent| agent.state.clone())
    }

    /// Last committed agent snapshot, bindings included
    pub fn snapshot(&self, agent_id: &AgentId) -> Result<Arc<Agent>> {
        self.agents
            .get(agent_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| PresenceError::UnknownAgent(agent_id.0.clone()))
    }

    /// Commit `next` if the store is still at `expected_sequence`.
    ///
    /// `next` must carry exactly `expected_sequence + 1`. Anything else is a
    /// `StaleWrite` and leaves the store untouched.
    pub fn compare_and_set(
        &self,
        agent_id: &AgentId,
        expected_sequence: u64,
        next: Agent,
    ) -> Result<Arc<Agent>> {
        let mut entry = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| PresenceError::UnknownAgent(agent_id.0.clone()))?;

        let current = entry.value().state.sequence;
        if current != expected_sequence || next.state.sequence != expected_sequence + 1 {
            debug!(
                "Rejected write for {}: expected {}, store at {}, proposed {}",
                agent_id, expected_sequence, current, next.state.sequence
            );
            return Err(PresenceError::stale_write(agent_id.0.clone(), expected_sequence, current));
        }

        let next = Arc::new(next);
        *entry.value_mut() = next.clone();
        Ok(next)
    }

    /// Commit without a sequence check.
    ///
    /// Reserved for transitions the telephony system forces (heartbeat loss).
    /// The committed state still receives `current + 1` so later writers see
    /// the move.
    pub fn force(&self, agent_id: &AgentId, mut next: Agent) -> Result<Arc<Agent>> {
        let mut entry = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| PresenceError::UnknownAgent(agent_id.0.clone()))?;

        let sequence = entry.value().state.sequence + 1;
        if next.state.sequence != sequence {
            warn!(
                "Forced write for {} proposed sequence {}, committing as {}",
                agent_id, next.state.sequence, sequence
            );
            next.state.sequence = sequence;
            if let Some(audit) = next.state.audit.as_mut() {
                audit.sequence = sequence;
            }
        }

        let next = Arc::new(next);
        *entry.value_mut() = next.clone();
        Ok(next)
    }

    /// All enrolled agent ids, sorted
    pub fn agents(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.agents.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Enabled agents whose binding on `channel` is currently available
    pub fn eligible_for(&self, channel: &ChannelId) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self
            .agents
            .iter()
            .filter(|entry| {
                let agent = entry.value();
                agent.enabled && agent.binding(channel).map(|b| b.is_available()).unwrap_or(false)
            })
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }
}

impl Default for PresenceStore {
    fn default() -> Self {
        Self::new()
    }
}
