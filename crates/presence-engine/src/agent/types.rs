//! Core types for agent management

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::channel::{ChannelCategory, ChannelId};
use crate::presence::projection::BindingStatus;
use crate::presence::state::{CallReference, PresenceState, PresenceStatus, ReasonCode};

/// Agent identifier type for strongly-typed agent references
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        AgentId(s)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        AgentId(s.to_string())
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identity of whoever triggered a change.
///
/// Passed explicitly into every mutating operation and stamped onto the
/// resulting state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl ActorId {
    /// Actor used for changes driven by the telephony system itself
    pub fn telephony() -> Self {
        ActorId("telephony".to_string())
    }

    /// Actor used for engine-internal changes (heartbeat sweeps)
    pub fn system() -> Self {
        ActorId("system".to_string())
    }
}

impl From<&str> for ActorId {
    fn from(s: &str) -> Self {
        ActorId(s.to_string())
    }
}

impl From<&AgentId> for ActorId {
    fn from(agent: &AgentId) -> Self {
        ActorId(agent.0.clone())
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One agent's enrollment on one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBinding {
    pub channel: ChannelId,
    pub category: ChannelCategory,
    pub status: BindingStatus,
    pub updated_at: DateTime<Utc>,
}

impl ChannelBinding {
    pub fn is_available(&self) -> bool {
        self.status.available
    }
}

/// Committed snapshot of an agent
///
/// The store swaps whole snapshots, so state and bindings are always
/// observed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,

    /// One binding per enrolled channel, sorted by channel id
    pub bindings: Vec<ChannelBinding>,

    pub state: PresenceState,

    /// Soft-disable flag; disabled agents are kept but refuse every intent
    pub enabled: bool,
}

impl Agent {
    pub fn status(&self) -> PresenceStatus {
        self.state.status
    }

    pub fn pause_reason(&self) -> Option<ReasonCode> {
        self.state.reason()
    }

    pub fn call(&self) -> Option<&CallReference> {
        self.state.call.as_ref()
    }

    pub fn sequence(&self) -> u64 {
        self.state.sequence
    }

    pub fn channels(&self) -> impl Iterator<Item = &ChannelId> {
        self.bindings.iter().map(|b| &b.channel)
    }

    pub fn binding(&self, channel: &ChannelId) -> Option<&ChannelBinding> {
        self.bindings.iter().find(|b| &b.channel == channel)
    }

    /// Whether any binding of `category` is currently available
    pub fn available_on(&self, category: ChannelCategory) -> bool {
        self.bindings
            .iter()
            .any(|b| b.category == category && b.is_available())
    }
}
