//! # Presence Notification Fan-out
//!
//! Every committed transition is handed to a [`PresencePublisher`] exactly
//! once, after the store has accepted it. Publishing is fire-and-forget: a
//! slow or absent subscriber never blocks or fails the transition that
//! produced the event.
//!
//! The default [`BroadcastPublisher`] uses a `tokio::sync::broadcast` channel,
//! so subscribers that fall behind lose the oldest events and are told how
//! many they missed. Consumers (WebSocket gateways, routing caches) should
//! treat every event as a full snapshot and simply keep the one with the
//! highest sequence.
//!
//! ```rust
//! use presence_engine::notify::{BroadcastPublisher, PresencePublisher};
//! use presence_engine::agent::AgentId;
//! use presence_engine::presence::PresenceState;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let publisher = BroadcastPublisher::new(16);
//! let mut events = publisher.subscribe();
//!
//! publisher.publish(&AgentId::from("agent-001"), &PresenceState::offline());
//! let event = events.recv().await.unwrap();
//! assert_eq!(event.agent_id, AgentId::from("agent-001"));
//! # }
//! ```

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::agent::AgentId;
use crate::presence::state::PresenceState;

/// A committed presence transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEvent {
    pub agent_id: AgentId,
    pub state: PresenceState,
    pub published_at: DateTime<Utc>,
}

/// Publish contract for committed transitions
pub trait PresencePublisher: Send + Sync {
    /// Fire-and-forget; must not block
    fn publish(&self, agent_id: &AgentId, state: &PresenceState);
}

/// Broadcast fan-out to any number of in-process subscribers
pub struct BroadcastPublisher {
    sender: broadcast::Sender<PresenceEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PresenceEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl PresencePublisher for BroadcastPublisher {
    fn publish(&self, agent_id: &AgentId, state: &PresenceState) {
        let event = PresenceEvent {
            agent_id: agent_id.clone(),
            state: state.clone(),
            published_at: Utc::now(),
        };
        // No subscribers is not an error
        if self.sender.send(event).is_err() {
            trace!("No subscribers for presence of {}", agent_id);
        }
    }
}

/// Keeps every published event in memory
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<PresenceEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PresenceEvent> {
        self.events.lock().clone()
    }

    pub fn for_agent(&self, agent_id: &AgentId) -> Vec<PresenceState> {
        self.events
            .lock()
            .iter()
            .filter(|event| &event.agent_id == agent_id)
            .map(|event| event.state.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl PresencePublisher for RecordingPublisher {
    fn publish(&self, agent_id: &AgentId, state: &PresenceState) {
        self.events.lock().push(PresenceEvent {
            agent_id: agent_id.clone(),
            state: state.clone(),
            published_at: Utc::now(),
        });
    }
}
