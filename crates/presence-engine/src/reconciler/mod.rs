//! # Presence Reconciler
//!
//! The only writer of the [`PresenceStore`]. Telephony events and local
//! intents both end up in [`PresenceReconciler::apply`], which serializes
//! them per agent, runs the pure [`transition`] table, re-projects every
//! channel binding and commits the result with compare-and-set.
//!
//! ## Conflict policy
//!
//! The telephony system wins for call state. A telephony event may omit the
//! sequence it observed and is then applied on top of whatever is current.
//! Local intents must always name the sequence they were built from:
//!
//! - sequence behind the store while the agent is now `INCALL`: `StaleIntent`
//! - any other sequence mismatch: `StaleWrite`
//! - sequence current but the state refuses the input: `InvalidTransition`
//!
//! Heartbeat loss is the single bypass: it forces `OFFLINE` regardless of
//! sequence, and any intent built before it fails its next sequence check.
//!
//! ## Locking
//!
//! Each agent has its own `tokio::sync::Mutex`. It is held only for the
//! read-validate-commit step, never across a telephony call, so different
//! agents never wait for each other and a slow PBX never blocks events for
//! the agent it is serving.

pub mod transitions;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::agent::{ActorId, Agent, AgentId, ChannelBinding};
use crate::channel::{ChannelId, ChannelRegistry};
use crate::error::{PresenceError, Result};
use crate::notify::PresencePublisher;
use crate::presence::state::{CallReference, PresenceState, PresenceStatus, StateKind};
use crate::presence::store::PresenceStore;
use crate::telephony::events::{TelephonyEvent, TelephonyEventKind};

pub use transitions::{transition, InputOrigin, Outcome, PresenceInput};

/// What [`PresenceReconciler::apply`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// A new state was committed and published
    Moved(PresenceState),
    /// Nothing to commit; carries the current state
    Unchanged(PresenceState),
}

impl Applied {
    pub fn state(&self) -> &PresenceState {
        match self {
            Applied::Moved(state) | Applied::Unchanged(state) => state,
        }
    }

    pub fn into_state(self) -> PresenceState {
        match self {
            Applied::Moved(state) | Applied::Unchanged(state) => state,
        }
    }

    pub fn is_moved(&self) -> bool {
        matches!(self, Applied::Moved(_))
    }
}

pub struct PresenceReconciler {
    store: Arc<PresenceStore>,
    registry: Arc<ChannelRegistry>,
    publisher: Arc<dyn PresencePublisher>,
    locks: DashMap<AgentId, Arc<Mutex<()>>>,
}

impl PresenceReconciler {
    pub fn new(
        store: Arc<PresenceStore>,
        registry: Arc<ChannelRegistry>,
        publisher: Arc<dyn PresencePublisher>,
    ) -> Self {
        Self {
            store,
            registry,
            publisher,
            locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<PresenceStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    async fn lock(&self, agent_id: &AgentId) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(agent_id.clone()).or_default().clone();
        lock.lock_owned().await
    }

    /// Create an agent in `OFFLINE` with one binding per channel.
    ///
    /// Duplicate channel ids collapse into a single binding.
    pub fn enroll(&self, actor: &ActorId, agent_id: AgentId, channels: &[ChannelId]) -> Result<Arc<Agent>> {
        let now = Utc::now();
        let mut channels: Vec<&ChannelId> = channels.iter().collect();
        channels.sort();
        channels.dedup();

        let bindings = channels
            .into_iter()
            .map(|channel| {
                let category = self.registry.category_of(channel)?;
                Ok(ChannelBinding {
                    channel: channel.clone(),
                    category,
                    status: self.registry.status_for(category, StateKind::Offline)?,
                    updated_at: now,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let agent = self.store.insert(Agent {
            id: agent_id,
            bindings,
            state: PresenceState::offline(),
            enabled: true,
        })?;

        info!(
            "✅ Agent {} enrolled by {} on {} channel(s)",
            agent.id,
            actor,
            agent.bindings.len()
        );
        Ok(agent)
    }

    /// Soft-disable an agent: force it `OFFLINE` and refuse further intents
    pub async fn disable(&self, agent_id: &AgentId, actor: &ActorId) -> Result<PresenceState> {
        let _guard = self.lock(agent_id).await;
        let agent = self.store.snapshot(agent_id)?;
        if !agent.enabled {
            return Ok(agent.state.clone());
        }

        // Always a new sequence, so the disable itself carries an audit stamp
        let now = Utc::now();
        let state = agent.state.successor(PresenceStatus::Offline, None, actor, now)?;
        let next = Agent {
            bindings: self.registry.mapping().project(&agent.bindings, state.kind(), now)?,
            state,
            enabled: false,
            ..(*agent).clone()
        };

        let committed = self.store.force(agent_id, next)?;
        info!("🚫 Agent {} disabled by {}", agent_id, actor);
        self.publisher.publish(agent_id, &committed.state);
        Ok(committed.state.clone())
    }

    /// Dry run of [`apply`](Self::apply) against the current snapshot.
    ///
    /// Used by the orchestrator before it talks to the PBX, so validation
    /// errors surface without any remote side effect.
    pub async fn validate(
        &self,
        agent_id: &AgentId,
        input: &PresenceInput,
        expected_sequence: Option<u64>,
        actor: &ActorId,
    ) -> Result<(Arc<Agent>, Outcome)> {
        let _guard = self.lock(agent_id).await;
        let agent = self.store.snapshot(agent_id)?;
        Self::check_admission(&agent, input, expected_sequence)?;
        let outcome = transition(agent_id, &agent.state, input, actor, Utc::now())?;
        Ok((agent, outcome))
    }

    /// Apply one input and commit the result.
    ///
    /// `expected_sequence` is mandatory for local intents; telephony events
    /// may pass `None` to apply on top of the current state.
    pub async fn apply(
        &self,
        agent_id: &AgentId,
        input: PresenceInput,
        expected_sequence: Option<u64>,
        actor: &ActorId,
    ) -> Result<Applied> {
        if input == PresenceInput::HeartbeatLost {
            return self.force_offline(agent_id, actor).await;
        }

        let _guard = self.lock(agent_id).await;
        let agent = self.store.snapshot(agent_id)?;
        Self::check_admission(&agent, &input, expected_sequence)?;

        let now = Utc::now();
        match transition(agent_id, &agent.state, &input, actor, now)? {
            Outcome::Unchanged => {
                debug!("{} for agent {} is already reflected at {}", input.name(), agent_id, agent.state.status);
                Ok(Applied::Unchanged(agent.state.clone()))
            }
            Outcome::Moved(state) => {
                let committed = self.commit(&agent, state, now)?;
                Ok(Applied::Moved(committed))
            }
        }
    }

    /// Force `OFFLINE`, ignoring sequence. The only bypass of CAS ordering.
    pub async fn force_offline(&self, agent_id: &AgentId, actor: &ActorId) -> Result<Applied> {
        let _guard = self.lock(agent_id).await;
        let agent = self.store.snapshot(agent_id)?;
        if agent.state.status == PresenceStatus::Offline {
            return Ok(Applied::Unchanged(agent.state.clone()));
        }

        let now = Utc::now();
        let state = agent.state.successor(PresenceStatus::Offline, None, actor, now)?;
        let next = Agent {
            bindings: self.registry.mapping().project(&agent.bindings, state.kind(), now)?,
            state,
            ..(*agent).clone()
        };

        let committed = self.store.force(agent_id, next)?;
        warn!(
            "📴 Agent {} forced OFFLINE from {} by {}",
            agent_id, agent.state.status, actor
        );
        self.publisher.publish(agent_id, &committed.state);
        Ok(Applied::Moved(committed.state.clone()))
    }

    /// Apply a normalized telephony event.
    ///
    /// Liveness pings carry no transition and return `Ok(None)`.
    pub async fn handle_telephony_event(&self, event: &TelephonyEvent) -> Result<Option<Applied>> {
        let input = match &event.kind {
            TelephonyEventKind::Heartbeat => return Ok(None),
            TelephonyEventKind::HeartbeatLost => PresenceInput::HeartbeatLost,
            TelephonyEventKind::Assigned { call_id } => PresenceInput::CallAssigned {
                call_id: call_id.clone(),
            },
            TelephonyEventKind::Answered {
                call_id,
                channel,
                contact,
            } => {
                self.registry.category_of(channel)?;
                PresenceInput::CallAnswered {
                    call: CallReference::new(call_id.clone(), channel.clone(), contact.clone(), Utc::now()),
                }
            }
            TelephonyEventKind::Ended { call_id } => PresenceInput::CallEnded {
                call_id: call_id.clone(),
            },
        };

        self.apply(&event.agent_id, input, event.expected_sequence, &ActorId::telephony())
            .await
            .map(Some)
    }

    /// Publish the current state without a transition
    pub fn republish(&self, agent_id: &AgentId) -> Result<PresenceState> {
        let state = self.store.get(agent_id)?;
        self.publisher.publish(agent_id, &state);
        Ok(state)
    }

    fn check_admission(agent: &Agent, input: &PresenceInput, expected_sequence: Option<u64>) -> Result<()> {
        if !agent.enabled {
            return Err(PresenceError::AgentDisabled(agent.id.0.clone()));
        }

        let current = agent.state.sequence;
        match expected_sequence {
            Some(expected) if expected == current => Ok(()),
            Some(expected) => {
                if input.is_local() && expected < current && agent.state.status == PresenceStatus::InCall {
                    Err(PresenceError::StaleIntent {
                        agent: agent.id.0.clone(),
                        current: agent.state.status.to_string(),
                    })
                } else {
                    Err(PresenceError::stale_write(agent.id.0.clone(), expected, current))
                }
            }
            None if input.is_local() => Err(PresenceError::internal(format!(
                "local {} for {} without an expected sequence",
                input.name(),
                agent.id
            ))),
            None => Ok(()),
        }
    }

    fn commit(&self, agent: &Agent, state: PresenceState, at: DateTime<Utc>) -> Result<PresenceState> {
        let from = agent.state.status;
        let next = Agent {
            bindings: self.registry.mapping().project(&agent.bindings, state.kind(), at)?,
            state,
            ..agent.clone()
        };

        let committed = self.store.compare_and_set(&agent.id, agent.state.sequence, next)?;
        info!(
            "🔄 Agent {} {} -> {} (seq {})",
            agent.id, from, committed.state.status, committed.state.sequence
        );
        self.publisher.publish(&agent.id, &committed.state);
        Ok(committed.state.clone())
    }
}
