//! Pure presence transition table
//!
//! [`transition`] takes the committed state and one input and returns the
//! successor (stamped with actor, time and next sequence) or says the input
//! changes nothing. It never touches the store, so every rule here can be
//! tested without a runtime.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::agent::{ActorId, AgentId};
use crate::error::{PresenceError, Result};
use crate::presence::state::{CallId, CallReference, PresenceState, PresenceStatus, ReasonCode};

/// Where an input comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOrigin {
    /// PBX event; wins for call state
    Telephony,
    /// Agent intent from the desktop
    Agent,
    /// Second half of an orchestrated operation, after the PBX confirmed it
    Orchestrator,
}

/// Everything that can move an agent's presence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceInput {
    CallAssigned { call_id: Option<CallId> },
    CallAnswered { call: CallReference },
    CallEnded { call_id: CallId },
    HeartbeatLost,
    LoggedIn,
    LoggedOut,
    Pause(ReasonCode),
    Unpause,
    EnterManualQueue,
    ParkToggled { parked: bool },
    Transferred { target: AgentId },
    Disposed { pause: Option<ReasonCode> },
}

impl PresenceInput {
    pub fn origin(&self) -> InputOrigin {
        match self {
            PresenceInput::CallAssigned { .. }
            | PresenceInput::CallAnswered { .. }
            | PresenceInput::CallEnded { .. }
            | PresenceInput::HeartbeatLost => InputOrigin::Telephony,
            PresenceInput::Pause(_) | PresenceInput::Unpause | PresenceInput::EnterManualQueue => {
                InputOrigin::Agent
            }
            PresenceInput::LoggedIn
            | PresenceInput::LoggedOut
            | PresenceInput::ParkToggled { .. }
            | PresenceInput::Transferred { .. }
            | PresenceInput::Disposed { .. } => InputOrigin::Orchestrator,
        }
    }

    /// Not issued by the telephony system
    pub fn is_local(&self) -> bool {
        self.origin() != InputOrigin::Telephony
    }

    pub fn name(&self) -> &'static str {
        match self {
            PresenceInput::CallAssigned { .. } => "assigned",
            PresenceInput::CallAnswered { .. } => "answered",
            PresenceInput::CallEnded { .. } => "ended",
            PresenceInput::HeartbeatLost => "heartbeatLost",
            PresenceInput::LoggedIn => "login",
            PresenceInput::LoggedOut => "logout",
            PresenceInput::Pause(_) => "pause",
            PresenceInput::Unpause => "unpause",
            PresenceInput::EnterManualQueue => "manual-queue",
            PresenceInput::ParkToggled { .. } => "park",
            PresenceInput::Transferred { .. } => "transfer",
            PresenceInput::Disposed { .. } => "dispose",
        }
    }
}

/// Result of applying one input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Moved(PresenceState),
    /// Input is already reflected in the current state
    Unchanged,
}

/// Compute the successor of `current` for `input`.
pub fn transition(
    agent_id: &AgentId,
    current: &PresenceState,
    input: &PresenceInput,
    actor: &ActorId,
    at: DateTime<Utc>,
) -> Result<Outcome> {
    use PresenceStatus::*;

    let reject = || {
        Err(PresenceError::invalid_transition(
            agent_id.0.clone(),
            current.status.to_string(),
            input.name(),
        ))
    };
    let moved = |status: PresenceStatus, call: Option<CallReference>| {
        current.successor(status, call, actor, at).map(Outcome::Moved)
    };

    match (input, current.status) {
        (PresenceInput::CallAssigned { .. }, Queue) => Ok(Outcome::Unchanged),
        (PresenceInput::CallAssigned { .. }, InCall) => reject(),
        (PresenceInput::CallAssigned { call_id }, status) => {
            if status == Closer {
                warn!(
                    "Agent {} assigned {:?} before disposing {:?}",
                    agent_id,
                    call_id,
                    current.call.as_ref().map(|c| &c.call_id)
                );
            }
            moved(Queue, None)
        }

        (PresenceInput::CallAnswered { call }, InCall) => match &current.call {
            Some(active) if active.call_id == call.call_id => Ok(Outcome::Unchanged),
            _ => reject(),
        },
        (PresenceInput::CallAnswered { .. }, Offline) => reject(),
        (PresenceInput::CallAnswered { call }, status) => {
            if status == Closer {
                warn!(
                    "Agent {} answered {} before disposing {:?}",
                    agent_id,
                    call.call_id,
                    current.call.as_ref().map(|c| &c.call_id)
                );
            }
            moved(InCall, Some(call.clone()))
        }

        (PresenceInput::CallEnded { call_id }, InCall | Closer) => match &current.call {
            Some(active) if &active.call_id == call_id => {
                if current.status == Closer {
                    Ok(Outcome::Unchanged)
                } else {
                    moved(Closer, Some(active.clone()))
                }
            }
            _ => reject(),
        },
        (PresenceInput::CallEnded { .. }, _) => reject(),

        (PresenceInput::HeartbeatLost, Offline) => Ok(Outcome::Unchanged),
        (PresenceInput::HeartbeatLost, _) => moved(Offline, None),

        (PresenceInput::LoggedIn, Offline) => moved(Paused(ReasonCode::Login), None),
        (PresenceInput::LoggedIn, _) => reject(),

        (PresenceInput::LoggedOut, Offline) => Ok(Outcome::Unchanged),
        (PresenceInput::LoggedOut, InCall | Closer) => reject(),
        (PresenceInput::LoggedOut, _) => moved(Offline, None),

        (PresenceInput::Pause(reason), Paused(current_reason)) if *reason == current_reason => {
            Ok(Outcome::Unchanged)
        }
        (PresenceInput::Pause(reason), Ready | Queue | ManualQueue | Paused(_)) => moved(Paused(*reason), None),
        // CLOSER leaves only through a disposition; OFFLINE needs a login
        (PresenceInput::Pause(_), _) => reject(),

        (PresenceInput::Unpause, Ready) => Ok(Outcome::Unchanged),
        (PresenceInput::Unpause, Paused(_) | ManualQueue) => moved(Ready, None),
        (PresenceInput::Unpause, _) => reject(),

        (PresenceInput::EnterManualQueue, ManualQueue) => Ok(Outcome::Unchanged),
        (PresenceInput::EnterManualQueue, Ready | Paused(_)) => moved(ManualQueue, None),
        (PresenceInput::EnterManualQueue, _) => reject(),

        (PresenceInput::ParkToggled { parked }, InCall) => match &current.call {
            Some(active) if active.parked == *parked => Ok(Outcome::Unchanged),
            Some(active) => moved(
                InCall,
                Some(CallReference {
                    parked: *parked,
                    ..active.clone()
                }),
            ),
            None => reject(),
        },
        (PresenceInput::ParkToggled { .. }, _) => reject(),

        (PresenceInput::Transferred { target }, InCall) => match &current.call {
            Some(active) => moved(
                Closer,
                Some(CallReference {
                    parked: false,
                    transferred_to: Some(target.clone()),
                    ..active.clone()
                }),
            ),
            None => reject(),
        },
        (PresenceInput::Transferred { .. }, _) => reject(),

        (PresenceInput::Disposed { pause: Some(reason) }, Closer) => moved(Paused(*reason), None),
        (PresenceInput::Disposed { pause: None }, Closer) => moved(Ready, None),
        (PresenceInput::Disposed { .. }, _) => reject(),
    }
}
