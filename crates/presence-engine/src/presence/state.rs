//! Presence value types
//!
//! [`PresenceState`] is an immutable value: transitions build a new one
//! rather than mutating the committed snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::agent::{ActorId, AgentId};
use crate::channel::ChannelId;
use crate::error::{PresenceError, Result};

/// Telephony call identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub String);

impl CallId {
    pub fn new() -> Self {
        Self(format!("call-{}", uuid::Uuid::new_v4()))
    }
}

impl From<&str> for CallId {
    fn from(s: &str) -> Self {
        CallId(s.to_string())
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pause reason codes accepted by the telephony system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReasonCode {
    Login,
    Lunch,
    Break,
    Meeting,
    Training,
    Personal,
    Technical,
    Wrap,
    WrapUp,
    Admin,
    Coaching,
    QualityReview,
}

impl ReasonCode {
    pub const ALL: [ReasonCode; 12] = [
        ReasonCode::Login,
        ReasonCode::Lunch,
        ReasonCode::Break,
        ReasonCode::Meeting,
        ReasonCode::Training,
        ReasonCode::Personal,
        ReasonCode::Technical,
        ReasonCode::Wrap,
        ReasonCode::WrapUp,
        ReasonCode::Admin,
        ReasonCode::Coaching,
        ReasonCode::QualityReview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::Login => "login",
            ReasonCode::Lunch => "lunch",
            ReasonCode::Break => "break",
            ReasonCode::Meeting => "meeting",
            ReasonCode::Training => "training",
            ReasonCode::Personal => "personal",
            ReasonCode::Technical => "technical",
            ReasonCode::Wrap => "wrap",
            ReasonCode::WrapUp => "wrap-up",
            ReasonCode::Admin => "admin",
            ReasonCode::Coaching => "coaching",
            ReasonCode::QualityReview => "quality-review",
        }
    }
}

impl FromStr for ReasonCode {
    type Err = PresenceError;

    fn from_str(s: &str) -> Result<Self> {
        ReasonCode::ALL
            .iter()
            .find(|code| code.as_str() == s)
            .copied()
            .ok_or_else(|| PresenceError::UnknownReasonCode(s.to_string()))
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminant of [`PresenceStatus`] without payload
///
/// Used as the key of availability mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    Ready,
    Queue,
    Incall,
    Paused,
    Closer,
    Mqueue,
    Offline,
}

impl StateKind {
    pub const ALL: [StateKind; 7] = [
        StateKind::Ready,
        StateKind::Queue,
        StateKind::Incall,
        StateKind::Paused,
        StateKind::Closer,
        StateKind::Mqueue,
        StateKind::Offline,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StateKind::Ready => "READY",
            StateKind::Queue => "QUEUE",
            StateKind::Incall => "INCALL",
            StateKind::Paused => "PAUSED",
            StateKind::Closer => "CLOSER",
            StateKind::Mqueue => "MQUEUE",
            StateKind::Offline => "OFFLINE",
        }
    }

    /// Integer code shared with the telephony system.
    ///
    /// These values are the PBX's own status codes and must not change.
    /// Manual queue has no counterpart on the PBX side.
    pub fn interchange_code(&self) -> Option<u8> {
        match self {
            StateKind::Ready => Some(1),
            StateKind::Closer => Some(15),
            StateKind::Offline => Some(16),
            StateKind::Incall => Some(17),
            StateKind::Paused => Some(18),
            StateKind::Queue => Some(19),
            StateKind::Mqueue => None,
        }
    }

    pub fn from_interchange_code(code: u8) -> Option<StateKind> {
        match code {
            1 => Some(StateKind::Ready),
            15 => Some(StateKind::Closer),
            16 => Some(StateKind::Offline),
            17 => Some(StateKind::Incall),
            18 => Some(StateKind::Paused),
            19 => Some(StateKind::Queue),
            _ => None,
        }
    }

    /// States that must carry a call reference
    pub fn holds_call(&self) -> bool {
        matches!(self, StateKind::Incall | StateKind::Closer)
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate agent status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum PresenceStatus {
    /// Waiting for the ACD to hand over a call
    Ready,
    /// PBX has assigned a pending call
    Queue,
    /// On a call
    InCall,
    /// Paused with a reason code
    Paused(ReasonCode),
    /// Post-call wrap-up, waiting for disposition
    Closer,
    /// Manual queue (agent-driven dialing)
    ManualQueue,
    /// Not logged in to the telephony system
    Offline,
}

impl PresenceStatus {
    pub fn kind(&self) -> StateKind {
        match self {
            PresenceStatus::Ready => StateKind::Ready,
            PresenceStatus::Queue => StateKind::Queue,
            PresenceStatus::InCall => StateKind::Incall,
            PresenceStatus::Paused(_) => StateKind::Paused,
            PresenceStatus::Closer => StateKind::Closer,
            PresenceStatus::ManualQueue => StateKind::Mqueue,
            PresenceStatus::Offline => StateKind::Offline,
        }
    }

    pub fn reason(&self) -> Option<ReasonCode> {
        match self {
            PresenceStatus::Paused(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresenceStatus::Paused(reason) => write!(f, "PAUSED({})", reason),
            other => f.write_str(other.kind().as_str()),
        }
    }
}

/// An in-progress or just-ended call owned by one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallReference {
    pub call_id: CallId,

    /// Channel the call came in on
    pub channel: ChannelId,

    /// Citizen contact the call belongs to, if the PBX reported one
    pub contact: Option<String>,

    pub started_at: DateTime<Utc>,

    pub parked: bool,

    /// Set once the call has been handed over to another agent
    pub transferred_to: Option<AgentId>,
}

impl CallReference {
    pub fn new(call_id: CallId, channel: ChannelId, contact: Option<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            call_id,
            channel,
            contact,
            started_at,
            parked: false,
            transferred_to: None,
        }
    }
}

/// Who changed presence, when, and which sequence that change produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStamp {
    pub actor: ActorId,
    pub at: DateTime<Utc>,
    pub sequence: u64,
}

/// Canonical presence of one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceState {
    pub status: PresenceStatus,

    /// Non-null exactly when the status is `INCALL` or `CLOSER`
    pub call: Option<CallReference>,

    /// Per-agent, strictly increasing
    pub sequence: u64,

    /// Stamp of the transition that produced this state
    pub audit: Option<AuditStamp>,
}

impl PresenceState {
    /// State of a freshly enrolled agent
    pub fn offline() -> Self {
        Self {
            status: PresenceStatus::Offline,
            call: None,
            sequence: 0,
            audit: None,
        }
    }

    pub fn kind(&self) -> StateKind {
        self.status.kind()
    }

    pub fn reason(&self) -> Option<ReasonCode> {
        self.status.reason()
    }

    pub fn interchange_code(&self) -> Option<u8> {
        self.kind().interchange_code()
    }

    /// Build the successor of `self`, stamping it with the next sequence
    pub fn successor(
        &self,
        status: PresenceStatus,
        call: Option<CallReference>,
        actor: &ActorId,
        at: DateTime<Utc>,
    ) -> Result<Self> {
        let sequence = self.sequence + 1;
        let next = Self {
            status,
            call,
            sequence,
            audit: Some(AuditStamp {
                actor: actor.clone(),
                at,
                sequence,
            }),
        };
        next.check_invariants()?;
        Ok(next)
    }

    /// The call reference is present iff the state holds a call
    pub fn check_invariants(&self) -> Result<()> {
        if self.kind().holds_call() != self.call.is_some() {
            return Err(PresenceError::internal(format!(
                "{} state {} a call reference",
                self.status,
                if self.call.is_some() { "must not carry" } else { "requires" }
            )));
        }
        Ok(())
    }
}
