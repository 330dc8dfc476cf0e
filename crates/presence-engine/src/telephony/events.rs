//! Event side of the telephony boundary
//!
//! The PBX pushes loosely-typed JSON. [`normalize`] turns it into the closed
//! [`TelephonyEvent`] set; anything it cannot classify is dropped with a
//! warning and never reaches the state machine.

use serde::Deserialize;
use tracing::warn;

use crate::agent::AgentId;
use crate::channel::ChannelId;
use crate::presence::state::CallId;

/// Normalized telephony event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelephonyEvent {
    pub agent_id: AgentId,
    pub kind: TelephonyEventKind,
    /// Sequence the emitter last observed for this agent, when it tracks one
    pub expected_sequence: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelephonyEventKind {
    /// PBX assigned a pending call
    Assigned { call_id: Option<CallId> },
    /// Agent picked up
    Answered {
        call_id: CallId,
        channel: ChannelId,
        contact: Option<String>,
    },
    /// Call hung up
    Ended { call_id: CallId },
    /// PBX lost the agent's session
    HeartbeatLost,
    /// Liveness ping, no state change
    Heartbeat,
}

impl TelephonyEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            TelephonyEventKind::Assigned { .. } => "assigned",
            TelephonyEventKind::Answered { .. } => "answered",
            TelephonyEventKind::Ended { .. } => "ended",
            TelephonyEventKind::HeartbeatLost => "heartbeatLost",
            TelephonyEventKind::Heartbeat => "heartbeat",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTelephonyEvent {
    agent_id: Option<String>,
    call_id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    channel: Option<String>,
    contact: Option<String>,
    sequence: Option<u64>,
}

/// Classify a raw PBX payload.
///
/// Calls without a channel are attributed to `default_channel`.
pub fn normalize(raw: &serde_json::Value, default_channel: &ChannelId) -> Option<TelephonyEvent> {
    let parsed: RawTelephonyEvent = match serde_json::from_value(raw.clone()) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Dropping malformed telephony event {}: {}", raw, e);
            return None;
        }
    };

    let agent_id = match parsed.agent_id.filter(|id| !id.is_empty()) {
        Some(id) => AgentId(id),
        None => {
            warn!("Dropping telephony event without agentId: {}", raw);
            return None;
        }
    };

    let call_id = parsed.call_id.filter(|id| !id.is_empty()).map(CallId);

    let kind = match (parsed.kind.as_deref(), call_id) {
        (Some("assigned"), call_id) => TelephonyEventKind::Assigned { call_id },
        (Some("answered"), Some(call_id)) => TelephonyEventKind::Answered {
            call_id,
            channel: parsed
                .channel
                .map(ChannelId)
                .unwrap_or_else(|| default_channel.clone()),
            contact: parsed.contact,
        },
        (Some("ended"), Some(call_id)) => TelephonyEventKind::Ended { call_id },
        (Some("heartbeatLost"), _) => TelephonyEventKind::HeartbeatLost,
        (Some("heartbeat"), _) => TelephonyEventKind::Heartbeat,
        (Some(other @ ("answered" | "ended")), None) => {
            warn!("Dropping '{}' event for {} without callId", other, agent_id);
            return None;
        }
        (other, _) => {
            warn!("Dropping unrecognized telephony event type {:?} for {}", other, agent_id);
            return None;
        }
    };

    Some(TelephonyEvent {
        agent_id,
        kind,
        expected_sequence: parsed.sequence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn voice() -> ChannelId {
        ChannelId::from("vicidial")
    }

    #[test]
    fn answered_defaults_to_voice_channel() {
        let event = normalize(
            &json!({"agentId": "a1", "callId": "c1", "type": "answered", "contact": "citizen-9"}),
            &voice(),
        )
        .unwrap();
        assert_eq!(event.agent_id, AgentId::from("a1"));
        assert_eq!(
            event.kind,
            TelephonyEventKind::Answered {
                call_id: CallId::from("c1"),
                channel: voice(),
                contact: Some("citizen-9".to_string()),
            }
        );
        assert_eq!(event.expected_sequence, None);
    }

    #[test]
    fn keeps_sequence_when_present() {
        let event = normalize(&json!({"agentId": "a1", "type": "assigned", "sequence": 7}), &voice()).unwrap();
        assert_eq!(event.kind, TelephonyEventKind::Assigned { call_id: None });
        assert_eq!(event.expected_sequence, Some(7));
    }

    #[test]
    fn unknown_shapes_are_dropped() {
        assert!(normalize(&json!({"agentId": "a1", "type": "ringing"}), &voice()).is_none());
        assert!(normalize(&json!({"type": "assigned"}), &voice()).is_none());
        assert!(normalize(&json!({"agentId": "a1", "type": "ended"}), &voice()).is_none());
        assert!(normalize(&json!({"agentId": 12, "type": "heartbeat"}), &voice()).is_none());
        assert!(normalize(&json!("heartbeat"), &voice()).is_none());
    }
}
