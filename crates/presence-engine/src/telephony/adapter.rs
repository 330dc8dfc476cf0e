//! Command side of the telephony boundary

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::error::Result;
use crate::presence::state::{CallId, ReasonCode};

/// Disposition write for a finished call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispositionRequest {
    pub agent_id: AgentId,
    pub call_id: CallId,
    pub code: String,
    /// Pause the agent on the PBX side as part of the same write
    pub pause_after: Option<ReasonCode>,
}

impl DispositionRequest {
    /// One-line summary for logs and errors
    pub fn describe(&self) -> String {
        match self.pause_after {
            Some(reason) => format!("disposition {} for call {} with pause {}", self.code, self.call_id, reason),
            None => format!("disposition {} for call {}", self.code, self.call_id),
        }
    }
}

/// Commands the engine issues to the PBX
///
/// Implementations report an explicit refusal as
/// [`PresenceError::RemoteRejected`](crate::error::PresenceError::RemoteRejected).
/// Timeouts are applied by the caller, so implementations should not add
/// their own. Every command must be safe to repeat: parking an already
/// parked call is a no-op on the PBX.
#[async_trait]
pub trait TelephonyAdapter: Send + Sync {
    async fn login(&self, agent_id: &AgentId, campaign_id: &str, inbound_groups: &[String]) -> Result<()>;

    async fn logout(&self, agent_id: &AgentId) -> Result<()>;

    async fn pause(&self, agent_id: &AgentId, reason: ReasonCode) -> Result<()>;

    async fn unpause(&self, agent_id: &AgentId) -> Result<()>;

    async fn park(&self, agent_id: &AgentId, on: bool) -> Result<()>;

    async fn transfer(&self, agent_id: &AgentId, target_agent_id: &AgentId) -> Result<()>;

    async fn record_disposition(&self, request: &DispositionRequest) -> Result<()>;
}
