//! Agent session operations: login, logout, pause, unpause, manual queue

use tracing::info;

use super::core::CallControlOrchestrator;
use crate::agent::{ActorId, AgentId};
use crate::error::Result;
use crate::presence::state::{PresenceState, ReasonCode};
use crate::reconciler::PresenceInput;

impl CallControlOrchestrator {
    /// Log the agent into a campaign; lands in `PAUSED(login)`
    pub async fn login(
        &self,
        agent_id: &AgentId,
        campaign_id: &str,
        inbound_groups: &[String],
        expected_sequence: u64,
        actor: &ActorId,
    ) -> Result<PresenceState> {
        let state = self
            .confirm_then_commit(
                agent_id,
                PresenceInput::LoggedIn,
                expected_sequence,
                actor,
                "login",
                None,
                self.telephony.login(agent_id, campaign_id, inbound_groups),
            )
            .await?;
        info!("🔐 Agent {} logged into campaign {}", agent_id, campaign_id);
        Ok(state)
    }

    pub async fn logout(&self, agent_id: &AgentId, expected_sequence: u64, actor: &ActorId) -> Result<PresenceState> {
        let state = self
            .confirm_then_commit(
                agent_id,
                PresenceInput::LoggedOut,
                expected_sequence,
                actor,
                "logout",
                None,
                self.telephony.logout(agent_id),
            )
            .await?;
        info!("👋 Agent {} logged out", agent_id);
        Ok(state)
    }

    /// Pause with a textual reason code.
    ///
    /// The code is parsed before anything else, so an unknown code never
    /// reaches the PBX.
    pub async fn pause(
        &self,
        agent_id: &AgentId,
        reason: &str,
        expected_sequence: u64,
        actor: &ActorId,
    ) -> Result<PresenceState> {
        let reason: ReasonCode = reason.parse()?;
        self.confirm_then_commit(
            agent_id,
            PresenceInput::Pause(reason),
            expected_sequence,
            actor,
            "pause",
            None,
            self.telephony.pause(agent_id, reason),
        )
        .await
    }

    pub async fn unpause(&self, agent_id: &AgentId, expected_sequence: u64, actor: &ActorId) -> Result<PresenceState> {
        self.confirm_then_commit(
            agent_id,
            PresenceInput::Unpause,
            expected_sequence,
            actor,
            "unpause",
            None,
            self.telephony.unpause(agent_id),
        )
        .await
    }

    /// Enter manual queue. The PBX has no such state, so nothing is sent.
    pub async fn enter_manual_queue(
        &self,
        agent_id: &AgentId,
        expected_sequence: u64,
        actor: &ActorId,
    ) -> Result<PresenceState> {
        self.commit_local(agent_id, PresenceInput::EnterManualQueue, expected_sequence, actor)
            .await
    }
}
