//! In-call operations: park, transfer, dispose

use tracing::info;

use super::core::CallControlOrchestrator;
use crate::agent::{ActorId, AgentId};
use crate::error::{PresenceError, Result};
use crate::presence::state::{PresenceState, PresenceStatus, ReasonCode};
use crate::reconciler::{Outcome, PresenceInput};
use crate::telephony::DispositionRequest;

/// Longest disposition code the PBX stores
const MAX_DISPOSITION_LEN: usize = 32;

impl CallControlOrchestrator {
    /// Park (`on = true`) or retrieve the active call.
    ///
    /// Parking an already parked call still asks the PBX and succeeds without
    /// a new transition.
    pub async fn park(&self, agent_id: &AgentId, on: bool, expected_sequence: u64, actor: &ActorId) -> Result<PresenceState> {
        let state = self
            .confirm_then_commit(
                agent_id,
                PresenceInput::ParkToggled { parked: on },
                expected_sequence,
                actor,
                "park",
                None,
                self.telephony.park(agent_id, on),
            )
            .await?;
        info!("🅿️ Agent {} call {}", agent_id, if on { "parked" } else { "retrieved" });
        Ok(state)
    }

    /// Hand the active call to `target`.
    ///
    /// The target must be `READY`, enabled, and available on a channel of the
    /// call's category. All of that is checked before the PBX is contacted.
    /// On success the source agent moves to `CLOSER` with the call marked as
    /// transferred; the target's own presence follows from the PBX events.
    pub async fn transfer(
        &self,
        agent_id: &AgentId,
        target: &AgentId,
        expected_sequence: u64,
        actor: &ActorId,
    ) -> Result<PresenceState> {
        let input = PresenceInput::Transferred {
            target: target.clone(),
        };
        let (source, outcome) = self
            .reconciler
            .validate(agent_id, &input, Some(expected_sequence), actor)
            .await?;
        let call = match (&outcome, source.call()) {
            (Outcome::Moved(_), Some(call)) => call.clone(),
            _ => {
                return Err(PresenceError::internal(format!(
                    "transfer for {} validated without an active call",
                    agent_id
                )))
            }
        };

        if target == agent_id {
            return Err(PresenceError::target_unavailable(target.0.clone(), "cannot transfer to self"));
        }
        let category = self.reconciler.registry().category_of(&call.channel)?;
        let target_agent = self
            .reconciler
            .store()
            .snapshot(target)
            .map_err(|_| PresenceError::target_unavailable(target.0.clone(), "not enrolled"))?;
        if !target_agent.enabled {
            return Err(PresenceError::target_unavailable(target.0.clone(), "disabled"));
        }
        if target_agent.status() != PresenceStatus::Ready {
            return Err(PresenceError::target_unavailable(
                target.0.clone(),
                format!("target is {}", target_agent.status()),
            ));
        }
        if !target_agent.available_on(category) {
            return Err(PresenceError::target_unavailable(
                target.0.clone(),
                format!("no available {} channel", category),
            ));
        }

        let state = self
            .confirm_then_commit(
                agent_id,
                input,
                expected_sequence,
                actor,
                "transfer",
                Some(format!("transfer of call {} to {}", call.call_id, target)),
                self.telephony.transfer(agent_id, target),
            )
            .await?;
        info!("🔀 Agent {} transferred {} to {}", agent_id, call.call_id, target);
        Ok(state)
    }

    /// Record the disposition of the wrapped-up call, then leave `CLOSER`.
    ///
    /// With `pause_reason` the agent lands in `PAUSED(reason)`, otherwise in
    /// `READY`. Presence does not move unless the PBX stored the disposition.
    pub async fn dispose(
        &self,
        agent_id: &AgentId,
        code: &str,
        pause_reason: Option<&str>,
        expected_sequence: u64,
        actor: &ActorId,
    ) -> Result<PresenceState> {
        validate_disposition_code(code)?;
        let pause = pause_reason.map(str::parse::<ReasonCode>).transpose()?;

        let input = PresenceInput::Disposed { pause };
        let (agent, _) = self
            .reconciler
            .validate(agent_id, &input, Some(expected_sequence), actor)
            .await?;
        let call_id = match agent.call() {
            Some(call) => call.call_id.clone(),
            None => {
                return Err(PresenceError::internal(format!(
                    "disposition for {} validated without a call reference",
                    agent_id
                )))
            }
        };

        let request = DispositionRequest {
            agent_id: agent_id.clone(),
            call_id,
            code: code.to_string(),
            pause_after: pause,
        };
        let state = self
            .confirm_then_commit(
                agent_id,
                input,
                expected_sequence,
                actor,
                "record_disposition",
                Some(request.describe()),
                self.telephony.record_disposition(&request),
            )
            .await?;
        info!(
            "📝 Agent {} disposed {} as {} -> {}",
            agent_id, request.call_id, request.code, state.status
        );
        Ok(state)
    }
}

fn validate_disposition_code(code: &str) -> Result<()> {
    if code.is_empty() {
        return Err(PresenceError::InvalidDisposition("empty disposition code".to_string()));
    }
    if code.len() > MAX_DISPOSITION_LEN {
        return Err(PresenceError::InvalidDisposition(format!(
            "disposition code longer than {} characters",
            MAX_DISPOSITION_LEN
        )));
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(PresenceError::InvalidDisposition(format!(
            "disposition code '{}' contains unsupported characters",
            code
        )));
    }
    Ok(())
}
