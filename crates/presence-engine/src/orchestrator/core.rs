//! Core orchestrator type and the confirm-then-commit sequence

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::agent::{ActorId, AgentId};
use crate::error::{PresenceError, Result};
use crate::presence::state::PresenceState;
use crate::reconciler::{Applied, Outcome, PresenceInput, PresenceReconciler};
use crate::telephony::TelephonyAdapter;

/// Sequences operator actions that span the PBX and local presence
pub struct CallControlOrchestrator {
    pub(super) reconciler: Arc<PresenceReconciler>,
    pub(super) telephony: Arc<dyn TelephonyAdapter>,
    pub(super) remote_timeout: Duration,
}

impl CallControlOrchestrator {
    pub fn new(
        reconciler: Arc<PresenceReconciler>,
        telephony: Arc<dyn TelephonyAdapter>,
        remote_timeout: Duration,
    ) -> Self {
        Self {
            reconciler,
            telephony,
            remote_timeout,
        }
    }

    pub fn reconciler(&self) -> &Arc<PresenceReconciler> {
        &self.reconciler
    }

    pub fn remote_timeout(&self) -> Duration {
        self.remote_timeout
    }

    /// Run one telephony command under the configured timeout.
    ///
    /// No retry: a timeout is reported as `RemoteTimeout` and the caller
    /// decides whether to resubmit.
    pub(super) async fn remote<F>(&self, operation: &'static str, agent_id: &AgentId, call: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        match tokio::time::timeout(self.remote_timeout, call).await {
            Ok(Ok(())) => {
                debug!("PBX confirmed {} for agent {}", operation, agent_id);
                Ok(())
            }
            Ok(Err(e)) => {
                warn!("❌ PBX refused {} for agent {}: {}", operation, agent_id, e);
                Err(e)
            }
            Err(_) => {
                warn!(
                    "⏱️ PBX did not answer {} for agent {} within {:?}",
                    operation, agent_id, self.remote_timeout
                );
                Err(PresenceError::RemoteTimeout {
                    operation: operation.to_string(),
                    after_ms: self.remote_timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Validate under the agent lock, release it, run `remote`, then commit.
    ///
    /// Presence only moves after the PBX confirmed the command. If the state
    /// moved while the command was in flight the commit fails its sequence
    /// check and the error is returned as is, unless `recorded` names a
    /// remote write that must not be repeated (a disposition, a transfer).
    /// Then the failure comes back as `RemoteCommittedLocalStale`.
    #[allow(clippy::too_many_arguments)]
    pub(super) async fn confirm_then_commit<F>(
        &self,
        agent_id: &AgentId,
        input: PresenceInput,
        expected_sequence: u64,
        actor: &ActorId,
        operation: &'static str,
        recorded: Option<String>,
        remote: F,
    ) -> Result<PresenceState>
    where
        F: Future<Output = Result<()>>,
    {
        let (_, outcome) = self
            .reconciler
            .validate(agent_id, &input, Some(expected_sequence), actor)
            .await?;

        self.remote(operation, agent_id, remote).await?;

        if outcome == Outcome::Unchanged {
            return self.reconciler.republish(agent_id);
        }

        match self
            .reconciler
            .apply(agent_id, input, Some(expected_sequence), actor)
            .await
        {
            Ok(Applied::Moved(state)) => Ok(state),
            Ok(Applied::Unchanged(_)) => self.reconciler.republish(agent_id),
            Err(e) => {
                let Some(recorded) = recorded else {
                    error!(
                        "PBX accepted {} for agent {} but the local commit failed: {}",
                        operation, agent_id, e
                    );
                    return Err(e);
                };
                let current = self
                    .reconciler
                    .store()
                    .get(agent_id)
                    .map(|s| s.status.to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                error!(
                    "PBX accepted {} for agent {} but presence moved to {} before the commit: {}",
                    recorded, agent_id, current, e
                );
                Err(PresenceError::RemoteCommittedLocalStale {
                    agent: agent_id.to_string(),
                    operation: operation.to_string(),
                    recorded,
                    current,
                    cause: e.to_string(),
                })
            }
        }
    }

    /// Commit a local-only intent
    pub(super) async fn commit_local(
        &self,
        agent_id: &AgentId,
        input: PresenceInput,
        expected_sequence: u64,
        actor: &ActorId,
    ) -> Result<PresenceState> {
        match self
            .reconciler
            .apply(agent_id, input, Some(expected_sequence), actor)
            .await?
        {
            Applied::Moved(state) => Ok(state),
            Applied::Unchanged(_) => self.reconciler.republish(agent_id),
        }
    }
}
