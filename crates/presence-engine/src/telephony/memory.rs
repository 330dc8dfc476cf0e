//! In-process telephony adapter
//!
//! Stands in for the PBX in tests and in the simulation binary. Commands are
//! recorded in order, individual operations can be made to fail or stall
//! once, and raw events are pushed through an unbounded channel exactly as a
//! real PBX connector would deliver them.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::adapter::{DispositionRequest, TelephonyAdapter};
use crate::agent::AgentId;
use crate::error::{PresenceError, Result};
use crate::presence::state::ReasonCode;

/// A command the adapter accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelephonyCommand {
    Login {
        agent_id: AgentId,
        campaign_id: String,
        inbound_groups: Vec<String>,
    },
    Logout {
        agent_id: AgentId,
    },
    Pause {
        agent_id: AgentId,
        reason: ReasonCode,
    },
    Unpause {
        agent_id: AgentId,
    },
    Park {
        agent_id: AgentId,
        on: bool,
    },
    Transfer {
        agent_id: AgentId,
        target_agent_id: AgentId,
    },
    Disposition(DispositionRequest),
}

impl TelephonyCommand {
    pub fn operation(&self) -> &'static str {
        match self {
            TelephonyCommand::Login { .. } => "login",
            TelephonyCommand::Logout { .. } => "logout",
            TelephonyCommand::Pause { .. } => "pause",
            TelephonyCommand::Unpause { .. } => "unpause",
            TelephonyCommand::Park { .. } => "park",
            TelephonyCommand::Transfer { .. } => "transfer",
            TelephonyCommand::Disposition(_) => "record_disposition",
        }
    }
}

pub struct InMemoryTelephony {
    commands: Mutex<Vec<TelephonyCommand>>,
    attempts: Mutex<Vec<&'static str>>,
    failures: Mutex<HashMap<&'static str, String>>,
    delays: Mutex<HashMap<&'static str, Duration>>,
    parked: Mutex<HashSet<AgentId>>,
    events_tx: mpsc::UnboundedSender<Value>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<Value>>>,
}

impl InMemoryTelephony {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            commands: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            parked: Mutex::new(HashSet::new()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Reject the next call of `operation` with `reason`
    pub fn fail_next(&self, operation: &'static str, reason: impl Into<String>) {
        self.failures.lock().insert(operation, reason.into());
    }

    /// Stall the next call of `operation` for `delay` before answering
    pub fn delay_next(&self, operation: &'static str, delay: Duration) {
        self.delays.lock().insert(operation, delay);
    }

    /// Commands accepted so far, oldest first
    pub fn commands(&self) -> Vec<TelephonyCommand> {
        self.commands.lock().clone()
    }

    /// Every operation invoked, accepted or not
    pub fn attempts(&self) -> Vec<&'static str> {
        self.attempts.lock().clone()
    }

    pub fn is_parked(&self, agent_id: &AgentId) -> bool {
        self.parked.lock().contains(agent_id)
    }

    /// Push a raw event as the PBX would
    pub fn emit(&self, event: Value) {
        debug!("PBX event: {}", event);
        if self.events_tx.send(event).is_err() {
            debug!("PBX event dropped, nobody is listening");
        }
    }

    /// Hand out the raw event stream. Only the first caller gets it.
    pub fn take_event_stream(&self) -> Option<mpsc::UnboundedReceiver<Value>> {
        self.events_rx.lock().take()
    }

    async fn gate(&self, operation: &'static str) -> Result<()> {
        self.attempts.lock().push(operation);

        let delay = self.delays.lock().remove(operation);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.failures.lock().remove(operation) {
            Some(reason) => Err(PresenceError::remote_rejected(operation, reason)),
            None => Ok(()),
        }
    }

    fn accept(&self, command: TelephonyCommand) {
        info!("☎️ PBX accepted {:?}", command);
        self.commands.lock().push(command);
    }
}

impl Default for InMemoryTelephony {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelephonyAdapter for InMemoryTelephony {
    async fn login(&self, agent_id: &AgentId, campaign_id: &str, inbound_groups: &[String]) -> Result<()> {
        self.gate("login").await?;
        self.accept(TelephonyCommand::Login {
            agent_id: agent_id.clone(),
            campaign_id: campaign_id.to_string(),
            inbound_groups: inbound_groups.to_vec(),
        });
        Ok(())
    }

    async fn logout(&self, agent_id: &AgentId) -> Result<()> {
        self.gate("logout").await?;
        self.parked.lock().remove(agent_id);
        self.accept(TelephonyCommand::Logout {
            agent_id: agent_id.clone(),
        });
        Ok(())
    }

    async fn pause(&self, agent_id: &AgentId, reason: ReasonCode) -> Result<()> {
        self.gate("pause").await?;
        self.accept(TelephonyCommand::Pause {
            agent_id: agent_id.clone(),
            reason,
        });
        Ok(())
    }

    async fn unpause(&self, agent_id: &AgentId) -> Result<()> {
        self.gate("unpause").await?;
        self.accept(TelephonyCommand::Unpause {
            agent_id: agent_id.clone(),
        });
        Ok(())
    }

    async fn park(&self, agent_id: &AgentId, on: bool) -> Result<()> {
        self.gate("park").await?;
        {
            let mut parked = self.parked.lock();
            if on {
                parked.insert(agent_id.clone());
            } else {
                parked.remove(agent_id);
            }
        }
        self.accept(TelephonyCommand::Park {
            agent_id: agent_id.clone(),
            on,
        });
        Ok(())
    }

    async fn transfer(&self, agent_id: &AgentId, target_agent_id: &AgentId) -> Result<()> {
        self.gate("transfer").await?;
        self.parked.lock().remove(agent_id);
        self.accept(TelephonyCommand::Transfer {
            agent_id: agent_id.clone(),
            target_agent_id: target_agent_id.clone(),
        });
        Ok(())
    }

    async fn record_disposition(&self, request: &DispositionRequest) -> Result<()> {
        self.gate("record_disposition").await?;
        self.accept(TelephonyCommand::Disposition(request.clone()));
        Ok(())
    }
}
