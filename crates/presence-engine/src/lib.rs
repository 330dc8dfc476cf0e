//! # Agent Presence Engine
//!
//! Keeps contact-center agents' availability consistent across every channel
//! they work (WhatsApp, Telegram, email, web chat and the voice ACD) and the
//! telephony system that owns their calls.
//!
//! ## Features
//!
//! - **Presence State Machine**: `READY`, `QUEUE`, `INCALL`, `PAUSED(reason)`,
//!   `CLOSER`, `MQUEUE`, `OFFLINE` with a pure transition table
//! - **Channel Projection**: per-category availability codes recomputed on
//!   every aggregate change
//! - **Optimistic Concurrency**: per-agent sequence numbers with
//!   compare-and-set commits
//! - **Call Control**: park, transfer and dispose-and-pause that only move
//!   presence once the PBX confirmed the command
//! - **Heartbeat Tracking**: silent agents are forced offline
//! - **Fan-out**: every committed transition is published once
//!
//! ## Architecture
//!
//! - [`channel`]: static channel registry and categories
//! - [`presence`]: state values, availability projection and the store
//! - [`telephony`]: PBX command trait, event normalization, in-memory PBX
//! - [`reconciler`]: the state machine and the only store writer
//! - [`orchestrator`]: multi-step operator actions
//! - [`notify`]: publish contract and broadcast fan-out
//! - [`agent`]: agent records and heartbeat tracking
//! - [`server`]: wiring and background tasks
//!
//! ## Quick Start
//!
//! ```rust
//! use presence_engine::prelude::*;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let server = PresenceServerBuilder::new().build()?;
//! let agent = AgentId::from("agent-001");
//! let actor = ActorId::from(&agent);
//! server.enroll(&ActorId::system(), agent.clone(), &["vicidial".into(), "whatsapp".into(), "email".into()])?;
//!
//! let orchestrator = server.orchestrator();
//! let state = orchestrator.login(&agent, "inbound", &[], 0, &actor).await?;
//! orchestrator.unpause(&agent, state.sequence, &actor).await?;
//!
//! server.ingest(&json!({"agentId": "agent-001", "callId": "c1", "type": "answered"})).await?;
//! assert_eq!(server.presence(&agent)?.status, PresenceStatus::InCall);
//! assert!(server.eligible_agents(&"whatsapp".into())?.is_empty());
//! assert_eq!(server.eligible_agents(&"email".into())?, vec![agent]);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod config;
pub mod logging;

pub mod agent;
pub mod channel;
pub mod notify;
pub mod orchestrator;
pub mod presence;
pub mod reconciler;
pub mod server;
pub mod telephony;

pub use config::PresenceConfig;
pub use error::{ErrorKind, PresenceError, Result};
pub use orchestrator::CallControlOrchestrator;
pub use reconciler::PresenceReconciler;
pub use server::{PresenceServer, PresenceServerBuilder};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{PresenceConfig, PresenceError, ErrorKind, Result};

    pub use crate::agent::{ActorId, Agent, AgentId, ChannelBinding, HeartbeatMonitor};

    pub use crate::channel::{ChannelCategory, ChannelId, ChannelRegistry};

    pub use crate::presence::{
        AvailabilityMapping, BindingStatus, CallId, CallReference, PresenceState, PresenceStatus,
        PresenceStore, ReasonCode, StateKind,
    };

    pub use crate::reconciler::{Applied, PresenceInput, PresenceReconciler};

    pub use crate::orchestrator::CallControlOrchestrator;

    pub use crate::telephony::{
        DispositionRequest, InMemoryTelephony, TelephonyAdapter, TelephonyCommand, TelephonyEvent,
        TelephonyEventKind,
    };

    pub use crate::notify::{BroadcastPublisher, PresenceEvent, PresencePublisher, RecordingPublisher};

    pub use crate::server::{PresenceServer, PresenceServerBuilder};

    pub use chrono::{DateTime, Utc};
}
