//! # Call-Control Orchestration Module
//!
//! Operator actions that need the PBX to act before local presence may
//! change. Each operation follows the same sequence:
//!
//! 1. validate the intent against the committed state under the agent lock
//! 2. release the lock and send the command to the PBX, bounded by the
//!    configured remote timeout
//! 3. re-lock, re-check the sequence and commit the transition
//!
//! There is no optimistic update. A refused or timed-out command leaves
//! presence exactly as it was, and nothing is published.
//!
//! ## Module Organization
//!
//! - **[`core`]**: the [`CallControlOrchestrator`] type and the
//!   confirm-then-commit sequence
//! - **[`agents`]**: login, logout, pause, unpause and manual queue
//! - **[`calls`]**: park, transfer and dispose-and-optionally-pause
//!
//! ## Example
//!
//! ```rust
//! use presence_engine::prelude::*;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let server = PresenceServerBuilder::new().build()?;
//! let agent = AgentId::from("agent-001");
//! let actor = ActorId::from(&agent);
//! server.enroll(&ActorId::system(), agent.clone(), &["vicidial".into(), "whatsapp".into()])?;
//!
//! let orchestrator = server.orchestrator();
//! let state = orchestrator.login(&agent, "inbound", &[], 0, &actor).await?;
//! assert_eq!(state.status, PresenceStatus::Paused(ReasonCode::Login));
//!
//! let state = orchestrator.unpause(&agent, state.sequence, &actor).await?;
//! assert_eq!(state.status, PresenceStatus::Ready);
//! # Ok(())
//! # }
//! ```

pub mod agents;
pub mod calls;
pub mod core;

pub use self::core::CallControlOrchestrator;
