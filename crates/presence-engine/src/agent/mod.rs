//! Agent management module
//!
//! This module provides the agent record held by the presence store and the
//! heartbeat tracking used to detect agents the telephony system lost.

pub mod heartbeat;
pub mod types;

pub use heartbeat::HeartbeatMonitor;
pub use types::{ActorId, Agent, AgentId, ChannelBinding};
