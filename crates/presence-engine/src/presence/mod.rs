//! Presence state, storage and channel projection
//!
//! - [`state`]: the closed set of aggregate states and the values they carry
//! - [`store`]: the compare-and-set store holding one snapshot per agent
//! - [`projection`]: per-category availability mapping applied to bindings

pub mod projection;
pub mod state;
pub mod store;

pub use projection::{AvailabilityMapping, BindingStatus, CategoryAvailability};
pub use state::{
    AuditStamp, CallId, CallReference, PresenceState, PresenceStatus, ReasonCode, StateKind,
};
pub use store::PresenceStore;
