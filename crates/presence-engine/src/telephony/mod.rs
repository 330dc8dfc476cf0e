//! Telephony boundary
//!
//! The PBX is the authority on call state. The engine talks to it through
//! [`TelephonyAdapter`] commands and listens to its raw event stream, which
//! [`normalize`] turns into typed [`TelephonyEvent`]s.

pub mod adapter;
pub mod events;
pub mod memory;

pub use adapter::{DispositionRequest, TelephonyAdapter};
pub use events::{normalize, TelephonyEvent, TelephonyEventKind};
pub use memory::{InMemoryTelephony, TelephonyCommand};
