//! Channel registry
//!
//! Maps every channel an agent can be enrolled in (WhatsApp, Telegram, email,
//! web chat, the Vicidial voice ACD) to its routing category, and each
//! category to the codes used when an agent becomes available or unavailable
//! on it.

pub mod registry;

pub use registry::{ChannelCategory, ChannelId, ChannelRegistry};
