//! Static channel table
//!
//! Built once from configuration at startup. There is no mutation API: a
//! channel or mapping change needs a restart.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::info;

use crate::config::PresenceConfig;
use crate::error::{PresenceError, Result};
use crate::presence::projection::{AvailabilityMapping, BindingStatus};
use crate::presence::state::StateKind;

/// Channel identifier (e.g. `whatsapp`, `vicidial`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        ChannelId(s.to_string())
    }
}

impl From<String> for ChannelId {
    fn from(s: String) -> Self {
        ChannelId(s)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Routing category of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelCategory {
    Voice,
    Chat,
    Email,
}

impl ChannelCategory {
    pub const ALL: [ChannelCategory; 3] = [
        ChannelCategory::Voice,
        ChannelCategory::Chat,
        ChannelCategory::Email,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelCategory::Voice => "voice",
            ChannelCategory::Chat => "chat",
            ChannelCategory::Email => "email",
        }
    }
}

impl fmt::Display for ChannelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only channel registry
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    channels: HashMap<ChannelId, ChannelCategory>,
    mapping: AvailabilityMapping,
}

impl ChannelRegistry {
    /// Build a registry, checking that every category in use has a mapping
    pub fn new(
        channels: impl IntoIterator<Item = (ChannelId, ChannelCategory)>,
        mapping: AvailabilityMapping,
    ) -> Result<Self> {
        let mut table = HashMap::new();
        for (id, category) in channels {
            if mapping.get(category).is_none() {
                return Err(PresenceError::config(format!(
                    "channel {} uses category {} which has no availability mapping",
                    id, category
                )));
            }
            if table.insert(id.clone(), category).is_some() {
                return Err(PresenceError::config(format!("channel {} registered twice", id)));
            }
        }

        Ok(Self {
            channels: table,
            mapping,
        })
    }

    /// Build the registry from the `channels` and `availability` config sections
    pub fn from_config(config: &PresenceConfig) -> Result<Self> {
        let mapping = AvailabilityMapping::from_config(&config.availability)?;
        let registry = Self::new(
            config
                .channels
                .iter()
                .map(|c| (ChannelId(c.id.clone()), c.category)),
            mapping,
        )?;
        info!("📡 Channel registry loaded with {} channels", registry.channels.len());
        Ok(registry)
    }

    pub fn category_of(&self, channel: &ChannelId) -> Result<ChannelCategory> {
        self.channels
            .get(channel)
            .copied()
            .ok_or_else(|| PresenceError::UnknownChannel(channel.0.clone()))
    }

    /// `(available_code, unavailable_code)` for a category
    pub fn availability_codes(&self, category: ChannelCategory) -> Result<(&str, &str)> {
        self.mapping
            .get(category)
            .map(|m| (m.available_code.as_str(), m.unavailable_code.as_str()))
            .ok_or_else(|| {
                PresenceError::config(format!("no availability mapping for category {}", category))
            })
    }

    /// Project an aggregate state onto a channel category
    pub fn status_for(&self, category: ChannelCategory, state: StateKind) -> Result<BindingStatus> {
        self.mapping.status_for(category, state)
    }

    pub fn mapping(&self) -> &AvailabilityMapping {
        &self.mapping
    }

    pub fn channels(&self) -> Vec<(ChannelId, ChannelCategory)> {
        let mut list: Vec<_> = self
            .channels
            .iter()
            .map(|(id, category)| (id.clone(), *category))
            .collect();
        list.sort();
        list
    }

    pub fn contains(&self, channel: &ChannelId) -> bool {
        self.channels.contains_key(channel)
    }
}
