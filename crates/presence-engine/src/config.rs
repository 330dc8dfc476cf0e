use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::channel::ChannelCategory;
use crate::error::{PresenceError, Result};
use crate::presence::projection::CategoryAvailability;
use crate::presence::state::StateKind;

/// Presence engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// General engine settings
    pub general: GeneralConfig,

    /// Registered channels; a `[[channels]]` list replaces the stock set
    pub channels: Vec<ChannelConfig>,

    /// Availability codes per channel category. Each `[availability.<category>]`
    /// table replaces the built-in entry for that category only.
    #[serde(deserialize_with = "overlay_availability")]
    pub availability: BTreeMap<ChannelCategory, CategoryAvailability>,

    /// Logging configuration
    pub logging: LogConfig,
}

/// General engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Upper bound for a single telephony command (milliseconds)
    pub remote_timeout_ms: u64,

    /// Silence after which an agent is forced offline (seconds)
    pub heartbeat_timeout_secs: u64,

    /// How often the heartbeat table is swept (milliseconds)
    pub heartbeat_sweep_interval_ms: u64,

    /// Buffer of the broadcast fan-out channel
    pub fanout_capacity: usize,

    /// Channel attached to calls when the PBX event does not name one
    pub default_voice_channel: String,
}

/// A registered channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub id: String,
    pub category: ChannelCategory,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,

    /// Include file and line information
    pub file_info: bool,

    /// Log span enter and exit events
    pub spans: bool,
}

impl PresenceConfig {
    /// Parse a TOML document; missing sections fall back to defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: PresenceConfig = toml::from_str(text)
            .map_err(|e| PresenceError::config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PresenceError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.remote_timeout_ms == 0 {
            return Err(PresenceError::config("general.remote_timeout_ms must be positive"));
        }
        if self.general.heartbeat_timeout_secs == 0 {
            return Err(PresenceError::config("general.heartbeat_timeout_secs must be positive"));
        }
        if self.general.heartbeat_sweep_interval_ms == 0 {
            return Err(PresenceError::config("general.heartbeat_sweep_interval_ms must be positive"));
        }
        if self.general.fanout_capacity == 0 {
            return Err(PresenceError::config("general.fanout_capacity must be positive"));
        }

        for channel in &self.channels {
            if !self.availability.contains_key(&channel.category) {
                return Err(PresenceError::config(format!(
                    "channel {} has category {} without an availability entry",
                    channel.id, channel.category
                )));
            }
        }

        let voice = self
            .channels
            .iter()
            .find(|c| c.id == self.general.default_voice_channel);
        match voice {
            Some(c) if c.category == ChannelCategory::Voice => Ok(()),
            Some(c) => Err(PresenceError::config(format!(
                "default voice channel {} is in category {}",
                c.id, c.category
            ))),
            None => Err(PresenceError::config(format!(
                "default voice channel {} is not registered",
                self.general.default_voice_channel
            ))),
        }
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.general.remote_timeout_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.general.heartbeat_timeout_secs)
    }

    pub fn heartbeat_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.general.heartbeat_sweep_interval_ms)
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        let channels = [
            ("vicidial", ChannelCategory::Voice),
            ("whatsapp", ChannelCategory::Chat),
            ("telegram", ChannelCategory::Chat),
            ("webchat", ChannelCategory::Chat),
            ("email", ChannelCategory::Email),
        ]
        .into_iter()
        .map(|(id, category)| ChannelConfig {
            id: id.to_string(),
            category,
        })
        .collect();

        let mut availability = BTreeMap::new();
        availability.insert(
            ChannelCategory::Voice,
            CategoryAvailability::new(
                "available",
                "busy",
                &[
                    StateKind::Queue,
                    StateKind::Incall,
                    StateKind::Closer,
                    StateKind::Paused,
                    StateKind::Mqueue,
                    StateKind::Offline,
                ],
            ),
        );
        availability.insert(
            ChannelCategory::Chat,
            CategoryAvailability::new(
                "online",
                "away",
                &[
                    StateKind::Incall,
                    StateKind::Closer,
                    StateKind::Paused,
                    StateKind::Offline,
                ],
            ),
        );
        availability.insert(
            ChannelCategory::Email,
            CategoryAvailability::new(
                "accepting",
                "not_accepting",
                &[StateKind::Paused, StateKind::Offline],
            ),
        );

        Self {
            general: GeneralConfig::default(),
            channels,
            availability,
            logging: LogConfig::default(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            remote_timeout_ms: 5_000,
            heartbeat_timeout_secs: 60,
            heartbeat_sweep_interval_ms: 5_000,
            fanout_capacity: 1024,
            default_voice_channel: "vicidial".to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_info: false,
            spans: false,
        }
    }
}

fn overlay_availability<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<ChannelCategory, CategoryAvailability>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<ChannelCategory, CategoryAvailability>::deserialize(deserializer)?;
    let mut availability = PresenceConfig::default().availability;
    availability.extend(overrides);
    Ok(availability)
}
