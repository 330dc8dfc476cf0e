//! Per-channel availability projection
//!
//! The mapping is strictly binary per category: a state is either in the
//! category's unavailable set or it counts as available.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::agent::ChannelBinding;
use crate::channel::ChannelCategory;
use crate::error::{PresenceError, Result};
use crate::presence::state::StateKind;

/// Availability codes and unavailable states for one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAvailability {
    pub available_code: String,
    pub unavailable_code: String,
    pub unavailable_when: BTreeSet<StateKind>,
}

impl CategoryAvailability {
    pub fn new(available_code: &str, unavailable_code: &str, unavailable_when: &[StateKind]) -> Self {
        Self {
            available_code: available_code.to_string(),
            unavailable_code: unavailable_code.to_string(),
            unavailable_when: unavailable_when.iter().copied().collect(),
        }
    }
}

/// Routing status of a single binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingStatus {
    pub available: bool,
    pub code: String,
}

/// Immutable category → availability mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityMapping {
    categories: BTreeMap<ChannelCategory, CategoryAvailability>,
}

impl AvailabilityMapping {
    pub fn from_config(config: &BTreeMap<ChannelCategory, CategoryAvailability>) -> Result<Self> {
        for (category, entry) in config {
            if entry.available_code.trim().is_empty() || entry.unavailable_code.trim().is_empty() {
                return Err(PresenceError::config(format!(
                    "category {} needs both an available and an unavailable code",
                    category
                )));
            }
            if entry.available_code == entry.unavailable_code {
                return Err(PresenceError::config(format!(
                    "category {} uses '{}' for both available and unavailable",
                    category, entry.available_code
                )));
            }
        }
        Ok(Self {
            categories: config.clone(),
        })
    }

    pub fn get(&self, category: ChannelCategory) -> Option<&CategoryAvailability> {
        self.categories.get(&category)
    }

    pub fn status_for(&self, category: ChannelCategory, state: StateKind) -> Result<BindingStatus> {
        let entry = self.get(category).ok_or_else(|| {
            PresenceError::config(format!("no availability mapping for category {}", category))
        })?;

        Ok(if entry.unavailable_when.contains(&state) {
            BindingStatus {
                available: false,
                code: entry.unavailable_code.clone(),
            }
        } else {
            BindingStatus {
                available: true,
                code: entry.available_code.clone(),
            }
        })
    }

    /// Recompute every binding for `state`.
    ///
    /// `updated_at` only moves for bindings whose status actually changed, so
    /// projecting the same state twice yields identical bindings.
    pub fn project(
        &self,
        bindings: &[ChannelBinding],
        state: StateKind,
        at: DateTime<Utc>,
    ) -> Result<Vec<ChannelBinding>> {
        bindings
            .iter()
            .map(|binding| {
                let status = self.status_for(binding.category, state)?;
                if status == binding.status {
                    Ok(binding.clone())
                } else {
                    Ok(ChannelBinding {
                        status,
                        updated_at: at,
                        ..binding.clone()
                    })
                }
            })
            .collect()
    }
}
