//! Per-channel settings with typed validation on write.

use crate::db::{ChannelSettings, Database, StoreError};
use crate::error::SettingsError;
use tracing::{error, info};

/// A validated settings write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingChange {
    Enabled(bool),
    Prefix(String),
    MaxRequestsPerUser(i64),
    MaxQueueSize(i64),
}

impl SettingChange {
    /// Recognized setting keys.
    pub const KEYS: [&'static str; 4] = [
        "enabled",
        "prefix",
        "max_requests_per_user",
        "max_queue_size",
    ];

    /// Validate `raw` for `key`.
    pub fn parse(key: &str, raw: &str) -> Result<Self, SettingsError> {
        match key {
            "enabled" => match raw {
                "true" => Ok(Self::Enabled(true)),
                "false" => Ok(Self::Enabled(false)),
                _ => Err(SettingsError::InvalidValue {
                    key: "enabled",
                    value: raw.to_string(),
                }),
            },
            "prefix" => {
                if raw.is_empty() {
                    return Err(SettingsError::InvalidValue {
                        key: "prefix",
                        value: String::new(),
                    });
                }
                Ok(Self::Prefix(raw.to_string()))
            }
            "max_requests_per_user" => {
                parse_limit("max_requests_per_user", raw).map(Self::MaxRequestsPerUser)
            }
            "max_queue_size" => parse_limit("max_queue_size", raw).map(Self::MaxQueueSize),
            other => Err(SettingsError::InvalidKey(other.to_string())),
        }
    }

    fn apply(self, settings: &mut ChannelSettings) {
        match self {
            Self::Enabled(v) => settings.enabled = v,
            Self::Prefix(v) => settings.prefix = Some(v),
            Self::MaxRequestsPerUser(v) => settings.max_requests_per_user = v,
            Self::MaxQueueSize(v) => settings.max_queue_size = v,
        }
    }
}

/// -1 (unlimited) or a positive count.
fn parse_limit(key: &'static str, raw: &str) -> Result<i64, SettingsError> {
    let n: i64 = raw.trim().parse().map_err(|_| SettingsError::InvalidValue {
        key,
        value: raw.to_string(),
    })?;
    if n == 0 || n < -1 {
        return Err(SettingsError::InvalidRange { key, value: n });
    }
    Ok(n)
}

/// Reads and writes channel settings.
#[derive(Clone)]
pub struct SettingsResolver {
    db: Database,
}

impl SettingsResolver {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Settings for a channel, defaulted if never written.
    pub fn get(&self, channel_id: &str) -> Result<ChannelSettings, StoreError> {
        self.db.channels().settings(channel_id)
    }

    /// Validate and persist one setting.
    pub fn set(&self, channel_id: &str, key: &str, raw: &str) -> Result<ChannelSettings, SettingsError> {
        let change = SettingChange::parse(key, raw)?;
        let settings = self
            .db
            .channels()
            .update_settings(channel_id, |s| change.apply(s))
            .map_err(|e| {
                error!(channel = %channel_id, key = %key, error = %e, "Failed to persist setting");
                SettingsError::Internal(e)
            })?;
        info!(channel = %channel_id, key = %key, value = %raw, "Setting changed");
        Ok(settings)
    }

    /// Flip `enabled`, returning the new state.
    pub fn toggle(&self, channel_id: &str) -> Result<bool, StoreError> {
        let settings = self
            .db
            .channels()
            .update_settings(channel_id, |s| s.enabled = !s.enabled)?;
        info!(channel = %channel_id, enabled = settings.enabled, "Requests toggled");
        Ok(settings.enabled)
    }

    /// Flip `random_mode`, returning the new state.
    pub fn toggle_random(&self, channel_id: &str) -> Result<bool, StoreError> {
        let settings = self
            .db
            .channels()
            .update_settings(channel_id, |s| s.random_mode = !s.random_mode)?;
        info!(channel = %channel_id, random = settings.random_mode, "Random mode toggled");
        Ok(settings.random_mode)
    }

    /// Clear the onboarding flag. Returns whether it was set.
    pub fn take_first_time(&self, channel_id: &str) -> Result<bool, StoreError> {
        let mut was_first = false;
        self.db.channels().update_settings(channel_id, |s| {
            was_first = s.first_time;
            s.first_time = false;
        })?;
        Ok(was_first)
    }
}
