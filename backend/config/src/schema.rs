//! Nudge configuration schema.
//!
//! Typed for serde YAML/JSON deserialization. Every field is optional on
//! disk; `defaults::apply_all_defaults` fills the gaps before validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration as read from `config.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NudgeConfig {
    /// Which (group, user) pairs are watched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<MonitoringConfig>,

    /// Thresholds, delays and scan cadence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<TimingConfig>,

    /// Outreach message pool; one entry is picked at random per attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<Vec<String>>,

    /// Logging configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

// ---------------------------------------------------------------------------
// Monitoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<MonitorMode>,

    /// Allow-list mode: the watched users per group.
    /// Discovery mode: the groups that may be activated (empty = any group).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<String, GroupConfig>,

    /// Discovery mode only: users never monitored, e.g. the bot itself.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_users: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MonitorMode {
    #[default]
    AllowList,
    Discovery,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_ids: Vec<String>,
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingConfig {
    /// Silence required before a pair becomes eligible for a campaign
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inactive_time_seconds: Option<u64>,

    /// Minimum gap after a reminder before the pair may be reminded again
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_cooldown_seconds: Option<u64>,

    /// Upper bound of the random wait before each attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_response_delay_seconds: Option<u64>,

    /// Attempts per campaign
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_consecutive_messages: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_interval_seconds: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_hours: Option<ActiveHoursConfig>,

    /// Seed a fresh activity timestamp when a pair is first registered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_on_register: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveHoursConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_hour: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_hour: Option<u8>,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Directory for rolling NDJSON logs; console only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}
