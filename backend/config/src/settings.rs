//! Validated, immutable runtime settings built once at startup.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use nudge_core::{GroupId, NudgeError, UserId};
use thiserror::Error;
use tracing::warn;

use crate::defaults::{self, apply_all_defaults};
use crate::hours::ActiveHours;
use crate::schema::{MonitorMode, NudgeConfig};
use crate::validation::{validate, ConfigValidationError};

/// Startup failure carrying every validation error found.
#[derive(Debug, Error)]
#[error("invalid configuration: {}", summarize(.errors))]
pub struct ConfigError {
    pub errors: Vec<ConfigValidationError>,
}

fn summarize(errors: &[ConfigValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.path, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ConfigError> for NudgeError {
    fn from(err: ConfigError) -> Self {
        NudgeError::Configuration(err.to_string())
    }
}

/// How monitored pairs are determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorPolicy {
    /// Explicit users per group.
    AllowList(BTreeMap<GroupId, BTreeSet<UserId>>),
    /// Members discovered from each group's roster on first contact.
    Discovery {
        /// Groups that may be activated; `None` means any group.
        groups: Option<BTreeSet<GroupId>>,
        excluded: BTreeSet<UserId>,
    },
}

/// Everything the scheduler reads, with typed fields and defaults applied.
#[derive(Debug, Clone)]
pub struct OutreachSettings {
    pub enabled: bool,
    pub policy: MonitorPolicy,
    pub inactivity_threshold: Duration,
    pub reminder_cooldown: Duration,
    pub max_response_delay: Duration,
    pub max_attempts: u32,
    pub scan_interval: Duration,
    /// `None` means outreach is allowed around the clock.
    pub active_hours: Option<ActiveHours>,
    /// Seed `last_active_at` when a pair is registered instead of treating
    /// a never-seen user as immediately inactive.
    pub grace_on_register: bool,
    pub prompts: Vec<String>,
    pub log_level: String,
    pub log_dir: Option<String>,
}

impl OutreachSettings {
    /// Apply defaults, validate, and build the settings. Warnings are logged;
    /// any error aborts startup.
    pub fn from_config(config: NudgeConfig) -> Result<Self, ConfigError> {
        let config = apply_all_defaults(config);
        let report = validate(&config);
        for warning in &report.warnings {
            warn!(path = %warning.path, message = %warning.message, "Config warning");
        }
        if !report.is_valid() {
            return Err(ConfigError { errors: report.errors });
        }

        let monitoring = config.monitoring.unwrap_or_default();
        let timing = config.timing.unwrap_or_default();
        let logging = config.logging.unwrap_or_default();

        let policy = match monitoring.mode.unwrap_or_default() {
            MonitorMode::AllowList => MonitorPolicy::AllowList(
                monitoring
                    .groups
                    .into_iter()
                    .map(|(group, cfg)| {
                        let users = cfg.user_ids.into_iter().map(UserId::from).collect();
                        (GroupId::from(group), users)
                    })
                    .collect(),
            ),
            MonitorMode::Discovery => MonitorPolicy::Discovery {
                groups: if monitoring.groups.is_empty() {
                    None
                } else {
                    Some(monitoring.groups.into_keys().map(GroupId::from).collect())
                },
                excluded: monitoring.excluded_users.into_iter().map(UserId::from).collect(),
            },
        };

        let active_hours = timing.active_hours.and_then(|h| {
            if h.enabled == Some(false) {
                return None;
            }
            Some(ActiveHours::new(
                h.start_hour.unwrap_or(defaults::DEFAULT_ACTIVE_START_HOUR),
                h.end_hour.unwrap_or(defaults::DEFAULT_ACTIVE_END_HOUR),
            ))
        });

        Ok(Self {
            enabled: monitoring.enabled.unwrap_or(true),
            policy,
            inactivity_threshold: Duration::from_secs(
                timing.inactive_time_seconds.unwrap_or(defaults::DEFAULT_INACTIVE_TIME_SECS),
            ),
            reminder_cooldown: Duration::from_secs(
                timing
                    .reminder_cooldown_seconds
                    .unwrap_or(defaults::DEFAULT_REMINDER_COOLDOWN_SECS),
            ),
            max_response_delay: Duration::from_secs(
                timing
                    .max_response_delay_seconds
                    .unwrap_or(defaults::DEFAULT_MAX_RESPONSE_DELAY_SECS),
            ),
            max_attempts: timing
                .max_consecutive_messages
                .unwrap_or(defaults::DEFAULT_MAX_CONSECUTIVE_MESSAGES),
            scan_interval: Duration::from_secs(
                timing.scan_interval_seconds.unwrap_or(defaults::DEFAULT_SCAN_INTERVAL_SECS),
            ),
            active_hours,
            grace_on_register: timing.grace_on_register.unwrap_or(false),
            prompts: config.prompts.unwrap_or_default(),
            log_level: logging
                .level
                .unwrap_or_else(|| defaults::DEFAULT_LOG_LEVEL.to_string()),
            log_dir: logging.dir,
        })
    }
}
