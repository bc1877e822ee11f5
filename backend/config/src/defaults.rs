//! Config defaults: applies sensible default values to parsed config.

use crate::schema::{
    ActiveHoursConfig, LoggingConfig, MonitorMode, MonitoringConfig, NudgeConfig, TimingConfig,
};

/// Default silence before a pair is considered inactive (2 hours).
pub const DEFAULT_INACTIVE_TIME_SECS: u64 = 7200;

/// Default gap between two reminders to the same pair (1 hour).
pub const DEFAULT_REMINDER_COOLDOWN_SECS: u64 = 3600;

/// Default upper bound of the random pre-send wait (1 hour).
pub const DEFAULT_MAX_RESPONSE_DELAY_SECS: u64 = 3600;

/// Default attempts per campaign.
pub const DEFAULT_MAX_CONSECUTIVE_MESSAGES: u32 = 3;

/// Default scanner period.
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 60;

/// Default active window, local time, end exclusive.
pub const DEFAULT_ACTIVE_START_HOUR: u8 = 8;
pub const DEFAULT_ACTIVE_END_HOUR: u8 = 23;

/// Fallback message when no prompts are configured.
pub const DEFAULT_PROMPT: &str = "Hi there~";

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: NudgeConfig) -> NudgeConfig {
    let config = apply_monitoring_defaults(config);
    let config = apply_timing_defaults(config);
    let config = apply_prompt_defaults(config);
    apply_logging_defaults(config)
}

/// Monitoring is on and in allow-list mode unless stated otherwise.
fn apply_monitoring_defaults(mut config: NudgeConfig) -> NudgeConfig {
    let monitoring = config.monitoring.get_or_insert_with(MonitoringConfig::default);
    if monitoring.enabled.is_none() {
        monitoring.enabled = Some(true);
    }
    if monitoring.mode.is_none() {
        monitoring.mode = Some(MonitorMode::AllowList);
    }
    config
}

fn apply_timing_defaults(mut config: NudgeConfig) -> NudgeConfig {
    let timing = config.timing.get_or_insert_with(TimingConfig::default);
    timing.inactive_time_seconds.get_or_insert(DEFAULT_INACTIVE_TIME_SECS);
    timing.reminder_cooldown_seconds.get_or_insert(DEFAULT_REMINDER_COOLDOWN_SECS);
    timing.max_response_delay_seconds.get_or_insert(DEFAULT_MAX_RESPONSE_DELAY_SECS);
    timing.max_consecutive_messages.get_or_insert(DEFAULT_MAX_CONSECUTIVE_MESSAGES);
    timing.scan_interval_seconds.get_or_insert(DEFAULT_SCAN_INTERVAL_SECS);
    timing.grace_on_register.get_or_insert(false);

    let hours = timing.active_hours.get_or_insert_with(ActiveHoursConfig::default);
    hours.enabled.get_or_insert(true);
    hours.start_hour.get_or_insert(DEFAULT_ACTIVE_START_HOUR);
    hours.end_hour.get_or_insert(DEFAULT_ACTIVE_END_HOUR);
    config
}

/// An absent prompt list becomes empty; the campaign falls back to `DEFAULT_PROMPT`.
fn apply_prompt_defaults(mut config: NudgeConfig) -> NudgeConfig {
    config.prompts.get_or_insert_with(Vec::new);
    config
}

fn apply_logging_defaults(mut config: NudgeConfig) -> NudgeConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if logging.level.is_none() {
        logging.level = Some(DEFAULT_LOG_LEVEL.to_string());
    }
    config
}
