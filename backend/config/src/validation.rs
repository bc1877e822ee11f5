//! Config validation: deep schema checks with user-friendly error messages.

use crate::schema::{MonitorMode, NudgeConfig};
use serde::Serialize;
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Clone, Error, Serialize)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &NudgeConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_monitoring(config, &mut report);
    validate_timing(config, &mut report);
    validate_prompts(config, &mut report);
    validate_logging(config, &mut report);
    report
}

/// Validate group and user identifiers for the configured mode.
fn validate_monitoring(config: &NudgeConfig, report: &mut ValidationReport) {
    let Some(monitoring) = &config.monitoring else { return };
    let mode = monitoring.mode.unwrap_or_default();

    for (group_id, group) in &monitoring.groups {
        let path = format!("monitoring.groups.{group_id}");
        if group_id.trim().is_empty() {
            report.error("monitoring.groups", "Group ID cannot be empty");
        }
        match mode {
            MonitorMode::AllowList => {
                if group.user_ids.is_empty() {
                    report.warn(&path, "Group has no userIds; nobody in it will be monitored");
                }
                for (i, user) in group.user_ids.iter().enumerate() {
                    if user.trim().is_empty() {
                        report.error(format!("{path}.userIds[{i}]"), "User ID cannot be empty");
                    }
                }
            }
            MonitorMode::Discovery => {
                if !group.user_ids.is_empty() {
                    report.warn(
                        format!("{path}.userIds"),
                        "userIds are ignored in discovery mode; members come from the group roster",
                    );
                }
            }
        }
    }

    match mode {
        MonitorMode::AllowList => {
            if monitoring.groups.is_empty() && monitoring.enabled != Some(false) {
                report.warn("monitoring.groups", "No groups configured; nothing will be monitored");
            }
            if !monitoring.excluded_users.is_empty() {
                report.warn(
                    "monitoring.excludedUsers",
                    "excludedUsers only applies in discovery mode",
                );
            }
        }
        MonitorMode::Discovery => {
            for (i, user) in monitoring.excluded_users.iter().enumerate() {
                if user.trim().is_empty() {
                    report.error(
                        format!("monitoring.excludedUsers[{i}]"),
                        "Excluded user ID cannot be empty",
                    );
                }
            }
        }
    }
}

/// Validate thresholds and the active-hours window.
fn validate_timing(config: &NudgeConfig, report: &mut ValidationReport) {
    let Some(timing) = &config.timing else { return };

    if timing.inactive_time_seconds == Some(0) {
        report.error("timing.inactiveTimeSeconds", "inactiveTimeSeconds must be > 0");
    }
    if timing.max_consecutive_messages == Some(0) {
        report.error("timing.maxConsecutiveMessages", "maxConsecutiveMessages must be >= 1");
    }
    if timing.scan_interval_seconds == Some(0) {
        report.error("timing.scanIntervalSeconds", "scanIntervalSeconds must be > 0");
    }
    if let (Some(delay), Some(inactive)) =
        (timing.max_response_delay_seconds, timing.inactive_time_seconds)
    {
        if delay > inactive {
            report.warn(
                "timing.maxResponseDelaySeconds",
                format!("Random delay of up to {delay}s exceeds the inactivity threshold of {inactive}s"),
            );
        }
    }

    let Some(hours) = &timing.active_hours else { return };
    if hours.enabled == Some(false) {
        return;
    }
    if let Some(start) = hours.start_hour {
        if start > 23 {
            report.error("timing.activeHours.startHour", "startHour must be within 0..=23");
        }
    }
    if let Some(end) = hours.end_hour {
        if end > 24 {
            report.error("timing.activeHours.endHour", "endHour must be within 0..=24");
        }
    }
    if let (Some(start), Some(end)) = (hours.start_hour, hours.end_hour) {
        if start == end || (start == 0 && end == 24) {
            report.error(
                "timing.activeHours",
                format!("Window {start}..{end} is empty or covers the whole day; disable activeHours instead"),
            );
        }
    }
}

fn validate_prompts(config: &NudgeConfig, report: &mut ValidationReport) {
    let Some(prompts) = &config.prompts else { return };
    if prompts.is_empty() {
        report.warn("prompts", "No prompts configured; the default greeting will be sent");
    }
    for (i, prompt) in prompts.iter().enumerate() {
        if prompt.trim().is_empty() {
            report.warn(format!("prompts[{i}]"), "Prompt is blank");
        }
    }
}

fn validate_logging(config: &NudgeConfig, report: &mut ValidationReport) {
    let Some(logging) = &config.logging else { return };
    if let Some(level) = &logging.level {
        if level.trim().is_empty() {
            report.error("logging.level", "Log level cannot be empty");
        }
    }
    if let Some(dir) = &logging.dir {
        if dir.trim().is_empty() {
            report.error("logging.dir", "Log directory cannot be empty; omit it for console-only logging");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::apply_all_defaults;
    use crate::schema::{ActiveHoursConfig, GroupConfig, MonitoringConfig, TimingConfig};

    #[test]
    fn empty_config_is_valid() {
        let report = validate(&NudgeConfig::default());
        assert!(report.is_valid(), "errors: {:?}", report.errors);
    }

    #[test]
    fn defaulted_config_warns_about_missing_groups() {
        let report = validate(&apply_all_defaults(NudgeConfig::default()));
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.path == "monitoring.groups"));
        assert!(report.warnings.iter().any(|w| w.path == "prompts"));
    }

    #[test]
    fn zero_attempts_is_error() {
        let cfg = NudgeConfig {
            timing: Some(TimingConfig {
                max_consecutive_messages: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let report = validate(&cfg);
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].path, "timing.maxConsecutiveMessages");
    }

    #[test]
    fn equal_active_hours_is_error() {
        let cfg = NudgeConfig {
            timing: Some(TimingConfig {
                active_hours: Some(ActiveHoursConfig {
                    enabled: Some(true),
                    start_hour: Some(9),
                    end_hour: Some(9),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let report = validate(&cfg);
        assert!(!report.is_valid());
        assert!(report.errors[0].path.contains("activeHours"));
    }

    #[test]
    fn disabled_active_hours_are_not_checked() {
        let cfg = NudgeConfig {
            timing: Some(TimingConfig {
                active_hours: Some(ActiveHoursConfig {
                    enabled: Some(false),
                    start_hour: Some(30),
                    end_hour: Some(30),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(validate(&cfg).is_valid());
    }

    #[test]
    fn blank_user_id_is_error() {
        let mut groups = std::collections::BTreeMap::new();
        groups.insert(
            "g1".to_string(),
            GroupConfig {
                user_ids: vec!["u1".into(), "  ".into()],
            },
        );
        let cfg = NudgeConfig {
            monitoring: Some(MonitoringConfig {
                groups,
                ..Default::default()
            }),
            ..Default::default()
        };
        let report = validate(&cfg);
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].path, "monitoring.groups.g1.userIds[1]");
    }
}
