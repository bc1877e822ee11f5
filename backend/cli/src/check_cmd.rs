//! `nudge check`: validate a config file without starting anything.

use std::path::Path;

use anyhow::Result;

use nudge_config::{apply_all_defaults, load_config, validate, MonitorPolicy, OutreachSettings};

use crate::terminal_output::{note_error, note_info, note_success, note_warn, render_pairs};

/// Returns whether the config is valid.
pub async fn run(path: &Path, json: bool) -> Result<bool> {
    let config = load_config(path).await?;
    let report = validate(&apply_all_defaults(config.clone()));

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report.is_valid());
    }

    note_info(&format!("Checking {}", path.display()));
    for warning in &report.warnings {
        note_warn(&format!("{}: {}", warning.path, warning.message));
    }
    for error in &report.errors {
        note_error(&format!("{}: {}", error.path, error.message));
    }
    if !report.is_valid() {
        return Ok(false);
    }

    let settings = OutreachSettings::from_config(config)?;
    note_success("Configuration is valid");
    print!("{}", render_pairs(&summary(&settings)));
    Ok(true)
}

fn summary(settings: &OutreachSettings) -> Vec<(&'static str, String)> {
    let monitoring = match &settings.policy {
        MonitorPolicy::AllowList(groups) => {
            let pairs: usize = groups.values().map(|users| users.len()).sum();
            format!("allowList, {} groups, {pairs} pairs", groups.len())
        }
        MonitorPolicy::Discovery { groups, excluded } => {
            let scope = match groups {
                Some(groups) => format!("{} groups", groups.len()),
                None => "any group".to_string(),
            };
            format!("discovery, {scope}, {} excluded", excluded.len())
        }
    };
    let hours = match settings.active_hours {
        Some(hours) => format!("{:02}:00-{:02}:00", hours.start_hour, hours.end_hour),
        None => "always".to_string(),
    };

    vec![
        ("enabled", settings.enabled.to_string()),
        ("monitoring", monitoring),
        ("inactiveTime", format!("{}s", settings.inactivity_threshold.as_secs())),
        ("reminderCooldown", format!("{}s", settings.reminder_cooldown.as_secs())),
        ("maxResponseDelay", format!("{}s", settings.max_response_delay.as_secs())),
        ("maxAttempts", settings.max_attempts.to_string()),
        ("scanInterval", format!("{}s", settings.scan_interval.as_secs())),
        ("activeHours", hours),
        ("prompts", settings.prompts.len().to_string()),
    ]
}
