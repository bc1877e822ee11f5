//! Outreach Event Logger
//!
//! Campaign lifecycle events written through `tracing` on the
//! `outreach_events` target, so they land in the NDJSON file as one record each.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum OutreachEvent {
    CampaignStarted {
        campaign_id: String,
    },
    ReminderSent {
        campaign_id: String,
        attempt: u32,
    },
    CampaignFinished {
        campaign_id: String,
        outcome: String,
        attempts: u32,
    },
    GroupActivated {
        members: usize,
    },
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub group_id: String,
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub event: OutreachEvent,
}

impl EventLogEntry {
    pub fn new(group_id: &str, user_id: Option<&str>, event: OutreachEvent) -> Self {
        Self {
            group_id: group_id.into(),
            user_id: user_id.map(Into::into),
            timestamp: Utc::now(),
            event,
        }
    }
}

pub struct EventLogger;

impl EventLogger {
    /// Logs an outreach event for a group, and for a user when the event concerns one.
    pub fn log_event(group_id: &str, user_id: Option<&str>, event: OutreachEvent) {
        let entry = EventLogEntry::new(group_id, user_id, event);
        info!(target: "outreach_events", event = ?entry, "Outreach event");
    }
}
