//! Active hours: the daily window within which outreach may happen.

use chrono::{DateTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

/// Defines the active hours window, end exclusive. A window whose start is
/// after its end wraps past midnight (e.g. 22..6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveHours {
    /// Hour of day (0–23) at which outreach becomes allowed.
    pub start_hour: u8,
    /// Hour of day (0–24) at which outreach stops.
    pub end_hour: u8,
}

impl ActiveHours {
    pub fn new(start_hour: u8, end_hour: u8) -> Self {
        Self { start_hour, end_hour }
    }

    pub fn contains_hour(&self, hour: u32) -> bool {
        let start = u32::from(self.start_hour);
        let end = u32::from(self.end_hour);
        if start < end {
            hour >= start && hour < end
        } else {
            hour >= start || hour < end
        }
    }

    /// Check whether `at`, in its own timezone, falls inside the window.
    pub fn is_active_at<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
        self.contains_hour(at.hour())
    }
}
