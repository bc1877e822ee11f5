//! Telemetry and structured logging components for Nudge.
//!
//! Handles console and rolling NDJSON output, plus structured outreach
//! lifecycle events.

pub mod event_logger;
pub mod logger;

pub use event_logger::{EventLogEntry, EventLogger, OutreachEvent};
pub use logger::init_logger;
