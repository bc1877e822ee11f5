use thiserror::Error;

use crate::types::GroupId;

/// Top-level error type for the Nudge runtime.
#[derive(Debug, Error)]
pub enum NudgeError {
    #[error("gateway send to group {group} failed: {message}")]
    GatewaySend { group: GroupId, message: String },

    #[error("gateway member fetch for group {group} failed: {message}")]
    GatewayFetch { group: GroupId, message: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    /// Expected outcome of shutdown, not a failure.
    #[error("cancelled")]
    Cancelled,

    #[error("campaign supervisor is closed")]
    SupervisorClosed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl NudgeError {
    /// True for control-flow outcomes that must never be logged as errors.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, NudgeError::Cancelled)
    }
}
