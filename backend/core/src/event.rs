use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{GroupId, PairKey, UserId};

/// A group message observed by the host process. Only the sender identity
/// and timing matter to the scheduler; the text is carried for logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub group_id: GroupId,
    pub user_id: UserId,
    #[serde(default)]
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(
        group_id: impl Into<GroupId>,
        user_id: impl Into<UserId>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            user_id: user_id.into(),
            text: text.into(),
            received_at: Utc::now(),
        }
    }

    pub fn pair(&self) -> PairKey {
        PairKey {
            group: self.group_id.clone(),
            user: self.user_id.clone(),
        }
    }
}
