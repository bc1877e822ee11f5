use anyhow::Result;
use async_trait::async_trait;

use crate::types::{GroupId, UserId};

/// Outbound side of the chat transport.
///
/// Implementations own all platform formatting: a gateway is expected to
/// mention `user` in whatever way its platform supports.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Human-readable gateway name for logging.
    fn name(&self) -> &str;

    /// Deliver an outreach message to `group`, addressed to `user`.
    async fn send_group_message(&self, group: &GroupId, user: &UserId, text: &str) -> Result<()>;

    /// Fetch the member roster of `group`. Only used in discovery mode.
    async fn fetch_group_members(&self, group: &GroupId) -> Result<Vec<UserId>> {
        anyhow::bail!("gateway {} cannot list members of group {}", self.name(), group)
    }
}
