//! A `MessagingGateway` backed by the terminal.
//!
//! Reminders are printed to stdout. The roster of a group is whoever has
//! spoken in it so far, which is enough for discovery mode to work.

use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use nudge_core::{GroupId, InboundMessage, MessagingGateway, UserId};

use crate::terminal_output::outbound;

#[derive(Default)]
pub struct ConsoleGateway {
    speakers: Mutex<HashMap<GroupId, BTreeSet<UserId>>>,
}

impl ConsoleGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn observe(&self, message: &InboundMessage) {
        self.speakers
            .lock()
            .await
            .entry(message.group_id.clone())
            .or_default()
            .insert(message.user_id.clone());
    }
}

#[async_trait]
impl MessagingGateway for ConsoleGateway {
    fn name(&self) -> &str {
        "console"
    }

    async fn send_group_message(&self, group: &GroupId, user: &UserId, text: &str) -> Result<()> {
        println!("{}", outbound(group.as_str(), user.as_str(), text));
        Ok(())
    }

    async fn fetch_group_members(&self, group: &GroupId) -> Result<Vec<UserId>> {
        let speakers = self.speakers.lock().await;
        Ok(speakers
            .get(group)
            .map(|users| users.iter().cloned().collect())
            .unwrap_or_default())
    }
}

/// Parse `<group> <user> <text...>`. The text may be empty.
pub fn parse_line(line: &str) -> Option<InboundMessage> {
    let mut parts = line.trim().splitn(3, char::is_whitespace);
    let group = parts.next().filter(|s| !s.is_empty())?;
    let user = parts.next().filter(|s| !s.is_empty())?;
    let text = parts.next().unwrap_or("").trim();
    Some(InboundMessage::new(group, user, text))
}
