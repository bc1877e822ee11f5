//! Gateway test double shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use nudge_core::{GroupId, MessagingGateway, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub group: GroupId,
    pub user: UserId,
    pub text: String,
}

/// Records every send, optionally failing sends or roster fetches.
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<SentMessage>>,
    members: HashMap<GroupId, Vec<UserId>>,
    fail_sends: AtomicBool,
    fail_fetches: bool,
    fetches: AtomicUsize,
    notify: Option<mpsc::UnboundedSender<SentMessage>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_members(mut self, group: &str, users: &[&str]) -> Self {
        self.members.insert(
            GroupId::from(group),
            users.iter().map(|u| UserId::from(*u)).collect(),
        );
        self
    }

    pub fn failing_fetches(mut self) -> Self {
        self.fail_fetches = true;
        self
    }

    pub fn failing_sends(self) -> Self {
        self.fail_sends.store(true, Ordering::SeqCst);
        self
    }

    /// Each successful send is also pushed to the returned receiver.
    pub fn notifying(mut self) -> (Self, mpsc::UnboundedReceiver<SentMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.notify = Some(tx);
        (self, rx)
    }

    pub fn set_failing_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_group_message(&self, group: &GroupId, user: &UserId, text: &str) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            anyhow::bail!("simulated delivery failure");
        }
        let message = SentMessage {
            group: group.clone(),
            user: user.clone(),
            text: text.to_string(),
        };
        self.sent.lock().unwrap().push(message.clone());
        if let Some(tx) = &self.notify {
            let _ = tx.send(message);
        }
        Ok(())
    }

    async fn fetch_group_members(&self, group: &GroupId) -> Result<Vec<UserId>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches {
            anyhow::bail!("simulated roster failure");
        }
        Ok(self.members.get(group).cloned().unwrap_or_default())
    }
}

/// Parks inside `send_group_message` until released, so tests can act
/// while a send is in flight.
#[derive(Default)]
pub struct BlockingGateway {
    pub entered: Notify,
    pub release: Notify,
    sends: AtomicUsize,
}

impl BlockingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends that returned successfully.
    pub fn sent_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessagingGateway for BlockingGateway {
    fn name(&self) -> &str {
        "blocking"
    }

    async fn send_group_message(&self, _: &GroupId, _: &UserId, _: &str) -> Result<()> {
        self.entered.notify_one();
        self.release.notified().await;
        self.sends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
