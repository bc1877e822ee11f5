//! Reminder campaign: one escalating sequence of outreach attempts for a
//! single pair.
//!
//! ```text
//! Running(k) --wait--> responded?        --> Responded
//!                      k + 1 > max?      --> Exhausted
//!                      send k + 1 ok     --> Running(k + 1)
//!                      send k + 1 failed --> SendFailed
//! any state   --cancel-->                    Cancelled
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use logging::{EventLogger, OutreachEvent};
use nudge_core::{MessagingGateway, NudgeError, PairKey};

use crate::activity::ActivityStore;
use crate::delay::ResponseDelay;
use crate::prompt::compose_reminder;

/// Terminal state of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignOutcome {
    /// The user spoke before the next attempt was due.
    Responded,
    /// Every attempt was sent without a response.
    Exhausted,
    /// The gateway rejected an attempt; the campaign gave up.
    SendFailed,
    /// Shutdown or unmonitoring interrupted the campaign.
    Cancelled,
}

impl fmt::Display for CampaignOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CampaignOutcome::Responded => "responded",
            CampaignOutcome::Exhausted => "exhausted",
            CampaignOutcome::SendFailed => "send_failed",
            CampaignOutcome::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Mutable per-campaign state shared between the campaign task and the
/// supervisor. Dropped together with the campaign, so a response marker
/// never leaks into a later campaign for the same pair.
#[derive(Debug, Default)]
pub struct CampaignState {
    responded: AtomicBool,
    attempts: AtomicU32,
}

impl CampaignState {
    pub fn mark_responded(&self) {
        self.responded.store(true, Ordering::SeqCst);
    }

    pub fn responded(&self) -> bool {
        self.responded.load(Ordering::SeqCst)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn record_attempt(&self, attempt: u32) {
        self.attempts.store(attempt, Ordering::SeqCst);
    }
}

/// Everything a campaign task receives from the supervisor.
#[derive(Debug, Clone)]
pub struct CampaignContext {
    pub id: Uuid,
    pub key: PairKey,
    pub state: Arc<CampaignState>,
    pub cancel: CancellationToken,
}

impl CampaignContext {
    pub fn new(key: PairKey) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            state: Arc::new(CampaignState::default()),
            cancel: CancellationToken::new(),
        }
    }
}

/// Campaign runner. Cheap to clone; one clone drives one campaign.
#[derive(Clone)]
pub struct ReminderCampaign {
    max_attempts: u32,
    prompts: Arc<[String]>,
    delay: ResponseDelay,
    gateway: Arc<dyn MessagingGateway>,
    activity: Arc<ActivityStore>,
}

impl ReminderCampaign {
    pub fn new(
        max_attempts: u32,
        prompts: Vec<String>,
        delay: ResponseDelay,
        gateway: Arc<dyn MessagingGateway>,
        activity: Arc<ActivityStore>,
    ) -> Self {
        Self {
            max_attempts,
            prompts: prompts.into(),
            delay,
            gateway,
            activity,
        }
    }

    /// Drive the campaign to a terminal state. Never fails: gateway errors
    /// end the campaign and are logged here.
    pub async fn run(self, ctx: CampaignContext) -> CampaignOutcome {
        let campaign_id = ctx.id.to_string();
        EventLogger::log_event(
            ctx.key.group.as_str(),
            Some(ctx.key.user.as_str()),
            OutreachEvent::CampaignStarted {
                campaign_id: campaign_id.clone(),
            },
        );

        let outcome = match self.drive(&ctx).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancellation() => {
                debug!(pair = %ctx.key, campaign = %ctx.id, "Campaign cancelled");
                CampaignOutcome::Cancelled
            }
            Err(e) => {
                warn!(pair = %ctx.key, campaign = %ctx.id, error = %e, "Campaign aborted");
                CampaignOutcome::SendFailed
            }
        };

        info!(
            pair = %ctx.key,
            campaign = %ctx.id,
            outcome = %outcome,
            attempts = ctx.state.attempts(),
            "Campaign finished"
        );
        EventLogger::log_event(
            ctx.key.group.as_str(),
            Some(ctx.key.user.as_str()),
            OutreachEvent::CampaignFinished {
                campaign_id,
                outcome: outcome.to_string(),
                attempts: ctx.state.attempts(),
            },
        );
        outcome
    }

    async fn drive(&self, ctx: &CampaignContext) -> Result<CampaignOutcome, NudgeError> {
        let CampaignContext {
            id, key, state, cancel,
        } = ctx;

        loop {
            let delay = self.delay.sample();
            debug!(pair = %key, delay_secs = delay.as_secs(), "Waiting before next attempt");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(NudgeError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }

            if state.responded() {
                return Ok(CampaignOutcome::Responded);
            }
            let attempt = state.attempts() + 1;
            if attempt > self.max_attempts {
                return Ok(CampaignOutcome::Exhausted);
            }

            let text = compose_reminder(&self.prompts, attempt, &key.user);
            // A send interrupted by cancellation is dropped and not counted,
            // even if the platform already accepted it.
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(NudgeError::Cancelled),
                sent = self.gateway.send_group_message(&key.group, &key.user, &text) => sent,
            };
            if let Err(e) = sent {
                return Err(NudgeError::GatewaySend {
                    group: key.group.clone(),
                    message: e.to_string(),
                });
            }

            self.activity.record_reminded(key).await;
            state.record_attempt(attempt);
            info!(pair = %key, campaign = %id, attempt, gateway = self.gateway.name(), "Reminder sent");
            EventLogger::log_event(
                key.group.as_str(),
                Some(key.user.as_str()),
                OutreachEvent::ReminderSent {
                    campaign_id: id.to_string(),
                    attempt,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::clock::ManualClock;
    use crate::testing::{BlockingGateway, RecordingGateway};

    fn campaign(
        max_attempts: u32,
        delay: ResponseDelay,
        gateway: Arc<RecordingGateway>,
    ) -> (ReminderCampaign, Arc<ActivityStore>) {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let activity = Arc::new(ActivityStore::new(clock));
        let campaign = ReminderCampaign::new(
            max_attempts,
            vec!["Still there?".to_string()],
            delay,
            gateway,
            activity.clone(),
        );
        (campaign, activity)
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let gateway = Arc::new(RecordingGateway::new());
        let (campaign, activity) = campaign(3, ResponseDelay::Fixed(Duration::ZERO), gateway.clone());
        let ctx = CampaignContext::new(PairKey::new("g", "u"));

        let outcome = campaign.run(ctx.clone()).await;

        assert_eq!(outcome, CampaignOutcome::Exhausted);
        assert_eq!(ctx.state.attempts(), 3);
        let sent = gateway.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].text, "Still there?");
        assert_eq!(sent[2].text, "Still there?\n(attempt #3 to reach u)");
        let record = activity.snapshot(&ctx.key).await.unwrap();
        assert!(record.last_reminded_at.is_some());
    }

    #[tokio::test]
    async fn response_before_first_send_sends_nothing() {
        let gateway = Arc::new(RecordingGateway::new());
        let (campaign, _) = campaign(3, ResponseDelay::Fixed(Duration::ZERO), gateway.clone());
        let ctx = CampaignContext::new(PairKey::new("g", "u"));
        ctx.state.mark_responded();

        assert_eq!(campaign.run(ctx).await, CampaignOutcome::Responded);
        assert_eq!(gateway.sent_count(), 0);
    }

    #[tokio::test]
    async fn send_failure_ends_campaign_without_retry() {
        let gateway = Arc::new(RecordingGateway::new().failing_sends());
        let (campaign, activity) = campaign(3, ResponseDelay::Fixed(Duration::ZERO), gateway.clone());
        let ctx = CampaignContext::new(PairKey::new("g", "u"));

        assert_eq!(campaign.run(ctx.clone()).await, CampaignOutcome::SendFailed);
        assert_eq!(ctx.state.attempts(), 0);
        assert!(activity.snapshot(&ctx.key).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_mid_wait_prevents_send() {
        let gateway = Arc::new(RecordingGateway::new());
        let (campaign, _) = campaign(
            3,
            ResponseDelay::Fixed(Duration::from_secs(600)),
            gateway.clone(),
        );
        let ctx = CampaignContext::new(PairKey::new("g", "u"));
        let cancel = ctx.cancel.clone();
        let handle = tokio::spawn(campaign.run(ctx));

        tokio::time::sleep(Duration::from_secs(300)).await;
        cancel.cancel();

        assert_eq!(handle.await.unwrap(), CampaignOutcome::Cancelled);
        assert_eq!(gateway.sent_count(), 0);
    }

    #[tokio::test]
    async fn cancel_during_send_abandons_the_attempt() {
        let gateway = Arc::new(BlockingGateway::new());
        let activity = Arc::new(ActivityStore::new(Arc::new(ManualClock::new(chrono::Utc::now()))));
        let campaign = ReminderCampaign::new(
            3,
            Vec::new(),
            ResponseDelay::Fixed(Duration::ZERO),
            gateway.clone(),
            activity.clone(),
        );
        let ctx = CampaignContext::new(PairKey::new("g", "u"));
        let cancel = ctx.cancel.clone();
        let state = ctx.state.clone();
        let handle = tokio::spawn(campaign.run(ctx));

        gateway.entered.notified().await;
        cancel.cancel();

        assert_eq!(handle.await.unwrap(), CampaignOutcome::Cancelled);
        assert_eq!(state.attempts(), 0);
        assert_eq!(gateway.sent_count(), 0);
        assert!(activity.snapshot(&PairKey::new("g", "u")).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn response_between_attempts_stops_escalation() {
        let (gateway, mut sends) = RecordingGateway::new().notifying();
        let gateway = Arc::new(gateway);
        let (campaign, _) = campaign(
            3,
            ResponseDelay::Fixed(Duration::from_secs(60)),
            gateway.clone(),
        );
        let ctx = CampaignContext::new(PairKey::new("g", "u"));
        let state = ctx.state.clone();
        let handle = tokio::spawn(campaign.run(ctx));

        sends.recv().await.unwrap();
        state.mark_responded();

        assert_eq!(handle.await.unwrap(), CampaignOutcome::Responded);
        assert_eq!(gateway.sent_count(), 1);
        assert_eq!(state.attempts(), 1);
    }

    #[test]
    fn outcome_display() {
        assert_eq!(CampaignOutcome::SendFailed.to_string(), "send_failed");
        assert_eq!(CampaignOutcome::Responded.to_string(), "responded");
    }
}
