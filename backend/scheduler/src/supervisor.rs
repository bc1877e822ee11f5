//! Campaign table: at most one live campaign task per pair, plus the
//! broadcast of their terminal reports.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use nudge_core::{NudgeError, PairKey};

use crate::campaign::{CampaignContext, CampaignOutcome, CampaignState};

/// Published once per campaign when it reaches a terminal state.
#[derive(Debug, Clone)]
pub struct CampaignReport {
    pub campaign_id: Uuid,
    pub key: PairKey,
    pub outcome: CampaignOutcome,
    pub attempts: u32,
}

/// Result of a guarded start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Started,
    /// A live campaign already exists for the pair.
    Running,
    /// The admission check said no.
    Refused,
}

struct CampaignEntry {
    id: Uuid,
    state: Arc<CampaignState>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl CampaignEntry {
    fn is_live(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Tracks in-flight campaigns and enforces at most one per pair.
pub struct CampaignSupervisor {
    campaigns: Mutex<HashMap<PairKey, CampaignEntry>>,
    closed: AtomicBool,
    reports: broadcast::Sender<CampaignReport>,
}

impl CampaignSupervisor {
    pub fn new() -> Self {
        let (reports, _) = broadcast::channel(256);
        Self {
            campaigns: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            reports,
        }
    }

    /// Start a campaign for `key` unless one is already running.
    ///
    /// The check and the registration happen under one lock, so concurrent
    /// callers for the same pair start exactly one campaign. Returns
    /// `Ok(false)` on a dedup hit.
    pub async fn try_start<F, Fut>(self: &Arc<Self>, key: PairKey, run: F) -> Result<bool, NudgeError>
    where
        F: FnOnce(CampaignContext) -> Fut,
        Fut: Future<Output = CampaignOutcome> + Send + 'static,
    {
        let admission = self.try_start_if(key, async { true }, run).await?;
        Ok(admission == Admission::Started)
    }

    /// Like `try_start`, but `admit` is awaited under the table lock right
    /// before registration. A campaign only starts if it resolves to true.
    ///
    /// Anything that revokes admission first and then calls `cancel` can
    /// never leave a campaign behind.
    pub async fn try_start_if<A, F, Fut>(
        self: &Arc<Self>,
        key: PairKey,
        admit: A,
        run: F,
    ) -> Result<Admission, NudgeError>
    where
        A: Future<Output = bool>,
        F: FnOnce(CampaignContext) -> Fut,
        Fut: Future<Output = CampaignOutcome> + Send + 'static,
    {
        let mut campaigns = self.campaigns.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(NudgeError::SupervisorClosed);
        }
        if campaigns.get(&key).is_some_and(CampaignEntry::is_live) {
            return Ok(Admission::Running);
        }
        if !admit.await {
            debug!(pair = %key, "Campaign start refused");
            return Ok(Admission::Refused);
        }

        let ctx = CampaignContext::new(key.clone());
        let id = ctx.id;
        let state = ctx.state.clone();
        let cancel = ctx.cancel.clone();
        let campaign = run(ctx);

        let supervisor = Arc::clone(self);
        let task_key = key.clone();
        let task_state = state.clone();
        let handle = tokio::spawn(async move {
            let outcome = campaign.await;
            supervisor.unregister(&task_key, id).await;
            // No subscribers is fine.
            let _ = supervisor.reports.send(CampaignReport {
                campaign_id: id,
                key: task_key,
                outcome,
                attempts: task_state.attempts(),
            });
        });

        debug!(pair = %key, campaign = %id, "Campaign registered");
        campaigns.insert(
            key,
            CampaignEntry {
                id,
                state,
                cancel,
                handle,
            },
        );
        Ok(Admission::Started)
    }

    /// Flag the running campaign for `key` as answered. Returns false when
    /// no campaign is running for the pair.
    pub async fn mark_responded(&self, key: &PairKey) -> bool {
        let campaigns = self.campaigns.lock().await;
        match campaigns.get(key) {
            Some(entry) if entry.is_live() => {
                entry.state.mark_responded();
                true
            }
            _ => false,
        }
    }

    /// Remove the entry for `key` if it still belongs to `campaign_id`.
    pub async fn unregister(&self, key: &PairKey, campaign_id: Uuid) -> bool {
        let mut campaigns = self.campaigns.lock().await;
        if campaigns.get(key).is_some_and(|e| e.id == campaign_id) {
            campaigns.remove(key);
            true
        } else {
            false
        }
    }

    /// Cancel the campaign for one pair and wait for it to stop.
    pub async fn cancel(&self, key: &PairKey) -> bool {
        let entry = self.campaigns.lock().await.remove(key);
        match entry {
            Some(entry) => {
                entry.cancel.cancel();
                await_campaign(key, entry).await;
                true
            }
            None => false,
        }
    }

    /// Cancel every tracked campaign and wait until all have terminated.
    pub async fn cancel_all(&self) {
        let drained: Vec<(PairKey, CampaignEntry)> = {
            let mut campaigns = self.campaigns.lock().await;
            campaigns.drain().collect()
        };
        if drained.is_empty() {
            return;
        }
        info!(count = drained.len(), "Cancelling campaigns");
        for (_, entry) in &drained {
            entry.cancel.cancel();
        }
        for (key, entry) in drained {
            await_campaign(&key, entry).await;
        }
    }

    /// Refuse new campaigns from now on.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn is_active(&self, key: &PairKey) -> bool {
        self.campaigns
            .lock()
            .await
            .get(key)
            .is_some_and(CampaignEntry::is_live)
    }

    pub async fn active_count(&self) -> usize {
        self.campaigns
            .lock()
            .await
            .values()
            .filter(|e| e.is_live())
            .count()
    }

    /// Attempts sent so far by the running campaign for `key`.
    pub async fn attempts(&self, key: &PairKey) -> Option<u32> {
        self.campaigns
            .lock()
            .await
            .get(key)
            .map(|e| e.state.attempts())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CampaignReport> {
        self.reports.subscribe()
    }
}

impl Default for CampaignSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

async fn await_campaign(key: &PairKey, entry: CampaignEntry) {
    if let Err(e) = entry.handle.await {
        if !e.is_cancelled() {
            error!(pair = %key, campaign = %entry.id, error = %e, "Campaign task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// A campaign that idles until cancelled.
    async fn idle(ctx: CampaignContext) -> CampaignOutcome {
        ctx.cancel.cancelled().await;
        CampaignOutcome::Cancelled
    }

    #[tokio::test]
    async fn second_start_is_deduplicated() {
        let supervisor = Arc::new(CampaignSupervisor::new());
        let key = PairKey::new("g", "u");
        assert!(supervisor.try_start(key.clone(), idle).await.unwrap());
        assert!(!supervisor.try_start(key.clone(), idle).await.unwrap());
        assert_eq!(supervisor.active_count().await, 1);

        assert!(supervisor.try_start(PairKey::new("g", "other"), idle).await.unwrap());
        assert_eq!(supervisor.active_count().await, 2);
        supervisor.cancel_all().await;
    }

    #[tokio::test]
    async fn finished_campaign_unregisters_and_reports() {
        let supervisor = Arc::new(CampaignSupervisor::new());
        let mut reports = supervisor.subscribe();
        let key = PairKey::new("g", "u");

        supervisor
            .try_start(key.clone(), |_ctx| async { CampaignOutcome::Exhausted })
            .await
            .unwrap();
        let report = reports.recv().await.unwrap();
        assert_eq!(report.key, key);
        assert_eq!(report.outcome, CampaignOutcome::Exhausted);
        assert!(!supervisor.is_active(&key).await);

        // A fresh campaign may start once the previous one is gone.
        assert!(supervisor.try_start(key, idle).await.unwrap());
        supervisor.cancel_all().await;
    }

    #[tokio::test]
    async fn mark_responded_reaches_running_campaign() {
        let supervisor = Arc::new(CampaignSupervisor::new());
        let mut reports = supervisor.subscribe();
        let key = PairKey::new("g", "u");
        assert!(!supervisor.mark_responded(&key).await);

        supervisor
            .try_start(key.clone(), |ctx| async move {
                while !ctx.state.responded() {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                CampaignOutcome::Responded
            })
            .await
            .unwrap();
        assert!(supervisor.mark_responded(&key).await);
        let report = reports.recv().await.unwrap();
        assert_eq!(report.outcome, CampaignOutcome::Responded);
    }

    #[tokio::test]
    async fn cancel_all_waits_for_termination() {
        let supervisor = Arc::new(CampaignSupervisor::new());
        let mut reports = supervisor.subscribe();
        for user in ["a", "b", "c"] {
            supervisor
                .try_start(PairKey::new("g", user), idle)
                .await
                .unwrap();
        }
        supervisor.cancel_all().await;
        assert_eq!(supervisor.active_count().await, 0);
        for _ in 0..3 {
            assert_eq!(reports.recv().await.unwrap().outcome, CampaignOutcome::Cancelled);
        }
    }

    #[tokio::test]
    async fn cancel_single_pair() {
        let supervisor = Arc::new(CampaignSupervisor::new());
        let a = PairKey::new("g", "a");
        let b = PairKey::new("g", "b");
        supervisor.try_start(a.clone(), idle).await.unwrap();
        supervisor.try_start(b.clone(), idle).await.unwrap();
        assert!(supervisor.cancel(&a).await);
        assert!(!supervisor.cancel(&a).await);
        assert!(!supervisor.is_active(&a).await);
        assert!(supervisor.is_active(&b).await);
        supervisor.cancel_all().await;
    }

    #[tokio::test]
    async fn closed_supervisor_refuses_new_campaigns() {
        let supervisor = Arc::new(CampaignSupervisor::new());
        supervisor.close();
        let err = supervisor
            .try_start(PairKey::new("g", "u"), idle)
            .await
            .unwrap_err();
        assert!(matches!(err, NudgeError::SupervisorClosed));
        supervisor.reopen();
        assert!(supervisor.try_start(PairKey::new("g", "u"), idle).await.unwrap());
        supervisor.cancel_all().await;
    }

    #[tokio::test]
    async fn stale_unregister_is_ignored() {
        let supervisor = Arc::new(CampaignSupervisor::new());
        let key = PairKey::new("g", "u");
        supervisor.try_start(key.clone(), idle).await.unwrap();
        assert!(!supervisor.unregister(&key, Uuid::new_v4()).await);
        assert!(supervisor.is_active(&key).await);
        supervisor.cancel_all().await;
    }

    #[tokio::test]
    async fn refused_admission_starts_nothing() {
        let supervisor = Arc::new(CampaignSupervisor::new());
        let key = PairKey::new("g", "u");

        let admission = supervisor
            .try_start_if(key.clone(), async { false }, idle)
            .await
            .unwrap();
        assert_eq!(admission, Admission::Refused);
        assert!(!supervisor.is_active(&key).await);

        let admission = supervisor
            .try_start_if(key.clone(), async { true }, idle)
            .await
            .unwrap();
        assert_eq!(admission, Admission::Started);
        let admission = supervisor
            .try_start_if(key.clone(), async { true }, idle)
            .await
            .unwrap();
        assert_eq!(admission, Admission::Running);
        supervisor.cancel_all().await;
    }
}
