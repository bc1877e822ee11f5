//! Inactivity scanner: the periodic sweep that starts reminder campaigns.
//!
//! Each tick walks the registry snapshot once. A pair gets a new campaign
//! only if none is running, it is out of its reminder cooldown, and it has
//! been silent for at least the inactivity threshold.

use std::sync::Arc;

use chrono::Local;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use nudge_config::OutreachSettings;
use nudge_core::{NudgeError, PairKey};

use crate::activity::ActivityStore;
use crate::campaign::ReminderCampaign;
use crate::clock::Clock;
use crate::registry::MonitorRegistry;
use crate::supervisor::{Admission, CampaignSupervisor};

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// The whole tick was skipped by the active-hours gate.
    pub outside_active_hours: bool,
    pub evaluated: usize,
    pub started: usize,
    pub deduplicated: usize,
    pub cooling_down: usize,
    pub active: usize,
    /// Pairs unmonitored while the tick was running.
    pub unmonitored: usize,
    pub failed: usize,
}

enum PairDecision {
    Started,
    Deduplicated,
    CoolingDown,
    Active,
    Unmonitored,
}

pub struct InactivityScanner {
    settings: Arc<OutreachSettings>,
    clock: Arc<dyn Clock>,
    activity: Arc<ActivityStore>,
    registry: Arc<MonitorRegistry>,
    supervisor: Arc<CampaignSupervisor>,
    campaign: ReminderCampaign,
}

impl InactivityScanner {
    pub fn new(
        settings: Arc<OutreachSettings>,
        clock: Arc<dyn Clock>,
        activity: Arc<ActivityStore>,
        registry: Arc<MonitorRegistry>,
        supervisor: Arc<CampaignSupervisor>,
        campaign: ReminderCampaign,
    ) -> Self {
        Self {
            settings,
            clock,
            activity,
            registry,
            supervisor,
            campaign,
        }
    }

    /// Run one sweep over every monitored pair.
    pub async fn scan_once(&self) -> ScanReport {
        let mut report = ScanReport::default();

        if let Some(hours) = &self.settings.active_hours {
            let local = self.clock.now().with_timezone(&Local);
            if !hours.is_active_at(&local) {
                debug!(start = hours.start_hour, end = hours.end_hour, "Outside active hours, skipping scan");
                report.outside_active_hours = true;
                return report;
            }
        }

        for key in self.registry.list_monitored_pairs().await {
            report.evaluated += 1;
            match self.evaluate(&key).await {
                Ok(PairDecision::Started) => report.started += 1,
                Ok(PairDecision::Deduplicated) => report.deduplicated += 1,
                Ok(PairDecision::CoolingDown) => report.cooling_down += 1,
                Ok(PairDecision::Active) => report.active += 1,
                Ok(PairDecision::Unmonitored) => report.unmonitored += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(pair = %key, error = %e, "Failed to evaluate pair");
                }
            }
        }

        if report.started > 0 {
            info!(started = report.started, evaluated = report.evaluated, "Scan started campaigns");
        }
        report
    }

    async fn evaluate(&self, key: &PairKey) -> Result<PairDecision, NudgeError> {
        if self.supervisor.is_active(key).await {
            return Ok(PairDecision::Deduplicated);
        }
        if self
            .activity
            .is_in_cooldown(key, self.settings.reminder_cooldown)
            .await
        {
            return Ok(PairDecision::CoolingDown);
        }
        if !self
            .activity
            .is_inactive_since(key, self.settings.inactivity_threshold)
            .await
        {
            return Ok(PairDecision::Active);
        }

        // The snapshot may be stale by now; membership is checked again
        // under the campaign table lock.
        let campaign = self.campaign.clone();
        let still_monitored = self.registry.is_monitored(&key.group, &key.user);
        let admission = self
            .supervisor
            .try_start_if(key.clone(), still_monitored, move |ctx| campaign.run(ctx))
            .await?;
        match admission {
            Admission::Started => {
                info!(pair = %key, "Inactive pair detected, campaign started");
                Ok(PairDecision::Started)
            }
            Admission::Running => Ok(PairDecision::Deduplicated),
            Admission::Refused => {
                debug!(pair = %key, "Pair unmonitored during scan");
                Ok(PairDecision::Unmonitored)
            }
        }
    }

    /// Scan every `scan_interval` until `cancel` fires. A tick never ends the loop.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = time::interval(self.settings.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_secs = self.settings.scan_interval.as_secs(),
            "Inactivity scanner started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.scan_once().await;
                    debug!(?report, "Scan tick complete");
                }
            }
        }

        info!("Inactivity scanner stopped");
    }
}
