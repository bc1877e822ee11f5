//! `OutreachScheduler`, the host-facing facade that owns every component.
//!
//! Lifecycle is `start()` / `stop()`; inbound group messages arrive through
//! `on_group_message`.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use nudge_config::{NudgeConfig, OutreachSettings};
use nudge_core::{GroupId, InboundMessage, MessagingGateway, NudgeError, PairKey};

use crate::activity::ActivityStore;
use crate::campaign::ReminderCampaign;
use crate::clock::{Clock, SystemClock};
use crate::delay::ResponseDelay;
use crate::registry::MonitorRegistry;
use crate::scanner::{InactivityScanner, ScanReport};
use crate::supervisor::{CampaignReport, CampaignSupervisor};

struct ScanTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct OutreachScheduler {
    settings: Arc<OutreachSettings>,
    gateway: Arc<dyn MessagingGateway>,
    activity: Arc<ActivityStore>,
    registry: Arc<MonitorRegistry>,
    supervisor: Arc<CampaignSupervisor>,
    scanner: Arc<InactivityScanner>,
    scan_task: Mutex<Option<ScanTask>>,
}

/// Builder for tests and hosts that need a custom clock or delay.
pub struct OutreachSchedulerBuilder {
    settings: OutreachSettings,
    gateway: Arc<dyn MessagingGateway>,
    clock: Arc<dyn Clock>,
    response_delay: Option<ResponseDelay>,
}

impl OutreachSchedulerBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the random pre-send wait derived from `max_response_delay`.
    pub fn response_delay(mut self, delay: ResponseDelay) -> Self {
        self.response_delay = Some(delay);
        self
    }

    pub fn build(self) -> OutreachScheduler {
        let settings = Arc::new(self.settings);
        let delay = self
            .response_delay
            .unwrap_or_else(|| ResponseDelay::uniform(settings.max_response_delay));

        let activity = Arc::new(ActivityStore::new(self.clock.clone()));
        let registry = Arc::new(MonitorRegistry::new(
            settings.policy.clone(),
            settings.enabled,
        ));
        let supervisor = Arc::new(CampaignSupervisor::new());
        let campaign = ReminderCampaign::new(
            settings.max_attempts,
            settings.prompts.clone(),
            delay,
            self.gateway.clone(),
            activity.clone(),
        );
        let scanner = Arc::new(InactivityScanner::new(
            settings.clone(),
            self.clock,
            activity.clone(),
            registry.clone(),
            supervisor.clone(),
            campaign,
        ));

        OutreachScheduler {
            settings,
            gateway: self.gateway,
            activity,
            registry,
            supervisor,
            scanner,
            scan_task: Mutex::new(None),
        }
    }
}

impl OutreachScheduler {
    pub fn builder(
        settings: OutreachSettings,
        gateway: Arc<dyn MessagingGateway>,
    ) -> OutreachSchedulerBuilder {
        OutreachSchedulerBuilder {
            settings,
            gateway,
            clock: Arc::new(SystemClock),
            response_delay: None,
        }
    }

    pub fn new(settings: OutreachSettings, gateway: Arc<dyn MessagingGateway>) -> Self {
        Self::builder(settings, gateway).build()
    }

    /// Validate a raw config and build the scheduler. Configuration errors
    /// are the only fatal errors of the component.
    pub fn from_config(
        config: NudgeConfig,
        gateway: Arc<dyn MessagingGateway>,
    ) -> Result<Self, NudgeError> {
        let settings = OutreachSettings::from_config(config)?;
        Ok(Self::new(settings, gateway))
    }

    /// Register the configured pairs and spawn the scanner. Calling `start`
    /// on a running scheduler is a no-op.
    pub async fn start(&self) {
        let mut scan_task = self.scan_task.lock().await;
        if scan_task.is_some() {
            debug!("Scheduler already running");
            return;
        }

        self.supervisor.reopen();
        let pairs = self.registry.list_monitored_pairs().await;
        for key in &pairs {
            self.activity.ensure(key, self.settings.grace_on_register).await;
        }

        let cancel = CancellationToken::new();
        let scanner = self.scanner.clone();
        let handle = tokio::spawn(scanner.run(cancel.clone()));
        *scan_task = Some(ScanTask { cancel, handle });

        info!(
            gateway = self.gateway.name(),
            enabled = self.registry.is_enabled(),
            discovery = self.registry.is_discovery(),
            pairs = pairs.len(),
            "Outreach scheduler started"
        );
    }

    /// Stop the scanner, cancel and await every campaign, then drop all
    /// in-memory state.
    pub async fn stop(&self) {
        let task = self.scan_task.lock().await.take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                if !e.is_cancelled() {
                    error!(error = %e, "Scanner task panicked");
                }
            }
        }

        self.supervisor.close();
        self.supervisor.cancel_all().await;
        self.activity.clear().await;
        self.registry.reset().await;
        info!("Outreach scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.scan_task.lock().await.is_some()
    }

    /// Feed an observed group message into the scheduler.
    pub async fn on_group_message(&self, message: &InboundMessage) {
        if !self.registry.is_enabled() {
            return;
        }

        if self.registry.is_discovery() {
            let added = self
                .registry
                .activate_group(&message.group_id, self.gateway.as_ref())
                .await;
            for key in &added {
                self.activity.ensure(key, self.settings.grace_on_register).await;
            }
            if self
                .registry
                .admit_speaker(&message.group_id, &message.user_id)
                .await
            {
                self.activity
                    .ensure(&message.pair(), self.settings.grace_on_register)
                    .await;
            }
        }

        if self
            .registry
            .is_monitored(&message.group_id, &message.user_id)
            .await
        {
            self.record_activity(&message.pair()).await;
        }
    }

    /// Record activity for a pair. If a campaign is running for it, this is
    /// its response signal. Returns true when a campaign was answered.
    pub async fn record_activity(&self, key: &PairKey) -> bool {
        self.activity.record_activity(key).await;
        let responded = self.supervisor.mark_responded(key).await;
        if responded {
            info!(pair = %key, "User responded to outreach");
        }
        responded
    }

    /// Run one scan immediately, outside the periodic loop.
    pub async fn scan_now(&self) -> ScanReport {
        self.scanner.scan_once().await
    }

    /// Start monitoring a pair at runtime.
    pub async fn monitor(&self, key: &PairKey) -> bool {
        let added = self.registry.add_pair(key).await;
        if added {
            self.activity.ensure(key, self.settings.grace_on_register).await;
        }
        added
    }

    /// Stop monitoring a pair: cancel its campaign and forget its activity.
    /// The registry entry goes first, so a scan in progress cannot start a
    /// new campaign for the pair after the cancel.
    pub async fn unmonitor(&self, key: &PairKey) -> bool {
        let removed = self.registry.remove_pair(key).await;
        self.supervisor.cancel(key).await;
        self.activity.remove(key).await;
        removed
    }

    /// Tear down a group: every pair in it is unmonitored.
    pub async fn teardown_group(&self, group: &GroupId) -> usize {
        let pairs = self.registry.remove_group(group).await;
        for key in &pairs {
            self.supervisor.cancel(key).await;
        }
        self.activity.remove_group(group).await;
        info!(group = %group, pairs = pairs.len(), "Group torn down");
        pairs.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CampaignReport> {
        self.supervisor.subscribe()
    }

    pub fn settings(&self) -> &OutreachSettings {
        &self.settings
    }

    pub fn activity(&self) -> &ActivityStore {
        &self.activity
    }

    pub fn registry(&self) -> &MonitorRegistry {
        &self.registry
    }

    pub fn supervisor(&self) -> &CampaignSupervisor {
        &self.supervisor
    }
}
