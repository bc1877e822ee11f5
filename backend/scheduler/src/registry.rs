//! The set of (group, user) pairs under observation.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use logging::{EventLogger, OutreachEvent};
use nudge_config::MonitorPolicy;
use nudge_core::{GroupId, MessagingGateway, NudgeError, PairKey, UserId};

#[derive(Default)]
struct RegistryState {
    rosters: BTreeMap<GroupId, BTreeSet<UserId>>,
    /// Discovery mode: groups whose roster fetch has been attempted.
    activated: HashSet<GroupId>,
}

/// Monitored pairs, seeded from the allow-list or discovered per group.
pub struct MonitorRegistry {
    policy: MonitorPolicy,
    enabled: AtomicBool,
    state: RwLock<RegistryState>,
}

impl MonitorRegistry {
    pub fn new(policy: MonitorPolicy, enabled: bool) -> Self {
        let state = RegistryState {
            rosters: seed_rosters(&policy),
            activated: HashSet::new(),
        };
        Self {
            policy,
            enabled: AtomicBool::new(enabled),
            state: RwLock::new(state),
        }
    }

    pub fn is_discovery(&self) -> bool {
        matches!(self.policy, MonitorPolicy::Discovery { .. })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "Monitoring toggled");
    }

    pub async fn is_monitored(&self, group: &GroupId, user: &UserId) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let state = self.state.read().await;
        state
            .rosters
            .get(group)
            .is_some_and(|users| users.contains(user))
    }

    /// Snapshot of every monitored pair; empty while monitoring is disabled.
    pub async fn list_monitored_pairs(&self) -> Vec<PairKey> {
        if !self.is_enabled() {
            return Vec::new();
        }
        let state = self.state.read().await;
        state
            .rosters
            .iter()
            .flat_map(|(group, users)| {
                users.iter().map(move |user| PairKey {
                    group: group.clone(),
                    user: user.clone(),
                })
            })
            .collect()
    }

    /// Discovery mode: on first contact with `group`, fetch its roster once
    /// and register every member that is not excluded. A failed fetch still
    /// activates the group, with no members. Returns the newly registered pairs.
    pub async fn activate_group(
        &self,
        group: &GroupId,
        gateway: &dyn MessagingGateway,
    ) -> Vec<PairKey> {
        if !self.is_discovery() || !self.group_allowed(group) {
            return Vec::new();
        }
        {
            let mut state = self.state.write().await;
            if !state.activated.insert(group.clone()) {
                return Vec::new();
            }
        }

        let members = match gateway.fetch_group_members(group).await {
            Ok(members) => members,
            Err(e) => {
                let err = NudgeError::GatewayFetch {
                    group: group.clone(),
                    message: e.to_string(),
                };
                warn!(gateway = gateway.name(), error = %err, "Roster fetch failed; group activated without members");
                Vec::new()
            }
        };

        let mut added = Vec::new();
        {
            let mut state = self.state.write().await;
            // A reset while the fetch was in flight wins.
            if !state.activated.contains(group) {
                return Vec::new();
            }
            let roster = state.rosters.entry(group.clone()).or_default();
            for user in members {
                if self.is_excluded(&user) {
                    continue;
                }
                if roster.insert(user.clone()) {
                    added.push(PairKey {
                        group: group.clone(),
                        user,
                    });
                }
            }
        }

        info!(group = %group, members = added.len(), "Group activated");
        EventLogger::log_event(
            group.as_str(),
            None,
            OutreachEvent::GroupActivated {
                members: added.len(),
            },
        );
        added
    }

    /// Discovery mode: register a speaker missing from an activated group's
    /// roster. Returns true if the pair is new.
    pub async fn admit_speaker(&self, group: &GroupId, user: &UserId) -> bool {
        if !self.is_discovery() || self.is_excluded(user) {
            return false;
        }
        let mut state = self.state.write().await;
        if !state.activated.contains(group) {
            return false;
        }
        let added = state
            .rosters
            .entry(group.clone())
            .or_default()
            .insert(user.clone());
        if added {
            debug!(group = %group, user = %user, "Speaker admitted to roster");
        }
        added
    }

    pub async fn add_pair(&self, key: &PairKey) -> bool {
        let mut state = self.state.write().await;
        state
            .rosters
            .entry(key.group.clone())
            .or_default()
            .insert(key.user.clone())
    }

    pub async fn remove_pair(&self, key: &PairKey) -> bool {
        let mut state = self.state.write().await;
        let Some(users) = state.rosters.get_mut(&key.group) else {
            return false;
        };
        let removed = users.remove(&key.user);
        if users.is_empty() {
            state.rosters.remove(&key.group);
        }
        removed
    }

    /// Forget a group entirely. Returns the pairs that were monitored in it.
    pub async fn remove_group(&self, group: &GroupId) -> Vec<PairKey> {
        let mut state = self.state.write().await;
        state.activated.remove(group);
        state
            .rosters
            .remove(group)
            .map(|users| {
                users
                    .into_iter()
                    .map(|user| PairKey {
                        group: group.clone(),
                        user,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop discovered rosters and runtime edits; back to the configured state.
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        state.rosters = seed_rosters(&self.policy);
        state.activated.clear();
    }

    fn group_allowed(&self, group: &GroupId) -> bool {
        match &self.policy {
            MonitorPolicy::Discovery {
                groups: Some(groups),
                ..
            } => groups.contains(group),
            MonitorPolicy::Discovery { groups: None, .. } => true,
            MonitorPolicy::AllowList(_) => false,
        }
    }

    fn is_excluded(&self, user: &UserId) -> bool {
        match &self.policy {
            MonitorPolicy::Discovery { excluded, .. } => excluded.contains(user),
            MonitorPolicy::AllowList(_) => false,
        }
    }
}

fn seed_rosters(policy: &MonitorPolicy) -> BTreeMap<GroupId, BTreeSet<UserId>> {
    match policy {
        MonitorPolicy::AllowList(groups) => groups
            .iter()
            .filter(|(_, users)| !users.is_empty())
            .map(|(group, users)| (group.clone(), users.clone()))
            .collect(),
        MonitorPolicy::Discovery { .. } => BTreeMap::new(),
    }
}
