//! Per-group, per-user activity and reminder timestamps.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use nudge_core::{GroupId, PairKey};

use crate::clock::Clock;

/// Timestamps for one pair. `None` means "never".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityRecord {
    pub last_active_at: Option<DateTime<Utc>>,
    pub last_reminded_at: Option<DateTime<Utc>>,
}

/// In-memory activity table. All operations are total: a missing key
/// behaves exactly like a record with both timestamps unset.
pub struct ActivityStore {
    clock: Arc<dyn Clock>,
    records: RwLock<HashMap<PairKey, ActivityRecord>>,
}

impl ActivityStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Mark the pair as active now. Never moves `last_active_at` backwards.
    pub async fn record_activity(&self, key: &PairKey) -> DateTime<Utc> {
        let now = self.clock.now();
        let mut records = self.records.write().await;
        let record = records.entry(key.clone()).or_default();
        let stamped = match record.last_active_at {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        record.last_active_at = Some(stamped);
        stamped
    }

    pub async fn record_reminded(&self, key: &PairKey) {
        let now = self.clock.now();
        let mut records = self.records.write().await;
        records.entry(key.clone()).or_default().last_reminded_at = Some(now);
    }

    /// True iff the pair has been silent for at least `threshold`.
    /// A pair never seen is inactive.
    pub async fn is_inactive_since(&self, key: &PairKey, threshold: Duration) -> bool {
        let records = self.records.read().await;
        match records.get(key).and_then(|r| r.last_active_at) {
            None => true,
            Some(at) => elapsed_since(self.clock.now(), at) >= threshold,
        }
    }

    /// True iff the pair was reminded less than `cooldown` ago.
    pub async fn is_in_cooldown(&self, key: &PairKey, cooldown: Duration) -> bool {
        let records = self.records.read().await;
        match records.get(key).and_then(|r| r.last_reminded_at) {
            None => false,
            Some(at) => elapsed_since(self.clock.now(), at) < cooldown,
        }
    }

    /// Create the record for a newly registered pair. With `seed_grace`, a
    /// pair with no recorded activity gets `last_active_at = now`.
    pub async fn ensure(&self, key: &PairKey, seed_grace: bool) {
        let now = self.clock.now();
        let mut records = self.records.write().await;
        let record = records.entry(key.clone()).or_default();
        if seed_grace && record.last_active_at.is_none() {
            debug!(pair = %key, "Seeding grace timestamp");
            record.last_active_at = Some(now);
        }
    }

    pub async fn snapshot(&self, key: &PairKey) -> Option<ActivityRecord> {
        self.records.read().await.get(key).copied()
    }

    pub async fn remove(&self, key: &PairKey) -> bool {
        self.records.write().await.remove(key).is_some()
    }

    /// Drop every record of `group`. Returns how many were removed.
    pub async fn remove_group(&self, group: &GroupId) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|key, _| &key.group != group);
        before - records.len()
    }

    pub async fn clear(&self) {
        self.records.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

/// Elapsed wall time, clamped to zero if `since` lies in the future.
fn elapsed_since(now: DateTime<Utc>, since: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn store() -> (Arc<ManualClock>, ActivityStore) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap(),
        ));
        let store = ActivityStore::new(clock.clone());
        (clock, store)
    }

    #[tokio::test]
    async fn never_seen_pair_is_inactive_and_not_cooling_down() {
        let (_clock, store) = store();
        let key = PairKey::new("g", "u");
        assert!(store.is_inactive_since(&key, Duration::from_secs(7200)).await);
        assert!(!store.is_in_cooldown(&key, Duration::from_secs(3600)).await);
        assert!(store.snapshot(&key).await.is_none());
    }

    #[tokio::test]
    async fn inactivity_threshold_is_inclusive() {
        let (clock, store) = store();
        let key = PairKey::new("g", "u");
        store.record_activity(&key).await;
        clock.advance(Duration::from_secs(7199));
        assert!(!store.is_inactive_since(&key, Duration::from_secs(7200)).await);
        clock.advance(Duration::from_secs(1));
        assert!(store.is_inactive_since(&key, Duration::from_secs(7200)).await);
    }

    #[tokio::test]
    async fn cooldown_expires() {
        let (clock, store) = store();
        let key = PairKey::new("g", "u");
        store.record_reminded(&key).await;
        assert!(store.is_in_cooldown(&key, Duration::from_secs(3600)).await);
        clock.advance(Duration::from_secs(3600));
        assert!(!store.is_in_cooldown(&key, Duration::from_secs(3600)).await);
    }

    #[tokio::test]
    async fn record_activity_is_monotonic() {
        let (clock, store) = store();
        let key = PairKey::new("g", "u");
        let first = store.record_activity(&key).await;
        clock.set(first - chrono::Duration::seconds(30));
        let second = store.record_activity(&key).await;
        assert_eq!(second, first);
        assert_eq!(store.snapshot(&key).await.unwrap().last_active_at, Some(first));
    }

    #[tokio::test]
    async fn ensure_seeds_only_when_asked() {
        let (clock, store) = store();
        let plain = PairKey::new("g", "plain");
        let graced = PairKey::new("g", "graced");
        store.ensure(&plain, false).await;
        store.ensure(&graced, true).await;
        assert_eq!(store.snapshot(&plain).await, Some(ActivityRecord::default()));
        assert_eq!(
            store.snapshot(&graced).await.unwrap().last_active_at,
            Some(clock.now())
        );
        assert!(store.is_inactive_since(&plain, Duration::from_secs(60)).await);
        assert!(!store.is_inactive_since(&graced, Duration::from_secs(60)).await);
    }

    #[tokio::test]
    async fn ensure_keeps_existing_activity() {
        let (clock, store) = store();
        let key = PairKey::new("g", "u");
        let stamped = store.record_activity(&key).await;
        clock.advance(Duration::from_secs(10));
        store.ensure(&key, true).await;
        assert_eq!(store.snapshot(&key).await.unwrap().last_active_at, Some(stamped));
    }

    #[tokio::test]
    async fn remove_group_drops_only_that_group() {
        let (_clock, store) = store();
        store.record_activity(&PairKey::new("g1", "a")).await;
        store.record_activity(&PairKey::new("g1", "b")).await;
        store.record_activity(&PairKey::new("g2", "a")).await;
        assert_eq!(store.remove_group(&GroupId::from("g1")).await, 2);
        assert_eq!(store.len().await, 1);
        assert!(store.remove(&PairKey::new("g2", "a")).await);
        assert!(store.is_empty().await);
    }
}
