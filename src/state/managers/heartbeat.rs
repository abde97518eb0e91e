//! Heartbeat liveness tracking.
//!
//! This module contains the `HeartbeatManager`, which records when each
//! session last proved it was alive, and the periodic sweep task that
//! evicts sessions whose heartbeat has gone stale.
//!
//! Per-session lifecycle: `Connected` (fresh) → `Stale` (older than the
//! timeout) → removed by the next sweep.

use crate::state::Hub;
use crate::state::session::SessionId;
use crate::telemetry::spans;
use dashmap::DashMap;
use pulse_proto::UserId;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Last heartbeat of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub session: SessionId,
    pub last_seen: Instant,
}

impl Heartbeat {
    fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > timeout
    }
}

/// LastHeartbeat table, keyed by user and tagged with the owning session.
pub struct HeartbeatManager {
    beats: DashMap<UserId, Heartbeat>,
}

impl HeartbeatManager {
    pub fn new() -> Self {
        Self {
            beats: DashMap::new(),
        }
    }

    /// Initialize the entry for a freshly connected session.
    pub fn start(&self, id: UserId, session: SessionId, now: Instant) {
        self.beats.insert(
            id,
            Heartbeat {
                session,
                last_seen: now,
            },
        );
    }

    /// Refresh liveness. Returns `false` if `session` no longer owns the entry.
    pub fn touch(&self, id: &str, session: SessionId, now: Instant) -> bool {
        match self.beats.get_mut(id) {
            Some(mut beat) if beat.session == session => {
                beat.last_seen = now;
                true
            }
            _ => false,
        }
    }

    /// Remove the entry if it belongs to `session`.
    pub fn remove_session(&self, id: &str, session: SessionId) -> bool {
        self.beats
            .remove_if(id, |_, beat| beat.session == session)
            .is_some()
    }

    /// Remove the entry only if it belongs to `session` and is still stale.
    ///
    /// A heartbeat that lands between the sweep's scan and this call keeps
    /// the session alive.
    pub fn remove_if_stale(
        &self,
        id: &str,
        session: SessionId,
        now: Instant,
        timeout: Duration,
    ) -> bool {
        self.beats
            .remove_if(id, |_, beat| {
                beat.session == session && beat.is_stale(now, timeout)
            })
            .is_some()
    }

    pub fn get(&self, id: &str) -> Option<Heartbeat> {
        self.beats.get(id).map(|b| *b)
    }

    /// Sessions whose last heartbeat is strictly older than `timeout`.
    pub fn stale(&self, now: Instant, timeout: Duration) -> Vec<(UserId, SessionId)> {
        self.beats
            .iter()
            .filter(|e| e.value().is_stale(now, timeout))
            .map(|e| (e.key().clone(), e.value().session))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }
}

impl Default for HeartbeatManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the periodic sweep.
///
/// Every `sweep_interval` the task evicts stale sessions and prunes expired
/// pulse records. It runs until the runtime shuts down or the handle is
/// aborted.
pub fn spawn_sweep_task(hub: Arc<Hub>) -> JoinHandle<()> {
    let period = hub.settings.sweep_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing can be stale yet.
        interval.tick().await;
        loop {
            interval.tick().await;
            let report = {
                let _span = spans::sweep().entered();
                hub.sweep(Instant::now())
            };
            if report.evicted > 0 {
                info!(evicted = report.evicted, "Evicted stale sessions");
            }
            if report.pruned > 0 {
                debug!(pruned = report.pruned, "Pruned expired pulse records");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(60);

    #[test]
    fn test_touch_requires_matching_session() {
        let beats = HeartbeatManager::new();
        let t0 = Instant::now();
        beats.start(UserId::from("user1"), 7, t0);

        assert!(!beats.touch("user1", 8, t0 + Duration::from_secs(5)));
        assert_eq!(beats.get("user1").map(|b| b.last_seen), Some(t0));

        assert!(beats.touch("user1", 7, t0 + Duration::from_secs(5)));
        assert_eq!(
            beats.get("user1").map(|b| b.last_seen),
            Some(t0 + Duration::from_secs(5))
        );
        assert!(!beats.touch("nobody", 7, t0));
    }

    #[test]
    fn test_stale_uses_strict_timeout() {
        let beats = HeartbeatManager::new();
        let t0 = Instant::now();
        beats.start(UserId::from("user1"), 1, t0);
        beats.start(UserId::from("user2"), 2, t0 + Duration::from_secs(30));

        assert!(beats.stale(t0 + TIMEOUT, TIMEOUT).is_empty());

        let stale = beats.stale(t0 + TIMEOUT + Duration::from_millis(1), TIMEOUT);
        assert_eq!(stale, vec![(UserId::from("user1"), 1)]);
    }

    #[test]
    fn test_remove_if_stale_respects_fresh_heartbeat() {
        let beats = HeartbeatManager::new();
        let t0 = Instant::now();
        beats.start(UserId::from("user1"), 1, t0);
        let late = t0 + TIMEOUT + Duration::from_secs(1);

        // Heartbeat arrives after the scan but before removal.
        beats.touch("user1", 1, late);
        assert!(!beats.remove_if_stale("user1", 1, late, TIMEOUT));
        assert!(beats.get("user1").is_some());
    }

    #[test]
    fn test_remove_session_is_idempotent() {
        let beats = HeartbeatManager::new();
        beats.start(UserId::from("user1"), 1, Instant::now());
        assert!(!beats.remove_session("user1", 2));
        assert!(beats.remove_session("user1", 1));
        assert!(!beats.remove_session("user1", 1));
        assert!(beats.is_empty());
    }
}
