//! The Hub - central shared state for the presence server.
//!
//! The Hub ties the link graph, connection registry, heartbeat table and
//! pulse detector together and owns every transition that touches more than
//! one of them. Connection tasks and the sweep task share it through an
//! `Arc<Hub>`.
//!
//! Ending a session goes through a compare-and-remove on the registry keyed
//! by `(UserId, SessionId)`. Whichever path wins that removal (disconnect or
//! eviction) emits the offline notification; the other path is a no-op.

use crate::config::Config;
use crate::metrics;
use crate::state::links::LinkGraph;
use crate::state::managers::{ConnectionRegistry, HeartbeatManager, PulseDetector, PulseOutcome};
use crate::state::presence;
use crate::state::session::{
    CloseReason, DeliveryOutcome, SessionHandle, SessionId, SessionIdGenerator,
};
use pulse_proto::{MAX_FRAME_LEN, ServerMessage, Status, UserId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runtime tunables derived from configuration.
#[derive(Debug, Clone)]
pub struct HubSettings {
    pub heartbeat_timeout: Duration,
    pub sweep_interval: Duration,
    pub pulse_window: Duration,
    pub click_retention: Duration,
    pub consume_on_match: bool,
    /// Capacity of each connection's outbound queue.
    pub send_queue: usize,
    /// Consecutive malformed frames tolerated before closing; 0 never closes.
    pub max_malformed_frames: u32,
    pub handshake_timeout: Duration,
    pub max_frame_len: usize,
}

impl HubSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            heartbeat_timeout: Duration::from_millis(config.heartbeat.timeout_ms),
            sweep_interval: Duration::from_millis(config.heartbeat.sweep_interval_ms),
            pulse_window: Duration::from_millis(config.pulse.window_ms),
            click_retention: Duration::from_millis(config.pulse.click_retention_ms),
            consume_on_match: config.pulse.consume_on_match,
            send_queue: config.limits.send_queue,
            max_malformed_frames: config.limits.max_malformed_frames,
            handshake_timeout: Duration::from_millis(config.server.handshake_timeout_ms),
            max_frame_len: config.limits.max_frame_len,
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(5),
            pulse_window: Duration::from_millis(300),
            click_retention: Duration::from_secs(60),
            consume_on_match: true,
            send_queue: 64,
            max_malformed_frames: 5,
            handshake_timeout: Duration::from_secs(10),
            max_frame_len: MAX_FRAME_LEN,
        }
    }
}

/// What the hub did with a pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseResult {
    /// `target` is not a linked peer of the sender; nothing was recorded.
    Unlinked,
    /// The sending session was already replaced or removed; ignored.
    Stale,
    /// Recorded without a reciprocal click inside the window.
    Single,
    /// Completed a double pulse.
    Double,
}

impl PulseResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unlinked => "unlinked",
            Self::Stale => "stale",
            Self::Single => "single",
            Self::Double => "double",
        }
    }
}

impl From<PulseOutcome> for PulseResult {
    fn from(outcome: PulseOutcome) -> Self {
        match outcome {
            PulseOutcome::Single => Self::Single,
            PulseOutcome::Double => Self::Double,
        }
    }
}

/// Work done by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sessions evicted for heartbeat timeout.
    pub evicted: usize,
    /// Pulse pairs pruned from the click table.
    pub pruned: usize,
}

/// Central shared state container.
pub struct Hub {
    pub links: LinkGraph,
    pub registry: ConnectionRegistry,
    pub heartbeats: HeartbeatManager,
    pub pulses: PulseDetector,
    pub session_ids: SessionIdGenerator,
    pub settings: HubSettings,
}

impl Hub {
    pub fn new(links: LinkGraph, settings: HubSettings) -> Self {
        Self {
            links,
            registry: ConnectionRegistry::new(),
            heartbeats: HeartbeatManager::new(),
            pulses: PulseDetector::new(settings.pulse_window, settings.consume_on_match),
            session_ids: SessionIdGenerator::new(),
            settings,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            LinkGraph::from_config(&config.links),
            HubSettings::from_config(config),
        )
    }

    /// Allocate a session handle and the receiving end of its outbound queue.
    pub fn open_session(&self) -> (SessionHandle, mpsc::Receiver<Arc<ServerMessage>>) {
        let (tx, rx) = mpsc::channel(self.settings.send_queue.max(1));
        let handle = SessionHandle::new(self.session_ids.next(), tx, CancellationToken::new());
        (handle, rx)
    }

    /// Register an identified session.
    ///
    /// The heartbeat is initialized while the registry entry is held, so
    /// racing connects for one user cannot leave the registry and the
    /// heartbeat table pointing at different sessions. A previous session of
    /// the same user is closed and returned; it gets no offline notification
    /// since the user never went offline.
    pub fn connect(&self, id: UserId, handle: SessionHandle, now: Instant) -> Option<SessionHandle> {
        let session = handle.session;
        let displaced = self.registry.register_with(id.clone(), handle, || {
            self.heartbeats.start(id.clone(), session, now);
        });
        metrics::record_connection();
        metrics::set_connected_users(self.registry.len());

        if let Some(previous) = &displaced {
            info!(user = %id, old = previous.session, new = session, "Session replaced");
            previous.close(CloseReason::Replaced);
            metrics::record_eviction(CloseReason::Replaced.as_str());
        }
        displaced
    }

    /// Tell linked peers that `id` came online.
    pub fn announce(&self, id: &UserId) -> usize {
        presence::notify(self, id, Status::Online)
    }

    /// End `session` of `id` after its connection closed.
    ///
    /// Returns `true` if this call removed the registration and emitted the
    /// offline notification.
    pub fn disconnect(&self, id: &UserId, session: SessionId) -> bool {
        let removed = self.registry.unregister_session(id, session).is_some();
        self.heartbeats.remove_session(id, session);
        if !removed {
            return false;
        }
        metrics::set_connected_users(self.registry.len());
        presence::notify(self, id, Status::Offline);
        true
    }

    /// Evict `session` of `id` if its heartbeat is still stale at `now`.
    ///
    /// Closes the session's socket and emits the offline notification when
    /// this call won the removal.
    pub fn evict(&self, id: &UserId, session: SessionId, now: Instant) -> bool {
        if !self
            .heartbeats
            .remove_if_stale(id, session, now, self.settings.heartbeat_timeout)
        {
            return false;
        }
        let Some(handle) = self.registry.unregister_session(id, session) else {
            return false;
        };

        info!(user = %id, session, "Heartbeat timeout");
        handle.close(CloseReason::HeartbeatTimeout);
        metrics::record_eviction(CloseReason::HeartbeatTimeout.as_str());
        metrics::set_connected_users(self.registry.len());
        presence::notify(self, id, Status::Offline);
        true
    }

    /// Refresh liveness of `session`. Ignored once the session was replaced.
    pub fn heartbeat(&self, id: &UserId, session: SessionId, now: Instant) -> bool {
        self.heartbeats.touch(id, session, now)
    }

    /// Process a pulse from `session` of `sender` to `target`.
    ///
    /// Frames still in flight from a replaced session are ignored, like its
    /// heartbeats.
    pub fn pulse(
        &self,
        sender: &UserId,
        session: SessionId,
        target: &UserId,
        now: Instant,
    ) -> PulseResult {
        if !self.registry.owns(sender, session) {
            debug!(user = %sender, session, "Dropping pulse from a replaced session");
            metrics::record_pulse(PulseResult::Stale.as_str());
            return PulseResult::Stale;
        }
        if sender == target || !self.links.is_linked(sender, target) {
            debug!(user = %sender, target = %target, "Dropping pulse to unlinked target");
            metrics::record_pulse(PulseResult::Unlinked.as_str());
            return PulseResult::Unlinked;
        }

        let outcome = self.pulses.record(sender, target, now);
        match outcome {
            PulseOutcome::Double => {
                self.deliver(target, Arc::new(ServerMessage::double_pulse(sender.clone())));
                self.deliver(sender, Arc::new(ServerMessage::double_pulse(target.clone())));
            }
            PulseOutcome::Single => {
                self.deliver(target, Arc::new(ServerMessage::pulse(sender.clone())));
            }
        }
        metrics::record_pulse(outcome.as_str());
        outcome.into()
    }

    /// Evict stale sessions and prune expired pulse records.
    pub fn sweep(&self, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();
        for (id, session) in self
            .heartbeats
            .stale(now, self.settings.heartbeat_timeout)
        {
            if self.evict(&id, session, now) {
                report.evicted += 1;
            }
        }
        report.pruned = self.pulses.prune(now, self.settings.click_retention);
        metrics::set_click_pairs(self.pulses.len());
        report
    }

    /// Close every registered session. Returns how many were asked to close.
    pub fn shutdown(&self) -> usize {
        let handles = self.registry.all_handles();
        for handle in &handles {
            handle.close(CloseReason::Shutdown);
        }
        handles.len()
    }

    /// Best-effort delivery to `recipient`, logging and counting drops.
    pub fn deliver(&self, recipient: &UserId, message: Arc<ServerMessage>) -> DeliveryOutcome {
        let kind = message.kind();
        let outcome = self.registry.send(recipient, message);
        match outcome {
            DeliveryOutcome::Delivered | DeliveryOutcome::Offline => {}
            DeliveryOutcome::QueueFull => {
                warn!(user = %recipient, kind, "Outbound queue full, dropping message");
                metrics::record_dropped(outcome.as_str());
            }
            DeliveryOutcome::Closed => {
                debug!(user = %recipient, kind, "Recipient closing, dropping message");
                metrics::record_dropped(outcome.as_str());
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::links::graph;
    use crate::state::test_handle;
    use pulse_proto::ServerMessage as Msg;

    type Rx = mpsc::Receiver<Arc<ServerMessage>>;

    fn hub() -> Hub {
        Hub::new(
            graph(&[
                ("user1", &["user2", "user3"]),
                ("user2", &["user1"]),
                ("user3", &["user1"]),
                ("user4", &["user5"]),
            ]),
            HubSettings::default(),
        )
    }

    fn join(hub: &Hub, id: &str, now: Instant) -> (SessionHandle, Rx) {
        let (handle, rx) = hub.open_session();
        hub.connect(UserId::from(id), handle.clone(), now);
        hub.announce(&UserId::from(id));
        (handle, rx)
    }

    fn drain(rx: &mut Rx) -> Vec<Msg> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push((*msg).clone());
        }
        out
    }

    #[test]
    fn test_connect_announces_to_linked_peers() {
        let hub = hub();
        let t0 = Instant::now();
        let (_h2, mut rx2) = join(&hub, "user2", t0);
        let (_h1, mut rx1) = join(&hub, "user1", t0);

        assert_eq!(drain(&mut rx2), vec![Msg::status("user1", Status::Online)]);
        // user1 learns about user2 from the snapshot, not a fan-out.
        assert!(drain(&mut rx1).is_empty());
        assert!(presence::snapshot(&hub, &UserId::from("user1"))
            .contains(&Msg::status("user2", Status::Online)));
    }

    #[test]
    fn test_disconnect_notifies_exactly_once() {
        let hub = hub();
        let t0 = Instant::now();
        let (_h2, mut rx2) = join(&hub, "user2", t0);
        let (h1, _rx1) = join(&hub, "user1", t0);
        drain(&mut rx2);

        let user1 = UserId::from("user1");
        assert!(hub.disconnect(&user1, h1.session));
        assert!(!hub.disconnect(&user1, h1.session));
        assert!(!hub.evict(&user1, h1.session, t0 + Duration::from_secs(120)));

        assert_eq!(drain(&mut rx2), vec![Msg::status("user1", Status::Offline)]);
        assert!(!hub.registry.is_online("user1"));
        assert!(hub.heartbeats.get("user1").is_none());
    }

    #[test]
    fn test_sweep_evicts_stale_session_once() {
        let hub = hub();
        let t0 = Instant::now();
        let (h2, mut rx2) = join(&hub, "user2", t0 + Duration::from_secs(30));
        let (h1, _rx1) = join(&hub, "user1", t0);
        drain(&mut rx2);

        // user2 keeps heartbeating, user1 stays silent.
        let late = t0 + Duration::from_secs(61);
        hub.heartbeat(&UserId::from("user2"), h2.session, late);
        let report = hub.sweep(late);

        assert_eq!(report.evicted, 1);
        assert!(h1.is_closed());
        assert_eq!(h1.close_reason(), Some(CloseReason::HeartbeatTimeout));
        assert!(!hub.registry.is_online("user1"));
        assert!(hub.registry.is_online("user2"));

        // The connection task's own close path must not notify again.
        assert!(!hub.disconnect(&UserId::from("user1"), h1.session));
        assert_eq!(drain(&mut rx2), vec![Msg::status("user1", Status::Offline)]);
        assert_eq!(hub.sweep(late + Duration::from_secs(5)).evicted, 0);
    }

    #[test]
    fn test_eviction_deadline_is_timeout_plus_sweep() {
        let hub = hub();
        let t0 = Instant::now();
        let (h1, _rx1) = join(&hub, "user1", t0);
        let interval = hub.settings.sweep_interval;
        let timeout = hub.settings.heartbeat_timeout;

        let mut tick = t0;
        let mut evicted_at = None;
        while tick <= t0 + timeout + interval {
            if hub.sweep(tick).evicted > 0 {
                evicted_at = Some(tick);
                break;
            }
            tick += interval;
        }

        let evicted_at = evicted_at.expect("session was never evicted");
        assert!(evicted_at > t0 + timeout);
        assert!(evicted_at <= t0 + timeout + interval);
        assert!(h1.is_closed());
    }

    #[test]
    fn test_heartbeat_postpones_eviction() {
        let hub = hub();
        let t0 = Instant::now();
        let (h1, _rx1) = join(&hub, "user1", t0);
        let user1 = UserId::from("user1");

        assert!(hub.heartbeat(&user1, h1.session, t0 + Duration::from_secs(50)));
        assert_eq!(hub.sweep(t0 + Duration::from_secs(65)).evicted, 0);
        assert_eq!(hub.sweep(t0 + Duration::from_secs(111)).evicted, 1);
    }

    #[test]
    fn test_duplicate_identity_replaces_previous_session() {
        let hub = hub();
        let t0 = Instant::now();
        let (_h2, mut rx2) = join(&hub, "user2", t0);
        let (old, _rx_old) = join(&hub, "user1", t0);
        drain(&mut rx2);

        let (new, _rx_new) = hub.open_session();
        let displaced = hub.connect(UserId::from("user1"), new.clone(), t0);

        assert_eq!(displaced.map(|h| h.session), Some(old.session));
        assert!(old.is_closed());
        assert_eq!(old.close_reason(), Some(CloseReason::Replaced));
        assert_eq!(hub.registry.lookup("user1").map(|h| h.session), Some(new.session));

        // The replaced connection's cleanup must not take the user offline.
        assert!(!hub.disconnect(&UserId::from("user1"), old.session));
        assert!(hub.registry.is_online("user1"));
        assert!(drain(&mut rx2).is_empty());

        // Heartbeats from the replaced session are ignored.
        assert!(!hub.heartbeat(&UserId::from("user1"), old.session, t0));
        assert!(hub.heartbeat(&UserId::from("user1"), new.session, t0));
    }

    #[test]
    fn test_reciprocal_pulse_sends_double_to_both() {
        let hub = hub();
        let t0 = Instant::now();
        let (h1, mut rx1) = join(&hub, "user1", t0);
        let (h2, mut rx2) = join(&hub, "user2", t0);
        drain(&mut rx1);
        drain(&mut rx2);
        let (a, b) = (UserId::from("user1"), UserId::from("user2"));

        assert_eq!(hub.pulse(&a, h1.session, &b, t0), PulseResult::Single);
        assert_eq!(drain(&mut rx2), vec![Msg::pulse("user1")]);
        assert!(drain(&mut rx1).is_empty());

        assert_eq!(
            hub.pulse(&b, h2.session, &a, t0 + Duration::from_millis(200)),
            PulseResult::Double
        );
        assert_eq!(drain(&mut rx1), vec![Msg::double_pulse("user2")]);
        assert_eq!(drain(&mut rx2), vec![Msg::double_pulse("user1")]);
    }

    #[test]
    fn test_late_reciprocal_pulse_is_single() {
        let hub = hub();
        let t0 = Instant::now();
        let (h1, mut rx1) = join(&hub, "user1", t0);
        let (h2, mut rx2) = join(&hub, "user2", t0);
        drain(&mut rx1);
        drain(&mut rx2);
        let (a, b) = (UserId::from("user1"), UserId::from("user2"));

        hub.pulse(&a, h1.session, &b, t0);
        assert_eq!(
            hub.pulse(&b, h2.session, &a, t0 + Duration::from_millis(500)),
            PulseResult::Single
        );
        assert_eq!(drain(&mut rx1), vec![Msg::pulse("user2")]);
        assert_eq!(drain(&mut rx2), vec![Msg::pulse("user1")]);
    }

    #[test]
    fn test_pulse_to_unlinked_or_absent_target_is_silent() {
        let hub = hub();
        let t0 = Instant::now();
        let (h1, mut rx1) = join(&hub, "user1", t0);
        let (_h4, mut rx4) = join(&hub, "user4", t0);
        drain(&mut rx1);
        drain(&mut rx4);
        let user1 = UserId::from("user1");
        let s1 = h1.session;

        assert_eq!(
            hub.pulse(&user1, s1, &UserId::from("user4"), t0),
            PulseResult::Unlinked
        );
        assert_eq!(hub.pulse(&user1, s1, &user1, t0), PulseResult::Unlinked);
        assert_eq!(
            hub.pulse(&user1, s1, &UserId::from("nobody"), t0),
            PulseResult::Unlinked
        );
        // Linked but never connected.
        assert_eq!(
            hub.pulse(&user1, s1, &UserId::from("user3"), t0),
            PulseResult::Single
        );

        assert!(drain(&mut rx1).is_empty());
        assert!(drain(&mut rx4).is_empty());
    }

    #[test]
    fn test_sweep_prunes_old_clicks() {
        let hub = hub();
        let t0 = Instant::now();
        let (h1, _rx1) = join(&hub, "user1", t0);
        hub.pulse(&UserId::from("user1"), h1.session, &UserId::from("user2"), t0);
        assert_eq!(hub.pulses.len(), 1);

        let report = hub.sweep(t0 + hub.settings.click_retention + Duration::from_secs(1));
        assert_eq!(report.pruned, 1);
        assert!(hub.pulses.is_empty());
    }

    #[test]
    fn test_shutdown_closes_all_sessions() {
        let hub = hub();
        let t0 = Instant::now();
        let (h1, _rx1) = join(&hub, "user1", t0);
        let (h2, _rx2) = join(&hub, "user2", t0);

        assert_eq!(hub.shutdown(), 2);
        assert_eq!(h1.close_reason(), Some(CloseReason::Shutdown));
        assert_eq!(h2.close_reason(), Some(CloseReason::Shutdown));
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config::default();
        let settings = HubSettings::from_config(&config);
        assert_eq!(settings.heartbeat_timeout, Duration::from_secs(60));
        assert_eq!(settings.sweep_interval, Duration::from_secs(5));
        assert_eq!(settings.pulse_window, Duration::from_millis(300));
        assert!(settings.consume_on_match);
    }

    #[test]
    fn test_full_cycle_leaves_tables_empty() {
        let hub = hub();
        let (handle, _rx) = test_handle(99, 1);
        hub.connect(UserId::from("user9"), handle, Instant::now());
        assert!(hub.disconnect(&UserId::from("user9"), 99));
        assert!(hub.registry.is_empty());
        assert!(hub.heartbeats.is_empty());
    }

    #[test]
    fn test_pulse_from_replaced_session_is_stale() {
        let hub = hub();
        let t0 = Instant::now();
        let (_h2, mut rx2) = join(&hub, "user2", t0);
        let (old, _rx_old) = join(&hub, "user1", t0);
        let (new, _rx_new) = join(&hub, "user1", t0);
        drain(&mut rx2);
        let (a, b) = (UserId::from("user1"), UserId::from("user2"));

        assert_eq!(hub.pulse(&a, old.session, &b, t0), PulseResult::Stale);
        assert!(drain(&mut rx2).is_empty());
        assert!(hub.pulses.is_empty());

        assert_eq!(hub.pulse(&a, new.session, &b, t0), PulseResult::Single);
        assert_eq!(drain(&mut rx2), vec![Msg::pulse("user1")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_connects_keep_heartbeat_with_registered_session() {
        let hub = Arc::new(hub());
        let t0 = Instant::now();
        let user1 = UserId::from("user1");

        for _ in 0..100 {
            let tasks: Vec<_> = (0..8)
                .map(|i| {
                    let hub = Arc::clone(&hub);
                    let id = user1.clone();
                    tokio::spawn(async move {
                        let (handle, _rx) = hub.open_session();
                        hub.connect(id.clone(), handle.clone(), t0);
                        if i % 2 == 0 {
                            hub.disconnect(&id, handle.session);
                        }
                    })
                })
                .collect();
            for task in tasks {
                task.await.unwrap();
            }

            if let Some(handle) = hub.registry.lookup("user1") {
                assert_eq!(
                    hub.heartbeats.get("user1").map(|b| b.session),
                    Some(handle.session)
                );
            }
        }

        // Whoever is left registered can still be evicted.
        let online = hub.registry.is_online("user1");
        let report = hub.sweep(t0 + Duration::from_secs(3600));
        assert_eq!(report.evicted, usize::from(online));
        assert!(hub.registry.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sweep_racing_disconnect_notifies_once() {
        let hub = Arc::new(hub());
        let t0 = Instant::now();
        let (_h2, mut rx2) = join(&hub, "user2", t0 + Duration::from_secs(3600));
        let late = t0 + hub.settings.heartbeat_timeout + Duration::from_secs(1);

        for _ in 0..100 {
            let (h1, _rx1) = join(&hub, "user1", t0);
            drain(&mut rx2);

            let sweeper = {
                let hub = Arc::clone(&hub);
                tokio::spawn(async move { hub.sweep(late).evicted })
            };
            let closer = {
                let hub = Arc::clone(&hub);
                let session = h1.session;
                tokio::spawn(async move { hub.disconnect(&UserId::from("user1"), session) })
            };
            let evicted = sweeper.await.unwrap();
            let disconnected = closer.await.unwrap();

            assert_eq!(evicted + usize::from(disconnected), 1);
            assert_eq!(drain(&mut rx2), vec![Msg::status("user1", Status::Offline)]);
            assert!(hub.registry.lookup("user1").is_none());
            assert!(hub.heartbeats.get("user1").is_none());
        }
    }
}
