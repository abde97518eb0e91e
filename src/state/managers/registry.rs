//! Connection registry.
//!
//! This module contains the `ConnectionRegistry`, the single source of truth
//! for which users are online and where to deliver their messages.

use crate::state::dashmap_ext::DashMapExt;
use crate::state::session::{DeliveryOutcome, SessionHandle, SessionId};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use pulse_proto::{ServerMessage, UserId};
use std::sync::Arc;

/// Maps each online user to exactly one live session.
///
/// Registration overwrites; removal by session id is a compare-and-remove so
/// that a stale close path can never unregister a newer connection.
pub struct ConnectionRegistry {
    sessions: DashMap<UserId, SessionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Install `handle` for `id`, returning the handle it displaced.
    ///
    /// The displaced handle is not closed here; that is the caller's call.
    pub fn register(&self, id: UserId, handle: SessionHandle) -> Option<SessionHandle> {
        self.sessions.insert(id, handle)
    }

    /// Like [`register`](Self::register), but runs `install` while holding
    /// the entry for `id`.
    ///
    /// Concurrent registrations of one id are serialized, so whatever
    /// `install` writes elsewhere always belongs to the session that ends up
    /// registered. `install` must not touch this registry.
    pub fn register_with<F>(
        &self,
        id: UserId,
        handle: SessionHandle,
        install: F,
    ) -> Option<SessionHandle>
    where
        F: FnOnce(),
    {
        match self.sessions.entry(id) {
            Entry::Occupied(mut entry) => {
                install();
                Some(entry.insert(handle))
            }
            Entry::Vacant(entry) => {
                install();
                entry.insert(handle);
                None
            }
        }
    }

    /// Whether `session` is the one registered for `id`.
    pub fn owns(&self, id: &str, session: SessionId) -> bool {
        self.sessions
            .get(id)
            .is_some_and(|handle| handle.session == session)
    }

    /// Remove the entry for `id` whatever session owns it.
    pub fn unregister(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.remove(id).map(|(_, handle)| handle)
    }

    /// Remove the entry for `id` only if it still belongs to `session`.
    pub fn unregister_session(&self, id: &str, session: SessionId) -> Option<SessionHandle> {
        self.sessions
            .remove_if(id, |_, handle| handle.session == session)
            .map(|(_, handle)| handle)
    }

    pub fn lookup(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.get_cloned(id)
    }

    pub fn is_online(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Snapshot of every registered user id.
    pub fn all_ids(&self) -> Vec<UserId> {
        self.sessions.keys_cloned()
    }

    /// Snapshot of every registered handle.
    pub fn all_handles(&self) -> Vec<SessionHandle> {
        self.sessions.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Best-effort, non-blocking delivery to the session registered for `id`.
    pub fn send(&self, id: &str, message: Arc<ServerMessage>) -> DeliveryOutcome {
        match self.sessions.get(id) {
            Some(handle) => handle.deliver(message),
            None => DeliveryOutcome::Offline,
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
