//! Session identifiers and connection handles.

use parking_lot::Mutex;
use pulse_proto::ServerMessage;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Identifier of one accepted connection.
///
/// A user that reconnects gets a new session, which lets every removal path
/// check that it still owns the registry entry it is about to remove.
pub type SessionId = u64;

/// Generates unique, monotonically increasing session ids.
pub struct SessionIdGenerator {
    counter: AtomicU64,
}

impl SessionIdGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    /// Generate the next session id.
    pub fn next(&self) -> SessionId {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for SessionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Why the hub closed a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// A newer connection registered the same user id.
    Replaced,
    /// No heartbeat within the timeout.
    HeartbeatTimeout,
    /// The hub is shutting down.
    Shutdown,
}

impl CloseReason {
    /// Static label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replaced => "replaced",
            Self::HeartbeatTimeout => "heartbeat_timeout",
            Self::Shutdown => "shutdown",
        }
    }

    /// Human readable text sent in the WebSocket close frame.
    pub fn close_text(&self) -> &'static str {
        match self {
            Self::Replaced => "session replaced",
            Self::HeartbeatTimeout => "heartbeat timeout",
            Self::Shutdown => "server shutting down",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a best-effort delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Queued on the recipient's outbound channel.
    Delivered,
    /// The recipient has no registered session.
    Offline,
    /// The recipient's outbound queue is full; the message was dropped.
    QueueFull,
    /// The recipient's connection task is gone; the message was dropped.
    Closed,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Static label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Offline => "offline",
            Self::QueueFull => "queue_full",
            Self::Closed => "closed",
        }
    }
}

/// Handle to a live connection, owned by the registry entry of its user.
///
/// Cloning is cheap; all clones refer to the same connection.
#[derive(Clone)]
pub struct SessionHandle {
    pub session: SessionId,
    pub connected_at: Instant,
    sender: mpsc::Sender<Arc<ServerMessage>>,
    closer: CancellationToken,
    close_reason: Arc<Mutex<Option<CloseReason>>>,
}

impl SessionHandle {
    pub fn new(
        session: SessionId,
        sender: mpsc::Sender<Arc<ServerMessage>>,
        closer: CancellationToken,
    ) -> Self {
        Self {
            session,
            connected_at: Instant::now(),
            sender,
            closer,
            close_reason: Arc::new(Mutex::new(None)),
        }
    }

    /// Queue a message without waiting.
    ///
    /// A full or closed queue drops the message; slow peers never stall the
    /// sender.
    pub fn deliver(&self, message: Arc<ServerMessage>) -> DeliveryOutcome {
        match self.sender.try_send(message) {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(TrySendError::Full(_)) => DeliveryOutcome::QueueFull,
            Err(TrySendError::Closed(_)) => DeliveryOutcome::Closed,
        }
    }

    /// Ask the connection task to close. The first reason wins.
    pub fn close(&self, reason: CloseReason) {
        {
            let mut slot = self.close_reason.lock();
            if slot.is_none() {
                *slot = Some(reason);
            }
        }
        self.closer.cancel();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closer.is_cancelled()
    }

    /// The reason passed to the first [`close`](Self::close) call.
    pub fn close_reason(&self) -> Option<CloseReason> {
        *self.close_reason.lock()
    }

    /// Token cancelled when the hub closes this session.
    pub fn closed_token(&self) -> &CancellationToken {
        &self.closer
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session", &self.session)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn test_handle(
    session: SessionId,
    capacity: usize,
) -> (SessionHandle, mpsc::Receiver<Arc<ServerMessage>>) {
    let (tx, rx) = mpsc::channel(capacity);
    (SessionHandle::new(session, tx, CancellationToken::new()), rx)
}
