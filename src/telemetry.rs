//! Telemetry utilities for frame timing and span construction.

use std::time::Instant;

/// Guard for timing inbound frame processing and recording metrics.
///
/// Records frame latency when dropped.
pub struct FrameTimer {
    kind: &'static str,
    start: Instant,
}

impl FrameTimer {
    /// Start timing a frame of the given message type.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            start: Instant::now(),
        }
    }
}

impl Drop for FrameTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_frame(self.kind, duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use std::net::SocketAddr;
    use tracing::{Span, info_span};

    /// Span for a connection before its identity is known.
    pub fn handshake(session: u64, addr: &SocketAddr) -> Span {
        info_span!("handshake", session, addr = %addr)
    }

    /// Span for an identified client connection.
    pub fn connection(user: &str, session: u64, addr: &SocketAddr) -> Span {
        info_span!("connection", user = %user, session, addr = %addr)
    }

    /// Span for one heartbeat sweep.
    pub fn sweep() -> Span {
        tracing::debug_span!("sweep")
    }
}
