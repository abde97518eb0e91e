//! Error handling utilities for connection management.
//!
//! Classifies transport errors and maps the ways a session can end onto
//! WebSocket close frames.

use crate::error::HandlerError;
use crate::state::CloseReason;
use pulse_proto::{ProtocolError, TransportReadError};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// Classification of transport read errors for appropriate handling.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum ReadErrorAction {
    /// A single bad frame; drop it and keep the connection.
    Malformed,
    /// The connection cannot continue (broken socket or oversized frame).
    Disconnect,
}

/// Classify a transport read error into an actionable category.
pub(super) fn classify_read_error(e: &TransportReadError) -> ReadErrorAction {
    match e {
        TransportReadError::Protocol(proto_err) if proto_err.is_recoverable() => {
            ReadErrorAction::Malformed
        }
        _ => ReadErrorAction::Disconnect,
    }
}

/// Close frame sent when the hub ends a session.
pub(super) fn close_frame_for_reason(reason: CloseReason) -> (CloseCode, &'static str) {
    let code = match reason {
        CloseReason::Replaced => CloseCode::Library(4001),
        CloseReason::HeartbeatTimeout => CloseCode::Library(4002),
        CloseReason::Shutdown => CloseCode::Away,
    };
    (code, reason.close_text())
}

/// Close frame sent after a handler error, if the peer can still receive one.
pub(super) fn close_frame_for_error(error: &HandlerError) -> Option<(CloseCode, &'static str)> {
    if error.is_disconnect() {
        return None;
    }
    Some(match error {
        HandlerError::InvalidHandshake(_) => (CloseCode::Policy, "invalid user id"),
        HandlerError::HandshakeTimeout => (CloseCode::Policy, "handshake timeout"),
        HandlerError::TooManyMalformed(_) => (CloseCode::Policy, "too many malformed frames"),
        HandlerError::Transport(TransportReadError::Protocol(ProtocolError::FrameTooLong {
            ..
        })) => (CloseCode::Protocol, "frame too long"),
        _ => (CloseCode::Protocol, "protocol error"),
    })
}
