//! Unified error handling for pulsehub.
//!
//! This module provides the error type for connection handling, with
//! automatic conversions from the protocol layer and metric labeling.

use pulse_proto::{ProtocolError, TransportReadError};
use thiserror::Error;

// ============================================================================
// Handler Errors (connection processing)
// ============================================================================

/// Errors that can occur while serving one connection.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid handshake: {0}")]
    InvalidHandshake(#[source] ProtocolError),

    #[error("no user id received before the handshake timeout")]
    HandshakeTimeout,

    #[error("connection closed before the handshake")]
    ClosedBeforeHandshake,

    #[error("too many malformed frames ({0} in a row)")]
    TooManyMalformed(u32),

    #[error("transport error: {0}")]
    Transport(#[from] TransportReadError),

    #[error("write error: {0}")]
    Io(#[from] std::io::Error),
}

impl HandlerError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidHandshake(_) => "invalid_handshake",
            Self::HandshakeTimeout => "handshake_timeout",
            Self::ClosedBeforeHandshake => "closed_before_handshake",
            Self::TooManyMalformed(_) => "too_many_malformed",
            Self::Transport(TransportReadError::Protocol(ProtocolError::FrameTooLong { .. })) => {
                "frame_too_long"
            }
            Self::Transport(_) => "transport_error",
            Self::Io(_) => "io_error",
        }
    }

    /// Whether the peer already went away, so no close frame can be sent.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::ClosedBeforeHandshake | Self::Transport(TransportReadError::Io(_)) | Self::Io(_)
        )
    }
}

/// Result type for connection handlers.
pub type HandlerResult<T = ()> = Result<T, HandlerError>;
