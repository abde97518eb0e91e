//! Tagged JSON messages exchanged after the handshake.
//!
//! Both directions use an internally tagged representation
//! (`{"type": "...", ...}`). Unknown fields are ignored; an unknown `type`
//! is a decode error.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::user_id::UserId;

/// Presence status of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The user has an active connection.
    Online,
    /// The user has no active connection.
    Offline,
}

impl Status {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Messages sent by a client after the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Liveness refresh.
    Heartbeat,
    /// Pulse a linked peer.
    PulseClick {
        /// The peer being pulsed.
        target: UserId,
    },
}

impl ClientMessage {
    /// Decode a client message from a text frame.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|cause| ProtocolError::InvalidMessage {
            string: text.to_string(),
            cause,
        })
    }

    /// Encode the message as a JSON text frame.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::PulseClick { .. } => "pulse_click",
        }
    }
}

/// Messages pushed by the hub to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A linked peer changed presence.
    StatusUpdate {
        /// The peer whose status changed.
        user: UserId,
        /// Its new status.
        status: Status,
    },
    /// A linked peer pulsed this client.
    PulseClick {
        /// The peer that pulsed.
        from: UserId,
    },
    /// This client and a linked peer pulsed each other within the window.
    DoublePulse {
        /// The peer this client reciprocated with.
        from: UserId,
    },
}

impl ServerMessage {
    /// Build a `status_update`.
    pub fn status(user: impl Into<UserId>, status: Status) -> Self {
        Self::StatusUpdate {
            user: user.into(),
            status,
        }
    }

    /// Build a single `pulse_click` notification.
    pub fn pulse(from: impl Into<UserId>) -> Self {
        Self::PulseClick { from: from.into() }
    }

    /// Build a `double_pulse` notification.
    pub fn double_pulse(from: impl Into<UserId>) -> Self {
        Self::DoublePulse { from: from.into() }
    }

    /// Encode the message as a JSON text frame.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Decode a server message from a text frame.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|cause| ProtocolError::InvalidMessage {
            string: text.to_string(),
            cause,
        })
    }

    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StatusUpdate { .. } => "status_update",
            Self::PulseClick { .. } => "pulse_click",
            Self::DoublePulse { .. } => "double_pulse",
        }
    }
}
