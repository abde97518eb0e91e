//! Error types for the pulse wire protocol.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Top-level protocol errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The handshake frame was empty (or only whitespace).
    #[error("empty user id")]
    EmptyUserId,

    /// The handshake frame exceeded the user id length limit.
    #[error("user id too long: {actual} bytes (limit: {limit})")]
    UserIdTooLong {
        /// Actual length in bytes.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// A user id contained a control character.
    #[error("illegal control character in user id: {0:?}")]
    IllegalControlChar(char),

    /// A text frame could not be decoded into a known message.
    #[error("invalid message: {cause} (input: {string:?})")]
    InvalidMessage {
        /// The offending frame.
        string: String,
        /// The underlying JSON error.
        #[source]
        cause: serde_json::Error,
    },

    /// A message could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// A frame exceeded the configured size limit.
    #[error("frame too long: {actual} bytes (limit: {limit})")]
    FrameTooLong {
        /// Actual length in bytes.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },
}

impl ProtocolError {
    /// Whether the error concerns a single frame and the connection may continue.
    ///
    /// An oversized frame is not recoverable: the rest of it is never read,
    /// so the stream cannot be resynchronized.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidMessage { .. })
    }
}
