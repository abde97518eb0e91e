//! Identity handshake.
//!
//! The first frame on a new connection is the raw user id, with no JSON
//! envelope and no credentials.

use crate::error::Result;
use crate::user_id::UserId;

/// Parse the first frame of a connection into a [`UserId`].
///
/// Surrounding whitespace (including a trailing CRLF from line-oriented
/// clients) is stripped before validation.
///
/// ```
/// use pulse_proto::parse_handshake;
///
/// assert_eq!(parse_handshake("user1\r\n").unwrap().as_str(), "user1");
/// assert!(parse_handshake("   ").is_err());
/// ```
pub fn parse_handshake(frame: &str) -> Result<UserId> {
    UserId::parse(frame.trim())
}
