//! User identifiers.
//!
//! A [`UserId`] is an opaque string compared byte-for-byte. The hub performs
//! no identity verification; the only rules are the ones needed to keep
//! the identifier printable and bounded.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Maximum length of a user id in bytes.
pub const MAX_USER_ID_LEN: usize = 128;

/// Opaque user identifier, the primary key of every hub table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Validate and wrap an identifier.
    ///
    /// Fails on empty input, input longer than [`MAX_USER_ID_LEN`], or input
    /// containing control characters. No trimming is performed here.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(ProtocolError::EmptyUserId);
        }
        if raw.len() > MAX_USER_ID_LEN {
            return Err(ProtocolError::UserIdTooLong {
                actual: raw.len(),
                limit: MAX_USER_ID_LEN,
            });
        }
        if let Some(c) = raw.chars().find(|c| c.is_control()) {
            return Err(ProtocolError::IllegalControlChar(c));
        }
        Ok(Self(raw.to_string()))
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for UserId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for UserId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Unchecked conversions for identifiers that come from trusted sources
// (configuration, tests). Wire input goes through `UserId::parse`.
impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
