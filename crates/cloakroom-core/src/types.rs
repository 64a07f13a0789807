//! Strong type definitions for Cloakroom.
//!
//! Space and session identifiers are newtypes over strings so that a
//! passphrase or a free-form label can never be passed where an id belongs.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// Number of random bytes in a generated session id (128 bits).
pub const SESSION_ID_BYTES: usize = 16;

/// Identifier of a space, handed to us by the storage collaborator.
///
/// Opaque to the core. The only requirement is that it is non-empty.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SpaceId(String);

impl SpaceId {
    /// Create a space id, rejecting the empty string.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(CoreError::InvalidIdentifier("space id is empty".into()));
        }
        Ok(Self(id))
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpaceId({})", self.0)
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SpaceId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for SpaceId {
    type Error = CoreError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SpaceId> for String {
    fn from(id: SpaceId) -> Self {
        id.0
    }
}

impl AsRef<str> for SpaceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of one client instance's participation in a space.
///
/// Locally generated ids are 128 random bits, hex encoded. Ids received from
/// peers are accepted as-is as long as they are non-empty. Ordering is plain
/// lexicographic byte order, which is what the session key derivation sorts by.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Create a session id from an existing token.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(CoreError::InvalidIdentifier("session id is empty".into()));
        }
        Ok(Self(id))
    }

    /// Generate a fresh random session id.
    ///
    /// Never derived from a passphrase or any other secret.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.0.get(..8).unwrap_or(&self.0);
        write!(f, "SessionId({short})")
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for SessionId {
    type Error = CoreError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_id_rejects_empty() {
        assert!(SpaceId::new("").is_err());
        assert_eq!(SpaceId::new("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_session_id_generate_is_random_hex() {
        let a = SessionId::generate();
        let b = SessionId::generate();

        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), SESSION_ID_BYTES * 2);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_session_id_ordering_is_lexicographic() {
        let s1 = SessionId::new("s1").unwrap();
        let s10 = SessionId::new("s10").unwrap();
        let s2 = SessionId::new("s2").unwrap();

        let mut ids = vec![s2.clone(), s10.clone(), s1.clone()];
        ids.sort();
        assert_eq!(ids, vec![s1, s10, s2]);
    }

    #[test]
    fn test_session_id_debug_is_truncated() {
        let id = SessionId::new("0123456789abcdef").unwrap();
        assert_eq!(format!("{:?}", id), "SessionId(01234567)");

        let short = SessionId::new("s1").unwrap();
        assert_eq!(format!("{:?}", short), "SessionId(s1)");
    }

    #[test]
    fn test_ids_deserialize_with_validation() {
        let id: SpaceId = serde_json::from_str("\"lobby\"").unwrap();
        assert_eq!(id.as_str(), "lobby");

        assert!(serde_json::from_str::<SpaceId>("\"\"").is_err());
        assert!(serde_json::from_str::<SessionId>("\"\"").is_err());
    }
}
