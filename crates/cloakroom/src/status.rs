//! Status signals for the UI layer.

use std::fmt;

use cloakroom_core::{SessionId, SpaceId};

/// Strength of protection new messages in a space will get.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncryptionLevel {
    /// Only the passphrase-derived key.
    Deterministic,
    /// Session key over the passphrase-derived key.
    Hybrid,
}

impl EncryptionLevel {
    /// The level a roster of `active_sessions` produces.
    pub const fn for_session_count(active_sessions: usize) -> Self {
        if active_sessions > 1 {
            EncryptionLevel::Hybrid
        } else {
            EncryptionLevel::Deterministic
        }
    }

    /// Wire name of the level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            EncryptionLevel::Deterministic => "deterministic",
            EncryptionLevel::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for EncryptionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a space as seen by this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceStatus {
    /// The space.
    pub space_id: SpaceId,
    /// Our session, if we are in the space.
    pub session_id: Option<SessionId>,
    /// Best-known number of active sessions, own included.
    pub active_sessions: usize,
    /// Level the next outgoing message will get.
    pub level: EncryptionLevel,
}
