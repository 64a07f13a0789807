//! Error types for the session module.

use cloakroom_core::SpaceId;
use thiserror::Error;

/// Errors that can occur while tracking sessions and rosters.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Nothing is known about the space's roster yet.
    #[error("roster unavailable for space {0}")]
    RosterUnavailable(SpaceId),

    /// The roster feed was dropped by the receiving side.
    #[error("roster feed closed")]
    FeedClosed,

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] cloakroom_core::CoreError),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
