//! Error types for the sync module.

use cloakroom_core::SpaceId;
use thiserror::Error;

/// Errors that can occur while relaying messages.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Message validation or decoding failed.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Transport-level error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Publishing to a space this peer has not subscribed to.
    #[error("not subscribed to space {0}")]
    NotSubscribed(SpaceId),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] cloakroom_core::CoreError),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
