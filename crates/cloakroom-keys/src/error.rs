//! Error types for the keys module.

use cloakroom_core::SpaceId;
use thiserror::Error;

/// Errors that can occur while managing key material.
#[derive(Debug, Error)]
pub enum KeysError {
    /// No key material exists for the space.
    #[error("no key material for space {0}")]
    UnknownSpace(SpaceId),

    /// A different deterministic key was offered for a space that already has one.
    #[error("conflicting deterministic key for space {0}")]
    DeterministicKeyConflict(SpaceId),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] cloakroom_core::CoreError),
}

/// Result type for key operations.
pub type Result<T> = std::result::Result<T, KeysError>;
