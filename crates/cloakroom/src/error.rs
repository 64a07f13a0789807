//! Error types for the cipher and the client.

use cloakroom_core::{CoreError, SpaceId};
use cloakroom_keys::KeysError;
use cloakroom_session::SessionError;
use cloakroom_sync::SyncError;
use thiserror::Error;

/// Per-message failures of the hybrid cipher.
///
/// None of these tear down a session or touch cached key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    /// The deterministic key could not be produced.
    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),

    /// The AEAD refused to seal.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Every decryption path was rejected.
    #[error("decryption failed")]
    DecryptionFailed,

    /// The envelope is structurally invalid or an error marker.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Nothing is known about the space's roster.
    #[error("roster unavailable for space {0}")]
    RosterUnavailable(SpaceId),
}

impl From<CoreError> for CipherError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::KeyDerivationFailed(msg) => CipherError::KeyDerivationFailed(msg),
            CoreError::EncryptionFailed(msg) => CipherError::EncryptionFailed(msg),
            CoreError::AuthenticationFailed => CipherError::DecryptionFailed,
            CoreError::MalformedEnvelope(msg) | CoreError::InvalidIdentifier(msg) => {
                CipherError::MalformedEnvelope(msg)
            }
        }
    }
}

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Cipher error.
    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),

    /// Session tracking error.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Key store error.
    #[error("key error: {0}")]
    Keys(#[from] KeysError),

    /// Transport error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Re-entering a space with a passphrase other than the one in use.
    #[error("passphrase does not match the one in use for space {0}")]
    PassphraseMismatch(SpaceId),

    /// The client holds no active session in the space.
    #[error("not in space {0}")]
    NotInSpace(SpaceId),

    /// Configuration rejected by [`crate::ClientConfig::validate`].
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
