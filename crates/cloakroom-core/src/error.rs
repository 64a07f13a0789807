//! Error types for Cloakroom Core.

use thiserror::Error;

/// Core errors that can occur while deriving keys or sealing payloads.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The passphrase was missing or the derivation could not run.
    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),

    /// The AEAD refused to encrypt (bad key length, oversize input).
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Authentication tag mismatch: wrong key, wrong IV or tampered data.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Structural violation in an envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// An identifier was empty or otherwise unusable.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
