//! Symmetric authenticated encryption.
//!
//! Every layer of an envelope is a 256-bit key, a 96-bit random IV and a
//! 128-bit authentication tag appended to the ciphertext. Two AEADs fit that
//! shape and both are accepted: ChaCha20-Poly1305 (the default) and
//! AES-256-GCM.

use aes_gcm::Aes256Gcm;
use chacha20poly1305::{
    aead::{self, Aead, KeyInit},
    ChaCha20Poly1305,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CoreError, Result};

/// Symmetric key length in bytes.
pub const KEY_LEN: usize = 32;

/// IV length in bytes.
pub const NONCE_LEN: usize = 12;

/// Authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// AEAD algorithm carried by each envelope layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// ChaCha20-Poly1305 with a 256-bit key.
    #[default]
    #[serde(rename = "ChaCha20-Poly1305")]
    ChaCha20Poly1305,

    /// AES-256 in Galois/Counter Mode.
    #[serde(rename = "AES-256-GCM")]
    Aes256Gcm,
}

impl Algorithm {
    /// Wire name of the algorithm.
    pub const fn name(&self) -> &'static str {
        match self {
            Algorithm::ChaCha20Poly1305 => "ChaCha20-Poly1305",
            Algorithm::Aes256Gcm => "AES-256-GCM",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A 256-bit symmetric key.
///
/// Wiped from memory when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Encrypt data with this key.
    pub fn encrypt(
        &self,
        algorithm: Algorithm,
        plaintext: &[u8],
        nonce: &EncryptionNonce,
    ) -> Result<Vec<u8>> {
        match algorithm {
            Algorithm::ChaCha20Poly1305 => seal_with::<ChaCha20Poly1305>(&self.0, nonce, plaintext),
            Algorithm::Aes256Gcm => seal_with::<Aes256Gcm>(&self.0, nonce, plaintext),
        }
    }

    /// Decrypt data with this key.
    ///
    /// Any tag mismatch surfaces as [`CoreError::AuthenticationFailed`]; no
    /// partial plaintext is ever returned.
    pub fn decrypt(
        &self,
        algorithm: Algorithm,
        ciphertext: &[u8],
        nonce: &EncryptionNonce,
    ) -> Result<Vec<u8>> {
        match algorithm {
            Algorithm::ChaCha20Poly1305 => open_with::<ChaCha20Poly1305>(&self.0, nonce, ciphertext),
            Algorithm::Aes256Gcm => open_with::<Aes256Gcm>(&self.0, nonce, ciphertext),
        }
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

fn seal_with<C: Aead + KeyInit>(
    key: &[u8; KEY_LEN],
    nonce: &EncryptionNonce,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let cipher =
        C::new_from_slice(key).map_err(|e| CoreError::EncryptionFailed(e.to_string()))?;
    cipher
        .encrypt(aead::Nonce::<C>::from_slice(&nonce.0), plaintext)
        .map_err(|e| CoreError::EncryptionFailed(e.to_string()))
}

fn open_with<C: Aead + KeyInit>(
    key: &[u8; KEY_LEN],
    nonce: &EncryptionNonce,
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let cipher = C::new_from_slice(key).map_err(|_| CoreError::AuthenticationFailed)?;
    cipher
        .decrypt(aead::Nonce::<C>::from_slice(&nonce.0), ciphertext)
        .map_err(|_| CoreError::AuthenticationFailed)
}

/// A 96-bit IV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncryptionNonce(pub [u8; NONCE_LEN]);

impl EncryptionNonce {
    /// Generate a new random IV.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

impl TryFrom<&[u8]> for EncryptionNonce {
    type Error = CoreError;

    fn try_from(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; NONCE_LEN] = slice.try_into().map_err(|_| {
            CoreError::MalformedEnvelope(format!(
                "iv must be {NONCE_LEN} bytes, got {}",
                slice.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}
