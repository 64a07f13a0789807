//! The hybrid cipher.
//!
//! Every message is first sealed under the space's deterministic key. When
//! more than one session is present, that ciphertext is sealed a second time
//! under a session key derived from the sorted roster, and the inner layer
//! is kept alongside as a fallback:
//!
//! ```text
//! det      = AEAD(deterministic_key, iv_1, plaintext)
//! |roster| <= 1  ->  Deterministic { det }
//! |roster| >  1  ->  Hybrid { AEAD(session_key, iv_2, det.ciphertext),
//!                             participants = sorted(roster),
//!                             fallback = det }
//! ```
//!
//! Any holder of the passphrase can always decrypt through the fallback, even
//! after the roster has changed.

use cloakroom_core::{
    derive_session_key, Algorithm, EncryptedEnvelope, EncryptionKey, HybridPayload, SealedPayload,
    SpaceId,
};
use cloakroom_session::Roster;

use crate::error::CipherError;

/// Result type for cipher operations.
pub type Result<T> = std::result::Result<T, CipherError>;

/// Which path produced the plaintext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecryptPath {
    /// A deterministic envelope, opened with the deterministic key.
    Deterministic,
    /// A hybrid envelope, unwrapped with the session key.
    SessionKey,
    /// A hybrid envelope, opened through its fallback layer.
    Fallback,
}

impl DecryptPath {
    /// Short name for logging.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DecryptPath::Deterministic => "deterministic",
            DecryptPath::SessionKey => "session_key",
            DecryptPath::Fallback => "fallback",
        }
    }
}

/// A successfully decrypted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    /// The recovered plaintext.
    pub plaintext: Vec<u8>,
    /// How it was recovered.
    pub path: DecryptPath,
}

impl Decrypted {
    /// The plaintext as UTF-8.
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.plaintext)
            .map_err(|e| CipherError::MalformedEnvelope(format!("plaintext is not UTF-8: {e}")))
    }

    /// Consume into a UTF-8 string.
    pub fn into_text(self) -> Result<String> {
        String::from_utf8(self.plaintext)
            .map_err(|e| CipherError::MalformedEnvelope(format!("plaintext is not UTF-8: {e}")))
    }
}

/// Seals and opens envelopes.
///
/// Holds no keys and no roster: callers resolve both and pass them in, so the
/// same cipher serves every space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HybridCipher {
    algorithm: Algorithm,
}

impl HybridCipher {
    /// Create a cipher sealing with `algorithm`.
    ///
    /// Opening always follows the algorithm carried by each layer.
    pub const fn new(algorithm: Algorithm) -> Self {
        Self { algorithm }
    }

    /// The algorithm new envelopes are sealed with.
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Encrypt `plaintext` for `space_id`.
    ///
    /// `roster` is the own-inclusive snapshot at the time of sending. An empty
    /// or single-member roster produces a deterministic envelope.
    pub fn seal(
        &self,
        plaintext: &[u8],
        space_id: &SpaceId,
        deterministic_key: &EncryptionKey,
        roster: &Roster,
    ) -> Result<EncryptedEnvelope> {
        let inner = SealedPayload::seal(plaintext, deterministic_key, self.algorithm)?;

        if !roster.is_multi_party() {
            tracing::debug!(space = %space_id, "sealed deterministic envelope");
            return Ok(EncryptedEnvelope::Deterministic(inner));
        }

        let session_key = derive_session_key(space_id, roster);
        let outer = SealedPayload::seal(&inner.ciphertext, &session_key, self.algorithm)?;

        let envelope = EncryptedEnvelope::Hybrid(HybridPayload {
            algorithm: outer.algorithm,
            ciphertext: outer.ciphertext,
            iv: outer.iv,
            session_participants: roster.to_sorted_vec(),
            fallback: inner,
        });
        envelope.validate()?;

        tracing::debug!(
            space = %space_id,
            participants = roster.len(),
            "sealed hybrid envelope"
        );
        Ok(envelope)
    }

    /// Decrypt `envelope` received in `space_id`.
    ///
    /// For hybrid envelopes the session key comes from `roster`, the
    /// receiver's current view; if that view is empty the participants named
    /// in the envelope are used instead. Any failure on the session-key path
    /// falls through to the fallback layer.
    pub fn open(
        &self,
        envelope: &EncryptedEnvelope,
        space_id: &SpaceId,
        deterministic_key: &EncryptionKey,
        roster: &Roster,
    ) -> Result<Decrypted> {
        envelope.validate()?;

        match envelope {
            EncryptedEnvelope::Deterministic(sealed) => {
                let plaintext = sealed.open(deterministic_key).map_err(|_| {
                    tracing::warn!(space = %space_id, "deterministic envelope rejected");
                    CipherError::DecryptionFailed
                })?;
                Ok(Decrypted {
                    plaintext,
                    path: DecryptPath::Deterministic,
                })
            }
            EncryptedEnvelope::Hybrid(hybrid) => {
                if let Some(plaintext) =
                    Self::open_session_layer(hybrid, space_id, deterministic_key, roster)
                {
                    return Ok(Decrypted {
                        plaintext,
                        path: DecryptPath::SessionKey,
                    });
                }

                tracing::debug!(space = %space_id, "session key path failed, trying fallback");
                let plaintext = hybrid.fallback.open(deterministic_key).map_err(|_| {
                    tracing::warn!(space = %space_id, "hybrid envelope rejected on both paths");
                    CipherError::DecryptionFailed
                })?;
                Ok(Decrypted {
                    plaintext,
                    path: DecryptPath::Fallback,
                })
            }
            EncryptedEnvelope::Error { reason } => Err(CipherError::MalformedEnvelope(
                reason
                    .clone()
                    .unwrap_or_else(|| "sender reported an encryption error".into()),
            )),
        }
    }

    fn open_session_layer(
        hybrid: &HybridPayload,
        space_id: &SpaceId,
        deterministic_key: &EncryptionKey,
        roster: &Roster,
    ) -> Option<Vec<u8>> {
        let session_key = if roster.is_empty() {
            derive_session_key(space_id, &hybrid.session_participants)
        } else {
            derive_session_key(space_id, roster)
        };

        let inner_ciphertext = hybrid.outer().open(&session_key).ok()?;
        deterministic_key
            .decrypt(hybrid.fallback.algorithm, &inner_ciphertext, &hybrid.fallback.iv)
            .ok()
    }
}
