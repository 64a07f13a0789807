//! Encrypted message envelopes.
//!
//! An envelope is a tagged union. The `type` field selects the shape:
//!
//! ```text
//! deterministic  { algorithm, ciphertext, iv }
//! hybrid         { algorithm, ciphertext, iv, sessionParticipants, fallback }
//! error          { reason? }
//! ```
//!
//! Binary fields are base64 in the JSON wire form. The CBOR form used by
//! [`EncryptedEnvelope::to_bytes`] carries the same field layout.

use serde::{Deserialize, Serialize};

use crate::crypto::{Algorithm, EncryptionKey, EncryptionNonce, TAG_LEN};
use crate::error::{CoreError, Result};
use crate::types::SessionId;

/// One sealed AEAD layer: the algorithm, its IV, and ciphertext plus tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPayload {
    /// Encryption algorithm used.
    pub algorithm: Algorithm,

    /// The encrypted data (includes authentication tag).
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,

    /// IV used for encryption (unique per encryption).
    #[serde(with = "b64_nonce")]
    pub iv: EncryptionNonce,
}

impl SealedPayload {
    /// Encrypt plaintext under `key` with a fresh random IV.
    pub fn seal(plaintext: &[u8], key: &EncryptionKey, algorithm: Algorithm) -> Result<Self> {
        let iv = EncryptionNonce::generate();
        let ciphertext = key.encrypt(algorithm, plaintext, &iv)?;

        Ok(Self {
            algorithm,
            ciphertext,
            iv,
        })
    }

    /// Decrypt with the given key.
    pub fn open(&self, key: &EncryptionKey) -> Result<Vec<u8>> {
        key.decrypt(self.algorithm, &self.ciphertext, &self.iv)
    }

    fn check(&self, layer: &str) -> Result<()> {
        if self.ciphertext.len() < TAG_LEN {
            return Err(CoreError::MalformedEnvelope(format!(
                "{layer} ciphertext is shorter than the authentication tag"
            )));
        }
        Ok(())
    }
}

/// The twice-wrapped form used when more than one session is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridPayload {
    /// Algorithm of the outer (session key) layer.
    pub algorithm: Algorithm,

    /// The inner ciphertext, encrypted again under the session key.
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,

    /// IV of the outer layer.
    #[serde(with = "b64_nonce")]
    pub iv: EncryptionNonce,

    /// Sorted roster the session key was derived from.
    pub session_participants: Vec<SessionId>,

    /// The inner layer, decryptable with the deterministic key alone.
    pub fallback: SealedPayload,
}

impl HybridPayload {
    /// The outer layer as a standalone sealed payload.
    pub fn outer(&self) -> SealedPayload {
        SealedPayload {
            algorithm: self.algorithm,
            ciphertext: self.ciphertext.clone(),
            iv: self.iv,
        }
    }
}

/// Discriminant of an envelope, without its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    /// Single layer under the deterministic key.
    Deterministic,
    /// Session-key layer over a deterministic layer.
    Hybrid,
    /// A sender-side failure marker.
    Error,
}

impl EnvelopeKind {
    /// Wire name of the kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            EnvelopeKind::Deterministic => "deterministic",
            EnvelopeKind::Hybrid => "hybrid",
            EnvelopeKind::Error => "error",
        }
    }
}

/// An encrypted message as it travels between clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EncryptedEnvelope {
    /// Encrypted under the deterministic key only.
    Deterministic(SealedPayload),

    /// Encrypted under the session key, with the deterministic layer retained.
    Hybrid(HybridPayload),

    /// The sender could not produce ciphertext.
    Error {
        /// Optional human-readable cause.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl EncryptedEnvelope {
    /// The kind of this envelope.
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            EncryptedEnvelope::Deterministic(_) => EnvelopeKind::Deterministic,
            EncryptedEnvelope::Hybrid(_) => EnvelopeKind::Hybrid,
            EncryptedEnvelope::Error { .. } => EnvelopeKind::Error,
        }
    }

    /// Roster recorded in a hybrid envelope.
    pub fn participants(&self) -> Option<&[SessionId]> {
        match self {
            EncryptedEnvelope::Hybrid(hybrid) => Some(&hybrid.session_participants),
            _ => None,
        }
    }

    /// Check structural invariants.
    ///
    /// A hybrid envelope must name at least two participants in strictly
    /// ascending order, and every layer must be long enough to hold a tag.
    /// Run before handing an envelope to the transport and after receiving one.
    pub fn validate(&self) -> Result<()> {
        match self {
            EncryptedEnvelope::Deterministic(sealed) => sealed.check("deterministic"),
            EncryptedEnvelope::Hybrid(hybrid) => {
                if hybrid.session_participants.len() < 2 {
                    return Err(CoreError::MalformedEnvelope(format!(
                        "hybrid envelope names {} participant(s), need at least 2",
                        hybrid.session_participants.len()
                    )));
                }
                if hybrid
                    .session_participants
                    .windows(2)
                    .any(|pair| pair[0] >= pair[1])
                {
                    return Err(CoreError::MalformedEnvelope(
                        "hybrid participants are not sorted and unique".into(),
                    ));
                }
                hybrid.outer().check("outer")?;
                hybrid.fallback.check("fallback")
            }
            EncryptedEnvelope::Error { .. } => Ok(()),
        }
    }

    /// Serialize to the JSON wire form.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CoreError::MalformedEnvelope(e.to_string()))
    }

    /// Parse the JSON wire form.
    ///
    /// Unknown `type` values, missing fallbacks and bad base64 all surface as
    /// [`CoreError::MalformedEnvelope`].
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CoreError::MalformedEnvelope(e.to_string()))
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CoreError::MalformedEnvelope(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::MalformedEnvelope(e.to_string()))
    }
}

mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

mod b64_nonce {
    use serde::{Deserializer, Serializer};

    use crate::crypto::EncryptionNonce;

    pub fn serialize<S: Serializer>(
        nonce: &EncryptionNonce,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        super::b64::serialize(nonce.as_bytes(), serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<EncryptionNonce, D::Error> {
        let bytes = super::b64::deserialize(deserializer)?;
        EncryptionNonce::try_from(bytes.as_slice()).map_err(serde::de::Error::custom)
    }
}
