//! Relay message types.
//!
//! Everything a client publishes to a space goes through the relay as one of
//! these messages. The relay sees space ids, session ids and ciphertext; it
//! never sees a passphrase, a key or plaintext.

use std::fmt;

use cloakroom_core::{EncryptedEnvelope, SessionId, SpaceId};
use cloakroom_keys::KeyExchangeMessage;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Identity of one transport endpoint.
///
/// Distinct from [`SessionId`]: a single endpoint carries one session for
/// every space it has entered.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(pub [u8; 16]);

impl PeerId {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Generate a random peer ID.
    pub fn random() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen())
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", &hex::encode(self.0)[..8])
    }
}

/// Message size limits.
pub mod limits {
    /// Max bytes of ciphertext in a single envelope layer.
    pub const MAX_CIPHERTEXT_BYTES: usize = 64 * 1024;
    /// Max participants named by a hybrid envelope.
    pub const MAX_PARTICIPANTS: usize = 256;
}

/// Messages exchanged through the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayMessage {
    /// A session entered the space.
    Join {
        /// The space entered.
        space_id: SpaceId,
        /// The new session.
        session_id: SessionId,
    },

    /// A session left the space.
    Leave {
        /// The space left.
        space_id: SpaceId,
        /// The departing session.
        session_id: SessionId,
    },

    /// Reply to a join so the newcomer learns who is already present.
    Presence {
        /// The space.
        space_id: SpaceId,
        /// A session already in the space.
        session_id: SessionId,
    },

    /// An encrypted chat message.
    Chat {
        /// The space the message was posted to.
        space_id: SpaceId,
        /// Sending session.
        from: SessionId,
        /// The encrypted content.
        envelope: EncryptedEnvelope,
        /// Sender clock (Unix ms).
        sent_at: i64,
    },

    /// Key exchange traffic.
    KeyExchange(KeyExchangeMessage),
}

impl RelayMessage {
    /// The space this message is routed to.
    pub fn space_id(&self) -> &SpaceId {
        match self {
            RelayMessage::Join { space_id, .. }
            | RelayMessage::Leave { space_id, .. }
            | RelayMessage::Presence { space_id, .. }
            | RelayMessage::Chat { space_id, .. } => space_id,
            RelayMessage::KeyExchange(message) => message.space_id(),
        }
    }

    /// The session that produced this message.
    pub fn sender(&self) -> &SessionId {
        match self {
            RelayMessage::Join { session_id, .. }
            | RelayMessage::Leave { session_id, .. }
            | RelayMessage::Presence { session_id, .. } => session_id,
            RelayMessage::Chat { from, .. } => from,
            RelayMessage::KeyExchange(message) => message.from(),
        }
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            RelayMessage::Join { .. } => "join",
            RelayMessage::Leave { .. } => "leave",
            RelayMessage::Presence { .. } => "presence",
            RelayMessage::Chat { .. } => "chat",
            RelayMessage::KeyExchange(_) => "key_exchange",
        }
    }

    /// Check size limits and envelope structure.
    pub fn validate(&self) -> Result<()> {
        let RelayMessage::Chat { envelope, .. } = self else {
            return Ok(());
        };

        envelope
            .validate()
            .map_err(|e| SyncError::InvalidMessage(e.to_string()))?;

        match envelope {
            EncryptedEnvelope::Deterministic(sealed) => {
                check_ciphertext_len(sealed.ciphertext.len())?;
            }
            EncryptedEnvelope::Hybrid(hybrid) => {
                if hybrid.session_participants.len() > limits::MAX_PARTICIPANTS {
                    return Err(SyncError::InvalidMessage(
                        "too many session participants".into(),
                    ));
                }
                check_ciphertext_len(hybrid.ciphertext.len())?;
                check_ciphertext_len(hybrid.fallback.ciphertext.len())?;
            }
            EncryptedEnvelope::Error { .. } => {}
        }
        Ok(())
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| SyncError::InvalidMessage(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| SyncError::InvalidMessage(e.to_string()))
    }
}

fn check_ciphertext_len(len: usize) -> Result<()> {
    if len > limits::MAX_CIPHERTEXT_BYTES {
        return Err(SyncError::InvalidMessage(format!(
            "ciphertext of {len} bytes exceeds limit of {}",
            limits::MAX_CIPHERTEXT_BYTES
        )));
    }
    Ok(())
}
