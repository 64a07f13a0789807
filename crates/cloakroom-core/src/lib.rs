//! # Cloakroom Core
//!
//! Pure primitives for Cloakroom: identifiers, authenticated encryption,
//! deterministic key derivation and the encrypted envelope format.
//!
//! This crate keeps no state between calls. Session tracking, key caches and
//! transport live in the crates above it.
//!
//! ## Key Types
//!
//! - [`SpaceId`] / [`SessionId`] - opaque identifiers
//! - [`EncryptionKey`] - 256-bit AEAD key, zeroized on drop
//! - [`KeyDeriver`] - `(space_id, passphrase)` to deterministic key
//! - [`EncryptedEnvelope`] - `deterministic | hybrid | error` tagged union
//!
//! ## Key derivation
//!
//! ```rust
//! use cloakroom_core::{derive_key, SpaceId};
//!
//! let space = SpaceId::new("abc").unwrap();
//! let key = derive_key(&space, "friends-42").unwrap();
//! let again = derive_key(&space, "friends-42").unwrap();
//! assert_eq!(key.as_bytes(), again.as_bytes());
//! ```

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod types;

pub use crypto::{Algorithm, EncryptionKey, EncryptionNonce, KEY_LEN, NONCE_LEN, TAG_LEN};
pub use envelope::{EncryptedEnvelope, EnvelopeKind, HybridPayload, SealedPayload};
pub use error::{CoreError, Result};
pub use kdf::{
    derive_key, derive_session_key, KeyDeriver, KEY_DERIVATION_TAG, MIN_KDF_ITERATIONS,
    SESSION_KEY_TAG,
};
pub use types::{now_millis, SessionId, SpaceId, SESSION_ID_BYTES};
pub use zeroize::Zeroizing;
