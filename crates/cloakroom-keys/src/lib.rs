//! # Cloakroom Keys
//!
//! Owns the key material a client holds for its spaces.
//!
//! ## Overview
//!
//! - [`SpaceKeyStore`] maps each space to its [`SpaceKeyMaterial`]: the
//!   passphrase-derived deterministic key, an X25519 key pair, peer public
//!   keys and the pairwise secrets derived from them.
//! - [`PassphraseCache`] keeps passphrases for a short TTL so an evicted
//!   deterministic key can be re-derived without prompting again.
//! - [`KeyExchangeCoordinator`] runs the announce/request/respond protocol
//!   that fills in peer keys.
//!
//! All material is memory-only and zeroized on drop.
//!
//! ## Usage
//!
//! ```rust
//! use cloakroom_core::{derive_key, SpaceId};
//! use cloakroom_keys::SpaceKeyStore;
//!
//! let space = SpaceId::new("abc").unwrap();
//! let key = derive_key(&space, "friends-42").unwrap();
//!
//! let mut store = SpaceKeyStore::new();
//! store.insert(space.clone(), key, 0).unwrap();
//! assert!(store.use_key(&space, 1).is_some());
//!
//! store.evict(&space);
//! assert!(store.is_empty());
//! ```

pub mod crypto;
pub mod error;
pub mod exchange;
pub mod passphrase;
pub mod store;

pub use crypto::{SharedKey, X25519KeyPair, X25519PublicKey, X25519StaticSecret, PEER_SECRET_CONTEXT};
pub use error::{KeysError, Result};
pub use exchange::{KeyExchangeConfig, KeyExchangeCoordinator, KeyExchangeMessage};
pub use passphrase::{PassphraseCache, DEFAULT_PASSPHRASE_TTL};
pub use store::{SpaceKeyMaterial, SpaceKeyStore};
