//! # Cloakroom
//!
//! Passphrase-gated ephemeral chat with adaptive hybrid encryption.
//!
//! ## Overview
//!
//! Everyone who knows a space's passphrase can derive the same
//! deterministic key, so message history stays readable on any device. While
//! more than one session is present, each message is additionally wrapped in
//! a session key derived from the live roster. The deterministic layer is
//! always kept as a fallback, so a roster change never strands a message.
//!
//! ## Key Concepts
//!
//! - **Space**: a chat room, addressed by id and gated by a passphrase.
//! - **Session**: one client's presence in one space, with a random id.
//! - **Roster**: the sessions believed to be present; best-effort.
//! - **Envelope**: `deterministic`, `hybrid` (with fallback) or `error`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cloakroom::{Client, ClientConfig};
//! use cloakroom::core::{SpaceId, Zeroizing};
//! use cloakroom::sync::MemoryNetwork;
//!
//! async fn example() -> cloakroom::Result<()> {
//!     let network = MemoryNetwork::new();
//!     let transport = network.create_transport().await;
//!     let mut client = Client::new(transport, ClientConfig::default())?;
//!
//!     let space = SpaceId::new("abc")?;
//!     client
//!         .enter_space(&space, Zeroizing::new("friends-42".to_string()))
//!         .await?;
//!
//!     client.send(&space, "hello").await?;
//!     while let Some(event) = client.next_event().await? {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `cloakroom::core` - identifiers, AEAD, key derivation, envelopes
//! - `cloakroom::session` - session registry and rosters
//! - `cloakroom::keys` - key store, passphrase cache, key exchange
//! - `cloakroom::sync` - relay messages and transports

pub mod cipher;
pub mod client;
pub mod config;
pub mod error;
pub mod status;

pub use cloakroom_core as core;
pub use cloakroom_keys as keys;
pub use cloakroom_session as session;
pub use cloakroom_sync as sync;

pub use cipher::{DecryptPath, Decrypted, HybridCipher};
pub use client::{Client, ClientEvent};
pub use config::ClientConfig;
pub use error::{CipherError, ClientError, Result};
pub use status::{EncryptionLevel, SpaceStatus};

pub use cloakroom_core::{Algorithm, EncryptedEnvelope, EnvelopeKind, SessionId, SpaceId};
