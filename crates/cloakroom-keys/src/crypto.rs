//! X25519 key agreement for pairwise peer secrets.

use std::fmt;

use cloakroom_core::{EncryptionKey, SpaceId};
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// BLAKE3 context for turning a raw X25519 secret into a peer key.
pub const PEER_SECRET_CONTEXT: &str = "cloakroom-peer-secret-v1";

/// Public half of a session's per-space X25519 key, as announced to peers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct X25519PublicKey(pub [u8; 32]);

impl X25519PublicKey {
    /// Wrap bytes received in an announce or respond message.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The 32 bytes that go on the wire.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn to_dalek(self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl From<PublicKey> for X25519PublicKey {
    fn from(public: PublicKey) -> Self {
        Self(public.to_bytes())
    }
}

impl fmt::Debug for X25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X25519PublicKey({})", &hex::encode(self.0)[..16])
    }
}

/// An X25519 static secret, held for the lifetime of a space's key material.
pub struct X25519StaticSecret(StaticSecret);

impl X25519StaticSecret {
    /// Fresh secret from the thread RNG.
    pub fn generate() -> Self {
        Self(StaticSecret::random_from_rng(rand::thread_rng()))
    }

    /// Fixed secret, for tests and vectors.
    pub fn from_bytes(seed: [u8; 32]) -> Self {
        Self(seed.into())
    }

    /// The matching public key.
    pub fn public_key(&self) -> X25519PublicKey {
        PublicKey::from(&self.0).into()
    }

    /// Agree on a raw shared secret with a peer.
    pub fn diffie_hellman(&self, peer: &X25519PublicKey) -> SharedKey {
        SharedKey(self.0.diffie_hellman(&peer.to_dalek()).to_bytes())
    }
}

impl fmt::Debug for X25519StaticSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("X25519StaticSecret(..)")
    }
}

/// A key pair generated once per space.
#[derive(Debug)]
pub struct X25519KeyPair {
    secret: X25519StaticSecret,
    public: X25519PublicKey,
}

impl X25519KeyPair {
    /// Generate a fresh key pair.
    pub fn generate() -> Self {
        Self::from_secret(X25519StaticSecret::generate())
    }

    /// Wrap an existing secret.
    pub fn from_secret(secret: X25519StaticSecret) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    /// The public half.
    pub fn public_key(&self) -> X25519PublicKey {
        self.public
    }

    /// Key agreement with a peer.
    pub fn diffie_hellman(&self, peer_public: &X25519PublicKey) -> SharedKey {
        self.secret.diffie_hellman(peer_public)
    }
}

/// A raw X25519 shared secret. Not used as a key directly.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedKey([u8; 32]);

impl SharedKey {
    /// Raw DH output.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive the pairwise secret for `space_id`.
    ///
    /// Both peers compute the same value: the DH output is symmetric and the
    /// only other input is the space id.
    pub fn derive_peer_secret(&self, space_id: &SpaceId) -> EncryptionKey {
        let mut hasher = blake3::Hasher::new_derive_key(PEER_SECRET_CONTEXT);
        hasher.update(&self.0);
        hasher.update(space_id.as_str().as_bytes());
        EncryptionKey::from_bytes(*hasher.finalize().as_bytes())
    }
}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedKey(..)")
    }
}
