//! Proptest generators for property-based testing.

use proptest::prelude::*;

use cloakroom::{CipherError, HybridCipher};
use cloakroom_core::{Algorithm, EncryptedEnvelope, EncryptionKey, SessionId, SpaceId};
use cloakroom_session::Roster;

/// Generate a valid SpaceId.
pub fn space_id() -> impl Strategy<Value = SpaceId> {
    "[a-z0-9][a-z0-9-]{0,23}".prop_filter_map("rejected space id", |s| SpaceId::new(s).ok())
}

/// Generate a SessionId shaped like a generated one.
pub fn session_id() -> impl Strategy<Value = SessionId> {
    any::<[u8; 16]>().prop_filter_map("rejected session id", |bytes| {
        SessionId::new(hex::encode(bytes)).ok()
    })
}

/// Generate a roster of up to `max` sessions.
pub fn roster(max: usize) -> impl Strategy<Value = Roster> {
    prop::collection::vec(session_id(), 0..=max).prop_map(|ids| ids.into_iter().collect())
}

/// Generate a roster with at least two sessions.
pub fn multi_party_roster(max: usize) -> impl Strategy<Value = Roster> {
    prop::collection::btree_set(session_id(), 2..=max.max(2))
        .prop_map(|ids| ids.into_iter().collect())
}

/// Generate a key from raw bytes.
pub fn encryption_key() -> impl Strategy<Value = EncryptionKey> {
    any::<[u8; 32]>().prop_map(EncryptionKey::from_bytes)
}

/// Generate an AEAD algorithm.
pub fn algorithm() -> impl Strategy<Value = Algorithm> {
    prop_oneof![Just(Algorithm::ChaCha20Poly1305), Just(Algorithm::Aes256Gcm)]
}

/// Generate a printable passphrase.
pub fn passphrase() -> impl Strategy<Value = String> {
    "[ -~]{1,32}"
}

/// Generate plaintext bytes of specified max length.
pub fn plaintext(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Parameters for sealing an arbitrary envelope.
#[derive(Debug, Clone)]
pub struct EnvelopeParams {
    pub key_bytes: [u8; 32],
    pub algorithm: Algorithm,
    pub space_id: SpaceId,
    pub roster: Roster,
    pub plaintext: Vec<u8>,
}

impl Arbitrary for EnvelopeParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            any::<[u8; 32]>(),
            algorithm(),
            space_id(),
            roster(5),
            plaintext(512),
        )
            .prop_map(
                |(key_bytes, algorithm, space_id, roster, plaintext)| EnvelopeParams {
                    key_bytes,
                    algorithm,
                    space_id,
                    roster,
                    plaintext,
                },
            )
            .boxed()
    }
}

impl EnvelopeParams {
    /// The deterministic key these parameters seal with.
    pub fn key(&self) -> EncryptionKey {
        EncryptionKey::from_bytes(self.key_bytes)
    }

    /// The cipher these parameters seal with.
    pub fn cipher(&self) -> HybridCipher {
        HybridCipher::new(self.algorithm)
    }
}

/// Seal an envelope from parameters.
pub fn envelope_from_params(params: &EnvelopeParams) -> Result<EncryptedEnvelope, CipherError> {
    params.cipher().seal(
        &params.plaintext,
        &params.space_id,
        &params.key(),
        &params.roster,
    )
}
