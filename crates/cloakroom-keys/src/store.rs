//! Per-space key material cache.
//!
//! [`SpaceKeyStore`] owns every key a client holds for the spaces it is in.
//! It is an ordinary value owned by the client context; there is no global
//! instance. Nothing here is persisted, and every key is zeroized on drop.

use std::collections::HashMap;
use std::time::Duration;

use cloakroom_core::{EncryptionKey, SessionId, SpaceId};

use crate::crypto::{X25519KeyPair, X25519PublicKey};
use crate::error::{KeysError, Result};

/// All key material held for one space.
#[derive(Debug)]
pub struct SpaceKeyMaterial {
    space_id: SpaceId,
    deterministic_key: EncryptionKey,
    key_pair: X25519KeyPair,
    peer_public_keys: HashMap<SessionId, X25519PublicKey>,
    peer_secrets: HashMap<SessionId, EncryptionKey>,
    created_at: i64,
    last_used: i64,
}

impl SpaceKeyMaterial {
    /// Fresh material with a newly generated key pair and no peers.
    pub fn new(space_id: SpaceId, deterministic_key: EncryptionKey, now: i64) -> Self {
        Self {
            space_id,
            deterministic_key,
            key_pair: X25519KeyPair::generate(),
            peer_public_keys: HashMap::new(),
            peer_secrets: HashMap::new(),
            created_at: now,
            last_used: now,
        }
    }

    /// The space this material belongs to.
    pub fn space_id(&self) -> &SpaceId {
        &self.space_id
    }

    /// The passphrase-derived key. Set once at creation and never replaced.
    pub fn deterministic_key(&self) -> &EncryptionKey {
        &self.deterministic_key
    }

    /// Our X25519 public key for this space.
    pub fn public_key(&self) -> X25519PublicKey {
        self.key_pair.public_key()
    }

    /// A peer's announced public key.
    pub fn peer_public_key(&self, session_id: &SessionId) -> Option<&X25519PublicKey> {
        self.peer_public_keys.get(session_id)
    }

    /// The pairwise secret shared with a peer.
    pub fn peer_secret(&self, session_id: &SessionId) -> Option<&EncryptionKey> {
        self.peer_secrets.get(session_id)
    }

    /// Number of peers we hold a public key for.
    pub fn peer_count(&self) -> usize {
        self.peer_public_keys.len()
    }

    /// Record a peer's public key and derive the pairwise secret.
    ///
    /// Returns false if the same key was already recorded.
    pub fn record_peer_key(&mut self, session_id: SessionId, public_key: X25519PublicKey) -> bool {
        if self.peer_public_keys.get(&session_id) == Some(&public_key) {
            return false;
        }

        let secret = self
            .key_pair
            .diffie_hellman(&public_key)
            .derive_peer_secret(&self.space_id);

        self.peer_secrets.insert(session_id.clone(), secret);
        self.peer_public_keys.insert(session_id, public_key);
        true
    }

    /// Drop everything known about a peer.
    pub fn forget_peer(&mut self, session_id: &SessionId) -> bool {
        self.peer_secrets.remove(session_id);
        self.peer_public_keys.remove(session_id).is_some()
    }

    /// Refresh `last_used`. Never moves backwards.
    pub fn touch(&mut self, now: i64) {
        self.last_used = self.last_used.max(now);
    }

    /// Creation time (Unix ms).
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Last use (Unix ms).
    pub fn last_used(&self) -> i64 {
        self.last_used
    }

    fn idle_for(&self, now: i64) -> Duration {
        Duration::from_millis(now.saturating_sub(self.last_used).max(0) as u64)
    }
}

/// Key material for every space the client is in.
#[derive(Debug, Default)]
pub struct SpaceKeyStore {
    materials: HashMap<SpaceId, SpaceKeyMaterial>,
}

impl SpaceKeyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the deterministic key for a space, or return the existing material.
    ///
    /// The deterministic key is write-once: offering a different key for a
    /// space that already has material is an error. Evict first to replace it.
    pub fn insert(
        &mut self,
        space_id: SpaceId,
        deterministic_key: EncryptionKey,
        now: i64,
    ) -> Result<&mut SpaceKeyMaterial> {
        use std::collections::hash_map::Entry;

        match self.materials.entry(space_id) {
            Entry::Occupied(entry) => {
                let material = entry.into_mut();
                if material.deterministic_key.as_bytes() != deterministic_key.as_bytes() {
                    return Err(KeysError::DeterministicKeyConflict(material.space_id.clone()));
                }
                material.touch(now);
                Ok(material)
            }
            Entry::Vacant(entry) => {
                tracing::debug!(space = %entry.key(), "key material created");
                let material = SpaceKeyMaterial::new(entry.key().clone(), deterministic_key, now);
                Ok(entry.insert(material))
            }
        }
    }

    /// Material for a space.
    pub fn get(&self, space_id: &SpaceId) -> Option<&SpaceKeyMaterial> {
        self.materials.get(space_id)
    }

    /// Mutable material for a space.
    pub fn get_mut(&mut self, space_id: &SpaceId) -> Option<&mut SpaceKeyMaterial> {
        self.materials.get_mut(space_id)
    }

    /// Material for a space, or [`KeysError::UnknownSpace`].
    pub fn require(&self, space_id: &SpaceId) -> Result<&SpaceKeyMaterial> {
        self.get(space_id)
            .ok_or_else(|| KeysError::UnknownSpace(space_id.clone()))
    }

    /// Whether material exists for a space.
    pub fn contains(&self, space_id: &SpaceId) -> bool {
        self.materials.contains_key(space_id)
    }

    /// The deterministic key for a space, refreshing `last_used`.
    pub fn use_key(&mut self, space_id: &SpaceId, now: i64) -> Option<&EncryptionKey> {
        let material = self.materials.get_mut(space_id)?;
        material.touch(now);
        Some(&material.deterministic_key)
    }

    /// Refresh `last_used` for a space.
    pub fn touch(&mut self, space_id: &SpaceId, now: i64) {
        if let Some(material) = self.materials.get_mut(space_id) {
            material.touch(now);
        }
    }

    /// Record a peer's public key in a space.
    pub fn record_peer_key(
        &mut self,
        space_id: &SpaceId,
        session_id: SessionId,
        public_key: X25519PublicKey,
    ) -> Result<bool> {
        let material = self
            .materials
            .get_mut(space_id)
            .ok_or_else(|| KeysError::UnknownSpace(space_id.clone()))?;
        Ok(material.record_peer_key(session_id, public_key))
    }

    /// Forget a peer in a space. Unknown spaces and peers are a no-op.
    pub fn forget_peer(&mut self, space_id: &SpaceId, session_id: &SessionId) -> bool {
        self.materials
            .get_mut(space_id)
            .is_some_and(|material| material.forget_peer(session_id))
    }

    /// Drop all material for a space.
    pub fn evict(&mut self, space_id: &SpaceId) -> bool {
        let evicted = self.materials.remove(space_id).is_some();
        if evicted {
            tracing::debug!(space = %space_id, "key material evicted");
        }
        evicted
    }

    /// Drop material unused for longer than `max_idle`. Returns the evicted spaces.
    pub fn evict_idle(&mut self, max_idle: Duration, now: i64) -> Vec<SpaceId> {
        let stale: Vec<SpaceId> = self
            .materials
            .values()
            .filter(|material| material.idle_for(now) > max_idle)
            .map(|material| material.space_id.clone())
            .collect();

        for space_id in &stale {
            self.evict(space_id);
        }
        stale
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        let count = self.materials.len();
        self.materials.clear();
        tracing::debug!(count, "key store cleared");
    }

    /// Number of spaces with material.
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::X25519KeyPair;

    fn space(id: &str) -> SpaceId {
        SpaceId::new(id).unwrap()
    }

    fn session(id: &str) -> SessionId {
        SessionId::new(id).unwrap()
    }

    #[test]
    fn test_insert_is_write_once() {
        let mut store = SpaceKeyStore::new();
        let key = EncryptionKey::from_bytes([1; 32]);

        let public = store.insert(space("abc"), key.clone(), 10).unwrap().public_key();

        // Same key: same material, same key pair.
        let again = store.insert(space("abc"), key, 20).unwrap();
        assert_eq!(again.public_key(), public);
        assert_eq!(again.created_at(), 10);
        assert_eq!(again.last_used(), 20);

        let conflict = store.insert(space("abc"), EncryptionKey::from_bytes([2; 32]), 30);
        assert!(matches!(conflict, Err(KeysError::DeterministicKeyConflict(_))));
        assert_eq!(
            store.get(&space("abc")).unwrap().deterministic_key().as_bytes(),
            &[1; 32]
        );
    }

    #[test]
    fn test_last_used_is_monotonic() {
        let mut store = SpaceKeyStore::new();
        store
            .insert(space("abc"), EncryptionKey::generate(), 100)
            .unwrap();

        assert!(store.use_key(&space("abc"), 200).is_some());
        store.touch(&space("abc"), 150);
        assert_eq!(store.get(&space("abc")).unwrap().last_used(), 200);
    }

    #[test]
    fn test_evict_and_clear() {
        let mut store = SpaceKeyStore::new();
        store.insert(space("a"), EncryptionKey::generate(), 0).unwrap();
        store.insert(space("b"), EncryptionKey::generate(), 0).unwrap();

        assert!(store.evict(&space("a")));
        assert!(!store.evict(&space("a")));
        assert!(store.use_key(&space("a"), 1).is_none());
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_evict_idle() {
        let mut store = SpaceKeyStore::new();
        store.insert(space("old"), EncryptionKey::generate(), 0).unwrap();
        store.insert(space("new"), EncryptionKey::generate(), 9_000).unwrap();

        let evicted = store.evict_idle(Duration::from_secs(5), 10_000);
        assert_eq!(evicted, vec![space("old")]);
        assert!(store.contains(&space("new")));
    }

    #[test]
    fn test_peer_secrets_agree() {
        let mut alice = SpaceKeyStore::new();
        let mut bob = SpaceKeyStore::new();
        let key = EncryptionKey::from_bytes([9; 32]);

        let alice_pk = alice.insert(space("abc"), key.clone(), 0).unwrap().public_key();
        let bob_pk = bob.insert(space("abc"), key, 0).unwrap().public_key();

        assert!(alice
            .record_peer_key(&space("abc"), session("bob"), bob_pk)
            .unwrap());
        assert!(!alice
            .record_peer_key(&space("abc"), session("bob"), bob_pk)
            .unwrap());
        bob.record_peer_key(&space("abc"), session("alice"), alice_pk)
            .unwrap();

        let a = alice.get(&space("abc")).unwrap().peer_secret(&session("bob")).unwrap();
        let b = bob.get(&space("abc")).unwrap().peer_secret(&session("alice")).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_peer_key_replacement_rederives_secret() {
        let mut store = SpaceKeyStore::new();
        store.insert(space("abc"), EncryptionKey::generate(), 0).unwrap();

        let first = X25519KeyPair::generate().public_key();
        let second = X25519KeyPair::generate().public_key();

        store.record_peer_key(&space("abc"), session("p"), first).unwrap();
        let before = *store
            .get(&space("abc"))
            .unwrap()
            .peer_secret(&session("p"))
            .unwrap()
            .as_bytes();

        assert!(store.record_peer_key(&space("abc"), session("p"), second).unwrap());
        let after = store
            .get(&space("abc"))
            .unwrap()
            .peer_secret(&session("p"))
            .unwrap();
        assert_ne!(&before, after.as_bytes());
    }

    #[test]
    fn test_forget_peer() {
        let mut store = SpaceKeyStore::new();
        store.insert(space("abc"), EncryptionKey::generate(), 0).unwrap();
        let pk = X25519KeyPair::generate().public_key();
        store.record_peer_key(&space("abc"), session("p"), pk).unwrap();

        assert!(store.forget_peer(&space("abc"), &session("p")));
        assert!(!store.forget_peer(&space("abc"), &session("p")));
        assert!(!store.forget_peer(&space("zzz"), &session("p")));

        let material = store.get(&space("abc")).unwrap();
        assert_eq!(material.peer_count(), 0);
        assert!(material.peer_secret(&session("p")).is_none());
    }

    #[test]
    fn test_unknown_space() {
        let mut store = SpaceKeyStore::new();
        let pk = X25519KeyPair::generate().public_key();

        assert!(matches!(
            store.record_peer_key(&space("abc"), session("p"), pk),
            Err(KeysError::UnknownSpace(_))
        ));
        assert!(store.require(&space("abc")).is_err());
    }
}
