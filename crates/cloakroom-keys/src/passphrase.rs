//! Short-lived passphrase cache.
//!
//! Holds the passphrase of each space just long enough to re-derive the
//! deterministic key after its material was evicted. Entries expire after a
//! TTL, are zeroized when dropped, and have no serialized form.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use cloakroom_core::SpaceId;
use zeroize::Zeroizing;

/// How long a passphrase is kept by default.
pub const DEFAULT_PASSPHRASE_TTL: Duration = Duration::from_secs(15 * 60);

struct CachedPassphrase {
    passphrase: Zeroizing<String>,
    stored_at: Instant,
}

/// Passphrases keyed by space, expiring after a fixed TTL.
pub struct PassphraseCache {
    ttl: Duration,
    entries: HashMap<SpaceId, CachedPassphrase>,
}

impl Default for PassphraseCache {
    fn default() -> Self {
        Self::new(DEFAULT_PASSPHRASE_TTL)
    }
}

impl PassphraseCache {
    /// Create a cache with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// The configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store a passphrase, replacing any previous one and restarting its TTL.
    pub fn remember(&mut self, space_id: SpaceId, passphrase: Zeroizing<String>) {
        self.remember_at(space_id, passphrase, Instant::now());
    }

    /// Store a passphrase as of `now`.
    pub fn remember_at(&mut self, space_id: SpaceId, passphrase: Zeroizing<String>, now: Instant) {
        self.entries.insert(
            space_id,
            CachedPassphrase {
                passphrase,
                stored_at: now,
            },
        );
    }

    /// The passphrase for a space, if present and not expired.
    pub fn get(&mut self, space_id: &SpaceId) -> Option<Zeroizing<String>> {
        self.get_at(space_id, Instant::now())
    }

    /// The passphrase for a space as of `now`. Expired entries are dropped.
    pub fn get_at(&mut self, space_id: &SpaceId, now: Instant) -> Option<Zeroizing<String>> {
        let expired = self
            .entries
            .get(space_id)
            .map(|entry| self.is_expired(entry, now))?;

        if expired {
            self.entries.remove(space_id);
            tracing::debug!(space = %space_id, "cached passphrase expired");
            return None;
        }

        self.entries
            .get(space_id)
            .map(|entry| entry.passphrase.clone())
    }

    /// Drop the passphrase for a space.
    pub fn forget(&mut self, space_id: &SpaceId) -> bool {
        self.entries.remove(space_id).is_some()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    /// Drop every entry expired as of `now`.
    pub fn purge_expired_at(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.stored_at) < ttl);
        before - self.entries.len()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached passphrases, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &CachedPassphrase, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored_at) >= self.ttl
    }
}

impl fmt::Debug for PassphraseCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassphraseCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.len())
            .finish()
    }
}
