//! Deterministic key derivation.
//!
//! Two keys come out of this module:
//!
//! - the **deterministic key** of a space, reproducible from
//!   `(space_id, passphrase)` alone on any device and in any process;
//! - the **session key** of a roster, reproducible by every participant from
//!   `(space_id, roster)` without ever being exchanged.
//!
//! ## Deterministic key
//!
//! ```text
//! seed     = "cloakroom-space-key-v1" ":" space_id ":" passphrase
//! salt     = SHA-256(seed)
//! key      = PBKDF2-HMAC-SHA256(space_id || passphrase, salt, iterations, 32)
//! ```
//!
//! ## Session key
//!
//! ```text
//! key = SHA-256("cloakroom-session-key-v1" ":" space_id ":" join(sorted(roster), ","))
//! ```

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::crypto::{EncryptionKey, KEY_LEN};
use crate::error::{CoreError, Result};
use crate::types::{SessionId, SpaceId};

/// Protocol tag bound into the deterministic key seed.
pub const KEY_DERIVATION_TAG: &str = "cloakroom-space-key-v1";

/// Protocol tag bound into the session key.
pub const SESSION_KEY_TAG: &str = "cloakroom-session-key-v1";

/// Lowest PBKDF2 iteration count the deriver accepts.
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

/// Turns `(space_id, passphrase)` into the space's deterministic key.
///
/// Stateless apart from the iteration count. Never retries: an error goes
/// back to the caller, who decides whether to prompt for the passphrase again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDeriver {
    iterations: u32,
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self {
            iterations: MIN_KDF_ITERATIONS,
        }
    }
}

impl KeyDeriver {
    /// Create a deriver with the default iteration count.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a deriver with a custom iteration count.
    ///
    /// Counts below [`MIN_KDF_ITERATIONS`] are rejected.
    pub fn with_iterations(iterations: u32) -> Result<Self> {
        if iterations < MIN_KDF_ITERATIONS {
            return Err(CoreError::KeyDerivationFailed(format!(
                "iteration count {iterations} is below the minimum of {MIN_KDF_ITERATIONS}"
            )));
        }
        Ok(Self { iterations })
    }

    /// The configured PBKDF2 iteration count.
    pub const fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Derive the deterministic key of a space.
    pub fn derive_key(&self, space_id: &SpaceId, passphrase: &str) -> Result<EncryptionKey> {
        if passphrase.is_empty() {
            return Err(CoreError::KeyDerivationFailed("passphrase is empty".into()));
        }

        let seed = Zeroizing::new(format!(
            "{KEY_DERIVATION_TAG}:{}:{passphrase}",
            space_id.as_str()
        ));
        let salt = Sha256::digest(seed.as_bytes());

        let mut password = Zeroizing::new(Vec::with_capacity(
            space_id.as_str().len() + passphrase.len(),
        ));
        password.extend_from_slice(space_id.as_str().as_bytes());
        password.extend_from_slice(passphrase.as_bytes());

        let mut key = [0u8; KEY_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(&password, &salt, self.iterations, &mut key);

        let derived = EncryptionKey::from_bytes(key);
        zeroize::Zeroize::zeroize(&mut key);

        tracing::debug!(space = %space_id, iterations = self.iterations, "derived space key");
        Ok(derived)
    }

    /// Derive the deterministic key on the blocking thread pool.
    ///
    /// PBKDF2 at this iteration count takes long enough to stall an event
    /// loop, so async callers should use this variant.
    pub async fn derive_key_async(
        &self,
        space_id: SpaceId,
        passphrase: Zeroizing<String>,
    ) -> Result<EncryptionKey> {
        let deriver = *self;
        tokio::task::spawn_blocking(move || deriver.derive_key(&space_id, &passphrase))
            .await
            .map_err(|e| CoreError::KeyDerivationFailed(format!("derivation task failed: {e}")))?
    }
}

/// Derive a space key with the default deriver.
pub fn derive_key(space_id: &SpaceId, passphrase: &str) -> Result<EncryptionKey> {
    KeyDeriver::default().derive_key(space_id, passphrase)
}

/// Derive the session key shared by every member of a roster.
///
/// The roster is sorted here, so callers may pass it in any order.
pub fn derive_session_key<'a, I>(space_id: &SpaceId, roster: I) -> EncryptionKey
where
    I: IntoIterator<Item = &'a SessionId>,
{
    let mut members: Vec<&str> = roster.into_iter().map(SessionId::as_str).collect();
    members.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(SESSION_KEY_TAG.as_bytes());
    hasher.update(b":");
    hasher.update(space_id.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(members.join(",").as_bytes());

    EncryptionKey::from_bytes(hasher.finalize().into())
}
