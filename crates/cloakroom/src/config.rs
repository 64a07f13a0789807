//! Client configuration.

use std::time::Duration;

use cloakroom_core::{Algorithm, KeyDeriver, MIN_KDF_ITERATIONS};
use cloakroom_keys::{KeyExchangeConfig, DEFAULT_PASSPHRASE_TTL};

use crate::error::{ClientError, Result};

/// Configuration for the [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// AEAD algorithm for outgoing envelopes.
    pub algorithm: Algorithm,
    /// PBKDF2 iteration count for the deterministic key.
    pub kdf_iterations: u32,
    /// How long a passphrase stays cached after entering a space.
    pub passphrase_ttl: Duration,
    /// How long [`Client::next_event`](crate::Client::next_event) waits.
    pub recv_timeout: Duration,
    /// Key exchange settings.
    pub exchange: KeyExchangeConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            kdf_iterations: MIN_KDF_ITERATIONS,
            passphrase_ttl: DEFAULT_PASSPHRASE_TTL,
            recv_timeout: Duration::from_secs(5),
            exchange: KeyExchangeConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Set the outgoing algorithm.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the PBKDF2 iteration count.
    pub fn with_kdf_iterations(mut self, iterations: u32) -> Self {
        self.kdf_iterations = iterations;
        self
    }

    /// Set the passphrase TTL.
    pub fn with_passphrase_ttl(mut self, ttl: Duration) -> Self {
        self.passphrase_ttl = ttl;
        self
    }

    /// Set the receive timeout.
    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Set the key exchange settings.
    pub fn with_exchange(mut self, exchange: KeyExchangeConfig) -> Self {
        self.exchange = exchange;
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.kdf_iterations < MIN_KDF_ITERATIONS {
            return Err(ClientError::InvalidConfig(format!(
                "kdf_iterations {} is below the minimum of {MIN_KDF_ITERATIONS}",
                self.kdf_iterations
            )));
        }
        if self.passphrase_ttl.is_zero() {
            return Err(ClientError::InvalidConfig(
                "passphrase_ttl must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// The key deriver this configuration describes.
    pub fn key_deriver(&self) -> Result<KeyDeriver> {
        self.validate()?;
        Ok(KeyDeriver::with_iterations(self.kdf_iterations)?)
    }
}
