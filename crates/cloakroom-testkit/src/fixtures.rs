//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a fixed space with a derived key,
//! and groups of clients wired together over the in-memory relay.

use std::sync::Arc;
use std::time::Duration;

use cloakroom::{
    Client, ClientConfig, ClientEvent, DecryptPath, Decrypted, EncryptedEnvelope, HybridCipher,
};
use cloakroom_core::{
    derive_key, EncryptionKey, Result as CoreResult, SessionId, SpaceId, Zeroizing,
};
use cloakroom_session::Roster;
use cloakroom_sync::{MemoryNetwork, MemoryTransport, Transport};

/// Space used by the reference vectors.
pub const TEST_SPACE: &str = "abc";

/// Passphrase used by the reference vectors.
pub const TEST_PASSPHRASE: &str = "friends-42";

/// Receive timeout for fixture clients. Short, so draining a quiet client
/// returns promptly.
pub const FIXTURE_RECV_TIMEOUT: Duration = Duration::from_millis(50);

/// A client connected to the in-memory relay.
pub type TestClient = Client<MemoryTransport>;

/// A space together with its deterministic key.
pub struct TestFixture {
    pub space_id: SpaceId,
    pub key: EncryptionKey,
    pub cipher: HybridCipher,
}

impl TestFixture {
    /// The reference space and passphrase.
    pub fn new() -> Self {
        Self::with_passphrase(TEST_SPACE, TEST_PASSPHRASE)
            .unwrap_or_else(|_| unreachable!("reference space id is non-empty"))
    }

    /// Derive the key for an arbitrary space and passphrase.
    pub fn with_passphrase(space: &str, passphrase: &str) -> CoreResult<Self> {
        let space_id = SpaceId::new(space)?;
        let key = derive_key(&space_id, passphrase)?;
        Ok(Self {
            space_id,
            key,
            cipher: HybridCipher::default(),
        })
    }

    /// Sessions named `s1..=sN`.
    pub fn session_ids(&self, count: usize) -> Vec<SessionId> {
        (1..=count)
            .filter_map(|i| SessionId::new(format!("s{i}")).ok())
            .collect()
    }

    /// A roster of `s1..=sN`.
    pub fn roster(&self, count: usize) -> Roster {
        self.session_ids(count).into_iter().collect()
    }

    /// Seal `plaintext` for a roster of `count` sessions.
    pub fn seal(&self, plaintext: &[u8], count: usize) -> cloakroom::Result<EncryptedEnvelope> {
        Ok(self
            .cipher
            .seal(plaintext, &self.space_id, &self.key, &self.roster(count))?)
    }

    /// Open an envelope with a roster of `count` sessions.
    pub fn open(
        &self,
        envelope: &EncryptedEnvelope,
        count: usize,
    ) -> cloakroom::Result<Decrypted> {
        Ok(self
            .cipher
            .open(envelope, &self.space_id, &self.key, &self.roster(count))?)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Space id from a literal.
///
/// # Panics
///
/// Panics on an empty id.
pub fn space(id: &str) -> SpaceId {
    SpaceId::new(id).unwrap_or_else(|_| panic!("space id must be non-empty"))
}

/// Passphrase from a literal.
pub fn passphrase(s: &str) -> Zeroizing<String> {
    Zeroizing::new(s.to_string())
}

/// Install a test-friendly tracing subscriber. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A client on `network` with the fixture receive timeout.
pub async fn client(network: &Arc<MemoryNetwork>) -> cloakroom::Result<TestClient> {
    let config = ClientConfig::default().with_recv_timeout(FIXTURE_RECV_TIMEOUT);
    Client::new(network.create_transport().await, config)
}

/// Create `count` clients that have all entered `space` with `passphrase`
/// and exchanged presence and keys.
pub async fn clients_in_space(
    count: usize,
    space: &SpaceId,
    passphrase: &str,
) -> cloakroom::Result<(Arc<MemoryNetwork>, Vec<TestClient>)> {
    let network = MemoryNetwork::new();
    let mut clients = Vec::with_capacity(count);
    for _ in 0..count {
        let mut c = client(&network).await?;
        c.enter_space(space, Zeroizing::new(passphrase.to_string())).await?;
        clients.push(c);
    }
    settle(&mut clients).await?;
    Ok((network, clients))
}

/// Pump a client until it goes quiet, returning what it reported.
pub async fn drain<T: Transport>(client: &mut Client<T>) -> cloakroom::Result<Vec<ClientEvent>> {
    let mut events = Vec::new();
    while let Some(event) = client.next_event().await? {
        events.push(event);
    }
    Ok(events)
}

/// Pump every client until the whole network is quiet.
pub async fn settle<T: Transport>(
    clients: &mut [Client<T>],
) -> cloakroom::Result<Vec<Vec<ClientEvent>>> {
    let mut all = vec![Vec::new(); clients.len()];
    loop {
        let mut quiet = true;
        for (i, client) in clients.iter_mut().enumerate() {
            let events = drain(client).await?;
            quiet &= events.is_empty();
            all[i].extend(events);
        }
        if quiet {
            return Ok(all);
        }
    }
}

/// Text and decrypt path of every message event.
pub fn messages(events: &[ClientEvent]) -> Vec<(String, DecryptPath)> {
    events
        .iter()
        .filter_map(|event| match event {
            ClientEvent::Message { text, path, .. } => Some((text.clone(), *path)),
            _ => None,
        })
        .collect()
}
