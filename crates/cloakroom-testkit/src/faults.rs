//! A transport that fails on request.
//!
//! Wraps a [`MemoryTransport`] and injects errors into subscribe and publish,
//! for exercising the client's error paths.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cloakroom::{Client, ClientConfig};
use cloakroom_core::SpaceId;
use cloakroom_sync::{MemoryNetwork, MemoryTransport, PeerId, RelayMessage, SyncError, Transport};

use crate::fixtures::FIXTURE_RECV_TIMEOUT;

/// Fault switches shared by a [`FaultyTransport`].
#[derive(Debug, Default)]
pub struct Faults {
    failing_subscribes: AtomicUsize,
    failing_publishes: AtomicUsize,
    reject_key_exchange: AtomicBool,
    subscribe_calls: AtomicUsize,
}

impl Faults {
    /// Fail the next `count` subscribe calls.
    pub fn fail_subscribes(&self, count: usize) {
        self.failing_subscribes.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` publish calls.
    pub fn fail_publishes(&self, count: usize) {
        self.failing_publishes.store(count, Ordering::SeqCst);
    }

    /// Refuse every key exchange message while set.
    pub fn reject_key_exchange(&self, reject: bool) {
        self.reject_key_exchange.store(reject, Ordering::SeqCst);
    }

    /// How many times subscribe reached the transport.
    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// A [`MemoryTransport`] with injectable failures.
pub struct FaultyTransport {
    inner: MemoryTransport,
    faults: Arc<Faults>,
}

impl FaultyTransport {
    /// Connect a new endpoint to `network`.
    pub async fn connect(network: &Arc<MemoryNetwork>) -> Self {
        Self {
            inner: network.create_transport().await,
            faults: Arc::default(),
        }
    }

    /// The fault switches.
    pub fn faults(&self) -> &Faults {
        &self.faults
    }
}

#[async_trait]
impl Transport for FaultyTransport {
    async fn subscribe(&self, space_id: &SpaceId) -> cloakroom_sync::Result<()> {
        self.faults.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if Faults::take(&self.faults.failing_subscribes) {
            return Err(SyncError::TransportError("subscribe refused".into()));
        }
        self.inner.subscribe(space_id).await
    }

    async fn unsubscribe(&self, space_id: &SpaceId) -> cloakroom_sync::Result<()> {
        self.inner.unsubscribe(space_id).await
    }

    async fn publish(&self, message: RelayMessage) -> cloakroom_sync::Result<()> {
        if self.faults.reject_key_exchange.load(Ordering::SeqCst)
            && matches!(message, RelayMessage::KeyExchange(_))
        {
            return Err(SyncError::TransportError("key exchange refused".into()));
        }
        if Faults::take(&self.faults.failing_publishes) {
            return Err(SyncError::TransportError("publish refused".into()));
        }
        self.inner.publish(message).await
    }

    async fn recv(&self) -> cloakroom_sync::Result<(PeerId, RelayMessage)> {
        self.inner.recv().await
    }

    async fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> cloakroom_sync::Result<Option<(PeerId, RelayMessage)>> {
        self.inner.recv_timeout(timeout).await
    }

    fn local_peer_id(&self) -> PeerId {
        self.inner.local_peer_id()
    }
}

/// A client on `network` whose transport can be told to fail.
pub async fn faulty_client(
    network: &Arc<MemoryNetwork>,
) -> cloakroom::Result<Client<FaultyTransport>> {
    let config = ClientConfig::default().with_recv_timeout(FIXTURE_RECV_TIMEOUT);
    Client::new(FaultyTransport::connect(network).await, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloakroom_core::SessionId;

    fn join() -> RelayMessage {
        RelayMessage::Join {
            space_id: SpaceId::new("abc").unwrap(),
            session_id: SessionId::new("s1").unwrap(),
        }
    }

    #[tokio::test]
    async fn test_faults_are_consumed() {
        let network = MemoryNetwork::new();
        let transport = FaultyTransport::connect(&network).await;
        let abc = SpaceId::new("abc").unwrap();

        transport.faults().fail_subscribes(1);
        assert!(transport.subscribe(&abc).await.is_err());
        assert!(transport.subscribe(&abc).await.is_ok());
        assert_eq!(transport.faults().subscribe_calls(), 2);

        transport.faults().fail_publishes(1);
        assert!(transport.publish(join()).await.is_err());
        assert!(transport.publish(join()).await.is_ok());
    }
}
