//! Transport abstraction for the relay.
//!
//! A transport publishes [`RelayMessage`]s to every other subscriber of a
//! space and yields what others publish. Delivery is best-effort: messages
//! may be lost, and nothing above this layer relies on ordering between
//! spaces. Implementations may use WebSockets, HTTP or anything else.

use std::time::Duration;

use async_trait::async_trait;
use cloakroom_core::SpaceId;

use crate::error::Result;
use crate::messages::{PeerId, RelayMessage};

/// Transport trait for publishing and receiving relay messages.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start receiving messages published to a space.
    async fn subscribe(&self, space_id: &SpaceId) -> Result<()>;

    /// Stop receiving messages for a space.
    async fn unsubscribe(&self, space_id: &SpaceId) -> Result<()>;

    /// Publish to every other subscriber of the message's space.
    async fn publish(&self, message: RelayMessage) -> Result<()>;

    /// Receive the next message from any subscribed space.
    async fn recv(&self) -> Result<(PeerId, RelayMessage)>;

    /// Receive with timeout. Returns `None` if nothing arrived in time.
    async fn recv_timeout(&self, timeout: Duration) -> Result<Option<(PeerId, RelayMessage)>>;

    /// This endpoint's identity.
    fn local_peer_id(&self) -> PeerId;
}

/// An in-memory relay for tests and local demos.
///
/// Messages are CBOR-encoded on publish and decoded on receive, so the wire
/// form is exercised even without a network.
pub mod memory {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use tokio::sync::{mpsc, Mutex, RwLock};

    use crate::error::SyncError;

    /// Frame routed between endpoints.
    #[derive(Debug)]
    struct Frame {
        from: PeerId,
        bytes: Vec<u8>,
    }

    /// Shared state for the in-memory relay.
    #[derive(Default)]
    pub struct MemoryNetwork {
        /// Inbox of each endpoint.
        senders: RwLock<HashMap<PeerId, mpsc::Sender<Frame>>>,
        /// Subscribers of each space.
        subscriptions: RwLock<HashMap<SpaceId, HashSet<PeerId>>>,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Create a transport connected to this network.
        pub async fn create_transport(self: &Arc<Self>) -> MemoryTransport {
            let peer_id = PeerId::random();
            let (tx, rx) = mpsc::channel(1000);

            self.senders.write().await.insert(peer_id, tx);

            MemoryTransport {
                peer_id,
                network: Arc::clone(self),
                receiver: Mutex::new(rx),
            }
        }

        /// Remove an endpoint and all its subscriptions.
        pub async fn disconnect(&self, peer_id: &PeerId) {
            self.senders.write().await.remove(peer_id);
            let mut subscriptions = self.subscriptions.write().await;
            for subscribers in subscriptions.values_mut() {
                subscribers.remove(peer_id);
            }
            subscriptions.retain(|_, subscribers| !subscribers.is_empty());
        }

        /// Current subscribers of a space.
        pub async fn subscribers(&self, space_id: &SpaceId) -> Vec<PeerId> {
            self.subscriptions
                .read()
                .await
                .get(space_id)
                .map(|subscribers| subscribers.iter().copied().collect())
                .unwrap_or_default()
        }
    }

    /// In-memory transport implementation.
    pub struct MemoryTransport {
        peer_id: PeerId,
        network: Arc<MemoryNetwork>,
        receiver: Mutex<mpsc::Receiver<Frame>>,
    }

    impl MemoryTransport {
        fn decode(frame: Frame) -> Result<(PeerId, RelayMessage)> {
            let message = RelayMessage::from_bytes(&frame.bytes)?;
            Ok((frame.from, message))
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn subscribe(&self, space_id: &SpaceId) -> Result<()> {
            self.network
                .subscriptions
                .write()
                .await
                .entry(space_id.clone())
                .or_default()
                .insert(self.peer_id);
            Ok(())
        }

        async fn unsubscribe(&self, space_id: &SpaceId) -> Result<()> {
            let mut subscriptions = self.network.subscriptions.write().await;
            if let Some(subscribers) = subscriptions.get_mut(space_id) {
                subscribers.remove(&self.peer_id);
                if subscribers.is_empty() {
                    subscriptions.remove(space_id);
                }
            }
            Ok(())
        }

        async fn publish(&self, message: RelayMessage) -> Result<()> {
            message.validate()?;
            let bytes = message.to_bytes()?;

            let targets: Vec<PeerId> = {
                let subscriptions = self.network.subscriptions.read().await;
                let subscribers = subscriptions
                    .get(message.space_id())
                    .filter(|subscribers| subscribers.contains(&self.peer_id))
                    .ok_or_else(|| SyncError::NotSubscribed(message.space_id().clone()))?;
                subscribers
                    .iter()
                    .filter(|peer| **peer != self.peer_id)
                    .copied()
                    .collect()
            };

            let senders = self.network.senders.read().await;
            for peer in targets {
                if let Some(sender) = senders.get(&peer) {
                    let frame = Frame {
                        from: self.peer_id,
                        bytes: bytes.clone(),
                    };
                    // Disconnected peers simply miss the message.
                    let _ = sender.send(frame).await;
                }
            }

            tracing::trace!(space = %message.space_id(), kind = message.name(), "published");
            Ok(())
        }

        async fn recv(&self) -> Result<(PeerId, RelayMessage)> {
            let mut rx = self.receiver.lock().await;
            match rx.recv().await {
                Some(frame) => Self::decode(frame),
                None => Err(SyncError::TransportError("channel closed".into())),
            }
        }

        async fn recv_timeout(&self, timeout: Duration) -> Result<Option<(PeerId, RelayMessage)>> {
            let mut rx = self.receiver.lock().await;
            match tokio::time::timeout(timeout, rx.recv()).await {
                Ok(Some(frame)) => Self::decode(frame).map(Some),
                Ok(None) => Err(SyncError::TransportError("channel closed".into())),
                Err(_) => Ok(None),
            }
        }

        fn local_peer_id(&self) -> PeerId {
            self.peer_id
        }
    }
}
