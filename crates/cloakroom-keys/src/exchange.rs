//! X25519 public-key exchange between sessions in a space.
//!
//! Each session announces its public key when it enters a space, asks for
//! missing keys with a request, and answers requests addressed to the space.
//! Received keys are recorded in the [`SpaceKeyStore`], which derives the
//! pairwise secrets.
//!
//! ```text
//! A ── Announce{pk_A} ──▶ all
//! B ── Request ─────────▶ all
//! A ── Respond{to: B, pk_A} ──▶ all   (only B records it)
//! ```
//!
//! The message cipher does not read these secrets; they are kept up to date
//! for protocols layered on top.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use cloakroom_core::{SessionId, SpaceId};
use serde::{Deserialize, Serialize};

use crate::crypto::X25519PublicKey;
use crate::error::Result;
use crate::store::SpaceKeyStore;

/// Messages of the key exchange protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum KeyExchangeMessage {
    /// Unsolicited announcement of a session's public key.
    Announce {
        /// Space the key is for.
        space_id: SpaceId,
        /// Announcing session.
        from: SessionId,
        /// The session's public key for this space.
        public_key: X25519PublicKey,
    },

    /// Ask every session in the space to send its public key.
    Request {
        /// Space being asked.
        space_id: SpaceId,
        /// Requesting session.
        from: SessionId,
    },

    /// Reply to a request.
    Respond {
        /// Space the key is for.
        space_id: SpaceId,
        /// Responding session.
        from: SessionId,
        /// The requesting session.
        to: SessionId,
        /// The responder's public key.
        public_key: X25519PublicKey,
    },
}

impl KeyExchangeMessage {
    /// The space the message belongs to.
    pub fn space_id(&self) -> &SpaceId {
        match self {
            KeyExchangeMessage::Announce { space_id, .. }
            | KeyExchangeMessage::Request { space_id, .. }
            | KeyExchangeMessage::Respond { space_id, .. } => space_id,
        }
    }

    /// The sending session.
    pub fn from(&self) -> &SessionId {
        match self {
            KeyExchangeMessage::Announce { from, .. }
            | KeyExchangeMessage::Request { from, .. }
            | KeyExchangeMessage::Respond { from, .. } => from,
        }
    }
}

/// Key exchange settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyExchangeConfig {
    /// Minimum spacing between two requests for the same space.
    pub request_interval: Duration,
}

impl Default for KeyExchangeConfig {
    fn default() -> Self {
        Self {
            request_interval: Duration::from_secs(5),
        }
    }
}

/// Drives the announce/request/respond protocol.
///
/// Holds only the request rate-limit state; all key material lives in the
/// [`SpaceKeyStore`] passed to each call.
#[derive(Debug, Default)]
pub struct KeyExchangeCoordinator {
    config: KeyExchangeConfig,
    last_request: HashMap<SpaceId, Instant>,
}

impl KeyExchangeCoordinator {
    /// Create a coordinator.
    pub fn new(config: KeyExchangeConfig) -> Self {
        Self {
            config,
            last_request: HashMap::new(),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &KeyExchangeConfig {
        &self.config
    }

    /// Build an announcement of our public key in `space_id`.
    pub fn announce(
        &self,
        store: &SpaceKeyStore,
        space_id: &SpaceId,
        own: &SessionId,
    ) -> Result<KeyExchangeMessage> {
        let material = store.require(space_id)?;
        Ok(KeyExchangeMessage::Announce {
            space_id: space_id.clone(),
            from: own.clone(),
            public_key: material.public_key(),
        })
    }

    /// Build a key request, unless one was sent for the space too recently.
    pub fn request(&mut self, space_id: &SpaceId, own: &SessionId) -> Option<KeyExchangeMessage> {
        self.request_at(space_id, own, Instant::now())
    }

    /// Build a key request as of `now`.
    pub fn request_at(
        &mut self,
        space_id: &SpaceId,
        own: &SessionId,
        now: Instant,
    ) -> Option<KeyExchangeMessage> {
        if let Some(last) = self.last_request.get(space_id) {
            if now.saturating_duration_since(*last) < self.config.request_interval {
                tracing::debug!(space = %space_id, "key request rate limited");
                return None;
            }
        }

        self.last_request.insert(space_id.clone(), now);
        Some(KeyExchangeMessage::Request {
            space_id: space_id.clone(),
            from: own.clone(),
        })
    }

    /// Process an inbound message. Returns a reply to send, if any.
    ///
    /// Our own messages, responses addressed to another session and messages
    /// for spaces without key material are ignored.
    pub fn handle(
        &mut self,
        store: &mut SpaceKeyStore,
        own: &SessionId,
        message: KeyExchangeMessage,
    ) -> Result<Option<KeyExchangeMessage>> {
        if message.from() == own {
            return Ok(None);
        }
        if !store.contains(message.space_id()) {
            tracing::debug!(space = %message.space_id(), "key exchange for unknown space ignored");
            return Ok(None);
        }

        match message {
            KeyExchangeMessage::Announce {
                space_id,
                from,
                public_key,
            } => {
                if store.record_peer_key(&space_id, from.clone(), public_key)? {
                    tracing::debug!(space = %space_id, peer = ?from, "peer key recorded");
                }
                Ok(None)
            }
            KeyExchangeMessage::Request { space_id, from } => {
                let material = store.require(&space_id)?;
                Ok(Some(KeyExchangeMessage::Respond {
                    public_key: material.public_key(),
                    space_id,
                    from: own.clone(),
                    to: from,
                }))
            }
            KeyExchangeMessage::Respond {
                space_id,
                from,
                to,
                public_key,
            } => {
                if &to != own {
                    return Ok(None);
                }
                if store.record_peer_key(&space_id, from.clone(), public_key)? {
                    tracing::debug!(space = %space_id, peer = ?from, "peer key recorded");
                }
                Ok(None)
            }
        }
    }

    /// Forget a peer that left the space.
    pub fn forget_peer(
        &mut self,
        store: &mut SpaceKeyStore,
        space_id: &SpaceId,
        session_id: &SessionId,
    ) -> bool {
        store.forget_peer(space_id, session_id)
    }

    /// Drop rate-limit state for a space we left.
    pub fn forget_space(&mut self, space_id: &SpaceId) {
        self.last_request.remove(space_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloakroom_core::EncryptionKey;

    fn space(id: &str) -> SpaceId {
        SpaceId::new(id).unwrap()
    }

    fn session(id: &str) -> SessionId {
        SessionId::new(id).unwrap()
    }

    fn store_for(space_id: &SpaceId) -> SpaceKeyStore {
        let mut store = SpaceKeyStore::new();
        store
            .insert(space_id.clone(), EncryptionKey::from_bytes([3; 32]), 0)
            .unwrap();
        store
    }

    #[test]
    fn test_announce_records_peer() {
        let abc = space("abc");
        let mut alice_store = store_for(&abc);
        let bob_store = store_for(&abc);
        let mut alice = KeyExchangeCoordinator::default();
        let bob = KeyExchangeCoordinator::default();

        let announce = bob.announce(&bob_store, &abc, &session("bob")).unwrap();
        let reply = alice
            .handle(&mut alice_store, &session("alice"), announce)
            .unwrap();

        assert!(reply.is_none());
        let material = alice_store.get(&abc).unwrap();
        assert_eq!(
            material.peer_public_key(&session("bob")),
            Some(&bob_store.get(&abc).unwrap().public_key())
        );
        assert!(material.peer_secret(&session("bob")).is_some());
    }

    #[test]
    fn test_request_respond_flow() {
        let abc = space("abc");
        let mut alice_store = store_for(&abc);
        let mut bob_store = store_for(&abc);
        let mut alice = KeyExchangeCoordinator::default();
        let mut bob = KeyExchangeCoordinator::default();

        let request = bob.request(&abc, &session("bob")).unwrap();
        let response = alice
            .handle(&mut alice_store, &session("alice"), request)
            .unwrap()
            .unwrap();

        // A third session sees the response but it is not addressed to it.
        let mut carol_store = store_for(&abc);
        let mut carol = KeyExchangeCoordinator::default();
        carol
            .handle(&mut carol_store, &session("carol"), response.clone())
            .unwrap();
        assert_eq!(carol_store.get(&abc).unwrap().peer_count(), 0);

        bob.handle(&mut bob_store, &session("bob"), response).unwrap();
        assert!(bob_store
            .get(&abc)
            .unwrap()
            .peer_secret(&session("alice"))
            .is_some());
    }

    #[test]
    fn test_own_messages_ignored() {
        let abc = space("abc");
        let mut store = store_for(&abc);
        let mut coordinator = KeyExchangeCoordinator::default();

        let announce = coordinator.announce(&store, &abc, &session("me")).unwrap();
        let reply = coordinator
            .handle(&mut store, &session("me"), announce)
            .unwrap();

        assert!(reply.is_none());
        assert_eq!(store.get(&abc).unwrap().peer_count(), 0);
    }

    #[test]
    fn test_unknown_space_ignored() {
        let mut store = SpaceKeyStore::new();
        let mut coordinator = KeyExchangeCoordinator::default();

        let request = KeyExchangeMessage::Request {
            space_id: space("abc"),
            from: session("peer"),
        };
        assert!(coordinator
            .handle(&mut store, &session("me"), request)
            .unwrap()
            .is_none());
        assert!(coordinator
            .announce(&store, &space("abc"), &session("me"))
            .is_err());
    }

    #[test]
    fn test_requests_are_rate_limited() {
        let abc = space("abc");
        let me = session("me");
        let mut coordinator = KeyExchangeCoordinator::new(KeyExchangeConfig {
            request_interval: Duration::from_secs(5),
        });
        let start = Instant::now();

        assert!(coordinator.request_at(&abc, &me, start).is_some());
        assert!(coordinator
            .request_at(&abc, &me, start + Duration::from_secs(1))
            .is_none());
        assert!(coordinator
            .request_at(&space("other"), &me, start + Duration::from_secs(1))
            .is_some());
        assert!(coordinator
            .request_at(&abc, &me, start + Duration::from_secs(5))
            .is_some());

        coordinator.forget_space(&abc);
        assert!(coordinator
            .request_at(&abc, &me, start + Duration::from_secs(6))
            .is_some());
    }

    #[test]
    fn test_forget_peer_drops_secret() {
        let abc = space("abc");
        let mut store = store_for(&abc);
        let other = store_for(&abc);
        let mut coordinator = KeyExchangeCoordinator::default();

        let announce = coordinator.announce(&other, &abc, &session("peer")).unwrap();
        coordinator
            .handle(&mut store, &session("me"), announce)
            .unwrap();

        assert!(coordinator.forget_peer(&mut store, &abc, &session("peer")));
        assert!(store
            .get(&abc)
            .unwrap()
            .peer_secret(&session("peer"))
            .is_none());
    }

    #[test]
    fn test_message_wire_shape() {
        let message = KeyExchangeMessage::Request {
            space_id: space("abc"),
            from: session("s1"),
        };
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["kind"], "request");
        assert_eq!(value["space_id"], "abc");
        assert_eq!(value["from"], "s1");

        let parsed: KeyExchangeMessage = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, message);
    }
}
