//! The Client: unified API for a Cloakroom participant.
//!
//! The Client brings together session tracking, key material, the hybrid
//! cipher and the relay transport behind one owned value. It holds no global
//! state; two clients in one process are fully independent.

use std::time::Duration;

use cloakroom_core::{
    now_millis, EncryptedEnvelope, EncryptionKey, KeyDeriver, SessionId, SpaceId, Zeroizing,
};
use cloakroom_keys::{KeyExchangeCoordinator, PassphraseCache, SpaceKeyMaterial, SpaceKeyStore};
use cloakroom_session::{roster_feed, Roster, RosterSender, Session, SessionRegistry};
use cloakroom_sync::{RelayMessage, Transport};

use crate::cipher::{Decrypted, DecryptPath, HybridCipher};
use crate::config::ClientConfig;
use crate::error::{CipherError, ClientError, Result};
use crate::status::{EncryptionLevel, SpaceStatus};

/// Something that happened in a space, as reported by [`Client::next_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A session joined, or announced it was already present.
    PeerJoined {
        /// The space.
        space_id: SpaceId,
        /// The peer session.
        session_id: SessionId,
    },

    /// A session left.
    PeerLeft {
        /// The space.
        space_id: SpaceId,
        /// The departed session.
        session_id: SessionId,
    },

    /// A chat message was decrypted.
    Message {
        /// The space.
        space_id: SpaceId,
        /// Sending session.
        from: SessionId,
        /// The message text.
        text: String,
        /// How it was decrypted.
        path: DecryptPath,
        /// Sender clock (Unix ms).
        sent_at: i64,
    },

    /// A chat message arrived but could not be decrypted.
    Undecryptable {
        /// The space.
        space_id: SpaceId,
        /// Sending session.
        from: SessionId,
        /// Why it failed.
        error: CipherError,
    },
}

/// A Cloakroom participant.
///
/// Provides a unified API for:
/// - Entering and leaving spaces
/// - Encrypting and decrypting messages
/// - Sending messages and processing inbound relay traffic
/// - Reporting per-space status
pub struct Client<T: Transport> {
    transport: T,
    config: ClientConfig,
    deriver: KeyDeriver,
    cipher: HybridCipher,
    registry: SessionRegistry,
    keys: SpaceKeyStore,
    passphrases: PassphraseCache,
    exchange: KeyExchangeCoordinator,
    roster_tx: RosterSender,
}

impl<T: Transport> Client<T> {
    /// Create a client on top of `transport`.
    pub fn new(transport: T, config: ClientConfig) -> Result<Self> {
        let deriver = config.key_deriver()?;
        let (roster_tx, roster_rx) = roster_feed();

        Ok(Self {
            transport,
            deriver,
            cipher: HybridCipher::new(config.algorithm),
            registry: SessionRegistry::with_feed(roster_rx),
            keys: SpaceKeyStore::new(),
            passphrases: PassphraseCache::new(config.passphrase_ttl),
            exchange: KeyExchangeCoordinator::new(config.exchange),
            roster_tx,
            config,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Our session id in a space.
    pub fn session_id(&self, space_id: &SpaceId) -> Option<&SessionId> {
        self.registry.current_session_id(space_id)
    }

    /// Key material held for a space.
    pub fn key_material(&self, space_id: &SpaceId) -> Option<&SpaceKeyMaterial> {
        self.keys.get(space_id)
    }

    /// A sender for roster notifications from an external transport.
    pub fn roster_sender(&self) -> RosterSender {
        self.roster_tx.clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Space Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a space with its passphrase.
    ///
    /// Derives the deterministic key, subscribes to the space, starts a
    /// session and announces ourselves. Nothing is kept if subscribing or
    /// the join announcement fails, so the call can simply be retried.
    ///
    /// Entering a space we are already in returns the existing session id,
    /// provided the passphrase matches the one in use; a different one is
    /// rejected with [`ClientError::PassphraseMismatch`].
    pub async fn enter_space(
        &mut self,
        space_id: &SpaceId,
        passphrase: Zeroizing<String>,
    ) -> Result<SessionId> {
        if let Some(existing) = self.registry.current_session_id(space_id).cloned() {
            self.confirm_passphrase(space_id, passphrase).await?;
            return Ok(existing);
        }

        let key = self
            .deriver
            .derive_key_async(space_id.clone(), passphrase.clone())
            .await
            .map_err(CipherError::from)?;

        self.transport.subscribe(space_id).await?;

        self.keys.evict(space_id);
        self.keys.insert(space_id.clone(), key, now_millis())?;
        self.passphrases.remember(space_id.clone(), passphrase);
        let session_id = self.registry.initialize_session(space_id);

        let joined = self
            .publish(RelayMessage::Join {
                space_id: space_id.clone(),
                session_id: session_id.clone(),
            })
            .await;
        if let Err(error) = joined {
            self.abandon_space(space_id).await;
            return Err(error);
        }
        self.announce_key(space_id, &session_id).await;

        tracing::info!(space = %space_id, session = ?session_id, "entered space");
        Ok(session_id)
    }

    /// Leave a space.
    ///
    /// Local state (session, key material, cached passphrase) is dropped
    /// before the departure is published.
    pub async fn leave_space(&mut self, space_id: &SpaceId) -> Result<Session> {
        let session = self
            .registry
            .leave_session(space_id)
            .ok_or_else(|| ClientError::NotInSpace(space_id.clone()))?;

        self.keys.evict(space_id);
        self.passphrases.forget(space_id);
        self.exchange.forget_space(space_id);

        self.publish(RelayMessage::Leave {
            space_id: space_id.clone(),
            session_id: session.session_id.clone(),
        })
        .await?;
        self.transport.unsubscribe(space_id).await?;

        tracing::info!(space = %space_id, session = ?session.session_id, "left space");
        Ok(session)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Encryption
    // ─────────────────────────────────────────────────────────────────────────

    /// Encrypt `plaintext` for a space.
    ///
    /// Produces a hybrid envelope when the roster holds more than one session
    /// and a deterministic one otherwise, including when the roster is
    /// unknown.
    pub async fn encrypt(
        &mut self,
        space_id: &SpaceId,
        plaintext: &[u8],
    ) -> Result<EncryptedEnvelope> {
        let key = self.resolve_key(space_id).await?;
        let roster = self.roster_or_empty(space_id);

        let envelope = self.cipher.seal(plaintext, space_id, &key, &roster)?;
        self.registry.touch(space_id);
        Ok(envelope)
    }

    /// Decrypt an envelope received in a space.
    pub async fn decrypt(
        &mut self,
        space_id: &SpaceId,
        envelope: &EncryptedEnvelope,
    ) -> Result<Decrypted> {
        let key = self.resolve_key(space_id).await?;
        let roster = self.roster_or_empty(space_id);

        let decrypted = self.cipher.open(envelope, space_id, &key, &roster)?;
        tracing::debug!(space = %space_id, path = decrypted.path.as_str(), "decrypted envelope");
        Ok(decrypted)
    }

    /// Encrypt `text` and publish it to the space.
    pub async fn send(&mut self, space_id: &SpaceId, text: &str) -> Result<EncryptedEnvelope> {
        let from = self
            .registry
            .current_session_id(space_id)
            .cloned()
            .ok_or_else(|| ClientError::NotInSpace(space_id.clone()))?;

        let envelope = self.encrypt(space_id, text.as_bytes()).await?;
        self.publish(RelayMessage::Chat {
            space_id: space_id.clone(),
            from,
            envelope: envelope.clone(),
            sent_at: now_millis(),
        })
        .await?;
        Ok(envelope)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inbound Traffic
    // ─────────────────────────────────────────────────────────────────────────

    /// Process inbound relay traffic until something worth reporting happens.
    ///
    /// Key exchange traffic is handled internally. Returns `None` once the
    /// configured receive timeout passes with nothing to report.
    pub async fn next_event(&mut self) -> Result<Option<ClientEvent>> {
        loop {
            let Some((_peer, message)) = self
                .transport
                .recv_timeout(self.config.recv_timeout)
                .await?
            else {
                return Ok(None);
            };

            if let Some(event) = self.dispatch(message).await? {
                return Ok(Some(event));
            }
        }
    }

    async fn dispatch(&mut self, message: RelayMessage) -> Result<Option<ClientEvent>> {
        let Some(own) = self.registry.current_session_id(message.space_id()).cloned() else {
            tracing::trace!(space = %message.space_id(), "message for a space we are not in");
            return Ok(None);
        };
        if message.sender() == &own {
            return Ok(None);
        }

        match message {
            RelayMessage::Join {
                space_id,
                session_id,
            } => {
                self.roster_tx.join(space_id.clone(), session_id.clone())?;
                self.publish(RelayMessage::Presence {
                    space_id: space_id.clone(),
                    session_id: own.clone(),
                })
                .await?;
                self.announce_key(&space_id, &own).await;
                Ok(Some(ClientEvent::PeerJoined {
                    space_id,
                    session_id,
                }))
            }
            RelayMessage::Presence {
                space_id,
                session_id,
            } => {
                self.roster_tx.join(space_id.clone(), session_id.clone())?;
                Ok(Some(ClientEvent::PeerJoined {
                    space_id,
                    session_id,
                }))
            }
            RelayMessage::Leave {
                space_id,
                session_id,
            } => {
                self.roster_tx.leave(space_id.clone(), session_id.clone())?;
                self.exchange
                    .forget_peer(&mut self.keys, &space_id, &session_id);
                Ok(Some(ClientEvent::PeerLeft {
                    space_id,
                    session_id,
                }))
            }
            RelayMessage::Chat {
                space_id,
                from,
                envelope,
                sent_at,
            } => {
                let missing_key = self
                    .keys
                    .get(&space_id)
                    .is_some_and(|material| material.peer_public_key(&from).is_none());
                if missing_key {
                    if let Err(error) = self.request_keys(&space_id).await {
                        tracing::warn!(space = %space_id, %error, "key request failed");
                    }
                }

                let opened = match self.decrypt(&space_id, &envelope).await {
                    Ok(decrypted) => {
                        let path = decrypted.path;
                        decrypted.into_text().map(|text| (text, path))
                    }
                    Err(ClientError::Cipher(error)) => Err(error),
                    Err(other) => Err(CipherError::KeyDerivationFailed(other.to_string())),
                };

                match opened {
                    Ok((text, path)) => Ok(Some(ClientEvent::Message {
                        space_id,
                        from,
                        text,
                        path,
                        sent_at,
                    })),
                    Err(error) => {
                        tracing::warn!(space = %space_id, from = ?from, %error, "undecryptable message");
                        Ok(Some(ClientEvent::Undecryptable {
                            space_id,
                            from,
                            error,
                        }))
                    }
                }
            }
            RelayMessage::KeyExchange(exchange_message) => {
                let reply = self
                    .exchange
                    .handle(&mut self.keys, &own, exchange_message)?;
                if let Some(reply) = reply {
                    self.publish(RelayMessage::KeyExchange(reply)).await?;
                }
                Ok(None)
            }
        }
    }

    /// Ask the space for every session's public key.
    ///
    /// Rate limited per space; returns false when the request was suppressed.
    pub async fn request_keys(&mut self, space_id: &SpaceId) -> Result<bool> {
        let own = self
            .registry
            .current_session_id(space_id)
            .cloned()
            .ok_or_else(|| ClientError::NotInSpace(space_id.clone()))?;

        match self.exchange.request(space_id, &own) {
            Some(request) => {
                self.publish(RelayMessage::KeyExchange(request)).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Status and Maintenance
    // ─────────────────────────────────────────────────────────────────────────

    /// Current status of a space.
    pub fn status(&mut self, space_id: &SpaceId) -> SpaceStatus {
        let active_sessions = self.registry.active_session_count(space_id);
        SpaceStatus {
            space_id: space_id.clone(),
            session_id: self.registry.current_session_id(space_id).cloned(),
            active_sessions,
            level: EncryptionLevel::for_session_count(active_sessions),
        }
    }

    /// Evict key material idle for longer than `max_idle` and expired passphrases.
    ///
    /// Evicted keys are re-derived from the passphrase cache on next use.
    pub fn evict_idle(&mut self, max_idle: Duration) -> Vec<SpaceId> {
        let evicted = self.keys.evict_idle(max_idle, now_millis());
        let purged = self.passphrases.purge_expired();
        if !evicted.is_empty() || purged > 0 {
            tracing::debug!(evicted = evicted.len(), purged, "evicted idle key material");
        }
        evicted
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    async fn resolve_key(&mut self, space_id: &SpaceId) -> Result<EncryptionKey> {
        let now = now_millis();
        if let Some(key) = self.keys.use_key(space_id, now) {
            return Ok(key.clone());
        }

        let passphrase = self.passphrases.get(space_id).ok_or_else(|| {
            CipherError::KeyDerivationFailed(format!("no passphrase cached for space {space_id}"))
        })?;
        let key = self
            .deriver
            .derive_key_async(space_id.clone(), passphrase)
            .await
            .map_err(CipherError::from)?;

        self.keys.insert(space_id.clone(), key.clone(), now)?;
        tracing::debug!(space = %space_id, "re-derived deterministic key");
        Ok(key)
    }

    fn roster_or_empty(&mut self, space_id: &SpaceId) -> Roster {
        self.registry
            .roster_snapshot(space_id)
            .unwrap_or_else(|err| {
                tracing::debug!(space = %space_id, %err, "no roster, treating as single session");
                Roster::new()
            })
    }

    /// Announce our public key. Key exchange is advisory, so a failed
    /// announcement is logged and otherwise ignored.
    async fn announce_key(&mut self, space_id: &SpaceId, own: &SessionId) {
        if !self.keys.contains(space_id) {
            return;
        }
        let announced = match self.exchange.announce(&self.keys, space_id, own) {
            Ok(announce) => self.publish(RelayMessage::KeyExchange(announce)).await,
            Err(error) => Err(error.into()),
        };
        if let Err(error) = announced {
            tracing::warn!(space = %space_id, %error, "key announcement failed");
        }
    }

    /// Check a passphrase offered for a space we are already in.
    async fn confirm_passphrase(
        &mut self,
        space_id: &SpaceId,
        passphrase: Zeroizing<String>,
    ) -> Result<()> {
        if let Some(cached) = self.passphrases.get(space_id) {
            if cached.as_str() != passphrase.as_str() {
                return Err(ClientError::PassphraseMismatch(space_id.clone()));
            }
            self.passphrases.remember(space_id.clone(), passphrase);
            return Ok(());
        }

        // The cached passphrase expired; check against the key still held.
        let offered = self
            .deriver
            .derive_key_async(space_id.clone(), passphrase.clone())
            .await
            .map_err(CipherError::from)?;

        match self.keys.get(space_id) {
            Some(material) if material.deterministic_key().as_bytes() != offered.as_bytes() => {
                return Err(ClientError::PassphraseMismatch(space_id.clone()));
            }
            Some(_) => {}
            None => {
                self.keys.insert(space_id.clone(), offered, now_millis())?;
            }
        }

        self.passphrases.remember(space_id.clone(), passphrase);
        Ok(())
    }

    /// Undo a partially completed `enter_space`.
    async fn abandon_space(&mut self, space_id: &SpaceId) {
        self.registry.leave_session(space_id);
        self.keys.evict(space_id);
        self.passphrases.forget(space_id);
        self.exchange.forget_space(space_id);
        if let Err(error) = self.transport.unsubscribe(space_id).await {
            tracing::warn!(space = %space_id, %error, "unsubscribe after failed entry");
        }
    }

    async fn publish(&self, message: RelayMessage) -> Result<()> {
        Ok(self.transport.publish(message).await?)
    }
}
