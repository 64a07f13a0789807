//! # Cloakroom Sync
//!
//! Wire messages and the transport seam between clients and the relay.
//!
//! ## Overview
//!
//! Clients never talk to each other directly. Each one subscribes to the
//! spaces it has entered and publishes [`RelayMessage`]s; the relay fans
//! them out to the other subscribers. The relay is untrusted: it routes by
//! space id and only ever carries ciphertext.
//!
//! ## Message Flow
//!
//! ```text
//! Client A                 Relay                  Client B
//!   |---- Join ------------>|---- Join ------------>|
//!   |<--- Presence ---------|<--- Presence ---------|
//!   |---- KeyExchange ----->|---- KeyExchange ----->|
//!   |---- Chat{envelope} -->|---- Chat{envelope} -->|
//!   |---- Leave ----------->|---- Leave ----------->|
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cloakroom_core::{SessionId, SpaceId};
//! use cloakroom_sync::{MemoryNetwork, RelayMessage, Transport};
//!
//! async fn example() -> cloakroom_sync::Result<()> {
//!     let network = MemoryNetwork::new();
//!     let transport = network.create_transport().await;
//!     let space = SpaceId::new("abc")?;
//!
//!     transport.subscribe(&space).await?;
//!     transport
//!         .publish(RelayMessage::Join {
//!             space_id: space,
//!             session_id: SessionId::generate(),
//!         })
//!         .await
//! }
//! ```

pub mod error;
pub mod messages;
pub mod transport;

pub use error::{Result, SyncError};
pub use messages::{limits, PeerId, RelayMessage};
pub use transport::{memory::MemoryNetwork, memory::MemoryTransport, Transport};
