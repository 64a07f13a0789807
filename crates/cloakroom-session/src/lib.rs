//! # Cloakroom Session
//!
//! Session lifecycle and the local roster view for each space.
//!
//! ## Overview
//!
//! Every time a client enters a space it starts a fresh session with a random
//! id. The set of sessions currently in a space is the *roster*; the hybrid
//! cipher derives its session key from it. Rosters are assembled from
//! unreliable join/leave notifications, so every view here is best-effort.
//!
//! ## Key Types
//!
//! - [`SessionRegistry`] - per-space local session plus known peers
//! - [`Session`] / [`SessionState`] - `Unjoined -> Active -> Left`
//! - [`Roster`] - sorted snapshot of session ids
//! - [`RosterSender`] / [`RosterReceiver`] - delta feed from the transport
//!
//! ## Usage
//!
//! ```rust
//! use cloakroom_core::{SessionId, SpaceId};
//! use cloakroom_session::{roster_feed, SessionRegistry};
//!
//! let (tx, rx) = roster_feed();
//! let mut registry = SessionRegistry::with_feed(rx);
//! let space = SpaceId::new("abc").unwrap();
//!
//! let own = registry.initialize_session(&space);
//! tx.join(space.clone(), SessionId::new("peer").unwrap()).unwrap();
//!
//! let roster = registry.roster_snapshot(&space).unwrap();
//! assert!(roster.contains(&own));
//! assert_eq!(roster.len(), 2);
//! ```

pub mod error;
pub mod registry;
pub mod roster;

pub use error::{Result, SessionError};
pub use registry::{Session, SessionRegistry, SessionState};
pub use roster::{roster_feed, Roster, RosterChange, RosterEvent, RosterReceiver, RosterSender};
