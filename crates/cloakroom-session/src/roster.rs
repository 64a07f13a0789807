//! Roster snapshots and the roster delta feed.
//!
//! A [`Roster`] is an owned, sorted snapshot of the sessions believed to be
//! active in a space. Join/leave notifications from the transport travel as
//! [`RosterEvent`]s over an unbounded channel; the registry drains the
//! channel before each snapshot, so the transport never touches registry
//! state directly.

use std::collections::BTreeSet;

use cloakroom_core::{SessionId, SpaceId};
use tokio::sync::mpsc;

use crate::error::{Result, SessionError};

/// Sorted set of session ids believed to be active in a space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    members: BTreeSet<SessionId>,
}

impl Roster {
    /// Create an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions in the roster.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether more than one session is present.
    pub fn is_multi_party(&self) -> bool {
        self.members.len() > 1
    }

    /// Check membership.
    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.members.contains(session_id)
    }

    /// Add a session. Returns false if it was already present.
    pub fn insert(&mut self, session_id: SessionId) -> bool {
        self.members.insert(session_id)
    }

    /// Iterate in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = &SessionId> {
        self.members.iter()
    }

    /// Members as a sorted vector.
    pub fn to_sorted_vec(&self) -> Vec<SessionId> {
        self.members.iter().cloned().collect()
    }

    /// Consume into the underlying ordered set.
    pub fn into_set(self) -> BTreeSet<SessionId> {
        self.members
    }
}

impl FromIterator<SessionId> for Roster {
    fn from_iter<I: IntoIterator<Item = SessionId>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Roster {
    type Item = &'a SessionId;
    type IntoIter = std::collections::btree_set::Iter<'a, SessionId>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

/// What happened to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RosterChange {
    /// The session entered the space.
    Join,
    /// The session left the space.
    Leave,
}

/// A roster change notification as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEvent {
    /// The space the change applies to.
    pub space_id: SpaceId,
    /// The session that joined or left.
    pub session_id: SessionId,
    /// Join or leave.
    pub change: RosterChange,
}

impl RosterEvent {
    /// A join notification.
    pub fn join(space_id: SpaceId, session_id: SessionId) -> Self {
        Self {
            space_id,
            session_id,
            change: RosterChange::Join,
        }
    }

    /// A leave notification.
    pub fn leave(space_id: SpaceId, session_id: SessionId) -> Self {
        Self {
            space_id,
            session_id,
            change: RosterChange::Leave,
        }
    }
}

/// Create a connected roster feed.
pub fn roster_feed() -> (RosterSender, RosterReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RosterSender { tx }, RosterReceiver { rx })
}

/// Sending half of the roster feed, held by the transport side.
#[derive(Debug, Clone)]
pub struct RosterSender {
    tx: mpsc::UnboundedSender<RosterEvent>,
}

impl RosterSender {
    /// Queue a roster event.
    pub fn send(&self, event: RosterEvent) -> Result<()> {
        self.tx.send(event).map_err(|_| SessionError::FeedClosed)
    }

    /// Queue a join notification.
    pub fn join(&self, space_id: SpaceId, session_id: SessionId) -> Result<()> {
        self.send(RosterEvent::join(space_id, session_id))
    }

    /// Queue a leave notification.
    pub fn leave(&self, space_id: SpaceId, session_id: SessionId) -> Result<()> {
        self.send(RosterEvent::leave(space_id, session_id))
    }
}

/// Receiving half of the roster feed, owned by the registry.
#[derive(Debug)]
pub struct RosterReceiver {
    rx: mpsc::UnboundedReceiver<RosterEvent>,
}

impl RosterReceiver {
    /// Take the next queued event without waiting.
    pub fn try_next(&mut self) -> Option<RosterEvent> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next event. Returns `None` once every sender is gone.
    pub async fn next(&mut self) -> Option<RosterEvent> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str) -> SessionId {
        SessionId::new(id).unwrap()
    }

    #[test]
    fn test_roster_is_sorted() {
        let roster: Roster = ["s3", "s1", "s2"].into_iter().map(session).collect();
        assert_eq!(
            roster.to_sorted_vec(),
            vec![session("s1"), session("s2"), session("s3")]
        );
        assert!(roster.is_multi_party());
    }

    #[test]
    fn test_roster_insert_is_idempotent() {
        let mut roster = Roster::new();
        assert!(roster.insert(session("s1")));
        assert!(!roster.insert(session("s1")));
        assert_eq!(roster.len(), 1);
        assert!(!roster.is_multi_party());
    }

    #[tokio::test]
    async fn test_feed_delivers_in_order() {
        let (tx, mut rx) = roster_feed();
        let space = SpaceId::new("abc").unwrap();

        tx.join(space.clone(), session("s1")).unwrap();
        tx.leave(space.clone(), session("s1")).unwrap();

        assert_eq!(rx.try_next().unwrap().change, RosterChange::Join);
        assert_eq!(rx.next().await.unwrap().change, RosterChange::Leave);
        assert!(rx.try_next().is_none());
    }

    #[test]
    fn test_send_after_receiver_dropped_fails() {
        let (tx, rx) = roster_feed();
        drop(rx);

        let result = tx.join(SpaceId::new("abc").unwrap(), session("s1"));
        assert!(matches!(result, Err(SessionError::FeedClosed)));
    }
}
