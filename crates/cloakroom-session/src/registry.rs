//! Session registry.
//!
//! Tracks this client's own session in each space and the peer sessions it
//! has heard about. The roster it reports is a local, best-effort view: peers
//! arrive and depart through notifications that may be late, duplicated or
//! missing, and nothing here treats the view as authoritative.
//!
//! ## Session lifecycle
//!
//! ```text
//! Unjoined --initialize_session--> Active --leave_session--> Left
//! ```
//!
//! `Left` is terminal for that session. Entering the same space again
//! creates a new session with a new id.

use std::collections::{BTreeSet, HashMap};

use cloakroom_core::{now_millis, SessionId, SpaceId};

use crate::error::{Result, SessionError};
use crate::roster::{Roster, RosterChange, RosterEvent, RosterReceiver};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No session exists for the space.
    Unjoined,
    /// The session is live and part of the roster.
    Active,
    /// The session has left. Terminal.
    Left,
}

/// This client's participation in one space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Random session identifier.
    pub session_id: SessionId,
    /// The space the session belongs to.
    pub space_id: SpaceId,
    /// Lifecycle state.
    pub state: SessionState,
    /// When the session was created (Unix ms).
    pub joined_at: i64,
    /// Last local activity (Unix ms).
    pub last_activity: i64,
}

impl Session {
    fn start(space_id: SpaceId, now: i64) -> Self {
        Self {
            session_id: SessionId::generate(),
            space_id,
            state: SessionState::Active,
            joined_at: now,
            last_activity: now,
        }
    }

    /// Whether the session is currently active.
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }
}

/// Everything known about one space.
#[derive(Debug, Default)]
struct SpaceSessions {
    /// Pointer to our own session, if we are in the space.
    local: Option<Session>,
    /// Peer sessions learned from notifications.
    peers: BTreeSet<SessionId>,
}

impl SpaceSessions {
    fn roster(&self) -> Roster {
        let mut roster: Roster = self.peers.iter().cloned().collect();
        if let Some(local) = self.local.as_ref().filter(|s| s.is_active()) {
            roster.insert(local.session_id.clone());
        }
        roster
    }

    fn is_own(&self, session_id: &SessionId) -> bool {
        self.local
            .as_ref()
            .is_some_and(|local| &local.session_id == session_id)
    }
}

/// Local view of sessions across spaces.
///
/// Owned by the application context and mutated through `&mut self`; remote
/// changes can either be applied directly or queued on a roster feed that the
/// registry drains before every read.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    spaces: HashMap<SpaceId, SpaceSessions>,
    feed: Option<RosterReceiver>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that drains the given roster feed.
    pub fn with_feed(feed: RosterReceiver) -> Self {
        Self {
            spaces: HashMap::new(),
            feed: Some(feed),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Local lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a session in `space_id` and return its id.
    ///
    /// If a session for the space is already active, its id is returned
    /// unchanged: one client instance holds at most one session per space.
    pub fn initialize_session(&mut self, space_id: &SpaceId) -> SessionId {
        let entry = self.spaces.entry(space_id.clone()).or_default();

        if let Some(existing) = entry.local.as_ref().filter(|s| s.is_active()) {
            return existing.session_id.clone();
        }

        let session = Session::start(space_id.clone(), now_millis());
        let session_id = session.session_id.clone();
        entry.peers.remove(&session_id);
        entry.local = Some(session);

        tracing::debug!(space = %space_id, session = ?session_id, "session initialized");
        session_id
    }

    /// Leave `space_id`.
    ///
    /// Returns the departed session in its terminal state, or `None` if there
    /// was no active session, in which case the peer view is left untouched.
    /// Otherwise the local session pointer and the peer view for the space are
    /// cleared, including roster events still queued on the feed.
    pub fn leave_session(&mut self, space_id: &SpaceId) -> Option<Session> {
        if self.current_session_id(space_id).is_none() {
            return None;
        }

        self.drain_feed();
        let mut session = self.spaces.remove(space_id)?.local?;

        session.state = SessionState::Left;
        session.last_activity = now_millis();

        tracing::debug!(space = %space_id, session = ?session.session_id, "session left");
        Some(session)
    }

    /// Record local activity on the space's session.
    pub fn touch(&mut self, space_id: &SpaceId) {
        if let Some(local) = self
            .spaces
            .get_mut(space_id)
            .and_then(|entry| entry.local.as_mut())
        {
            local.last_activity = local.last_activity.max(now_millis());
        }
    }

    /// Our own session in `space_id`, if any.
    pub fn current_session(&self, space_id: &SpaceId) -> Option<&Session> {
        self.spaces
            .get(space_id)
            .and_then(|entry| entry.local.as_ref())
    }

    /// Our own session id in `space_id`, if active.
    pub fn current_session_id(&self, space_id: &SpaceId) -> Option<&SessionId> {
        self.current_session(space_id)
            .filter(|s| s.is_active())
            .map(|s| &s.session_id)
    }

    /// Lifecycle state of our session in `space_id`.
    pub fn session_state(&self, space_id: &SpaceId) -> SessionState {
        self.current_session(space_id)
            .map(|s| s.state)
            .unwrap_or(SessionState::Unjoined)
    }

    /// Spaces we hold an active session in.
    pub fn joined_spaces(&self) -> Vec<SpaceId> {
        self.spaces
            .iter()
            .filter(|(_, entry)| entry.local.as_ref().is_some_and(Session::is_active))
            .map(|(space_id, _)| space_id.clone())
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Remote roster changes
    // ─────────────────────────────────────────────────────────────────────────

    /// Record that a peer session is present. Idempotent.
    ///
    /// Returns true if the roster changed. Our own id is never stored as a
    /// peer.
    pub fn add_peer_session(&mut self, space_id: &SpaceId, session_id: SessionId) -> bool {
        let entry = self.spaces.entry(space_id.clone()).or_default();
        if entry.is_own(&session_id) {
            return false;
        }

        let added = entry.peers.insert(session_id.clone());
        if added {
            tracing::debug!(space = %space_id, session = ?session_id, "peer joined");
        }
        added
    }

    /// Record that a peer session is gone. Removing an absent id is a no-op.
    ///
    /// Returns true if the roster changed. A remote notification can never
    /// remove our own session; only [`SessionRegistry::leave_session`] does.
    pub fn remove_peer_session(&mut self, space_id: &SpaceId, session_id: &SessionId) -> bool {
        let Some(entry) = self.spaces.get_mut(space_id) else {
            return false;
        };

        let removed = entry.peers.remove(session_id);
        if removed {
            tracing::debug!(space = %space_id, session = ?session_id, "peer left");
        }
        removed
    }

    /// Apply one roster event.
    pub fn apply(&mut self, event: RosterEvent) -> bool {
        match event.change {
            RosterChange::Join => self.add_peer_session(&event.space_id, event.session_id),
            RosterChange::Leave => self.remove_peer_session(&event.space_id, &event.session_id),
        }
    }

    /// Apply every event queued on the roster feed. Returns how many were read.
    pub fn drain_feed(&mut self) -> usize {
        let mut pending = Vec::new();
        if let Some(feed) = self.feed.as_mut() {
            while let Some(event) = feed.try_next() {
                pending.push(event);
            }
        }

        let count = pending.len();
        for event in pending {
            self.apply(event);
        }
        count
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshots
    // ─────────────────────────────────────────────────────────────────────────

    /// Best-known set of active sessions in `space_id`.
    ///
    /// Always includes our own session when it is active. Empty when nothing
    /// is known about the space.
    pub fn active_sessions_for_space(&mut self, space_id: &SpaceId) -> BTreeSet<SessionId> {
        self.roster_snapshot(space_id)
            .map(Roster::into_set)
            .unwrap_or_default()
    }

    /// Snapshot of the roster for `space_id`.
    ///
    /// Fails with [`SessionError::RosterUnavailable`] when neither a local
    /// session nor any notification has been seen for the space.
    pub fn roster_snapshot(&mut self, space_id: &SpaceId) -> Result<Roster> {
        self.drain_feed();
        self.spaces
            .get(space_id)
            .map(SpaceSessions::roster)
            .ok_or_else(|| SessionError::RosterUnavailable(space_id.clone()))
    }

    /// Number of active sessions in `space_id`, for status display.
    pub fn active_session_count(&mut self, space_id: &SpaceId) -> usize {
        self.roster_snapshot(space_id)
            .map(|roster| roster.len())
            .unwrap_or(0)
    }
}
