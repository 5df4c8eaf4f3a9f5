//! Room membership registry.
//!
//! The registry keeps two views of the same relation: room -> sessions for
//! fan-out, and session -> rooms for disconnect cleanup. Both are updated
//! together by every mutating call, so a session is in a room's member set
//! if and only if the room is in the session's membership set.
//!
//! The registry itself is not synchronized; the [`Gateway`](crate::Gateway)
//! owns it behind a single mutex.

use crate::room::{Room, RoomId};
use crate::session::SessionId;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// The room membership registry.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    /// Rooms indexed by name.
    rooms: HashMap<RoomId, Room>,
    /// Session memberships (session -> set of room names).
    memberships: HashMap<SessionId, HashSet<RoomId>>,
}

impl RoomRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session to a room, creating the room on first join.
    ///
    /// Joining a room twice is a no-op. Returns the member count after the
    /// join.
    pub fn join(&mut self, room: &str, session: &SessionId) -> usize {
        let entry = self.rooms.entry(room.to_string()).or_insert_with(|| {
            debug!(room = %room, "Creating new room");
            Room::new(room)
        });

        entry.add(session.clone());
        self.memberships
            .entry(session.clone())
            .or_default()
            .insert(room.to_string());

        entry.member_count()
    }

    /// Remove a session from every room it belongs to.
    ///
    /// Returns each room the session was actually removed from, with the
    /// member count left behind, ordered by room name.
    pub fn leave_all(&mut self, session: &SessionId) -> Vec<(RoomId, usize)> {
        let Some(rooms) = self.memberships.remove(session) else {
            return Vec::new();
        };

        let mut left: Vec<(RoomId, usize)> = rooms
            .into_iter()
            .filter_map(|name| {
                let room = self.rooms.get_mut(&name)?;
                room.remove(session).then(|| {
                    let count = room.member_count();
                    (name, count)
                })
            })
            .collect();
        left.sort_by(|a, b| a.0.cmp(&b.0));

        debug!(session = %session, rooms = left.len(), "Session left all rooms");
        left
    }

    /// Get the member count of a room, 0 if the room is unknown.
    #[must_use]
    pub fn count(&self, room: &str) -> usize {
        self.rooms.get(room).map(Room::member_count).unwrap_or(0)
    }

    /// Get a room by name.
    #[must_use]
    pub fn room(&self, room: &str) -> Option<&Room> {
        self.rooms.get(room)
    }

    /// Get the members of a room, sorted. Empty if the room is unknown.
    #[must_use]
    pub fn members(&self, room: &str) -> Vec<SessionId> {
        let mut members: Vec<SessionId> = self
            .rooms
            .get(room)
            .map(|r| r.members().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    /// Check whether a session is a member of a room.
    #[must_use]
    pub fn is_member(&self, room: &str, session: &SessionId) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|r| r.is_member(session))
    }

    /// Get the rooms a session belongs to, sorted by name.
    #[must_use]
    pub fn rooms_of(&self, session: &SessionId) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = self
            .memberships
            .get(session)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    /// Number of rooms a session belongs to.
    #[must_use]
    pub fn membership_count(&self, session: &SessionId) -> usize {
        self.memberships.get(session).map(HashSet::len).unwrap_or(0)
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            room_count: self.rooms.len(),
            session_count: self.memberships.len(),
            total_memberships: self.memberships.values().map(HashSet::len).sum(),
        }
    }
}

/// Registry statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of rooms ever joined.
    pub room_count: usize,
    /// Number of sessions holding at least one membership.
    pub session_count: usize,
    /// Total number of (session, room) memberships.
    pub total_memberships: usize,
}
