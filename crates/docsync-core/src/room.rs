//! Room abstraction for docsync.
//!
//! Rooms are named broadcast groups. A room exists from its first join and is
//! never destroyed; an abandoned room is simply a room with no members.

use crate::session::SessionId;
use std::collections::HashSet;
use tracing::debug;

/// Maximum room name length in bytes.
pub const MAX_ROOM_NAME_LENGTH: usize = 256;

/// A room identifier.
pub type RoomId = String;

/// Validate a room name.
///
/// # Errors
///
/// Returns an error message if the room name is invalid.
pub fn validate_room_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("Room name cannot be empty");
    }
    if name.len() > MAX_ROOM_NAME_LENGTH {
        return Err("Room name too long");
    }
    if name.chars().any(char::is_control) {
        return Err("Room name contains control characters");
    }
    Ok(())
}

/// A room and its current members.
#[derive(Debug)]
pub struct Room {
    /// Room name.
    name: RoomId,
    /// Sessions currently joined.
    members: HashSet<SessionId>,
}

impl Room {
    /// Create a new, empty room.
    #[must_use]
    pub fn new(name: impl Into<RoomId>) -> Self {
        Self {
            name: name.into(),
            members: HashSet::new(),
        }
    }

    /// Get the room name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of members.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Check if a session is a member.
    #[must_use]
    pub fn is_member(&self, session: &SessionId) -> bool {
        self.members.contains(session)
    }

    /// Add a session to this room.
    ///
    /// Returns `true` if the session was not already a member.
    pub fn add(&mut self, session: SessionId) -> bool {
        let added = self.members.insert(session);
        if added {
            debug!(room = %self.name, members = self.members.len(), "Session joined room");
        }
        added
    }

    /// Remove a session from this room.
    ///
    /// Returns `true` if the session was a member.
    pub fn remove(&mut self, session: &SessionId) -> bool {
        let removed = self.members.remove(session);
        if removed {
            debug!(room = %self.name, session = %session, "Session left room");
        }
        removed
    }

    /// Iterate over the current members.
    pub fn members(&self) -> impl Iterator<Item = &SessionId> {
        self.members.iter()
    }

    /// Check if the room has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_creation() {
        let room = Room::new("doc:readme");
        assert_eq!(room.name(), "doc:readme");
        assert_eq!(room.member_count(), 0);
        assert!(room.is_empty());
    }

    #[test]
    fn test_room_add_remove() {
        let mut room = Room::new("r1");
        let a = SessionId::from("a");
        let b = SessionId::from("b");

        assert!(room.add(a.clone()));
        assert!(!room.add(a.clone())); // Already a member
        assert!(room.add(b.clone()));
        assert_eq!(room.member_count(), 2);

        assert!(room.remove(&a));
        assert!(!room.is_member(&a));
        assert!(!room.remove(&a));
        assert_eq!(room.member_count(), 1);
    }

    #[test]
    fn test_room_name_validation() {
        assert!(validate_room_name("r1").is_ok());
        assert!(validate_room_name("projet/été").is_ok());
        assert!(validate_room_name("").is_err());
        assert!(validate_room_name("bad\nname").is_err());

        let long_name = "a".repeat(MAX_ROOM_NAME_LENGTH + 1);
        assert!(validate_room_name(&long_name).is_err());
    }
}
