//! Event types for the docsync protocol.
//!
//! Every event travels as an envelope `{"event": <name>, "data": <payload>}`.
//! Inbound and outbound events are separate enums so a client can never
//! inject a server-only event and vice versa.

use serde::{Deserialize, Serialize};

/// Event name identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    JoinRoom,
    DocumentUpdate,
    RoomJoined,
    UserJoined,
    SyncUpdate,
    UserLeft,
}

impl EventKind {
    /// Wire name of the event.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKind::JoinRoom => "join_room",
            EventKind::DocumentUpdate => "document_update",
            EventKind::RoomJoined => "room_joined",
            EventKind::UserJoined => "user_joined",
            EventKind::SyncUpdate => "sync_update",
            EventKind::UserLeft => "user_left",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a `document_update` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpdate {
    /// Room the update is addressed to.
    pub room: String,
    /// Full document content (last write wins, no merge).
    pub content: String,
}

/// An event sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Join a room. The payload is the bare room name.
    JoinRoom(String),

    /// Broadcast new content to a room.
    DocumentUpdate(DocumentUpdate),
}

impl ClientEvent {
    /// Get the event kind.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            ClientEvent::JoinRoom(_) => EventKind::JoinRoom,
            ClientEvent::DocumentUpdate(_) => EventKind::DocumentUpdate,
        }
    }

    /// Create a new `join_room` event.
    #[must_use]
    pub fn join_room(room: impl Into<String>) -> Self {
        ClientEvent::JoinRoom(room.into())
    }

    /// Create a new `document_update` event.
    #[must_use]
    pub fn document_update(room: impl Into<String>, content: impl Into<String>) -> Self {
        ClientEvent::DocumentUpdate(DocumentUpdate {
            room: room.into(),
            content: content.into(),
        })
    }
}

/// An event sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Confirms a join to the joining session only.
    RoomJoined {
        /// Joined room.
        room: String,
    },

    /// A session joined the room.
    UserJoined {
        /// Session that joined.
        user_id: String,
        /// Member count after the join.
        user_count: usize,
    },

    /// New document content for the room.
    SyncUpdate {
        /// Content as sent by the author.
        content: String,
        /// Session that sent the update.
        user_id: String,
    },

    /// A session left the room.
    UserLeft {
        /// Session that left.
        user_id: String,
        /// Member count after the departure.
        user_count: usize,
    },
}

impl ServerEvent {
    /// Get the event kind.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::RoomJoined { .. } => EventKind::RoomJoined,
            ServerEvent::UserJoined { .. } => EventKind::UserJoined,
            ServerEvent::SyncUpdate { .. } => EventKind::SyncUpdate,
            ServerEvent::UserLeft { .. } => EventKind::UserLeft,
        }
    }

    #[must_use]
    pub fn room_joined(room: impl Into<String>) -> Self {
        ServerEvent::RoomJoined { room: room.into() }
    }

    #[must_use]
    pub fn user_joined(user_id: impl Into<String>, user_count: usize) -> Self {
        ServerEvent::UserJoined {
            user_id: user_id.into(),
            user_count,
        }
    }

    #[must_use]
    pub fn sync_update(content: impl Into<String>, user_id: impl Into<String>) -> Self {
        ServerEvent::SyncUpdate {
            content: content.into(),
            user_id: user_id.into(),
        }
    }

    #[must_use]
    pub fn user_left(user_id: impl Into<String>, user_count: usize) -> Self {
        ServerEvent::UserLeft {
            user_id: user_id.into(),
            user_count,
        }
    }
}
