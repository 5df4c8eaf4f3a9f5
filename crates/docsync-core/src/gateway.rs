//! Connection gateway for docsync.
//!
//! The gateway is the transport-agnostic half of connection handling. A
//! transport calls [`Gateway::connect`] when a client arrives, feeds every
//! decoded [`ClientEvent`] to [`Gateway::handle`], forwards whatever shows up
//! on the session's outbound queue, and calls [`Gateway::disconnect`] when
//! the connection ends.
//!
//! Membership changes and the fan-out they trigger run under one mutex, so
//! each event is fully processed before the next one starts. This is what
//! keeps per-room delivery order equal to arrival order.

use crate::dispatch::{Dispatcher, Outbound, DEFAULT_QUEUE_CAPACITY};
use crate::registry::{RegistryStats, RoomRegistry};
use crate::room::{validate_room_name, RoomId};
use crate::session::SessionId;
use docsync_protocol::{ClientEvent, DocumentUpdate, ServerEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

/// Reasons an inbound event is rejected.
///
/// A rejected event is dropped; the session stays connected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Invalid room name.
    #[error("Invalid room name: {0}")]
    InvalidRoom(&'static str),

    /// The session already holds the maximum number of rooms.
    #[error("Maximum rooms per session reached ({0})")]
    TooManyRooms(usize),

    /// The session sent a document update to a room it has not joined.
    #[error("Not a member of room: {0}")]
    NotMember(String),

    /// The session is not connected.
    #[error("Unknown session: {0}")]
    UnknownSession(String),
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Maximum rooms a single session may join.
    pub max_rooms_per_session: usize,
    /// Outbound queue capacity per session.
    pub queue_capacity: usize,
    /// Reject document updates from sessions outside the target room.
    pub require_membership: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_rooms_per_session: 100,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            require_membership: false,
        }
    }
}

/// A newly connected session.
#[derive(Debug)]
pub struct SessionHandle {
    /// Identifier assigned to the session.
    pub id: SessionId,
    /// Events to forward to the client, in delivery order.
    pub outbound: mpsc::Receiver<Outbound>,
}

/// The connection gateway.
pub struct Gateway {
    /// Room memberships, mutated only under this lock.
    registry: Mutex<RoomRegistry>,
    /// Session queues.
    dispatcher: Dispatcher,
    /// Configuration.
    config: GatewayConfig,
}

impl Gateway {
    /// Create a gateway with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(GatewayConfig::default())
    }

    /// Create a gateway with custom configuration.
    #[must_use]
    pub fn with_config(config: GatewayConfig) -> Self {
        info!("Creating gateway with config: {:?}", config);
        Self {
            registry: Mutex::new(RoomRegistry::new()),
            dispatcher: Dispatcher::with_capacity(config.queue_capacity),
            config,
        }
    }

    /// Get the gateway configuration.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Accept a new session.
    #[must_use]
    pub fn connect(&self) -> SessionHandle {
        let id = SessionId::generate();
        let outbound = self.dispatcher.register(id.clone());
        debug!(session = %id, "Session connected");
        SessionHandle { id, outbound }
    }

    /// Process one inbound event from a session.
    ///
    /// Returns the number of sessions the resulting room broadcast was
    /// queued for.
    ///
    /// # Errors
    ///
    /// Returns an error if the event is rejected. Nothing is mutated or sent
    /// in that case.
    pub fn handle(&self, session: &SessionId, event: ClientEvent) -> Result<usize, GatewayError> {
        if !self.dispatcher.is_registered(session) {
            return Err(GatewayError::UnknownSession(session.to_string()));
        }

        match event {
            ClientEvent::JoinRoom(room) => self.join(session, &room),
            ClientEvent::DocumentUpdate(update) => self.document_update(session, update),
        }
    }

    /// Join a room.
    ///
    /// Sends `room_joined` to the session, then `user_joined` to the whole
    /// room, the session included.
    fn join(&self, session: &SessionId, room: &str) -> Result<usize, GatewayError> {
        validate_room_name(room).map_err(GatewayError::InvalidRoom)?;

        let mut registry = self.registry.lock();

        if !registry.is_member(room, session)
            && registry.membership_count(session) >= self.config.max_rooms_per_session
        {
            return Err(GatewayError::TooManyRooms(self.config.max_rooms_per_session));
        }

        let count = registry.join(room, session);
        self.dispatcher
            .send_to(session, Arc::new(ServerEvent::room_joined(room)));

        let delivered = Self::fan_out(
            &registry,
            &self.dispatcher,
            room,
            ServerEvent::user_joined(session.as_str(), count),
        );

        debug!(session = %session, room = %room, members = count, "Joined room");
        Ok(delivered)
    }

    /// Relay new document content to a room.
    fn document_update(
        &self,
        session: &SessionId,
        update: DocumentUpdate,
    ) -> Result<usize, GatewayError> {
        let registry = self.registry.lock();

        if self.config.require_membership && !registry.is_member(&update.room, session) {
            return Err(GatewayError::NotMember(update.room));
        }

        let delivered = Self::fan_out(
            &registry,
            &self.dispatcher,
            &update.room,
            ServerEvent::sync_update(update.content, session.as_str()),
        );

        trace!(session = %session, room = %update.room, recipients = delivered, "Document update relayed");
        Ok(delivered)
    }

    /// Tear down a session.
    ///
    /// The session's queue is closed first, then every room it belonged to
    /// receives `user_left` with the remaining member count. Returns the
    /// affected rooms and their new counts. Safe to call more than once.
    pub fn disconnect(&self, session: &SessionId) -> Vec<(RoomId, usize)> {
        self.dispatcher.unregister(session);

        let mut registry = self.registry.lock();
        let left = registry.leave_all(session);

        for (room, count) in &left {
            Self::fan_out(
                &registry,
                &self.dispatcher,
                room,
                ServerEvent::user_left(session.as_str(), *count),
            );
        }

        debug!(session = %session, rooms = left.len(), "Session disconnected");
        left
    }

    /// Deliver an event to every current member of a room.
    ///
    /// Returns the number of sessions the event was queued for; 0 for an
    /// unknown or empty room.
    pub fn broadcast(&self, room: &str, event: ServerEvent) -> usize {
        let registry = self.registry.lock();
        Self::fan_out(&registry, &self.dispatcher, room, event)
    }

    fn fan_out(
        registry: &RoomRegistry,
        dispatcher: &Dispatcher,
        room: &str,
        event: ServerEvent,
    ) -> usize {
        match registry.room(room) {
            Some(entry) => dispatcher.broadcast(entry.members(), event),
            None => 0,
        }
    }

    /// Get the member count of a room.
    #[must_use]
    pub fn count(&self, room: &str) -> usize {
        self.registry.lock().count(room)
    }

    /// Get the rooms a session belongs to.
    #[must_use]
    pub fn rooms_of(&self, session: &SessionId) -> Vec<RoomId> {
        self.registry.lock().rooms_of(session)
    }

    /// Get gateway statistics.
    #[must_use]
    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            connected_sessions: self.dispatcher.session_count(),
            registry: self.registry.lock().stats(),
        }
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}

/// Gateway statistics.
#[derive(Debug, Clone, Copy)]
pub struct GatewayStats {
    /// Number of live sessions.
    pub connected_sessions: usize,
    /// Membership statistics.
    pub registry: RegistryStats,
}
