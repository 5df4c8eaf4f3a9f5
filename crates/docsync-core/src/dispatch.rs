//! Broadcast dispatcher.
//!
//! Each connected session owns a bounded outbound queue. The dispatcher maps
//! session IDs to the sending half of those queues and fans events out to a
//! given set of members. An event is enqueued whole or not at all: a member
//! whose queue is full misses that event and stays connected.

use crate::session::SessionId;
use dashmap::DashMap;
use docsync_protocol::ServerEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Default per-session outbound queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// An event queued for delivery, shared between all recipients.
pub type Outbound = Arc<ServerEvent>;

/// Fan-out of server events to session queues.
#[derive(Debug)]
pub struct Dispatcher {
    /// Outbound queues indexed by session.
    sessions: DashMap<SessionId, mpsc::Sender<Outbound>>,
    /// Capacity of each session queue.
    capacity: usize,
}

impl Dispatcher {
    /// Create a dispatcher with the default queue capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a dispatcher with a specific queue capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Register a session and return the receiving half of its queue.
    ///
    /// Registering an existing session replaces its queue.
    pub fn register(&self, session: SessionId) -> mpsc::Receiver<Outbound> {
        let (tx, rx) = mpsc::channel(self.capacity);
        debug!(session = %session, "Session registered");
        self.sessions.insert(session, tx);
        rx
    }

    /// Remove a session's queue.
    ///
    /// Returns `true` if the session was registered.
    pub fn unregister(&self, session: &SessionId) -> bool {
        let removed = self.sessions.remove(session).is_some();
        if removed {
            debug!(session = %session, "Session unregistered");
        }
        removed
    }

    /// Check if a session is registered.
    #[must_use]
    pub fn is_registered(&self, session: &SessionId) -> bool {
        self.sessions.contains_key(session)
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Queue an event for a single session.
    ///
    /// Returns `true` if the event was queued.
    pub fn send_to(&self, session: &SessionId, event: Outbound) -> bool {
        let Some(tx) = self.sessions.get(session) else {
            trace!(session = %session, "Send to unregistered session");
            return false;
        };

        match tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(session = %session, event = %event.kind(), "Outbound queue full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(session = %session, "Outbound queue closed");
                false
            }
        }
    }

    /// Queue an event for every session in `members`.
    ///
    /// Returns the number of sessions the event was queued for.
    pub fn broadcast<'a, I>(&self, members: I, event: ServerEvent) -> usize
    where
        I: IntoIterator<Item = &'a SessionId>,
    {
        let event = Arc::new(event);
        let delivered = members
            .into_iter()
            .filter(|member| self.send_to(member, Arc::clone(&event)))
            .count();
        trace!(event = %event.kind(), recipients = delivered, "Broadcast event");
        delivered
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
