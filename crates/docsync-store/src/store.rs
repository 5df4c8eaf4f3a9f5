//! Document store abstraction.
//!
//! A document store maps a room identifier to the latest content saved for
//! it. Saves are upserts: there is never more than one record per room, and
//! a later save replaces an earlier one unconditionally.

use crate::document::{StorageTier, StoredDocument};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store cannot be reached. Callers may fall back to another tier.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store is reachable but rejected the write.
    #[error("Write rejected: {0}")]
    Write(String),

    /// The store is reachable but the read failed.
    #[error("Read failed: {0}")]
    Read(String),
}

impl StoreError {
    /// Whether this error is about reachability rather than the request.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// A key/value mapping from room to its latest document.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Tier this store belongs to.
    fn tier(&self) -> StorageTier;

    /// Whether the store is currently reachable. Must not perform I/O.
    fn is_available(&self) -> bool {
        true
    }

    /// Insert or replace the document for a room.
    async fn upsert(
        &self,
        room_id: &str,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<StoredDocument, StoreError>;

    /// Fetch the document for a room.
    async fn get(&self, room_id: &str) -> Result<Option<StoredDocument>, StoreError>;
}
