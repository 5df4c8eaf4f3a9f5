//! Volatile in-process document store.

use crate::document::{StorageTier, StoredDocument};
use crate::store::{DocumentStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

/// Prefix of record identifiers issued by the volatile store.
pub const MEMORY_ID_PREFIX: &str = "mem-";

/// In-memory document store. Always available; contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: DashMap<String, StoredDocument>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn tier(&self) -> StorageTier {
        StorageTier::Volatile
    }

    async fn upsert(
        &self,
        room_id: &str,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<StoredDocument, StoreError> {
        let document = StoredDocument {
            id: format!("{MEMORY_ID_PREFIX}{room_id}"),
            room_id: room_id.to_string(),
            content: content.to_string(),
            updated_at,
        };
        self.documents.insert(room_id.to_string(), document.clone());
        debug!(room = %room_id, bytes = content.len(), "Document saved to memory");
        Ok(document)
    }

    async fn get(&self, room_id: &str) -> Result<Option<StoredDocument>, StoreError> {
        Ok(self.documents.get(room_id).map(|d| d.clone()))
    }
}
