//! Persistence coordinator.
//!
//! Routes each save to the durable store when it is reachable and to the
//! volatile store when it is not. Only reachability triggers the fallback:
//! a durable store that is up but rejects a write fails the save.

use crate::document::{LoadedDocument, SaveReceipt, StorageTier, StoredDocument};
use crate::store::{DocumentStore, StoreError};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Chooses a store tier per request.
#[derive(Clone)]
pub struct PersistenceCoordinator {
    durable: Arc<dyn DocumentStore>,
    volatile: Arc<dyn DocumentStore>,
}

impl PersistenceCoordinator {
    /// Create a coordinator over a durable and a volatile store.
    #[must_use]
    pub fn new(durable: Arc<dyn DocumentStore>, volatile: Arc<dyn DocumentStore>) -> Self {
        Self { durable, volatile }
    }

    /// Tier the next save is expected to use, without touching either store.
    #[must_use]
    pub fn health(&self) -> StorageTier {
        if self.durable.is_available() {
            StorageTier::Durable
        } else {
            StorageTier::Volatile
        }
    }

    /// Save the content of a room.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable store is reachable but rejects the
    /// write, or if the volatile fallback itself fails.
    pub async fn save(&self, room: &str, content: &str) -> Result<SaveReceipt, StoreError> {
        let now = Utc::now();

        if self.durable.is_available() {
            match self.durable.upsert(room, content, now).await {
                Ok(document) => return Ok(receipt(document, StorageTier::Durable)),
                Err(e) if e.is_unavailable() => {
                    warn!(room = %room, error = %e, "Durable store unreachable, saving to memory");
                }
                Err(e) => {
                    error!(room = %room, error = %e, "Durable save failed");
                    return Err(e);
                }
            }
        } else {
            debug!(room = %room, "Durable store not connected, saving to memory");
        }

        let document = self.volatile.upsert(room, content, now).await?;
        Ok(receipt(document, StorageTier::Volatile))
    }

    /// Load the latest content saved for a room.
    ///
    /// Both tiers are consulted and the more recently updated copy wins, so
    /// a save that fell back to memory during an outage stays visible after
    /// the durable store comes back.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable store is reachable but the read fails.
    pub async fn load(&self, room: &str) -> Result<Option<LoadedDocument>, StoreError> {
        let durable = if self.durable.is_available() {
            match self.durable.get(room).await {
                Ok(document) => document,
                Err(e) if e.is_unavailable() => None,
                Err(e) => return Err(e),
            }
        } else {
            None
        };
        let volatile = self.volatile.get(room).await?;

        Ok(newest(durable, volatile))
    }
}

fn receipt(document: StoredDocument, tier: StorageTier) -> SaveReceipt {
    SaveReceipt {
        document_id: document.id,
        updated_at: document.updated_at,
        tier,
    }
}

fn newest(
    durable: Option<StoredDocument>,
    volatile: Option<StoredDocument>,
) -> Option<LoadedDocument> {
    let loaded = |document, tier| LoadedDocument { document, tier };
    match (durable, volatile) {
        (Some(d), Some(v)) if v.updated_at > d.updated_at => Some(loaded(v, StorageTier::Volatile)),
        (Some(d), _) => Some(loaded(d, StorageTier::Durable)),
        (None, Some(v)) => Some(loaded(v, StorageTier::Volatile)),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

    const UNREACHABLE: u8 = 1;
    const REJECT: u8 = 2;

    /// Durable stand-in whose availability and failures are scripted.
    #[derive(Default)]
    struct ScriptedStore {
        inner: MemoryStore,
        connected: AtomicBool,
        mode: AtomicU8,
    }

    impl ScriptedStore {
        fn up() -> Arc<Self> {
            let store = Self::default();
            store.connected.store(true, Ordering::SeqCst);
            Arc::new(store)
        }

        fn set_connected(&self, connected: bool) {
            self.connected.store(connected, Ordering::SeqCst);
        }

        fn set_mode(&self, mode: u8) {
            self.mode.store(mode, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), StoreError> {
            match self.mode.load(Ordering::SeqCst) {
                UNREACHABLE => {
                    self.set_connected(false);
                    Err(StoreError::Unavailable("connection reset".into()))
                }
                REJECT => Err(StoreError::Write("content violates constraint".into())),
                _ => Ok(()),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for ScriptedStore {
        fn tier(&self) -> StorageTier {
            StorageTier::Durable
        }

        fn is_available(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn upsert(
            &self,
            room_id: &str,
            content: &str,
            updated_at: DateTime<Utc>,
        ) -> Result<StoredDocument, StoreError> {
            self.check()?;
            let mut document = self.inner.upsert(room_id, content, updated_at).await?;
            document.id = format!("db-{room_id}");
            Ok(document)
        }

        async fn get(&self, room_id: &str) -> Result<Option<StoredDocument>, StoreError> {
            self.check()?;
            self.inner.get(room_id).await
        }
    }

    fn coordinator(durable: &Arc<ScriptedStore>) -> (PersistenceCoordinator, Arc<MemoryStore>) {
        let volatile = Arc::new(MemoryStore::new());
        let coordinator = PersistenceCoordinator::new(durable.clone(), volatile.clone());
        (coordinator, volatile)
    }

    #[tokio::test]
    async fn test_save_uses_durable_when_available() {
        let durable = ScriptedStore::up();
        let (coordinator, volatile) = coordinator(&durable);

        let receipt = coordinator.save("r1", "hello").await.unwrap();
        assert_eq!(receipt.tier, StorageTier::Durable);
        assert_eq!(receipt.document_id, "db-r1");
        assert!(volatile.is_empty());
        assert_eq!(coordinator.health(), StorageTier::Durable);
    }

    #[tokio::test]
    async fn test_save_falls_back_when_disconnected() {
        let durable = ScriptedStore::up();
        durable.set_connected(false);
        let (coordinator, volatile) = coordinator(&durable);

        let receipt = coordinator.save("r1", "hello").await.unwrap();
        assert_eq!(receipt.tier, StorageTier::Volatile);
        assert_eq!(receipt.document_id, "mem-r1");
        assert_eq!(volatile.len(), 1);
        assert_eq!(coordinator.health(), StorageTier::Volatile);
    }

    #[tokio::test]
    async fn test_save_falls_back_on_connectivity_error() {
        let durable = ScriptedStore::up();
        durable.set_mode(UNREACHABLE);
        let (coordinator, _volatile) = coordinator(&durable);

        let receipt = coordinator.save("r1", "hello").await.unwrap();
        assert_eq!(receipt.tier, StorageTier::Volatile);
        assert_eq!(coordinator.health(), StorageTier::Volatile);
    }

    #[tokio::test]
    async fn test_save_surfaces_rejected_write() {
        let durable = ScriptedStore::up();
        durable.set_mode(REJECT);
        let (coordinator, volatile) = coordinator(&durable);

        let err = coordinator.save("r1", "hello").await.unwrap_err();
        assert!(matches!(err, StoreError::Write(_)));
        assert!(volatile.is_empty());
    }

    #[tokio::test]
    async fn test_save_returns_to_durable_after_recovery() {
        let durable = ScriptedStore::up();
        durable.set_connected(false);
        let (coordinator, _volatile) = coordinator(&durable);

        assert_eq!(
            coordinator.save("r1", "hello").await.unwrap().tier,
            StorageTier::Volatile
        );

        durable.set_connected(true);
        let receipt = coordinator.save("r1", "hello2").await.unwrap();
        assert_eq!(receipt.tier, StorageTier::Durable);

        let loaded = coordinator.load("r1").await.unwrap().unwrap();
        assert_eq!(loaded.document.content, "hello2");
        assert_eq!(loaded.tier, StorageTier::Durable);
    }

    #[tokio::test]
    async fn test_save_is_last_write_wins() {
        let durable = ScriptedStore::up();
        let (coordinator, _volatile) = coordinator(&durable);

        coordinator.save("r1", "hello").await.unwrap();
        coordinator.save("r1", "hello2").await.unwrap();

        assert_eq!(durable.inner.len(), 1);
        let loaded = coordinator.load("r1").await.unwrap().unwrap();
        assert_eq!(loaded.document.content, "hello2");
    }

    #[tokio::test]
    async fn test_load_prefers_newer_memory_copy() {
        let durable = ScriptedStore::up();
        let (coordinator, _volatile) = coordinator(&durable);

        coordinator.save("r1", "from-db").await.unwrap();
        durable.set_connected(false);
        coordinator.save("r1", "during-outage").await.unwrap();
        durable.set_connected(true);

        let loaded = coordinator.load("r1").await.unwrap().unwrap();
        assert_eq!(loaded.document.content, "during-outage");
        assert_eq!(loaded.tier, StorageTier::Volatile);
    }

    #[tokio::test]
    async fn test_nul_content_round_trips_on_both_tiers() {
        let durable = ScriptedStore::up();
        let (coordinator, _volatile) = coordinator(&durable);

        let receipt = coordinator.save("r1", "a\0b").await.unwrap();
        assert_eq!(receipt.tier, StorageTier::Durable);
        assert_eq!(coordinator.load("r1").await.unwrap().unwrap().document.content, "a\0b");

        durable.set_connected(false);
        let receipt = coordinator.save("r2", "c\0d").await.unwrap();
        assert_eq!(receipt.tier, StorageTier::Volatile);
        assert_eq!(coordinator.load("r2").await.unwrap().unwrap().document.content, "c\0d");
    }

    #[tokio::test]
    async fn test_load_unknown_room() {
        let durable = ScriptedStore::up();
        let (coordinator, _volatile) = coordinator(&durable);
        assert!(coordinator.load("nope").await.unwrap().is_none());
    }
}
