#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, Utc};

use docsync_server::config::Config;
use docsync_server::AppState;
use docsync_store::{
    DocumentStore, MemoryStore, PersistenceCoordinator, StorageTier, StoreError, StoredDocument,
};

pub const ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Stand-in for the PostgreSQL store: row ids count up from 1 and the
/// connection state can be flipped by the test.
#[derive(Default)]
pub struct FakeDurableStore {
    rows: Mutex<HashMap<String, StoredDocument>>,
    next_id: AtomicU64,
    connected: AtomicBool,
    reject_writes: AtomicBool,
}

impl FakeDurableStore {
    pub fn connected() -> Arc<Self> {
        let store = Self::default();
        store.connected.store(true, Ordering::SeqCst);
        Arc::new(store)
    }

    pub fn disconnected() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn reject_writes(&self) {
        self.reject_writes.store(true, Ordering::SeqCst);
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl DocumentStore for FakeDurableStore {
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
        if !self.is_available() {
            return Err(StoreError::Unavailable("Database not connected".into()));
        }
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Write("value too long for type".into()));
        }

        let mut rows = self.rows.lock().unwrap();
        let id = match rows.get(room_id) {
            Some(existing) => existing.id.clone(),
            None => (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string(),
        };
        let document = StoredDocument {
            id,
            room_id: room_id.to_string(),
            content: content.to_string(),
            updated_at,
        };
        rows.insert(room_id.to_string(), document.clone());
        Ok(document)
    }

    async fn get(&self, room_id: &str) -> Result<Option<StoredDocument>, StoreError> {
        if !self.is_available() {
            return Err(StoreError::Unavailable("Database not connected".into()));
        }
        Ok(self.rows.lock().unwrap().get(room_id).cloned())
    }
}

/// Static directory unique to one test.
pub fn static_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "docsync-test-{}-{}-{}",
        name,
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn test_config(static_dir: PathBuf) -> Config {
    let mut config = Config::default();
    config.cors.allowed_origins = vec![ALLOWED_ORIGIN.to_string()];
    config.static_files.directory = static_dir;
    config.metrics.enabled = false;
    config
}

/// Build a test AppState over a fake durable store and a real memory store.
pub fn test_state(durable: Arc<FakeDurableStore>, config: Config) -> AppState {
    let coordinator = PersistenceCoordinator::new(durable, Arc::new(MemoryStore::new()));
    AppState::new(config, coordinator)
}

/// Build the full application router with a connected durable store.
pub fn test_app(durable: Arc<FakeDurableStore>) -> (Router, AppState) {
    let state = test_state(durable, test_config(static_dir("app")));
    (docsync_server::app(state.clone()), state)
}

/// Start an actual TCP server for WebSocket testing.
pub async fn start_server(state: AppState) -> SocketAddr {
    let app = docsync_server::app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}
