//! Durable document store backed by PostgreSQL.
//!
//! The store owns its connection lifecycle. It starts disconnected; a
//! supervisor task (see [`PgDocumentStore::spawn_supervisor`]) connects it,
//! pings it on a fixed interval while connected, and retries the connection
//! on the same interval forever while disconnected. Writes that fail with a
//! connectivity error flip the store to unavailable immediately so that the
//! next save goes straight to the fallback tier.

use crate::document::{StorageTier, StoredDocument};
use crate::store::{DocumentStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Table definition, applied on every successful connect.
pub const SCHEMA: &str = include_str!("../migrations/0001_documents.sql");

const UPSERT_SQL: &str = r#"
    INSERT INTO documents (room_id, content, updated_at)
    VALUES ($1, $2, $3)
    ON CONFLICT (room_id) DO UPDATE SET
        content = EXCLUDED.content,
        updated_at = EXCLUDED.updated_at
    RETURNING id, room_id, content, updated_at
"#;

const SELECT_SQL: &str =
    "SELECT id, room_id, content, updated_at FROM documents WHERE room_id = $1";

/// Shortest supervisor tick; `tokio::time::interval` rejects zero.
pub const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Connection options for the durable store.
#[derive(Debug, Clone)]
pub struct PgStoreOptions {
    /// PostgreSQL connection URL.
    pub url: String,
    /// How long a connection attempt may take.
    pub connect_timeout: Duration,
    /// Fixed delay between reconnect attempts and liveness pings. Values
    /// below [`MIN_RETRY_INTERVAL`] are raised to it.
    pub retry_interval: Duration,
    /// Maximum pool size.
    pub max_connections: u32,
}

impl Default for PgStoreOptions {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/realtime-docs".to_string(),
            connect_timeout: Duration::from_secs(5),
            retry_interval: Duration::from_secs(5),
            max_connections: 10,
        }
    }
}

/// Whether an error means the database could not be reached.
#[must_use]
pub fn is_connectivity_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

/// PostgreSQL-backed document store.
pub struct PgDocumentStore {
    options: PgStoreOptions,
    pool: RwLock<Option<PgPool>>,
    connected: AtomicBool,
}

impl PgDocumentStore {
    /// Create a disconnected store.
    #[must_use]
    pub fn new(mut options: PgStoreOptions) -> Self {
        options.retry_interval = options.retry_interval.max(MIN_RETRY_INTERVAL);
        Self {
            options,
            pool: RwLock::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Get the connection options.
    #[must_use]
    pub fn options(&self) -> &PgStoreOptions {
        &self.options
    }

    /// Open a new pool and make sure the schema exists.
    ///
    /// On success the new pool replaces any previous one and the store
    /// becomes available.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be reached
    /// or the schema cannot be applied.
    pub async fn connect(&self) -> Result<(), StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.options.max_connections)
            .acquire_timeout(self.options.connect_timeout)
            .connect(&self.options.url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to apply schema: {e}")))?;

        if let Some(previous) = self.pool.write().await.replace(pool) {
            tokio::spawn(async move { previous.close().await });
        }
        self.connected.store(true, Ordering::SeqCst);

        info!("Connected to database");
        Ok(())
    }

    /// Check that the current pool can run a query.
    pub async fn ping(&self) -> bool {
        let Some(pool) = self.pool.read().await.clone() else {
            return false;
        };
        sqlx::query("SELECT 1").execute(&pool).await.is_ok()
    }

    /// Start the background connection supervisor.
    ///
    /// The first attempt happens immediately. The task runs until aborted.
    pub fn spawn_supervisor(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move { store.supervise().await })
    }

    async fn supervise(&self) {
        let mut interval = tokio::time::interval(self.options.retry_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            if self.is_available() {
                if !self.ping().await {
                    self.mark_unavailable();
                }
                continue;
            }

            match self.connect().await {
                Ok(()) => {}
                Err(e) => warn!(
                    error = %e,
                    retry_in_ms = self.options.retry_interval.as_millis() as u64,
                    "Database connection failed, retrying"
                ),
            }
        }
    }

    fn mark_unavailable(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            warn!("Database disconnected - attempting to reconnect");
        }
    }

    async fn pool(&self) -> Result<PgPool, StoreError> {
        if !self.is_available() {
            return Err(StoreError::Unavailable("Database not connected".to_string()));
        }
        self.pool
            .read()
            .await
            .clone()
            .ok_or_else(|| StoreError::Unavailable("Database not connected".to_string()))
    }

    fn classify(&self, err: sqlx::Error, otherwise: fn(String) -> StoreError) -> StoreError {
        if is_connectivity_error(&err) {
            self.mark_unavailable();
            StoreError::Unavailable(err.to_string())
        } else {
            otherwise(err.to_string())
        }
    }
}

// Content is stored as BYTEA holding UTF-8, since TEXT cannot hold NUL.
fn document_from_row(row: &PgRow) -> Result<StoredDocument, sqlx::Error> {
    let content: Vec<u8> = row.try_get("content")?;
    Ok(StoredDocument {
        id: row.try_get::<i64, _>("id")?.to_string(),
        room_id: row.try_get("room_id")?,
        content: String::from_utf8(content).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
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
        let pool = self.pool().await?;

        let row = sqlx::query(UPSERT_SQL)
            .bind(room_id)
            .bind(content.as_bytes())
            .bind(updated_at)
            .fetch_one(&pool)
            .await
            .map_err(|e| self.classify(e, StoreError::Write))?;

        let document = document_from_row(&row).map_err(|e| StoreError::Write(e.to_string()))?;
        debug!(room = %room_id, id = %document.id, "Document saved to database");
        Ok(document)
    }

    async fn get(&self, room_id: &str) -> Result<Option<StoredDocument>, StoreError> {
        let pool = self.pool().await?;

        let row = sqlx::query(SELECT_SQL)
            .bind(room_id)
            .fetch_optional(&pool)
            .await
            .map_err(|e| self.classify(e, StoreError::Read))?;

        row.as_ref()
            .map(document_from_row)
            .transpose()
            .map_err(|e| StoreError::Read(e.to_string()))
    }
}
