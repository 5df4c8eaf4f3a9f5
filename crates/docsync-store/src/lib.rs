//! # docsync-store
//!
//! Dual-tier document persistence for the docsync relay.
//!
//! Every room has at most one saved document per tier. Saves go to the
//! durable PostgreSQL store while it is reachable and to an in-process
//! memory store while it is not. The [`PersistenceCoordinator`] makes that
//! choice per request and reports which tier accepted the save.
//!
//! ## Example
//!
//! ```rust
//! use docsync_store::{MemoryStore, PersistenceCoordinator, StorageTier};
//! use std::sync::Arc;
//!
//! # tokio_test_block(async {
//! let coordinator = PersistenceCoordinator::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryStore::new()),
//! );
//! let receipt = coordinator.save("r1", "hello").await.unwrap();
//! assert_eq!(receipt.tier, StorageTier::Durable);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

pub mod coordinator;
pub mod document;
pub mod memory;
pub mod postgres;
pub mod store;

pub use coordinator::PersistenceCoordinator;
pub use document::{LoadedDocument, SaveReceipt, StorageTier, StoredDocument};
pub use memory::MemoryStore;
pub use postgres::{PgDocumentStore, PgStoreOptions};
pub use store::{DocumentStore, StoreError};
