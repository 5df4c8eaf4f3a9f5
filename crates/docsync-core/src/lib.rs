//! # docsync-core
//!
//! Room membership, broadcast dispatch and the connection gateway for the
//! docsync relay.
//!
//! This crate provides the real-time half of the relay:
//!
//! - **Room** - Named broadcast group and its members
//! - **RoomRegistry** - Room -> sessions and session -> rooms mappings
//! - **Dispatcher** - Per-session outbound queues and fan-out
//! - **Gateway** - Event state machine tying the above together
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  Transport  │────▶│   Gateway    │────▶│ RoomRegistry │
//! └─────────────┘     └──────────────┘     └──────────────┘
//!        ▲                   │
//!        │                   ▼
//!        │            ┌──────────────┐
//!        └────────────│  Dispatcher  │
//!                     └──────────────┘
//! ```

pub mod dispatch;
pub mod gateway;
pub mod registry;
pub mod room;
pub mod session;

pub use dispatch::{Dispatcher, Outbound};
pub use gateway::{Gateway, GatewayConfig, GatewayError, GatewayStats, SessionHandle};
pub use registry::{RegistryStats, RoomRegistry};
pub use room::{Room, RoomId};
pub use session::SessionId;
