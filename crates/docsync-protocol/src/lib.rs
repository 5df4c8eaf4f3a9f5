//! # docsync-protocol
//!
//! Wire protocol definitions for the docsync room relay.
//!
//! This crate defines the events exchanged between clients and the relay
//! and the codecs used to put them on a WebSocket.
//!
//! ## Events
//!
//! - `join_room` / `room_joined` - Room membership
//! - `user_joined` / `user_left` - Membership notifications
//! - `document_update` / `sync_update` - Document content fan-out
//!
//! ## Example
//!
//! ```rust
//! use docsync_protocol::{codec, ClientEvent};
//!
//! let event = ClientEvent::document_update("r1", "hello");
//!
//! let text = codec::encode_text(&event).unwrap();
//! let decoded: ClientEvent = codec::decode_text(&text).unwrap();
//! assert_eq!(event, decoded);
//! ```

pub mod codec;
pub mod events;

pub use codec::{decode_text, encode, Encoded, Encoding, ProtocolError};
pub use events::{ClientEvent, DocumentUpdate, EventKind, ServerEvent};
