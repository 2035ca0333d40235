//! Live update delivery to the desktop client.
//!
//! - [`UpdateChannel`] forwards named events to the single attached
//!   subscriber (the `/updates` WebSocket).
//! - [`UpdateMessage`] is the wire envelope, `{"name": ..., "payload": ...}`.

pub mod channel;

pub use channel::{UpdateChannel, UpdateMessage};
pub use varnava_core::update_events;
