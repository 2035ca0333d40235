//! The `/updates` WebSocket.
//!
//! Each connection attaches itself as the single subscriber of the
//! [`UpdateChannel`](varnava_events::UpdateChannel). A newer connection
//! replaces it; the older one is then closed by the server.

mod handler;

pub use handler::ws_handler;
