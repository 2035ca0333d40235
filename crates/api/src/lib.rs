//! Varnava API server library.
//!
//! Exposes the building blocks (config, state, startup wiring, error
//! handling, routes, the update WebSocket) so integration tests and the
//! binary entrypoint share them.

pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod router;
pub mod routes;
pub mod startup;
pub mod state;
pub mod ws;
