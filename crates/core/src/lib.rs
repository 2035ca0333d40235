//! Domain types shared by every Varnava crate.
//!
//! Nothing in here talks to the network or the database. Filesystem access
//! is limited to resolving paths inside the local model cache.

pub mod device;
pub mod error;
pub mod ignore;
pub mod plan;
pub mod remote_model;
pub mod settings;
pub mod snapshot;
pub mod types;
pub mod update_events;
