//! Event names published on the update channel.
//!
//! The desktop client dispatches on these strings, so they are part of the
//! wire contract. Payloads are the serialized entity, unversioned.

/// An output row was created by a generation request.
pub const EVENT_OUTPUT_CREATED: &str = "output.created";

/// An output row changed (progress, seed).
pub const EVENT_OUTPUT_UPDATED: &str = "output.updated";

/// Resource manager state changed (sizes, download activity).
pub const EVENT_RESOURCES_UPDATE: &str = "resources.update";
