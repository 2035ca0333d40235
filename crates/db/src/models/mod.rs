//! Entity structs and create DTOs.
//!
//! Entities serialize with camelCase keys, which is the shape the desktop
//! client reads from both HTTP responses and update events.

pub mod output;
pub mod project;
pub mod prompt;
