//! Request handlers.
//!
//! Handlers stay thin: they validate input, delegate to the repositories,
//! the resource manager or the worker, and map errors via [`AppError`](crate::error::AppError).

pub mod outputs;
pub mod resources;
pub mod settings;
pub mod tasks;
