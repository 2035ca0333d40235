//! The generation worker.
//!
//! One dedicated thread drains a FIFO queue of [`GenerationTask`]s, one task
//! at a time. The thread exclusively owns the [`PipelineCache`] and with it
//! the only live pipeline. Progress flows back through each task's
//! [`TaskObserver`].
//!
//! [`PipelineCache`]: varnava_pipeline::PipelineCache

pub mod error;
mod execute;
pub mod task;
pub mod worker;

pub use error::WorkerError;
pub use task::{GenerationOutput, GenerationTask, TaskObserver};
pub use worker::GenerationWorker;
