//! Bridges from the worker and the resource manager back into the async
//! side of the server.

pub mod progress;
pub mod resources;

pub use progress::{spawn_progress_writer, ProgressEvent, ProgressForwarder};
pub use resources::ResourceUpdatePublisher;
