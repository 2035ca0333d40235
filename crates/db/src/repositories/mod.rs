//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&SqlitePool` as the first argument.

pub mod output_repo;
pub mod project_repo;
pub mod prompt_repo;

pub use output_repo::OutputRepo;
pub use project_repo::ProjectRepo;
pub use prompt_repo::PromptRepo;
