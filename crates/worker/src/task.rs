//! Submitted jobs and the callback contract.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use varnava_core::settings::GenerationTaskSettings;
use varnava_core::types::EntityId;

use crate::error::WorkerError;

/// One image slot of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    pub id: EntityId,
    /// Where the preview and then the final image are written.
    pub path: PathBuf,
}

/// Receives progress for the tasks it was attached to.
///
/// Calls come from the worker thread. For every task that runs to the end,
/// `on_progress` is called with non-decreasing values and exactly one final
/// call with `progress == 1.0`. The seed is the same on every call.
pub trait TaskObserver: Send + Sync {
    fn on_progress(&self, task: &GenerationTask, progress: f64, seed: u64);

    /// The task stopped early. Its outputs keep their last reported progress.
    fn on_failed(&self, task: &GenerationTask, error: &WorkerError) {
        let _ = (task, error);
    }

    /// The task was cancelled before it started.
    fn on_cancelled(&self, task: &GenerationTask) {
        let _ = task;
    }
}

pub struct GenerationTask {
    pub id: EntityId,
    pub prompt: String,
    /// Produced together; `outputs.len()` is the batch size.
    pub outputs: Vec<GenerationOutput>,
    pub settings: GenerationTaskSettings,
    observer: Arc<dyn TaskObserver>,
}

impl GenerationTask {
    pub fn new(
        prompt: impl Into<String>,
        outputs: Vec<GenerationOutput>,
        settings: GenerationTaskSettings,
        observer: Arc<dyn TaskObserver>,
    ) -> Self {
        Self {
            id: EntityId::new_v4(),
            prompt: prompt.into(),
            outputs,
            settings,
            observer,
        }
    }

    /// Reuse a known id, e.g. to resubmit.
    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    pub fn observer(&self) -> &dyn TaskObserver {
        self.observer.as_ref()
    }
}

impl fmt::Debug for GenerationTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationTask")
            .field("id", &self.id)
            .field("prompt", &self.prompt)
            .field("outputs", &self.outputs)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
