//! Task progress persistence.
//!
//! The worker thread reports through [`ProgressForwarder`], which only
//! pushes a [`ProgressEvent`] onto a channel. A single async task drains the
//! channel in order, writes `progress`/`seed` to every output row of the
//! task and publishes `output.updated` with the stored row.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use varnava_core::types::EntityId;
use varnava_core::update_events::EVENT_OUTPUT_UPDATED;
use varnava_db::repositories::OutputRepo;
use varnava_db::DbPool;
use varnava_events::UpdateChannel;
use varnava_worker::{GenerationTask, TaskObserver, WorkerError};

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Progress {
        outputs: Vec<EntityId>,
        progress: f64,
        seed: u64,
    },
    Failed {
        task_id: EntityId,
        message: String,
    },
    Cancelled {
        task_id: EntityId,
    },
}

/// [`TaskObserver`] attached to every submitted task.
pub struct ProgressForwarder {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressForwarder {
    pub fn new(sender: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { sender }
    }

    fn forward(&self, event: ProgressEvent) {
        if self.sender.send(event).is_err() {
            tracing::warn!("Progress writer is gone, dropping progress event");
        }
    }
}

impl TaskObserver for ProgressForwarder {
    fn on_progress(&self, task: &GenerationTask, progress: f64, seed: u64) {
        self.forward(ProgressEvent::Progress {
            outputs: task.outputs.iter().map(|output| output.id).collect(),
            progress,
            seed,
        });
    }

    fn on_failed(&self, task: &GenerationTask, error: &WorkerError) {
        self.forward(ProgressEvent::Failed {
            task_id: task.id,
            message: error.to_string(),
        });
    }

    fn on_cancelled(&self, task: &GenerationTask) {
        self.forward(ProgressEvent::Cancelled { task_id: task.id });
    }
}

/// Start the writer task. It ends once every forwarder is dropped.
pub fn spawn_progress_writer(
    pool: DbPool,
    channel: Arc<UpdateChannel>,
) -> (Arc<ProgressForwarder>, JoinHandle<()>) {
    let (sender, mut receiver) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            handle_progress_event(&pool, &channel, event).await;
        }
        tracing::debug!("Progress writer stopped");
    });
    (Arc::new(ProgressForwarder::new(sender)), handle)
}

pub async fn handle_progress_event(pool: &DbPool, channel: &UpdateChannel, event: ProgressEvent) {
    match event {
        ProgressEvent::Progress {
            outputs,
            progress,
            seed,
        } => {
            let seed = i64::try_from(seed).unwrap_or(i64::MAX);
            for id in outputs {
                match OutputRepo::update_progress(pool, id, progress, seed).await {
                    Ok(Some(output)) => channel.send(EVENT_OUTPUT_UPDATED, &output),
                    // Deleted while the task was running.
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!(output_id = %id, error = %e, "Failed to update output progress");
                    }
                }
            }
        }
        ProgressEvent::Failed { task_id, message } => {
            tracing::warn!(task_id = %task_id, error = %message, "Generation task failed");
        }
        ProgressEvent::Cancelled { task_id } => {
            tracing::info!(task_id = %task_id, "Generation task cancelled");
        }
    }
}
