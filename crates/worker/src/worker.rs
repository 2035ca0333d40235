//! Queue handle and the loop thread.
//!
//! [`GenerationWorker::submit`] may be called from any thread and never
//! blocks. The loop thread takes tasks strictly in submission order. A
//! failing or panicking task is reported to its observer and the loop moves
//! on to the next one; the loop itself only ends when every handle is gone.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use varnava_core::types::EntityId;
use varnava_pipeline::{PipelineCache, PipelineFactory};

use crate::error::WorkerError;
use crate::execute::execute;
use crate::task::GenerationTask;

const THREAD_NAME: &str = "varnava-generator";

enum Command {
    Run(GenerationTask),
    Release,
}

/// Ids shared between the handle and the loop thread.
#[derive(Default)]
struct QueueState {
    queued: HashSet<EntityId>,
    cancelled: HashSet<EntityId>,
}

pub struct GenerationWorker {
    sender: mpsc::Sender<Command>,
    state: Arc<Mutex<QueueState>>,
}

impl GenerationWorker {
    /// Start the loop thread. The cache, and with it the factory, moves onto
    /// that thread for good.
    pub fn spawn<F>(cache: PipelineCache<F>) -> Result<Self, WorkerError>
    where
        F: PipelineFactory + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let state = Arc::new(Mutex::new(QueueState::default()));

        let loop_state = state.clone();
        thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run_loop(cache, receiver, loop_state))
            .map_err(WorkerError::Spawn)?;

        tracing::info!(thread = THREAD_NAME, "Generation worker started");
        Ok(Self { sender, state })
    }

    /// Enqueue a task. Returns `false` without enqueueing when a task with
    /// the same id is still waiting in the queue.
    pub fn submit(&self, task: GenerationTask) -> Result<bool, WorkerError> {
        let id = task.id;
        {
            let mut state = lock(&self.state);
            if !state.queued.insert(id) {
                tracing::debug!(task_id = %id, "Task already queued");
                return Ok(false);
            }
            state.cancelled.remove(&id);
        }

        if self.sender.send(Command::Run(task)).is_err() {
            lock(&self.state).queued.remove(&id);
            return Err(WorkerError::Stopped);
        }
        tracing::debug!(task_id = %id, "Task queued");
        Ok(true)
    }

    /// Skip a task that has not started yet. Returns `false` if it is not
    /// waiting in the queue; running tasks cannot be interrupted.
    pub fn cancel(&self, id: EntityId) -> bool {
        let mut state = lock(&self.state);
        if state.queued.contains(&id) {
            state.cancelled.insert(id)
        } else {
            false
        }
    }

    /// Number of tasks waiting to start.
    pub fn queued_len(&self) -> usize {
        lock(&self.state).queued.len()
    }

    /// Release the cached pipeline once the tasks queued so far are done.
    /// The worker keeps accepting and running tasks afterwards.
    pub fn stop(&self) -> Result<(), WorkerError> {
        self.sender
            .send(Command::Release)
            .map_err(|_| WorkerError::Stopped)
    }
}

fn lock(state: &Mutex<QueueState>) -> MutexGuard<'_, QueueState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn run_loop<F: PipelineFactory>(
    mut cache: PipelineCache<F>,
    receiver: mpsc::Receiver<Command>,
    state: Arc<Mutex<QueueState>>,
) {
    while let Ok(command) = receiver.recv() {
        let task = match command {
            Command::Run(task) => task,
            Command::Release => {
                cache.release();
                continue;
            }
        };

        let cancelled = {
            let mut state = lock(&state);
            state.queued.remove(&task.id);
            state.cancelled.remove(&task.id)
        };
        if cancelled {
            tracing::info!(task_id = %task.id, "Skipping cancelled task");
            task.observer().on_cancelled(&task);
            continue;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| execute(&mut cache, &task)))
            .unwrap_or_else(|payload| Err(WorkerError::Panicked(panic_message(payload.as_ref()))));

        match outcome {
            Ok(()) => tracing::info!(task_id = %task.id, "Task completed"),
            Err(e) => {
                tracing::error!(task_id = %task.id, error = %e, "Task failed");
                if e.invalidates_pipeline() {
                    cache.release();
                }
                task.observer().on_failed(&task, &e);
            }
        }
    }
    tracing::info!("Generation worker stopped");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
