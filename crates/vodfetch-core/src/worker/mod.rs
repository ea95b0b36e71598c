//! Download workers.
//!
//! A worker owns one session for its whole life, pulls tasks from the shared
//! queue until it is empty, executes each with the retry policy, and records
//! outcomes in the shared aggregator. The session is released when the
//! worker is dropped, whatever the exit path.

mod sink;
mod task;

use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

use crate::control::CancelToken;
use crate::progress::{ProgressAggregator, TaskReport, TaskStatus};
use crate::queue::TaskQueue;
use crate::retry::RetryPolicy;
use crate::session::{RetrievalSession, SessionError, SessionGuard, Stream};

/// Per-run settings every worker shares.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub channel: u8,
    pub stream: Stream,
    pub retry: RetryPolicy,
    /// Pause after each task so one worker cannot saturate the device.
    pub pacing: Duration,
}

/// Why a worker stopped.
#[derive(Debug)]
pub enum WorkerExit {
    /// The queue is empty.
    Drained { tasks: usize },
    /// The initial login failed; the worker took no task.
    AuthFailed(SessionError),
    Cancelled { tasks: usize },
}

pub struct DownloadWorker<S: RetrievalSession> {
    id: usize,
    session: SessionGuard<S>,
    queue: Arc<TaskQueue>,
    progress: Arc<ProgressAggregator>,
    settings: WorkerSettings,
    reports: Option<Sender<TaskReport>>,
    cancel: CancelToken,
}

impl<S: RetrievalSession> DownloadWorker<S> {
    /// `id` is 1-based and only used for reporting.
    pub fn new(
        id: usize,
        session: S,
        queue: Arc<TaskQueue>,
        progress: Arc<ProgressAggregator>,
        settings: WorkerSettings,
        cancel: CancelToken,
    ) -> Self {
        Self {
            id,
            session: SessionGuard::new(session),
            queue,
            progress,
            settings,
            reports: None,
            cancel,
        }
    }

    /// Send a `TaskReport` to `tx` after every task.
    pub fn with_reports(mut self, tx: Sender<TaskReport>) -> Self {
        self.reports = Some(tx);
        self
    }

    /// Log in, drain the queue, release the session.
    pub fn run(mut self) -> WorkerExit {
        let worker = self.id;
        if let Err(e) = self.session.authenticate() {
            tracing::error!(worker, "login failed, worker exits: {}", e);
            return WorkerExit::AuthFailed(e);
        }
        tracing::info!(worker, "worker started");

        let mut handled = 0usize;
        loop {
            if self.cancel.is_cancelled() {
                tracing::info!(worker, handled, "worker cancelled");
                return WorkerExit::Cancelled { tasks: handled };
            }
            let Some(task) = self.queue.try_pop() else {
                break;
            };
            let outcome =
                task::execute_task(&mut *self.session, task, &self.settings, &self.cancel);
            handled += 1;

            let chunk = outcome.task.label();
            match outcome.status {
                TaskStatus::Exists => {
                    tracing::debug!(worker, %chunk, bytes = outcome.bytes, "already on disk")
                }
                TaskStatus::Downloaded => tracing::info!(
                    worker,
                    %chunk,
                    bytes = outcome.bytes,
                    attempts = outcome.attempts,
                    "downloaded"
                ),
                TaskStatus::Failed => {
                    tracing::warn!(worker, %chunk, attempts = outcome.attempts, "failed")
                }
            }

            let progress = self.progress.record(&outcome);
            if let Some(tx) = &self.reports {
                // A reporter that went away must not stop the download.
                let _ = tx.send(TaskReport {
                    worker,
                    outcome,
                    progress,
                });
            }

            if !self.cancel.sleep(self.settings.pacing) {
                tracing::info!(worker, handled, "worker cancelled");
                return WorkerExit::Cancelled { tasks: handled };
            }
        }

        tracing::info!(worker, handled, "queue drained");
        WorkerExit::Drained { tasks: handled }
    }
}
