//! Run progress shared by all workers.
//!
//! Workers record each finished task under one mutex; reporters read a
//! consistent `ProgressSnapshot`. Consumers can compute rate and ETA from
//! the snapshot like `bytes_per_sec()` does.

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::planner::DownloadTask;

/// Terminal state of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Output already present with non-zero size; nothing was fetched.
    Exists,
    Downloaded,
    /// Attempts exhausted (or the run was cancelled mid-task); no file is left behind.
    Failed,
}

/// Result of executing one task.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task: DownloadTask,
    pub status: TaskStatus,
    /// Bytes on disk for `Exists`, bytes received for `Downloaded`, 0 for `Failed`.
    pub bytes: u64,
    /// Fetch attempts made (0 for `Exists`).
    pub attempts: u32,
}

/// Incremental report sent after every task.
#[derive(Debug, Clone)]
pub struct TaskReport {
    /// 1-based worker number.
    pub worker: usize,
    pub outcome: TaskOutcome,
    pub progress: ProgressSnapshot,
}

/// Consistent snapshot of run progress.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressSnapshot {
    pub downloaded: usize,
    pub existing: usize,
    pub failed: usize,
    pub total: usize,
    /// Bytes fetched from the device during this run.
    pub bytes_transferred: u64,
    /// Bytes of all finished chunks on disk (fetched plus already present).
    pub bytes_on_disk: u64,
    pub elapsed_secs: f64,
}

impl ProgressSnapshot {
    /// Tasks that reached a terminal state.
    pub fn finished(&self) -> usize {
        self.downloaded + self.existing + self.failed
    }

    /// Tasks whose chunk is on disk.
    pub fn completed(&self) -> usize {
        self.downloaded + self.existing
    }

    /// Transfer rate in bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_transferred as f64 / self.elapsed_secs
    }

    /// Fraction of tasks finished in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.finished() as f64 / self.total as f64).min(1.0)
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    downloaded: usize,
    existing: usize,
    failed: usize,
    bytes_transferred: u64,
    bytes_on_disk: u64,
}

/// Mutex-guarded counters, constructed once per run and shared by `Arc`.
#[derive(Debug)]
pub struct ProgressAggregator {
    state: Mutex<ProgressState>,
    total: usize,
    started: Instant,
}

impl ProgressAggregator {
    pub fn new(total: usize) -> Self {
        Self {
            state: Mutex::new(ProgressState::default()),
            total,
            started: Instant::now(),
        }
    }

    /// Count one outcome and return the snapshot right after it.
    pub fn record(&self, outcome: &TaskOutcome) -> ProgressSnapshot {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match outcome.status {
            TaskStatus::Exists => {
                state.existing += 1;
                state.bytes_on_disk += outcome.bytes;
            }
            TaskStatus::Downloaded => {
                state.downloaded += 1;
                state.bytes_transferred += outcome.bytes;
                state.bytes_on_disk += outcome.bytes;
            }
            TaskStatus::Failed => state.failed += 1,
        }
        self.snapshot_of(&state)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.snapshot_of(&state)
    }

    fn snapshot_of(&self, state: &ProgressState) -> ProgressSnapshot {
        ProgressSnapshot {
            downloaded: state.downloaded,
            existing: state.existing,
            failed: state.failed,
            total: self.total,
            bytes_transferred: state.bytes_transferred,
            bytes_on_disk: state.bytes_on_disk,
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        }
    }
}
