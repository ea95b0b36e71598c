//! Shared pull queue of planned download tasks.
//!
//! Loaded once with the whole plan before any worker starts; workers pop
//! until it reports empty. Nothing is ever pushed back, so a task is handed
//! to exactly one worker per run.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::planner::DownloadTask;

#[derive(Debug)]
pub struct TaskQueue {
    tasks: Mutex<VecDeque<DownloadTask>>,
    total: usize,
}

impl TaskQueue {
    pub fn new(tasks: Vec<DownloadTask>) -> Self {
        let total = tasks.len();
        Self {
            tasks: Mutex::new(tasks.into()),
            total,
        }
    }

    /// Next task in plan order, or `None` once the queue is drained.
    pub fn try_pop(&self) -> Option<DownloadTask> {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    /// Tasks not yet handed out.
    pub fn remaining(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of tasks the queue was loaded with.
    pub fn total(&self) -> usize {
        self.total
    }
}
