//! Run one full-day download end to end.
//!
//! A scout session lists the day's recordings and is released. The planner
//! turns them into tasks, the tasks go into one shared queue, and a fixed
//! number of worker threads (each with its own session) drain it. The run
//! ends when every worker has exited; the summary is built from the shared
//! aggregator.

mod summary;

use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use crate::config::VodConfig;
use crate::control::CancelToken;
use crate::planner::{estimate_bytes, ChunkPlanner, DownloadTask, PlanError};
use crate::progress::{ProgressAggregator, TaskReport};
use crate::queue::TaskQueue;
use crate::retry::RetryPolicy;
use crate::session::{
    RetrievalSession, Segment, SessionError, SessionFactory, SessionGuard, Stream,
};
use crate::worker::{DownloadWorker, WorkerExit, WorkerSettings};

pub use summary::RunSummary;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("login failed: {0}")]
    ScoutAuth(#[source] SessionError),
    #[error("could not list recordings: {0}")]
    Listing(#[source] SessionError),
    #[error("cannot create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("could not start worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Everything one run needs besides the session factory.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub day: NaiveDate,
    pub channel: u8,
    pub stream: Stream,
    pub chunk_duration: chrono::Duration,
    pub output_dir: PathBuf,
    /// Number of worker threads; clamped to at least one.
    pub workers: usize,
    /// Delay between starting consecutive workers.
    pub stagger: Duration,
    pub pacing: Duration,
    pub retry: RetryPolicy,
}

impl RunSettings {
    /// Settings for `day` from the effective configuration.
    pub fn from_config(cfg: &VodConfig, day: NaiveDate) -> Self {
        Self {
            day,
            channel: cfg.channel,
            stream: cfg.stream,
            chunk_duration: cfg.chunk_duration(),
            output_dir: cfg.output_dir.clone(),
            workers: cfg.workers,
            stagger: cfg.stagger(),
            pacing: cfg.pacing(),
            retry: cfg.retry_policy(),
        }
    }

    fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            channel: self.channel,
            stream: self.stream,
            retry: self.retry,
            pacing: self.pacing,
        }
    }
}

/// Recordings of one day and the tasks planned from them.
#[derive(Debug, Clone)]
pub struct DayPlan {
    pub segments: Vec<Segment>,
    pub tasks: Vec<DownloadTask>,
    pub estimated_bytes: u64,
}

impl DayPlan {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Log in with a scout session, list `settings.day` and plan its chunks.
///
/// The scout is released before this returns, whatever the outcome.
pub fn prepare_day<F: SessionFactory>(
    factory: &F,
    settings: &RunSettings,
) -> Result<DayPlan, RunError> {
    let planner = ChunkPlanner::new(settings.chunk_duration, &settings.output_dir)?;

    let segments = {
        let mut scout = SessionGuard::new(factory.open());
        scout.authenticate().map_err(RunError::ScoutAuth)?;
        let start = settings.day.and_time(NaiveTime::MIN);
        let end = settings.day.and_hms_opt(23, 59, 59).unwrap_or(start);
        scout
            .list_segments(settings.channel, settings.stream, start, end)
            .map_err(RunError::Listing)?
    };
    tracing::info!(
        day = %settings.day,
        channel = settings.channel,
        stream = settings.stream.as_str(),
        segments = segments.len(),
        "listed recordings"
    );

    let tasks = planner.plan(settings.day, &segments);
    let estimated_bytes = estimate_bytes(&tasks, settings.stream);
    Ok(DayPlan {
        segments,
        tasks,
        estimated_bytes,
    })
}

/// Download every recording of `settings.day`.
///
/// Returns an error only when the run cannot start (scout login or listing
/// fails, output directory or planner rejected). Per-task failures are
/// counted in the summary instead. `reports` receives one message per
/// finished task; cancelling `cancel` stops the run at the next safe point.
pub fn run_day<F: SessionFactory>(
    factory: &F,
    settings: &RunSettings,
    reports: Option<Sender<TaskReport>>,
    cancel: &CancelToken,
) -> Result<RunSummary, RunError> {
    let plan = prepare_day(factory, settings)?;
    run_plan(factory, settings, plan, reports, cancel)
}

/// Execute a prepared plan with `settings.workers` worker threads.
///
/// An empty plan returns a "no recordings" summary without starting any worker.
pub fn run_plan<F: SessionFactory>(
    factory: &F,
    settings: &RunSettings,
    plan: DayPlan,
    reports: Option<Sender<TaskReport>>,
    cancel: &CancelToken,
) -> Result<RunSummary, RunError> {
    let started = Instant::now();
    let DayPlan {
        segments,
        tasks,
        estimated_bytes,
    } = plan;
    if tasks.is_empty() {
        tracing::info!(day = %settings.day, "no recordings");
        return Ok(RunSummary::empty(settings, segments.len()));
    }

    std::fs::create_dir_all(&settings.output_dir).map_err(|source| RunError::OutputDir {
        path: settings.output_dir.clone(),
        source,
    })?;

    let queue = Arc::new(TaskQueue::new(tasks));
    let total = queue.total();
    let progress = Arc::new(ProgressAggregator::new(total));
    let workers = settings.workers.max(1);
    tracing::info!(tasks = total, workers, estimated_bytes, "starting download");

    let mut handles = Vec::with_capacity(workers);
    for id in 1..=workers {
        if id > 1 && !cancel.sleep(settings.stagger) {
            tracing::info!("cancelled while starting workers");
            break;
        }
        let worker = DownloadWorker::new(
            id,
            factory.open(),
            Arc::clone(&queue),
            Arc::clone(&progress),
            settings.worker_settings(),
            cancel.clone(),
        );
        let worker = match &reports {
            Some(tx) => worker.with_reports(tx.clone()),
            None => worker,
        };
        let handle = std::thread::Builder::new()
            .name(format!("worker-{id}"))
            .spawn(move || worker.run());
        match handle {
            Ok(h) => handles.push((id, h)),
            Err(e) if handles.is_empty() => return Err(RunError::Spawn(e)),
            Err(e) => {
                tracing::error!(worker = id, "could not start worker thread: {}", e);
                break;
            }
        }
    }
    drop(reports);

    let mut auth_failures = 0usize;
    for (id, handle) in handles {
        match handle.join() {
            Ok(WorkerExit::Drained { tasks }) => {
                tracing::debug!(worker = id, tasks, "worker finished")
            }
            Ok(WorkerExit::Cancelled { tasks }) => {
                tracing::debug!(worker = id, tasks, "worker stopped")
            }
            Ok(WorkerExit::AuthFailed(_)) => auth_failures += 1,
            Err(_) => tracing::error!(worker = id, "worker thread panicked"),
        }
    }

    let not_attempted = queue.remaining();
    if not_attempted > 0 {
        tracing::warn!(not_attempted, "tasks left in the queue");
    }
    let progress = progress.snapshot();
    let lost = total.saturating_sub(progress.finished() + not_attempted);
    if lost > 0 {
        tracing::error!(lost, "tasks lost with a crashed worker");
    }
    Ok(RunSummary {
        day: settings.day,
        stream: settings.stream,
        output_dir: settings.output_dir.clone(),
        segments: segments.len(),
        progress,
        not_attempted,
        lost,
        auth_failures,
        estimated_bytes,
        elapsed: started.elapsed(),
        cancelled: cancel.is_cancelled(),
    })
}
