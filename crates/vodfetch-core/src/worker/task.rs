//! One task through the existence check and the retry loop.

use crate::control::CancelToken;
use crate::planner::DownloadTask;
use crate::progress::{TaskOutcome, TaskStatus};
use crate::retry::{classify, RetryDecision};
use crate::session::{FetchRequest, RetrievalSession, SessionError};

use super::sink::{existing_size, remove_partial, ChunkFile};
use super::WorkerSettings;

/// Execute `task` on `session` and return its terminal outcome.
///
/// Never returns an error: every failure is retried according to the policy
/// and finally becomes a `Failed` outcome with no file left at the output path.
pub(super) fn execute_task<S>(
    session: &mut S,
    task: DownloadTask,
    settings: &WorkerSettings,
    cancel: &CancelToken,
) -> TaskOutcome
where
    S: RetrievalSession + ?Sized,
{
    if let Some(size) = existing_size(&task.output_path) {
        return TaskOutcome {
            task,
            status: TaskStatus::Exists,
            bytes: size,
            attempts: 0,
        };
    }

    let request = FetchRequest {
        channel: settings.channel,
        stream: settings.stream,
        segment_name: &task.segment_name,
        start: task.chunk_start,
        end: task.chunk_end,
    };
    let chunk = task.label();
    let mut attempts = 0u32;

    loop {
        if cancel.is_cancelled() {
            break;
        }
        let attempt = attempts;
        attempts += 1;
        tracing::debug!(%chunk, attempt = attempts, "fetching");

        let mut sink = ChunkFile::new(&task.output_path, cancel);
        let result = session
            .fetch(&request, &mut sink)
            .and_then(|_| sink.finish().map_err(SessionError::Storage));
        let err = match result {
            Ok(bytes) if bytes > 0 => {
                return TaskOutcome {
                    status: TaskStatus::Downloaded,
                    bytes,
                    attempts,
                    task,
                };
            }
            Ok(_) => {
                // An empty body must not leave an older partial attempt looking complete.
                remove_partial(&task.output_path);
                SessionError::Decode("empty response body".to_string())
            }
            Err(e) => e,
        };

        if err.is_cancelled() || cancel.is_cancelled() {
            tracing::info!(%chunk, "cancelled mid-download");
            break;
        }

        let class = classify(&err);
        match settings.retry.decide(attempt, class) {
            RetryDecision::GiveUp => {
                tracing::warn!(%chunk, attempts, ?class, "giving up: {}", err);
                break;
            }
            RetryDecision::Retry {
                after,
                reauthenticate,
            } => {
                tracing::warn!(
                    %chunk,
                    attempt = attempts,
                    ?class,
                    backoff_ms = after.as_millis() as u64,
                    "attempt failed: {}",
                    err
                );
                if !cancel.sleep(after) {
                    break;
                }
                if reauthenticate {
                    if let Err(e) = session.authenticate() {
                        tracing::warn!(%chunk, "re-login failed, retrying anyway: {}", e);
                    }
                }
            }
        }
    }

    remove_partial(&task.output_path);
    TaskOutcome {
        task,
        status: TaskStatus::Failed,
        bytes: 0,
        attempts,
    }
}
