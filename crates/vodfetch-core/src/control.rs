//! Run control: a shared cancellation token.
//!
//! The CLI sets the token on Ctrl-C. Workers check it between tasks, before
//! each attempt, while backing off, and on every block written to disk, so a
//! run stops at the next such point and leaves only complete chunks behind.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Error returned when a download is stopped by the user.
#[derive(Debug)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run cancelled by user")
    }
}

impl std::error::Error for Cancelled {}

/// Cloneable cancellation flag shared by the orchestrator and every worker.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Sleep for `d`, waking early on cancellation.
    /// Returns `false` if the token was cancelled before or during the sleep.
    /// A duration past the clock's range sleeps until cancelled.
    pub fn sleep(&self, d: Duration) -> bool {
        let deadline = Instant::now().checked_add(d);
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            let left = match deadline {
                Some(deadline) if now >= deadline => return true,
                Some(deadline) => deadline - now,
                None => SLEEP_SLICE,
            };
            std::thread::sleep(left.min(SLEEP_SLICE));
        }
    }
}
