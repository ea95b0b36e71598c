//! Retry and backoff policy.
//!
//! This module encapsulates error classification (device busy, broken
//! session, anything else) and the per-class backoff decision so the worker
//! loop only has to act on a `RetryDecision`.

mod classify;
mod policy;

pub use classify::{classify, ErrorClass};
pub use policy::{RetryDecision, RetryPolicy};
