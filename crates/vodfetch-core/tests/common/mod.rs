//! Shared helpers for integration tests.
//!
//! `ScriptedFactory` hands out in-memory sessions whose answers are decided by
//! a closure, and records every call so tests can check how the run used them.

#![allow(dead_code)]

pub mod device_server;

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime};
use vodfetch_core::orchestrator::RunSettings;
use vodfetch_core::retry::RetryPolicy;
use vodfetch_core::session::{
    FetchRequest, RetrievalSession, Segment, SessionError, SessionFactory, Stream,
};

/// Decides the answer to one fetch: `(chunk start, attempt number starting at 1)`.
pub type FetchScript = dyn Fn(NaiveDateTime, u32) -> Result<Vec<u8>, SessionError> + Send + Sync;

#[derive(Debug, Default)]
pub struct Stats {
    pub opened: usize,
    pub authenticated: usize,
    pub released: usize,
    pub listed: usize,
    /// When each session was opened, in open order.
    pub opened_at: Vec<Instant>,
    /// `(session number, time)` of every login attempt.
    pub logins: Vec<(usize, Instant)>,
    /// Fetch attempts per chunk start.
    pub fetches: HashMap<NaiveDateTime, u32>,
    in_flight: HashSet<NaiveDateTime>,
    /// Set if two sessions ever fetched the same chunk at the same time.
    pub concurrent_same_chunk: bool,
}

impl Stats {
    pub fn total_fetches(&self) -> u32 {
        self.fetches.values().sum()
    }
}

#[derive(Clone)]
pub struct ScriptedFactory {
    segments: Vec<Segment>,
    script: Arc<FetchScript>,
    /// Sessions (1-based, in open order) whose login fails.
    failing_logins: Vec<usize>,
    fetch_delay: Duration,
    pub stats: Arc<Mutex<Stats>>,
}

impl ScriptedFactory {
    pub fn new<F>(segments: Vec<Segment>, script: F) -> Self
    where
        F: Fn(NaiveDateTime, u32) -> Result<Vec<u8>, SessionError> + Send + Sync + 'static,
    {
        Self {
            segments,
            script: Arc::new(script),
            failing_logins: Vec::new(),
            fetch_delay: Duration::ZERO,
            stats: Arc::new(Mutex::new(Stats::default())),
        }
    }

    /// Every fetch succeeds with a small body derived from the chunk start.
    pub fn always_ok(segments: Vec<Segment>) -> Self {
        Self::new(segments, |start, _| {
            Ok(start.format("chunk %H%M%S").to_string().into_bytes())
        })
    }

    /// Make the login of the `n`th opened session fail. The scout is opened first.
    pub fn fail_login_of(mut self, n: usize) -> Self {
        self.failing_logins.push(n);
        self
    }

    pub fn fetch_delay(mut self, d: Duration) -> Self {
        self.fetch_delay = d;
        self
    }

    pub fn stats(&self) -> std::sync::MutexGuard<'_, Stats> {
        self.stats.lock().unwrap()
    }
}

impl SessionFactory for ScriptedFactory {
    type Session = ScriptedSession;

    fn open(&self) -> ScriptedSession {
        let mut stats = self.stats.lock().unwrap();
        stats.opened += 1;
        stats.opened_at.push(Instant::now());
        ScriptedSession {
            factory: self.clone(),
            number: stats.opened,
            fail_login: self.failing_logins.contains(&stats.opened),
        }
    }
}

pub struct ScriptedSession {
    factory: ScriptedFactory,
    /// 1-based open order; the scout is 1.
    number: usize,
    fail_login: bool,
}

impl RetrievalSession for ScriptedSession {
    fn authenticate(&mut self) -> Result<(), SessionError> {
        {
            let mut stats = self.factory.stats();
            stats.authenticated += 1;
            stats.logins.push((self.number, Instant::now()));
        }
        if self.fail_login {
            return Err(SessionError::Auth("invalid credentials".into()));
        }
        Ok(())
    }

    fn list_segments(
        &mut self,
        _channel: u8,
        _stream: Stream,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Segment>, SessionError> {
        self.factory.stats().listed += 1;
        Ok(self
            .factory
            .segments
            .iter()
            .filter(|s| s.start <= end && s.end >= start)
            .cloned()
            .collect())
    }

    fn fetch(
        &mut self,
        request: &FetchRequest<'_>,
        sink: &mut dyn Write,
    ) -> Result<u64, SessionError> {
        let attempt = {
            let mut stats = self.factory.stats();
            if !stats.in_flight.insert(request.start) {
                stats.concurrent_same_chunk = true;
            }
            let n = stats.fetches.entry(request.start).or_insert(0);
            *n += 1;
            *n
        };
        if !self.factory.fetch_delay.is_zero() {
            std::thread::sleep(self.factory.fetch_delay);
        }
        let result = (self.factory.script)(request.start, attempt).and_then(|body| {
            sink.write_all(&body).map_err(SessionError::Storage)?;
            Ok(body.len() as u64)
        });
        self.factory.stats().in_flight.remove(&request.start);
        result
    }

    fn release(&mut self) {
        self.factory.stats().released += 1;
    }
}

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
}

pub fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    day().and_hms_opt(h, m, s).unwrap()
}

pub fn segment(name: &str, start: NaiveDateTime, end: NaiveDateTime) -> Segment {
    Segment {
        name: name.to_string(),
        start,
        end,
    }
}

/// Fast settings: millisecond backoff, no pacing, no stagger.
pub fn settings(output_dir: &std::path::Path, workers: usize) -> RunSettings {
    RunSettings {
        day: day(),
        channel: 0,
        stream: Stream::Main,
        chunk_duration: chrono::Duration::minutes(5),
        output_dir: output_dir.to_path_buf(),
        workers,
        stagger: Duration::ZERO,
        pacing: Duration::ZERO,
        retry: RetryPolicy {
            max_attempts: 5,
            busy_step: Duration::from_millis(5),
            retry_step: Duration::from_millis(2),
        },
    }
}
