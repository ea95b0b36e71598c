//! Remote device sessions.
//!
//! A `RetrievalSession` is one authenticated connection to the recorder. It
//! owns the login/logout lifecycle and exposes the two remote operations the
//! engine needs: list recorded segments in a time range and stream a time
//! slice of one segment. Sessions are owned by exactly one worker (or the
//! scout) and are never shared.

mod error;
pub mod reolink;

pub use error::SessionError;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::ops::{Deref, DerefMut};

/// One continuously recorded file as listed by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Opaque file name used to address the recording in fetch requests.
    pub name: String,
    /// Start of the recording (device local time, inclusive).
    pub start: NaiveDateTime,
    /// End of the recording (device local time, exclusive).
    pub end: NaiveDateTime,
}

impl Segment {
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

/// Recording stream of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    /// Full resolution ("high quality").
    #[default]
    Main,
    /// Reduced resolution ("low quality").
    Sub,
}

impl Stream {
    /// Name used by the device API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stream::Main => "main",
            Stream::Sub => "sub",
        }
    }

    /// Human label for summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Stream::Main => "HIGH (main)",
            Stream::Sub => "LOW (sub)",
        }
    }
}

/// A time slice of one recorded segment to stream.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub channel: u8,
    pub stream: Stream,
    pub segment_name: &'a str,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// One authenticated connection to the recorder.
pub trait RetrievalSession: Send {
    /// Log in (or log in again after the device dropped the session).
    /// Fails with `SessionError::Auth` on bad credentials or an unreachable host.
    fn authenticate(&mut self) -> Result<(), SessionError>;

    /// Segments recorded on `channel` that overlap `[start, end]`.
    fn list_segments(
        &mut self,
        channel: u8,
        stream: Stream,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Segment>, SessionError>;

    /// Stream the requested slice into `sink` as bytes arrive.
    /// Returns the number of bytes written to `sink`.
    fn fetch(
        &mut self,
        request: &FetchRequest<'_>,
        sink: &mut dyn Write,
    ) -> Result<u64, SessionError>;

    /// Log out. Best effort: failures are logged by the implementation, never returned.
    fn release(&mut self);
}

/// Opens fresh, unauthenticated sessions (one per worker plus the scout).
pub trait SessionFactory {
    type Session: RetrievalSession + 'static;

    fn open(&self) -> Self::Session;
}

/// Owns a session and releases it when dropped, including on early return or panic.
pub struct SessionGuard<S: RetrievalSession> {
    session: S,
}

impl<S: RetrievalSession> SessionGuard<S> {
    pub fn new(session: S) -> Self {
        Self { session }
    }
}

impl<S: RetrievalSession> Deref for SessionGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: RetrievalSession> DerefMut for SessionGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

impl<S: RetrievalSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        self.session.release();
    }
}
