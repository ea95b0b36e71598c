//! End-of-run summary.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;

use crate::progress::ProgressSnapshot;
use crate::session::Stream;

use super::RunSettings;

const MIB: f64 = 1024.0 * 1024.0;

/// Final counts of one run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub day: NaiveDate,
    pub stream: Stream,
    pub output_dir: PathBuf,
    /// Recorded segments the device listed.
    pub segments: usize,
    pub progress: ProgressSnapshot,
    /// Tasks still queued when the run ended (cancellation or no worker could log in).
    pub not_attempted: usize,
    /// Tasks taken by a worker that panicked before recording an outcome.
    pub lost: usize,
    /// Workers that exited because their login failed.
    pub auth_failures: usize,
    pub estimated_bytes: u64,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl RunSummary {
    pub(super) fn empty(settings: &RunSettings, segments: usize) -> Self {
        Self {
            day: settings.day,
            stream: settings.stream,
            output_dir: settings.output_dir.clone(),
            segments,
            progress: ProgressSnapshot::default(),
            not_attempted: 0,
            lost: 0,
            auth_failures: 0,
            estimated_bytes: 0,
            elapsed: Duration::ZERO,
            cancelled: false,
        }
    }

    /// True when the day had nothing to download.
    pub fn no_recordings(&self) -> bool {
        self.progress.total == 0
    }

    pub fn total_tasks(&self) -> usize {
        self.progress.total
    }

    /// Every planned task ended up on disk.
    pub fn is_complete(&self) -> bool {
        self.progress.completed() == self.progress.total
    }

    /// Transfer rate of this run in MiB/s (zero when nothing was transferred).
    pub fn mib_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.progress.bytes_transferred as f64 / MIB / secs
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.progress;
        if self.no_recordings() {
            return write!(f, "No recordings found for {}", self.day);
        }
        let heading = if self.cancelled {
            "Download cancelled"
        } else if self.is_complete() {
            "Download complete"
        } else {
            "Download finished with errors"
        };
        writeln!(f, "{} ({}, {})", heading, self.day, self.stream.label())?;
        writeln!(f, "  Chunks downloaded: {}/{}", p.downloaded, p.total)?;
        if p.existing > 0 {
            writeln!(f, "  Already on disk:   {}", p.existing)?;
        }
        if p.failed > 0 {
            writeln!(f, "  Chunks failed:     {}", p.failed)?;
        }
        if self.not_attempted > 0 {
            writeln!(f, "  Not attempted:     {}", self.not_attempted)?;
        }
        if self.lost > 0 {
            writeln!(f, "  Lost (crashed):    {}", self.lost)?;
        }
        let size_mib = p.bytes_on_disk as f64 / MIB;
        writeln!(
            f,
            "  Total size:        {:.1} MB ({:.2} GB)",
            size_mib,
            size_mib / 1024.0
        )?;
        if self.estimated_bytes > 0 {
            writeln!(
                f,
                "  Estimated size:    ~{:.1} GB",
                self.estimated_bytes as f64 / MIB / 1024.0
            )?;
        }
        let secs = self.elapsed.as_secs();
        writeln!(f, "  Time elapsed:      {}m {}s", secs / 60, secs % 60)?;
        if p.bytes_transferred > 0 {
            writeln!(f, "  Speed:             {:.1} MB/s", self.mib_per_sec())?;
        }
        let location = std::fs::canonicalize(&self.output_dir)
            .unwrap_or_else(|_| self.output_dir.clone());
        write!(f, "  Location:          {}", location.display())
    }
}
