//! Rough download size estimate shown before a run starts.

use crate::planner::DownloadTask;
use crate::session::Stream;

/// Observed main-stream bitrate of typical 4K devices, per recorded minute.
const MAIN_BYTES_PER_MINUTE: u64 = 37 * 1024 * 1024;
/// The sub stream is roughly a tenth of the main stream.
const SUB_DIVISOR: u64 = 10;

/// Estimated total size of `tasks` for `stream`.
pub fn estimate_bytes(tasks: &[DownloadTask], stream: Stream) -> u64 {
    let seconds: i64 = tasks.iter().map(|t| t.duration().num_seconds()).sum();
    let per_minute = match stream {
        Stream::Main => MAIN_BYTES_PER_MINUTE,
        Stream::Sub => MAIN_BYTES_PER_MINUTE / SUB_DIVISOR,
    };
    (seconds.max(0) as u64).saturating_mul(per_minute) / 60
}
