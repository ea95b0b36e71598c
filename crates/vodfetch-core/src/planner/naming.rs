//! Output file naming for chunks.

use chrono::{NaiveDate, NaiveDateTime};

/// Container extension of downloaded chunks.
pub const CHUNK_EXTENSION: &str = "mp4";

/// File name of the chunk starting at `chunk_start` on `day`:
/// `YYYY-MM-DD_YYYYMMDD_HHMMSS.ext`.
pub fn chunk_file_name(day: NaiveDate, chunk_start: NaiveDateTime, ext: &str) -> String {
    format!(
        "{}_{}.{}",
        day.format("%Y-%m-%d"),
        chunk_start.format("%Y%m%d_%H%M%S"),
        ext
    )
}
