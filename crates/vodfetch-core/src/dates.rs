//! Find which recent days have recordings.

use chrono::{Duration, NaiveDate, NaiveTime};

use crate::session::{RetrievalSession, Stream};

/// Days among `today` and the `days - 1` days before it that have at least
/// one recording in their first hour, newest first.
///
/// `session` must already be authenticated. A day whose search fails is
/// skipped, not reported.
pub fn scan_recording_dates<S>(
    session: &mut S,
    channel: u8,
    stream: Stream,
    today: NaiveDate,
    days: u32,
) -> Vec<NaiveDate>
where
    S: RetrievalSession + ?Sized,
{
    let mut found = Vec::new();
    for back in 0..i64::from(days) {
        let Some(day) = today.checked_sub_signed(Duration::days(back)) else {
            break;
        };
        let start = day.and_time(NaiveTime::MIN);
        let end = start + Duration::hours(1);
        match session.list_segments(channel, stream, start, end) {
            Ok(segments) if !segments.is_empty() => found.push(day),
            Ok(_) => {}
            Err(e) => tracing::debug!(%day, "date probe failed: {}", e),
        }
    }
    found
}
