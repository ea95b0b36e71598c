//! Download task type and chunk planning.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::naming::{chunk_file_name, CHUNK_EXTENSION};
use crate::session::Segment;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("chunk duration must be positive, got {0} seconds")]
    NonPositiveChunk(i64),
}

/// One time slice of one recorded segment: `[chunk_start, chunk_end)` (half-open).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Device file the slice is cut from.
    pub segment_name: String,
    pub chunk_start: NaiveDateTime,
    pub chunk_end: NaiveDateTime,
    /// Where the slice is written; existence with non-zero size means done.
    pub output_path: PathBuf,
}

impl DownloadTask {
    pub fn duration(&self) -> chrono::Duration {
        self.chunk_end - self.chunk_start
    }

    /// Short `HH:MM-HH:MM` label for progress lines.
    pub fn label(&self) -> String {
        format!(
            "{}-{}",
            self.chunk_start.format("%H:%M"),
            self.chunk_end.format("%H:%M")
        )
    }
}

/// Splits recorded segments into fixed-duration download tasks.
#[derive(Debug, Clone)]
pub struct ChunkPlanner {
    chunk_duration: chrono::Duration,
    output_dir: PathBuf,
    extension: String,
}

impl ChunkPlanner {
    /// Planner writing `.mp4` chunks of at most `chunk_duration` into `output_dir`.
    pub fn new(chunk_duration: chrono::Duration, output_dir: &Path) -> Result<Self, PlanError> {
        if chunk_duration <= chrono::Duration::zero() {
            return Err(PlanError::NonPositiveChunk(chunk_duration.num_seconds()));
        }
        Ok(Self {
            chunk_duration,
            output_dir: output_dir.to_path_buf(),
            extension: CHUNK_EXTENSION.to_string(),
        })
    }

    pub fn chunk_duration(&self) -> chrono::Duration {
        self.chunk_duration
    }

    /// Plan tasks for every segment of `day`, in segment order.
    ///
    /// Each segment is walked from its start in steps of the chunk duration,
    /// the last chunk clamped to the segment end. Segments with `end <= start`
    /// yield nothing; zero segments yield an empty plan.
    ///
    /// Overlapping segments can produce two chunks with the same start and
    /// therefore the same output path. Only one task per path is kept, the
    /// one reaching further, so no file is written by two workers and no
    /// recorded span loses its coverage.
    pub fn plan(&self, day: NaiveDate, segments: &[Segment]) -> Vec<DownloadTask> {
        let mut out: Vec<DownloadTask> = Vec::new();
        let mut by_path: HashMap<PathBuf, usize> = HashMap::new();
        for segment in segments {
            let mut chunk_start = segment.start;
            while chunk_start < segment.end {
                let chunk_end = (chunk_start + self.chunk_duration).min(segment.end);
                let output_path = self
                    .output_dir
                    .join(chunk_file_name(day, chunk_start, &self.extension));
                let task = DownloadTask {
                    segment_name: segment.name.clone(),
                    chunk_start,
                    chunk_end,
                    output_path,
                };
                match by_path.entry(task.output_path.clone()) {
                    Entry::Vacant(slot) => {
                        slot.insert(out.len());
                        out.push(task);
                    }
                    Entry::Occupied(slot) => {
                        let planned = &mut out[*slot.get()];
                        let replace = task.chunk_end > planned.chunk_end;
                        tracing::debug!(
                            segment = %segment.name,
                            path = %task.output_path.display(),
                            replace,
                            "chunk already planned from an overlapping segment"
                        );
                        if replace {
                            *planned = task;
                        }
                    }
                }
                chunk_start = chunk_end;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        day().and_hms_opt(h, m, s).unwrap()
    }

    fn seg(name: &str, start: NaiveDateTime, end: NaiveDateTime) -> Segment {
        Segment {
            name: name.to_string(),
            start,
            end,
        }
    }

    fn planner() -> ChunkPlanner {
        ChunkPlanner::new(chrono::Duration::minutes(5), Path::new("/out")).unwrap()
    }

    #[test]
    fn twelve_minute_segment_gives_three_chunks() {
        let tasks = planner().plan(day(), &[seg("f1", at(0, 0, 0), at(0, 12, 0))]);
        assert_eq!(tasks.len(), 3);
        assert_eq!((tasks[0].chunk_start, tasks[0].chunk_end), (at(0, 0, 0), at(0, 5, 0)));
        assert_eq!((tasks[1].chunk_start, tasks[1].chunk_end), (at(0, 5, 0), at(0, 10, 0)));
        assert_eq!((tasks[2].chunk_start, tasks[2].chunk_end), (at(0, 10, 0), at(0, 12, 0)));
        assert_eq!(tasks[2].duration(), chrono::Duration::minutes(2));
        assert!(tasks.iter().all(|t| t.segment_name == "f1"));
        assert_eq!(tasks[1].label(), "00:05-00:10");
    }

    #[test]
    fn chunks_tile_each_segment_exactly() {
        let segments = vec![
            seg("a", at(0, 0, 0), at(0, 59, 59)),
            seg("b", at(1, 3, 17), at(1, 8, 17)),
            seg("c", at(2, 0, 0), at(2, 0, 1)),
            seg("d", at(9, 30, 0), at(13, 7, 45)),
        ];
        let p = planner();
        let tasks = p.plan(day(), &segments);
        for s in &segments {
            let mine: Vec<_> = tasks.iter().filter(|t| t.segment_name == s.name).collect();
            assert!(!mine.is_empty());
            assert_eq!(mine.first().unwrap().chunk_start, s.start);
            assert_eq!(mine.last().unwrap().chunk_end, s.end);
            for w in mine.windows(2) {
                assert_eq!(w[0].chunk_end, w[1].chunk_start, "gap or overlap in {}", s.name);
            }
            for t in &mine {
                assert!(t.chunk_start < t.chunk_end);
                assert!(t.chunk_end <= s.end);
                assert!(t.duration() <= p.chunk_duration());
            }
        }
    }

    #[test]
    fn short_segment_yields_single_task() {
        let tasks = planner().plan(day(), &[seg("s", at(4, 0, 0), at(4, 1, 30))]);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].chunk_start, at(4, 0, 0));
        assert_eq!(tasks[0].chunk_end, at(4, 1, 30));
    }

    #[test]
    fn exact_multiple_has_no_trailing_empty_chunk() {
        let tasks = planner().plan(day(), &[seg("x", at(5, 0, 0), at(5, 10, 0))]);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].chunk_end, at(5, 10, 0));
    }

    #[test]
    fn empty_and_degenerate_segments() {
        assert!(planner().plan(day(), &[]).is_empty());
        assert!(planner()
            .plan(day(), &[seg("z", at(6, 0, 0), at(6, 0, 0))])
            .is_empty());
        assert!(planner()
            .plan(day(), &[seg("r", at(6, 0, 0), at(5, 0, 0))])
            .is_empty());
    }

    #[test]
    fn output_paths_are_deterministic() {
        let segments = [seg("f1", at(0, 0, 0), at(0, 12, 0))];
        let a = planner().plan(day(), &segments);
        let b = planner().plan(day(), &segments);
        assert_eq!(a, b);
        assert_eq!(
            a[1].output_path,
            PathBuf::from("/out/2024-03-09_20240309_000500.mp4")
        );
    }

    #[test]
    fn overlapping_segments_never_share_an_output_path() {
        let segments = [
            seg("main_a", at(8, 0, 0), at(8, 10, 0)),
            seg("main_b", at(8, 0, 0), at(8, 7, 0)),
            seg("main_c", at(8, 2, 30), at(8, 6, 0)),
        ];
        let tasks = planner().plan(day(), &segments);
        let paths: HashSet<_> = tasks.iter().map(|t| t.output_path.clone()).collect();
        assert_eq!(paths.len(), tasks.len());
        // main_b duplicates both starts of main_a; main_c starts elsewhere.
        assert_eq!(tasks.iter().filter(|t| t.segment_name == "main_b").count(), 0);
        assert_eq!(tasks.iter().filter(|t| t.segment_name == "main_c").count(), 1);
    }

    #[test]
    fn shorter_segment_listed_first_does_not_hide_the_longer_one() {
        let segments = [
            seg("short", at(8, 0, 0), at(8, 2, 0)),
            seg("long", at(8, 0, 0), at(8, 10, 0)),
        ];
        let tasks = planner().plan(day(), &segments);
        let paths: HashSet<_> = tasks.iter().map(|t| t.output_path.clone()).collect();
        assert_eq!(paths.len(), tasks.len());
        assert_eq!(tasks.len(), 2);
        assert_eq!((tasks[0].chunk_start, tasks[0].chunk_end), (at(8, 0, 0), at(8, 5, 0)));
        assert_eq!(tasks[0].segment_name, "long");
        assert_eq!((tasks[1].chunk_start, tasks[1].chunk_end), (at(8, 5, 0), at(8, 10, 0)));

        // every recorded second is covered by some task
        for s in &segments {
            let mut t = s.start;
            while t < s.end {
                assert!(
                    tasks.iter().any(|k| k.chunk_start <= t && t < k.chunk_end),
                    "{} at {} has no task",
                    s.name,
                    t
                );
                t += chrono::Duration::seconds(1);
            }
        }
    }

    #[test]
    fn rejects_non_positive_chunk_duration() {
        assert!(ChunkPlanner::new(chrono::Duration::zero(), Path::new("/out")).is_err());
        assert!(ChunkPlanner::new(chrono::Duration::minutes(-1), Path::new("/out")).is_err());
    }
}
