//! Chunk planning.
//!
//! Splits each recorded segment of a day into fixed-duration download tasks
//! and derives a deterministic output path for every task, so a rerun with
//! the same inputs lands on the same files.

mod chunk;
mod estimate;
mod naming;

pub use chunk::{ChunkPlanner, DownloadTask, PlanError};
pub use estimate::estimate_bytes;
pub use naming::{chunk_file_name, CHUNK_EXTENSION};
