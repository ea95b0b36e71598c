//! Chunk file writer used as the fetch sink.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::control::{CancelToken, Cancelled};

const WRITE_BUFFER: usize = 64 * 1024;

/// Writes a chunk to its output path, creating (and truncating) the file on
/// the first non-empty write. An attempt that fails before any byte arrives
/// therefore never touches the disk. Every write checks the cancel token.
pub(super) struct ChunkFile<'a> {
    path: &'a Path,
    cancel: &'a CancelToken,
    file: Option<BufWriter<File>>,
    written: u64,
}

impl<'a> ChunkFile<'a> {
    pub fn new(path: &'a Path, cancel: &'a CancelToken) -> Self {
        Self {
            path,
            cancel,
            file: None,
            written: 0,
        }
    }

    /// Flush and sync. Returns bytes written during this attempt.
    pub fn finish(mut self) -> io::Result<u64> {
        if let Some(writer) = self.file.take() {
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        Ok(self.written)
    }
}

impl Write for ChunkFile<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(io::Error::new(io::ErrorKind::Other, Cancelled));
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if self.file.is_none() {
            let f = File::create(self.path)?;
            self.file = Some(BufWriter::with_capacity(WRITE_BUFFER, f));
        }
        let n = match self.file.as_mut() {
            Some(writer) => writer.write(buf)?,
            None => 0,
        };
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.file {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }
}

/// Size of `path` if it is a regular file with non-zero length.
pub(super) fn existing_size(path: &Path) -> Option<u64> {
    fs::metadata(path)
        .ok()
        .filter(|m| m.is_file() && m.len() > 0)
        .map(|m| m.len())
}

/// Remove a partially written chunk so a later run does not mistake it for a finished one.
pub(super) fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed partial chunk"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "could not remove partial chunk: {}", e),
    }
}
