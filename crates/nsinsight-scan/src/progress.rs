//! Walk statistics.

use std::time::{Duration, Instant};

use tracing::info;

/// Counters gathered while walking a root.
#[derive(Debug, Clone)]
pub struct WalkStats {
    pub files: u64,
    pub dirs: u64,
    /// Apparent bytes of every file walked.
    pub bytes: u64,
    /// Entries skipped by ignore patterns or because they are not regular
    /// files or directories.
    pub skipped: u64,
    /// Entries whose metadata could not be read.
    pub errors: u64,
    started: Instant,
}

impl WalkStats {
    pub fn new() -> Self {
        Self {
            files: 0,
            dirs: 0,
            bytes: 0,
            skipped: 0,
            errors: 0,
            started: Instant::now(),
        }
    }

    pub fn record_file(&mut self, size: u64) {
        self.files += 1;
        self.bytes += size;
    }

    pub fn record_dir(&mut self) {
        self.dirs += 1;
    }

    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Log a one-line summary.
    pub fn report(&self, root: &str) {
        info!(
            root,
            files = self.files,
            dirs = self.dirs,
            bytes = self.bytes,
            skipped = self.skipped,
            errors = self.errors,
            ms = self.elapsed().as_millis() as u64,
            "Filesystem walk finished"
        );
    }
}

impl Default for WalkStats {
    fn default() -> Self {
        Self::new()
    }
}
