//! Size and age bucket classification.
//!
//! All age comparisons are made against a single reference time captured
//! when a pass starts, so every entry in the pass is judged against the
//! same "now".

use serde::{Deserialize, Serialize};

use nsinsight_core::Entry;

/// Upper bound (inclusive) of the tiny bucket.
pub const TINY_MAX: u64 = 1024;
/// Upper bound (inclusive) of the small bucket.
pub const SMALL_MAX: u64 = 1_048_576;
/// Upper bound (inclusive) of the medium bucket.
pub const MEDIUM_MAX: u64 = 134_217_728;

/// Quota ratios strictly above this value count as exceeded.
pub const QUOTA_THRESHOLD: i64 = 85;

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;
const YEAR_MS: i64 = 365 * DAY_MS;

/// Mutually exclusive size classes for files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SizeBucket {
    /// size = 0
    Empty,
    /// 0 < size <= 1 KiB
    Tiny,
    /// 1 KiB < size <= 1 MiB
    Small,
    /// 1 MiB < size <= 128 MiB
    Medium,
    /// Everything else.
    Large,
}

impl SizeBucket {
    /// Classify a byte size.
    pub fn of(size: u64) -> Self {
        match size {
            0 => SizeBucket::Empty,
            1..=TINY_MAX => SizeBucket::Tiny,
            s if s <= SMALL_MAX => SizeBucket::Small,
            s if s <= MEDIUM_MAX => SizeBucket::Medium,
            _ => SizeBucket::Large,
        }
    }
}

/// Time windows. The stale windows are independent of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeWindow {
    /// Modified within the last 24 hours.
    Recent24h,
    /// Not accessed for more than a year.
    Stale1yr,
    /// Not accessed for more than two years.
    Stale2yr,
}

/// A named classification an entry may belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Size(SizeBucket),
    Age(AgeWindow),
}

impl From<SizeBucket> for Bucket {
    fn from(bucket: SizeBucket) -> Self {
        Bucket::Size(bucket)
    }
}

impl From<AgeWindow> for Bucket {
    fn from(window: AgeWindow) -> Self {
        Bucket::Age(window)
    }
}

/// Pure bucket membership tests relative to a fixed reference time.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    reference_time: i64,
}

impl Classifier {
    /// Create a classifier judging ages against `reference_time` (ms since epoch).
    pub fn new(reference_time: i64) -> Self {
        Self { reference_time }
    }

    /// Create a classifier anchored at the current time.
    pub fn now() -> Self {
        Self::new(chrono::Utc::now().timestamp_millis())
    }

    /// Reference time shared by every check.
    pub fn reference_time(&self) -> i64 {
        self.reference_time
    }

    /// Size class of an entry.
    pub fn size_bucket(&self, entry: &Entry) -> SizeBucket {
        SizeBucket::of(entry.size)
    }

    /// Check whether an entry falls inside an age window.
    ///
    /// Directories are judged by modification time in the stale windows
    /// since they carry no meaningful access time.
    pub fn in_window(&self, entry: &Entry, window: AgeWindow) -> bool {
        match window {
            AgeWindow::Recent24h => entry.modified >= self.reference_time - DAY_MS,
            AgeWindow::Stale1yr => self.stale_time(entry) < self.reference_time - YEAR_MS,
            AgeWindow::Stale2yr => self.stale_time(entry) < self.reference_time - 2 * YEAR_MS,
        }
    }

    /// Check bucket membership.
    pub fn contains(&self, entry: &Entry, bucket: impl Into<Bucket>) -> bool {
        match bucket.into() {
            Bucket::Size(size) => entry.is_file() && self.size_bucket(entry) == size,
            Bucket::Age(window) => self.in_window(entry, window),
        }
    }

    fn stale_time(&self, entry: &Entry) -> i64 {
        if entry.is_dir() {
            entry.modified
        } else {
            entry.accessed
        }
    }
}

/// Check whether a directory has no children.
pub fn is_empty_dir(entry: &Entry) -> bool {
    entry.is_dir() && entry.child_count == 0
}

/// Check whether a quota ratio exceeds the pressure threshold.
pub fn exceeds_quota(ratio: i64) -> bool {
    ratio > QUOTA_THRESHOLD
}
