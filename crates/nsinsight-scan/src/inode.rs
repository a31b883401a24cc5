//! Inode tracking for hardlink deduplication.

use dashmap::DashSet;

/// Identity of an inode: (inode number, device).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InodeKey {
    pub ino: u64,
    pub dev: u64,
}

impl InodeKey {
    pub fn new(ino: u64, dev: u64) -> Self {
        Self { ino, dev }
    }
}

/// Tracks seen inodes so that a file with several hardlinks has its disk
/// space counted once.
#[derive(Debug, Default)]
pub struct InodeTracker {
    seen: DashSet<InodeKey>,
}

impl InodeTracker {
    /// Create a new inode tracker.
    pub fn new() -> Self {
        Self {
            seen: DashSet::new(),
        }
    }

    /// Track an inode. Returns `true` if this is the first time seeing it.
    pub fn track(&self, key: InodeKey) -> bool {
        self.seen.insert(key)
    }

    /// Check if an inode has been seen (without tracking).
    pub fn has_seen(&self, key: &InodeKey) -> bool {
        self.seen.contains(key)
    }

    /// Get the number of unique inodes tracked.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if no inodes have been tracked.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
