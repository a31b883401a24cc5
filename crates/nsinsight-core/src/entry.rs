//! File and directory entry types.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Type of namespace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl EntryKind {
    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }

    /// Check if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, EntryKind::File)
    }
}

/// Quota consumption of a directory, as percentages of the configured limit.
///
/// Each ratio is `None` when that kind of quota is not set on the directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    /// Percentage of the namespace (item count) quota in use.
    pub ns_ratio_used: Option<i64>,
    /// Percentage of the diskspace quota in use.
    pub ds_ratio_used: Option<i64>,
}

impl QuotaUsage {
    /// Create quota usage from the two ratios.
    pub fn new(ns_ratio_used: Option<i64>, ds_ratio_used: Option<i64>) -> Self {
        Self {
            ns_ratio_used,
            ds_ratio_used,
        }
    }

    /// Check if any quota is configured.
    pub fn is_set(&self) -> bool {
        self.ns_ratio_used.is_some() || self.ds_ratio_used.is_some()
    }
}

/// A single file or directory as seen by a metadata source.
///
/// Timestamps are milliseconds since the Unix epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// Absolute path, unique within a collection.
    pub path: CompactString,

    /// Owning user.
    pub owner: CompactString,

    /// Entry type.
    pub kind: EntryKind,

    /// Logical size in bytes (0 for directories).
    pub size: u64,

    /// Disk space actually consumed, including replication or block overhead.
    pub diskspace: u64,

    /// Estimated memory the metadata store spends on this entry.
    pub memory: u64,

    /// Last modification time.
    pub modified: i64,

    /// Last access time.
    pub accessed: i64,

    /// Number of direct children (directories only).
    pub child_count: u64,

    /// Quota usage (directories only).
    pub quota: Option<QuotaUsage>,
}

impl Entry {
    /// Create a new file entry. Disk space defaults to the logical size.
    pub fn file(path: impl Into<CompactString>, owner: impl Into<CompactString>, size: u64) -> Self {
        Self {
            path: path.into(),
            owner: owner.into(),
            kind: EntryKind::File,
            size,
            diskspace: size,
            memory: 0,
            modified: 0,
            accessed: 0,
            child_count: 0,
            quota: None,
        }
    }

    /// Create a new directory entry.
    pub fn directory(
        path: impl Into<CompactString>,
        owner: impl Into<CompactString>,
        child_count: u64,
    ) -> Self {
        Self {
            path: path.into(),
            owner: owner.into(),
            kind: EntryKind::Directory,
            size: 0,
            diskspace: 0,
            memory: 0,
            modified: 0,
            accessed: 0,
            child_count,
            quota: None,
        }
    }

    /// Set modification and access times.
    pub fn with_times(mut self, modified: i64, accessed: i64) -> Self {
        self.modified = modified;
        self.accessed = accessed;
        self
    }

    /// Set consumed disk space.
    pub fn with_diskspace(mut self, diskspace: u64) -> Self {
        self.diskspace = diskspace;
        self
    }

    /// Set estimated memory footprint.
    pub fn with_memory(mut self, memory: u64) -> Self {
        self.memory = memory;
        self
    }

    /// Attach quota usage.
    pub fn with_quota(mut self, quota: QuotaUsage) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Check if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Check if this entry is a file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Check if a quota is configured on this entry.
    pub fn has_quota(&self) -> bool {
        self.quota.is_some_and(|q| q.is_set())
    }

    /// Parent directory path, `None` for the root.
    pub fn parent(&self) -> Option<&str> {
        let path = self.path.as_str();
        if path == "/" {
            return None;
        }
        match path.rfind('/') {
            Some(0) => Some("/"),
            Some(idx) => Some(&path[..idx]),
            None => None,
        }
    }
}
