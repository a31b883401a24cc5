//! Metadata source abstraction.

use std::collections::HashMap;

use crate::entry::{Entry, EntryKind};
use crate::error::SourceError;

/// A point-in-time view of the namespace the engine aggregates over.
pub trait MetadataSource: Send + Sync {
    /// List every entry of the given kind.
    fn list_entries(&self, kind: EntryKind) -> Result<Vec<Entry>, SourceError>;

    /// Last login time per user (ms since epoch).
    fn last_login_times(&self) -> Result<HashMap<String, i64>, SourceError>;

    /// Total storage capacity in bytes.
    fn total_capacity(&self) -> Result<u64, SourceError>;
}

/// Metadata source over entries already held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entries: Vec<Entry>,
    logins: HashMap<String, i64>,
    capacity: Option<u64>,
}

impl MemorySource {
    /// Create a source over the given entries.
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            entries,
            logins: HashMap::new(),
            capacity: None,
        }
    }

    /// Set the reported capacity.
    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Record a user's last login.
    pub fn with_login(mut self, user: impl Into<String>, timestamp: i64) -> Self {
        self.logins.insert(user.into(), timestamp);
        self
    }

    /// Add an entry.
    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }
}

impl MetadataSource for MemorySource {
    fn list_entries(&self, kind: EntryKind) -> Result<Vec<Entry>, SourceError> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect())
    }

    fn last_login_times(&self) -> Result<HashMap<String, i64>, SourceError> {
        Ok(self.logins.clone())
    }

    fn total_capacity(&self) -> Result<u64, SourceError> {
        self.capacity.ok_or_else(|| SourceError::CapacityUnavailable {
            message: "no capacity configured".to_string(),
        })
    }
}
