//! User-configured watched directories.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashSet;
use tracing::info;

use nsinsight_analyze::{WatchTree, canonical_path};
use nsinsight_core::WatchError;

use crate::store::SharedSet;

/// Normalize a watch path to its canonical form: repeated separators
/// collapse and a trailing one is dropped, while `/` stays the root.
pub fn normalize(path: &str) -> Result<String, WatchError> {
    if path.is_empty() {
        return Err(WatchError::InvalidArgument {
            message: "No directory specified".to_string(),
        });
    }
    if !path.starts_with('/') {
        return Err(WatchError::InvalidArgument {
            message: format!("{path} is not an absolute path"),
        });
    }
    Ok(canonical_path(path))
}

/// Concurrent set of watched directories. Safe to mutate while a refresh is
/// reading it.
#[derive(Debug, Clone, Default)]
pub struct WatchSet {
    dirs: SharedSet,
}

impl WatchSet {
    /// Create an empty, unshared watch set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a set handed out by the cache store.
    pub fn from_shared(dirs: SharedSet) -> Self {
        Self { dirs }
    }

    /// Start watching a directory. Returns the normalized path.
    pub fn add(&self, path: &str) -> Result<String, WatchError> {
        let dir = normalize(path)?;
        if !self.dirs.insert(dir.clone()) {
            return Err(WatchError::AlreadyWatched { path: dir });
        }
        info!(dir = %dir, "Added directory for analysis");
        Ok(dir)
    }

    /// Stop watching a directory. Returns the normalized path.
    pub fn remove(&self, path: &str) -> Result<String, WatchError> {
        let dir = normalize(path)?;
        if self.dirs.remove(&dir).is_none() {
            return Err(WatchError::NotWatched { path: dir });
        }
        info!(dir = %dir, "Removed directory from analysis");
        Ok(dir)
    }

    /// Check whether a directory is watched.
    pub fn contains(&self, path: &str) -> bool {
        normalize(path).is_ok_and(|dir| self.dirs.contains(&dir))
    }

    /// Point-in-time copy of the watched directories.
    pub fn current(&self) -> BTreeSet<String> {
        self.dirs.iter().map(|d| d.key().clone()).collect()
    }

    /// The live shared set.
    pub fn shared(&self) -> Arc<DashSet<String>> {
        Arc::clone(&self.dirs)
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Minimal set of ancestors covering every watched directory.
    pub fn resolve_common_ancestors(&self) -> Vec<String> {
        WatchTree::from_paths(self.current()).common_ancestors()
    }
}
