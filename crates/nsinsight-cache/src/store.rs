//! Persistent cache store.
//!
//! Named sets, maps and maps-of-maps are handed out as shared concurrent
//! containers. When a path is configured, `start` loads them from a JSON
//! document and `commit` writes them back through a temp file and rename.
//! The last published snapshot is persisted in the same document.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use nsinsight_core::{EngineConfig, Snapshot, StoreError};

/// Shared set handed out by the store.
pub type SharedSet = Arc<DashSet<String>>;
/// Shared map handed out by the store.
pub type SharedMap = Arc<DashMap<String, i64>>;
/// Shared map of maps handed out by the store.
pub type SharedMapOfMaps = Arc<DashMap<String, BTreeMap<String, i64>>>;

/// On-disk layout of the store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    sets: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    maps: BTreeMap<String, BTreeMap<String, i64>>,
    #[serde(default)]
    map_of_maps: BTreeMap<String, BTreeMap<String, BTreeMap<String, i64>>>,
    #[serde(default)]
    snapshot: Option<Snapshot>,
}

/// Keyed store of long-lived engine state.
#[derive(Debug)]
pub struct CacheStore {
    path: Option<PathBuf>,
    sets: DashMap<String, SharedSet>,
    maps: DashMap<String, SharedMap>,
    map_of_maps: DashMap<String, SharedMapOfMaps>,
    snapshot: Mutex<Option<Snapshot>>,
    started: AtomicBool,
}

impl CacheStore {
    fn with_path(path: Option<PathBuf>) -> Self {
        Self {
            path,
            sets: DashMap::new(),
            maps: DashMap::new(),
            map_of_maps: DashMap::new(),
            snapshot: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Start a store for the given engine configuration, loading any
    /// previously committed state.
    pub fn start(config: &EngineConfig) -> Result<Self, StoreError> {
        let store = Self::with_path(config.store_path.clone());
        if let Some(path) = store.path.as_deref().filter(|p| p.exists()) {
            store.load(path)?;
        }
        store.started.store(true, Ordering::Release);
        info!(path = ?store.path, "Cache store started");
        Ok(store)
    }

    /// Start a store that is never persisted.
    pub fn in_memory() -> Self {
        let store = Self::with_path(None);
        store.started.store(true, Ordering::Release);
        store
    }

    /// Commit and detach. Later commits fail with [`StoreError::NotStarted`].
    pub fn stop(&self) -> Result<(), StoreError> {
        self.commit()?;
        self.started.store(false, Ordering::Release);
        info!(path = ?self.path, "Cache store stopped");
        Ok(())
    }

    /// Check if the store is started.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get a named set, creating it empty on first use.
    pub fn get_or_create_set(&self, name: &str) -> SharedSet {
        self.sets.entry(name.to_string()).or_default().value().clone()
    }

    /// Get a named map, creating it empty on first use.
    pub fn get_or_create_map(&self, name: &str) -> SharedMap {
        self.maps.entry(name.to_string()).or_default().value().clone()
    }

    /// Get a named map of maps, creating it empty on first use.
    pub fn get_or_create_map_of_maps(&self, name: &str) -> SharedMapOfMaps {
        self.map_of_maps.entry(name.to_string()).or_default().value().clone()
    }

    /// Record the snapshot to persist on the next commit.
    pub fn set_snapshot(&self, snapshot: Snapshot) {
        *self.snapshot.lock() = Some(snapshot);
    }

    /// Persisted snapshot, if one was loaded or recorded.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.snapshot.lock().clone()
    }

    /// Write the current state to disk. A no-op for in-memory stores.
    pub fn commit(&self) -> Result<(), StoreError> {
        if !self.is_started() {
            return Err(StoreError::NotStarted);
        }
        let Some(path) = &self.path else {
            return Ok(());
        };

        let document = self.to_document();
        let json = serde_json::to_vec(&document).map_err(|e| StoreError::persistence(path, e))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::persistence(parent, e))?;
        }
        let tmp = temp_path(path);
        fs::write(&tmp, &json).map_err(|e| StoreError::persistence(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| StoreError::persistence(path, e))?;

        debug!(path = %path.display(), bytes = json.len(), "Cache store committed");
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<(), StoreError> {
        let bytes = fs::read(path).map_err(|e| StoreError::persistence(path, e))?;
        let document: StoreDocument =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::persistence(path, e))?;

        for (name, values) in document.sets {
            let set = self.get_or_create_set(&name);
            for value in values {
                set.insert(value);
            }
        }
        for (name, values) in document.maps {
            let map = self.get_or_create_map(&name);
            for (key, value) in values {
                map.insert(key, value);
            }
        }
        for (name, values) in document.map_of_maps {
            let map = self.get_or_create_map_of_maps(&name);
            for (key, value) in values {
                map.insert(key, value);
            }
        }
        *self.snapshot.lock() = document.snapshot;

        debug!(path = %path.display(), "Cache store loaded");
        Ok(())
    }

    fn to_document(&self) -> StoreDocument {
        StoreDocument {
            sets: self
                .sets
                .iter()
                .map(|e| (e.key().clone(), e.value().iter().map(|v| v.key().clone()).collect()))
                .collect(),
            maps: self
                .maps
                .iter()
                .map(|e| {
                    let values: BTreeMap<String, i64> =
                        e.value().iter().map(|v| (v.key().clone(), *v.value())).collect();
                    (e.key().clone(), values)
                })
                .collect(),
            map_of_maps: self
                .map_of_maps
                .iter()
                .map(|e| {
                    let values: BTreeMap<String, BTreeMap<String, i64>> = e
                        .value()
                        .iter()
                        .map(|v| (v.key().clone(), v.value().clone()))
                        .collect();
                    (e.key().clone(), values)
                })
                .collect(),
            snapshot: self.snapshot.lock().clone(),
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_at(path: PathBuf) -> EngineConfig {
        EngineConfig::builder().store_path(path).build().unwrap()
    }

    #[test]
    fn test_containers_are_shared() {
        let store = CacheStore::in_memory();
        let a = store.get_or_create_set("watches");
        let b = store.get_or_create_set("watches");
        a.insert("/data".to_string());
        assert!(b.contains("/data"));

        let m = store.get_or_create_map("logins");
        m.insert("alice".to_string(), 5);
        assert_eq!(*store.get_or_create_map("logins").get("alice").unwrap(), 5);
    }

    #[test]
    fn test_commit_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("cache.json");

        {
            let store = CacheStore::start(&config_at(path.clone())).unwrap();
            store.get_or_create_set("watches").insert("/a".to_string());
            store.get_or_create_map("logins").insert("bob".to_string(), 42);
            store
                .get_or_create_map_of_maps("quotas")
                .insert("bob".to_string(), BTreeMap::from([("/q".to_string(), 90)]));
            store.set_snapshot(Snapshot {
                report_time: 7,
                ..Default::default()
            });
            store.stop().unwrap();
            assert!(!store.is_started());
        }

        assert!(path.exists());
        assert!(!temp_path(&path).exists());

        let store = CacheStore::start(&config_at(path)).unwrap();
        assert!(store.get_or_create_set("watches").contains("/a"));
        assert_eq!(*store.get_or_create_map("logins").get("bob").unwrap(), 42);
        assert_eq!(
            store.get_or_create_map_of_maps("quotas").get("bob").unwrap()["/q"],
            90
        );
        assert_eq!(store.snapshot().unwrap().report_time, 7);
    }

    #[test]
    fn test_commit_after_stop_fails() {
        let store = CacheStore::in_memory();
        store.stop().unwrap();
        assert!(matches!(store.commit(), Err(StoreError::NotStarted)));
    }

    #[test]
    fn test_corrupt_file_is_persistence_failure() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");
        fs::write(&path, b"not json").unwrap();

        let result = CacheStore::start(&config_at(path));
        assert!(matches!(result, Err(StoreError::PersistenceFailure { .. })));
    }
}
