//! The suggestions engine: long-lived state plus the refresh driver.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use nsinsight_analyze::{Pipeline, PipelineConfig, PipelineInput};
use nsinsight_core::{
    EngineConfig, EntryKind, MetadataSource, RefreshError, Snapshot, StoreError, WatchError,
};

use crate::history::{HistoryWriter, JsonlHistoryWriter};
use crate::publisher::{EngineState, SnapshotCell};
use crate::query::Suggestions;
use crate::store::{CacheStore, SharedMap};
use crate::watch::WatchSet;

/// Store key of the watched-directory set.
pub const WATCHES_KEY: &str = "watchedDirs";
/// Store key of the login map.
pub const LOGINS_KEY: &str = "lastLogins";

/// Owns the cache store, the watch set, the login map and the served
/// snapshot, and runs refresh passes over a [`MetadataSource`].
pub struct SuggestionsEngine {
    config: EngineConfig,
    store: CacheStore,
    watches: WatchSet,
    logins: SharedMap,
    cell: SnapshotCell,
    history: Option<Box<dyn HistoryWriter>>,
    refresh_lock: Mutex<()>,
    cancel: Mutex<CancellationToken>,
}

impl std::fmt::Debug for SuggestionsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuggestionsEngine")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("watches", &self.watches.len())
            .field("history", &self.history.is_some())
            .finish()
    }
}

impl SuggestionsEngine {
    /// Start an engine: open the cache store, attach the persisted watch set
    /// and login map, and restore the last snapshot when configured.
    pub fn start(config: EngineConfig) -> Result<Self, StoreError> {
        let store = CacheStore::start(&config)?;
        let history: Option<Box<dyn HistoryWriter>> = config
            .history_path
            .as_ref()
            .map(|path| Box::new(JsonlHistoryWriter::new(path)) as Box<dyn HistoryWriter>);
        Ok(Self::with_store(config, store, history))
    }

    /// Start an engine that keeps everything in memory.
    pub fn in_memory() -> Self {
        Self::with_store(EngineConfig::in_memory(), CacheStore::in_memory(), None)
    }

    fn with_store(
        config: EngineConfig,
        store: CacheStore,
        history: Option<Box<dyn HistoryWriter>>,
    ) -> Self {
        let watches = WatchSet::from_shared(store.get_or_create_set(WATCHES_KEY));
        let logins = store.get_or_create_map(LOGINS_KEY);
        let cell = SnapshotCell::new();

        if config.restore_snapshot {
            if let Some(snapshot) = store.snapshot() {
                info!(report_time = snapshot.report_time, "Restored persisted snapshot");
                cell.publish(snapshot);
            }
        }

        Self {
            config,
            store,
            watches,
            logins,
            cell,
            history,
            refresh_lock: Mutex::new(()),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Replace the history writer.
    pub fn with_history(mut self, writer: impl HistoryWriter + 'static) -> Self {
        self.history = Some(Box::new(writer));
        self
    }

    /// Cancel any running pass and commit the store.
    pub fn stop(&self) -> Result<(), StoreError> {
        self.cancel();
        self.store.stop()
    }

    /// Ask the running pass, if any, to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.lock().cancel();
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Current readiness.
    pub fn state(&self) -> EngineState {
        self.cell.state()
    }

    /// The served snapshot.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.cell.load()
    }

    /// Query façade over the currently served snapshot.
    pub fn query(&self) -> Suggestions {
        Suggestions::new(self.cell.load())
    }

    pub fn watches(&self) -> &WatchSet {
        &self.watches
    }

    pub fn add_watch(&self, path: &str) -> Result<String, WatchError> {
        self.watches.add(path)
    }

    pub fn remove_watch(&self, path: &str) -> Result<String, WatchError> {
        self.watches.remove(path)
    }

    pub fn current_watches(&self) -> std::collections::BTreeSet<String> {
        self.watches.current()
    }

    pub fn resolve_common_ancestors(&self) -> Vec<String> {
        self.watches.resolve_common_ancestors()
    }

    /// Run one full pass and publish the result.
    ///
    /// Only one pass runs at a time; an overlapping call fails with
    /// [`RefreshError::RefreshInProgress`]. On any failure the previously
    /// served snapshot stays in place.
    pub fn refresh(&self, source: &dyn MetadataSource) -> Result<Arc<Snapshot>, RefreshError> {
        let Some(_guard) = self.refresh_lock.try_lock() else {
            warn!("Refresh requested while another is running");
            return Err(RefreshError::RefreshInProgress);
        };

        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();

        match self.run_pass(source, token) {
            Ok(snapshot) => Ok(snapshot),
            Err(RefreshError::Cancelled) => {
                warn!("Refresh cancelled, keeping previous snapshot");
                Err(RefreshError::Cancelled)
            }
            Err(e) => {
                error!(error = %e, "Refresh failed, keeping previous snapshot");
                Err(e)
            }
        }
    }

    fn run_pass(
        &self,
        source: &dyn MetadataSource,
        token: CancellationToken,
    ) -> Result<Arc<Snapshot>, RefreshError> {
        info!("Reloading suggestion matrices");

        let files = source.list_entries(EntryKind::File)?;
        let dirs = source.list_entries(EntryKind::Directory)?;
        debug!(files = files.len(), dirs = dirs.len(), "Listed entries");

        let capacity = source.total_capacity().unwrap_or_else(|e| {
            warn!(error = %e, "Capacity unavailable, reporting 0");
            0
        });

        let mut logins: BTreeMap<String, i64> = self
            .logins
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        let fresh = source.last_login_times().unwrap_or_else(|e| {
            warn!(error = %e, "Login times unavailable, keeping previous values");
            Default::default()
        });
        logins.extend(fresh.iter().map(|(user, time)| (user.clone(), *time)));

        let watches = self.watches.current();
        let config = PipelineConfig::builder()
            .dir_depth(self.config.dir_depth)
            .dir_limit(self.config.dir_limit)
            .build()
            .map_err(|e| RefreshError::Aggregation {
                message: e.to_string(),
            })?;
        let snapshot = Pipeline::with_cancellation(config, token).run(PipelineInput {
            files: &files,
            dirs: &dirs,
            capacity,
            watches: &watches,
            logins: &logins,
        })?;

        for (user, time) in fresh {
            self.logins.insert(user, time);
        }

        let snapshot = self.cell.publish(snapshot);
        self.record_history(&snapshot);
        self.store.set_snapshot(Snapshot::clone(&snapshot));
        if let Err(e) = self.store.commit() {
            warn!(error = %e, "Failed to commit cache store");
        }
        Ok(snapshot)
    }

    fn record_history(&self, snapshot: &Snapshot) {
        let Some(history) = &self.history else {
            return;
        };
        if let Err(e) = history.record_snapshot(&snapshot.scalars, &snapshot.grouped, &snapshot.users) {
            warn!(error = %e, "Failed to record snapshot history");
        }
    }
}
