//! Holds the served snapshot behind an atomic pointer.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};

use nsinsight_core::Snapshot;

/// Readiness of the served snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// No pass has completed yet.
    Empty,
    /// A complete snapshot is being served.
    Ready,
}

/// Atomically swappable snapshot slot.
///
/// Readers get an `Arc` to a complete snapshot and never block; a publish
/// replaces the whole snapshot in one pointer swap.
#[derive(Debug, Default)]
pub struct SnapshotCell {
    current: ArcSwapOption<Snapshot>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current readiness.
    pub fn state(&self) -> EngineState {
        if self.current.load().is_some() {
            EngineState::Ready
        } else {
            EngineState::Empty
        }
    }

    /// The served snapshot, or `None` while empty.
    pub fn load(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }

    /// Publish a new snapshot and return the shared handle to it.
    pub fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        self.current.store(Some(Arc::clone(&snapshot)));
        snapshot
    }
}
