//! Historical record of published snapshots.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use nsinsight_core::{GroupedMetric, ScalarMetric, StoreError};

/// Receives every successfully published snapshot. Writes are best-effort;
/// a failure never affects the published snapshot.
pub trait HistoryWriter: Send + Sync {
    /// Record one refresh.
    fn record_snapshot(
        &self,
        scalars: &BTreeMap<ScalarMetric, i64>,
        grouped: &BTreeMap<GroupedMetric, BTreeMap<String, i64>>,
        users: &BTreeSet<String>,
    ) -> Result<(), StoreError>;
}

/// One line of the history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub report_time: i64,
    pub scalars: BTreeMap<ScalarMetric, i64>,
    /// Per-user grouped metrics only.
    pub grouped: BTreeMap<GroupedMetric, BTreeMap<String, i64>>,
    pub users: BTreeSet<String>,
}

/// Appends one JSON document per line.
#[derive(Debug)]
pub struct JsonlHistoryWriter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlHistoryWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every record in the file.
    pub fn read_all(&self) -> Result<Vec<HistoryRecord>, StoreError> {
        let contents =
            fs::read_to_string(&self.path).map_err(|e| StoreError::persistence(&self.path, e))?;
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(|e| StoreError::persistence(&self.path, e)))
            .collect()
    }
}

impl HistoryWriter for JsonlHistoryWriter {
    fn record_snapshot(
        &self,
        scalars: &BTreeMap<ScalarMetric, i64>,
        grouped: &BTreeMap<GroupedMetric, BTreeMap<String, i64>>,
        users: &BTreeSet<String>,
    ) -> Result<(), StoreError> {
        let record = HistoryRecord {
            report_time: scalars.get(&ScalarMetric::ReportTime).copied().unwrap_or(0),
            scalars: scalars.clone(),
            grouped: grouped
                .iter()
                .filter(|(metric, _)| metric.is_per_user())
                .map(|(metric, values)| (*metric, values.clone()))
                .collect(),
            users: users.clone(),
        };
        let mut line =
            serde_json::to_vec(&record).map_err(|e| StoreError::persistence(&self.path, e))?;
        line.push(b'\n');

        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::persistence(&self.path, e))?;
        file.write_all(&line)
            .map_err(|e| StoreError::persistence(&self.path, e))
    }
}
