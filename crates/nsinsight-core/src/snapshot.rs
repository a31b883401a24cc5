//! Published snapshot of derived statistics.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::metrics::{GroupedMetric, ScalarMetric};

/// Exact usage of a single watched directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedDirStats {
    /// Number of files under the directory.
    pub count: i64,
    /// Disk space consumed by those files.
    pub diskspace: i64,
    /// Files under the directory modified in the last 24 hours.
    pub count_24h: i64,
    /// Disk space of files modified in the last 24 hours.
    pub diskspace_24h: i64,
}

/// Complete result of one aggregation pass.
///
/// Built once per refresh and never mutated after publication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the pass finished (ms since epoch).
    pub report_time: i64,

    /// Namespace-wide values.
    pub scalars: BTreeMap<ScalarMetric, i64>,

    /// Values keyed by user, directory or month.
    pub grouped: BTreeMap<GroupedMetric, BTreeMap<String, i64>>,

    /// Exact aggregates for each watched directory.
    pub watched: BTreeMap<String, WatchedDirStats>,

    /// Per user: directory -> namespace quota ratio used.
    pub ns_quotas: BTreeMap<String, BTreeMap<String, i64>>,

    /// Per user: directory -> diskspace quota ratio used.
    pub ds_quotas: BTreeMap<String, BTreeMap<String, i64>>,

    /// Per user: last seen timestamp.
    pub logins: BTreeMap<String, i64>,

    /// Every user owning at least one file or directory.
    pub users: BTreeSet<String>,

    /// Watched directories at the time of the pass.
    pub watches: BTreeSet<String>,
}

impl Snapshot {
    /// Get a scalar metric, 0 when absent.
    pub fn scalar(&self, metric: ScalarMetric) -> i64 {
        self.scalars.get(&metric).copied().unwrap_or(0)
    }

    /// Get a grouped metric.
    pub fn grouped(&self, metric: GroupedMetric) -> Option<&BTreeMap<String, i64>> {
        self.grouped.get(&metric)
    }

    /// Get one group's value in a grouped metric, 0 when absent.
    pub fn grouped_value(&self, metric: GroupedMetric, key: &str) -> i64 {
        self.grouped(metric)
            .and_then(|m| m.get(key))
            .copied()
            .unwrap_or(0)
    }

    /// Last login for a user, 0 when never seen.
    pub fn last_login(&self, user: &str) -> i64 {
        self.logins.get(user).copied().unwrap_or(0)
    }
}
