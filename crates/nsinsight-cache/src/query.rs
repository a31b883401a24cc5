//! Read-only queries over the served snapshot.
//!
//! Every query answers from one snapshot handle, so the results of a single
//! [`Suggestions`] value are mutually consistent. Before the first refresh
//! queries return empty results; only malformed parameters are errors.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use nsinsight_analyze::{canonical_path, sorted_by_value};
use nsinsight_core::{GroupedMetric, QueryError, QuotaMetric, Snapshot, SumMetric};

use crate::publisher::EngineState;

/// Key under which a user's last login appears in per-user suggestions.
pub const LAST_LOGIN: &str = "lastLogin";

/// Metrics ranked by [`Suggestions::top_issues`], keyed by issue name.
pub const ISSUES: [(&str, GroupedMetric); 13] = [
    ("emptyFiles", GroupedMetric::EmptyFilesUsers),
    ("emptyDirs", GroupedMetric::EmptyDirsUsers),
    ("tinyFiles", GroupedMetric::TinyFilesUsers),
    ("smallFiles", GroupedMetric::SmallFilesUsers),
    ("emptyFiles24h", GroupedMetric::EmptyFiles24hUsers),
    ("emptyDirs24h", GroupedMetric::EmptyDirs24hUsers),
    ("tinyFiles24h", GroupedMetric::TinyFiles24hUsers),
    ("smallFiles24h", GroupedMetric::SmallFiles24hUsers),
    ("oldFiles1yr", GroupedMetric::OldFiles1yrUsers),
    ("dirCount", GroupedMetric::DirCount),
    ("dirDiskspace", GroupedMetric::DirDs),
    ("dirCount24h", GroupedMetric::DirCount24h),
    ("dirDiskspace24h", GroupedMetric::DirDs24h),
];

/// Quota ratios for one user, ordered by ratio, or for every user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QuotaView {
    User(IndexMap<String, i64>),
    All(BTreeMap<String, BTreeMap<String, i64>>),
}

/// The user set, or one grouped metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UsersOrSuggestion {
    Users(BTreeSet<String>),
    Suggestion(BTreeMap<String, i64>),
}

/// Query façade over a single snapshot handle.
#[derive(Debug, Clone, Default)]
pub struct Suggestions {
    snapshot: Option<Arc<Snapshot>>,
}

impl Suggestions {
    /// Wrap a snapshot handle. `None` answers every query as empty.
    pub fn new(snapshot: Option<Arc<Snapshot>>) -> Self {
        Self { snapshot }
    }

    pub fn state(&self) -> EngineState {
        match self.snapshot {
            Some(_) => EngineState::Ready,
            None => EngineState::Empty,
        }
    }

    /// The underlying snapshot.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_deref()
    }

    /// Scalar suggestions, optionally narrowed to one user.
    ///
    /// For a user, every scalar with a per-user counterpart is replaced by
    /// that user's value (0 when the user has none) and `lastLogin` is added.
    pub fn suggestions_for_user(&self, user: Option<&str>) -> BTreeMap<String, i64> {
        let Some(snapshot) = self.snapshot() else {
            return BTreeMap::new();
        };
        let mut out: BTreeMap<String, i64> = snapshot
            .scalars
            .iter()
            .map(|(metric, value)| (metric.as_ref().to_string(), *value))
            .collect();

        if let Some(user) = user {
            for (scalar, grouped) in GroupedMetric::PER_USER {
                out.insert(
                    scalar.as_ref().to_string(),
                    snapshot.grouped_value(grouped, user),
                );
            }
            out.insert(LAST_LOGIN.to_string(), snapshot.last_login(user));
        }
        out
    }

    /// Quota ratios of quota-bearing directories.
    pub fn quota_ratios(&self, user: Option<&str>, metric: &str) -> Result<QuotaView, QueryError> {
        let metric = QuotaMetric::from_str(metric)
            .map_err(|_| QueryError::invalid(format!("{metric} is not a quota metric")))?;

        let all = match (self.snapshot(), metric) {
            (None, _) => None,
            (Some(s), QuotaMetric::NsQuotaRatioUsed) => Some(&s.ns_quotas),
            (Some(s), QuotaMetric::DsQuotaRatioUsed) => Some(&s.ds_quotas),
        };

        Ok(match user {
            Some(user) => {
                let ratios = all
                    .and_then(|all| all.get(user))
                    .map(|ratios| sorted_by_value(ratios, false).into_iter().collect())
                    .unwrap_or_default();
                QuotaView::User(ratios)
            }
            None => QuotaView::All(all.cloned().unwrap_or_default()),
        })
    }

    /// Monthly modification-time histogram.
    pub fn file_age_histogram(&self, metric: &str) -> Result<BTreeMap<String, i64>, QueryError> {
        let grouped = match parse_sum(metric)? {
            SumMetric::Count => GroupedMetric::ModTimeCount,
            SumMetric::DiskspaceConsumed => GroupedMetric::ModTimeDiskspace,
        };
        Ok(self.grouped(grouped))
    }

    /// The user set, or the named grouped metric.
    pub fn users_or_suggestion(&self, name: Option<&str>) -> Result<UsersOrSuggestion, QueryError> {
        match name {
            None => Ok(UsersOrSuggestion::Users(
                self.snapshot()
                    .map(|s| s.users.clone())
                    .unwrap_or_default(),
            )),
            Some(name) => {
                let metric = GroupedMetric::from_str(name)
                    .map_err(|_| QueryError::invalid(format!("{name} is not a known suggestion")))?;
                Ok(UsersOrSuggestion::Suggestion(self.grouped(metric)))
            }
        }
    }

    /// Directory aggregates, for one directory or every tracked directory.
    ///
    /// A single directory that is neither watched nor in the top directory
    /// histogram maps to `None`.
    pub fn directory_metrics(
        &self,
        directory: Option<&str>,
        metric: &str,
    ) -> Result<BTreeMap<String, Option<i64>>, QueryError> {
        let grouped = match parse_sum(metric)? {
            SumMetric::Count => GroupedMetric::DirCount,
            SumMetric::DiskspaceConsumed => GroupedMetric::DirDs,
        };
        let values = self.snapshot().and_then(|s| s.grouped(grouped));

        Ok(match directory {
            Some(dir) => {
                let dir = canonical_path(dir);
                let value = values.and_then(|v| v.get(&dir)).copied();
                BTreeMap::from([(dir, value)])
            }
            None => values
                .map(|v| v.iter().map(|(k, v)| (k.clone(), Some(*v))).collect())
                .unwrap_or_default(),
        })
    }

    /// Ranked lists of the largest (or smallest) offenders per issue.
    pub fn top_issues(&self, limit: usize, ascending: bool) -> IndexMap<String, IndexMap<String, i64>> {
        let Some(snapshot) = self.snapshot() else {
            return IndexMap::new();
        };
        ISSUES
            .iter()
            .map(|(name, metric)| {
                let ranked = snapshot
                    .grouped(*metric)
                    .map(|values| rank(values, limit, ascending))
                    .unwrap_or_default();
                (name.to_string(), ranked)
            })
            .collect()
    }

    /// Last logins, most recent first.
    pub fn last_logins(&self) -> IndexMap<String, i64> {
        self.snapshot()
            .map(|s| sorted_by_value(&s.logins, false).into_iter().collect())
            .unwrap_or_default()
    }

    fn grouped(&self, metric: GroupedMetric) -> BTreeMap<String, i64> {
        self.snapshot()
            .and_then(|s| s.grouped(metric))
            .cloned()
            .unwrap_or_default()
    }
}

fn parse_sum(metric: &str) -> Result<SumMetric, QueryError> {
    SumMetric::from_str(metric).map_err(|_| {
        QueryError::invalid(format!(
            "{metric} is not a valid sum; use count or diskspaceConsumed"
        ))
    })
}

fn rank(values: &BTreeMap<String, i64>, limit: usize, ascending: bool) -> IndexMap<String, i64> {
    sorted_by_value(values, ascending)
        .into_iter()
        .take(limit)
        .collect()
}
