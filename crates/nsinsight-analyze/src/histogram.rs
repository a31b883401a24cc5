//! Filter, sum and group-by primitives over entry collections.
//!
//! Collections are slices of borrowed entries so that sub-collections can be
//! re-filtered without cloning. Every primitive runs on the rayon pool.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use chrono::DateTime;
use itertools::Itertools;
use rayon::prelude::*;

use nsinsight_core::{Entry, QuotaMetric};

/// Quantity accumulated by sums and histograms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// One per entry.
    Count,
    /// Disk space consumed.
    Diskspace,
    /// Estimated memory footprint.
    Memory,
}

impl Field {
    /// Value of this field for an entry.
    pub fn value(&self, entry: &Entry) -> i64 {
        match self {
            Field::Count => 1,
            Field::Diskspace => entry.diskspace as i64,
            Field::Memory => entry.memory as i64,
        }
    }
}

/// Keep the entries matching a predicate.
pub fn filter<'a, P>(entries: &[&'a Entry], predicate: P) -> Vec<&'a Entry>
where
    P: Fn(&Entry) -> bool + Sync,
{
    entries
        .par_iter()
        .copied()
        .filter(|e| predicate(*e))
        .collect()
}

/// Sum a field over a collection.
pub fn sum(entries: &[&Entry], field: Field) -> i64 {
    match field {
        Field::Count => entries.len() as i64,
        _ => entries.par_iter().map(|e| field.value(e)).sum(),
    }
}

fn group_by<'a, K, F>(entries: &[&'a Entry], field: Field, key: F) -> HashMap<K, i64>
where
    K: Eq + Hash + Send,
    F: Fn(&'a Entry) -> Option<K> + Sync,
{
    entries
        .par_iter()
        .fold(HashMap::new, |mut acc, e| {
            if let Some(k) = key(*e) {
                *acc.entry(k).or_insert(0) += field.value(e);
            }
            acc
        })
        .reduce(HashMap::new, |mut a, b| {
            for (k, v) in b {
                *a.entry(k).or_insert(0) += v;
            }
            a
        })
}

fn into_owned(map: HashMap<&str, i64>) -> BTreeMap<String, i64> {
    map.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Sum a field per owning user.
pub fn by_user(entries: &[&Entry], field: Field) -> BTreeMap<String, i64> {
    into_owned(group_by(entries, field, |e| Some(e.owner.as_str())))
}

/// Sum a field per parent directory, truncated to `depth` path segments.
pub fn by_parent_dir(entries: &[&Entry], depth: usize, field: Field) -> BTreeMap<String, i64> {
    into_owned(group_by(entries, field, |e| {
        Some(parent_prefix(e.path.as_str(), depth))
    }))
}

/// Sum a field per month of last modification (`YYYY-MM`, UTC).
pub fn by_month(entries: &[&Entry], field: Field) -> BTreeMap<String, i64> {
    group_by(entries, field, |e| {
        DateTime::from_timestamp_millis(e.modified).map(|t| t.format("%Y-%m").to_string())
    })
    .into_iter()
    .collect()
}

/// Map each quota-bearing directory to its quota ratio.
pub fn quota_ratios(dirs: &[&Entry], metric: QuotaMetric) -> BTreeMap<String, i64> {
    dirs.iter()
        .filter_map(|d| {
            let quota = d.quota?;
            let ratio = match metric {
                QuotaMetric::NsQuotaRatioUsed => quota.ns_ratio_used,
                QuotaMetric::DsQuotaRatioUsed => quota.ds_ratio_used,
            }?;
            Some((d.path.to_string(), ratio))
        })
        .collect()
}

/// Order a histogram by value. Ties are broken by key, ascending, in both
/// directions.
pub fn sorted_by_value(map: &BTreeMap<String, i64>, ascending: bool) -> Vec<(String, i64)> {
    map.iter()
        .map(|(k, v)| (k.clone(), *v))
        .sorted_by(|a, b| {
            let by_value = if ascending { a.1.cmp(&b.1) } else { b.1.cmp(&a.1) };
            by_value.then_with(|| a.0.cmp(&b.0))
        })
        .collect()
}

/// Keep the `limit` largest values.
pub fn slice_to_top(map: &BTreeMap<String, i64>, limit: usize) -> BTreeMap<String, i64> {
    sorted_by_value(map, false).into_iter().take(limit).collect()
}

/// Keep the `limit` smallest values.
pub fn slice_to_bottom(map: &BTreeMap<String, i64>, limit: usize) -> BTreeMap<String, i64> {
    sorted_by_value(map, true).into_iter().take(limit).collect()
}

/// Parent directory of `path`, cut to its first `depth` segments.
///
/// The result is always a prefix of `path`.
pub fn parent_prefix(path: &str, depth: usize) -> &str {
    let parent = match path.rfind('/') {
        Some(0) | None => return "/",
        Some(idx) => &path[..idx],
    };
    let mut seen = 0;
    for (idx, byte) in parent.bytes().enumerate().skip(1) {
        if byte == b'/' {
            seen += 1;
            if seen == depth {
                return &parent[..idx];
            }
        }
    }
    parent
}

/// Check whether `path` is `dir` or lies beneath it, segment-wise.
pub fn is_under(path: &str, dir: &str) -> bool {
    if dir == "/" {
        return path.starts_with('/');
    }
    match path.strip_prefix(dir) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
