//! One full aggregation pass over a namespace view.
//!
//! The pass partitions files into size buckets and time windows, computes
//! per-user and per-directory histograms, quota pressure and modification
//! time histograms, and assembles everything into a fresh [`Snapshot`].
//! Independent sub-steps run on the rayon pool; cancellation is only checked
//! between sub-steps.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Instant;

use derive_builder::Builder;
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use nsinsight_core::{
    Entry, GroupedMetric, QuotaMetric, RefreshError, ScalarMetric, Snapshot, WatchedDirStats,
};

use crate::classify::{AgeWindow, Classifier, SizeBucket, exceeds_quota, is_empty_dir};
use crate::histogram::{self, Field};
use crate::watch_tree::WatchTree;

/// Configuration for an aggregation pass.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct PipelineConfig {
    /// Reference time for every age check in the pass (ms since epoch).
    #[builder(default = "chrono::Utc::now().timestamp_millis()")]
    pub reference_time: i64,

    /// Path depth of the top-directories histogram.
    #[builder(default = "3")]
    pub dir_depth: usize,

    /// Entries kept in the top-directories histogram.
    #[builder(default = "1000")]
    pub dir_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reference_time: chrono::Utc::now().timestamp_millis(),
            dir_depth: 3,
            dir_limit: 1000,
        }
    }
}

impl PipelineConfig {
    /// Create a new config builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }
}

/// Materialized inputs of one pass.
#[derive(Debug, Clone, Copy)]
pub struct PipelineInput<'a> {
    /// Every file in the namespace.
    pub files: &'a [Entry],
    /// Every directory in the namespace.
    pub dirs: &'a [Entry],
    /// Total capacity, 0 when unknown.
    pub capacity: u64,
    /// Directories receiving exact aggregates.
    pub watches: &'a BTreeSet<String>,
    /// Merged login map to publish with the snapshot.
    pub logins: &'a BTreeMap<String, i64>,
}

/// Files split into the four directly filtered size buckets. Large files
/// are never collected; they are derived by subtraction.
#[derive(Default)]
struct SizePartition<'a> {
    empty: Vec<&'a Entry>,
    tiny: Vec<&'a Entry>,
    small: Vec<&'a Entry>,
    medium: Vec<&'a Entry>,
}

impl<'a> SizePartition<'a> {
    fn of(files: &[&'a Entry], classifier: &Classifier) -> Self {
        files
            .par_iter()
            .fold(SizePartition::default, |mut acc, e| {
                match classifier.size_bucket(e) {
                    SizeBucket::Empty => acc.empty.push(*e),
                    SizeBucket::Tiny => acc.tiny.push(*e),
                    SizeBucket::Small => acc.small.push(*e),
                    SizeBucket::Medium => acc.medium.push(*e),
                    SizeBucket::Large => {}
                }
                acc
            })
            .reduce(SizePartition::default, |mut a, mut b| {
                a.empty.append(&mut b.empty);
                a.tiny.append(&mut b.tiny);
                a.small.append(&mut b.small);
                a.medium.append(&mut b.medium);
                a
            })
    }

    fn counted(&self) -> usize {
        self.empty.len() + self.tiny.len() + self.small.len() + self.medium.len()
    }
}

/// A bucket restricted to one time window.
struct Windowed<'a> {
    recent: Vec<&'a Entry>,
    stale: Vec<&'a Entry>,
}

impl<'a> Windowed<'a> {
    fn of(entries: &[&'a Entry], classifier: &Classifier) -> Self {
        let (recent, stale) = rayon::join(
            || histogram::filter(entries, |e| classifier.in_window(e, AgeWindow::Recent24h)),
            || histogram::filter(entries, |e| classifier.in_window(e, AgeWindow::Stale1yr)),
        );
        Self { recent, stale }
    }
}

/// Runs aggregation passes.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Create a pipeline with the given config.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Create a pipeline that stops at the next checkpoint once `cancel` fires.
    pub fn with_cancellation(config: PipelineConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    fn checkpoint(&self, step: &str) -> Result<(), RefreshError> {
        if self.cancel.is_cancelled() {
            info!(step, "Aggregation cancelled");
            return Err(RefreshError::Cancelled);
        }
        Ok(())
    }

    /// Run a full pass and build a snapshot.
    pub fn run(&self, input: PipelineInput<'_>) -> Result<Snapshot, RefreshError> {
        let started = Instant::now();
        let classifier = Classifier::new(self.config.reference_time);
        let files: Vec<&Entry> = input.files.iter().collect();
        let dirs: Vec<&Entry> = input.dirs.iter().collect();
        let num_files = files.len() as i64;
        let num_dirs = dirs.len() as i64;

        let users = collect_users(&files, &dirs);
        debug!(files = num_files, dirs = num_dirs, users = users.len(), "Starting aggregation");

        // Step 1: partition into buckets and windows.
        self.checkpoint("partition")?;
        let (partition, (files_24h, (old_1yr, old_2yr))) = rayon::join(
            || SizePartition::of(&files, &classifier),
            || {
                rayon::join(
                    || histogram::filter(&files, |e| classifier.in_window(e, AgeWindow::Recent24h)),
                    || {
                        rayon::join(
                            || histogram::filter(&files, |e| classifier.in_window(e, AgeWindow::Stale1yr)),
                            || histogram::filter(&files, |e| classifier.in_window(e, AgeWindow::Stale2yr)),
                        )
                    },
                )
            },
        );
        if partition.counted() > files.len() {
            return Err(RefreshError::Aggregation {
                message: format!(
                    "size buckets hold {} files but only {} exist",
                    partition.counted(),
                    files.len()
                ),
            });
        }

        let empty_dirs = histogram::filter(&dirs, is_empty_dir);
        let empty_files_w = Windowed::of(&partition.empty, &classifier);
        let empty_dirs_w = Windowed::of(&empty_dirs, &classifier);
        let tiny_w = Windowed::of(&partition.tiny, &classifier);
        let small_w = Windowed::of(&partition.small, &classifier);

        // Step 2: scalar metrics.
        self.checkpoint("scalars")?;
        let empty_files_count = partition.empty.len() as i64;
        let tiny_count = partition.tiny.len() as i64;
        let small_count = partition.small.len() as i64;
        let medium_count = partition.medium.len() as i64;
        let large_count = non_negative(
            "largeFiles",
            num_files - empty_files_count - tiny_count - small_count - medium_count,
        );

        let mut scalars: BTreeMap<ScalarMetric, i64> = BTreeMap::new();
        let scalar_jobs: Vec<(ScalarMetric, &[&Entry], Field)> = vec![
            (ScalarMetric::Diskspace, &files[..], Field::Diskspace),
            (ScalarMetric::Diskspace24h, &files_24h[..], Field::Diskspace),
            (ScalarMetric::NumFiles24h, &files_24h[..], Field::Count),
            (ScalarMetric::EmptyDirs, &empty_dirs[..], Field::Count),
            (ScalarMetric::EmptyFiles24h, &empty_files_w.recent[..], Field::Count),
            (ScalarMetric::EmptyDirs24h, &empty_dirs_w.recent[..], Field::Count),
            (ScalarMetric::TinyFiles24h, &tiny_w.recent[..], Field::Count),
            (ScalarMetric::SmallFiles24h, &small_w.recent[..], Field::Count),
            (ScalarMetric::EmptyFiles1yr, &empty_files_w.stale[..], Field::Count),
            (ScalarMetric::EmptyDirs1yr, &empty_dirs_w.stale[..], Field::Count),
            (ScalarMetric::TinyFiles1yr, &tiny_w.stale[..], Field::Count),
            (ScalarMetric::SmallFiles1yr, &small_w.stale[..], Field::Count),
            (ScalarMetric::EmptyFilesMem, &partition.empty[..], Field::Memory),
            (ScalarMetric::EmptyDirsMem, &empty_dirs[..], Field::Memory),
            (ScalarMetric::TinyFilesMem, &partition.tiny[..], Field::Memory),
            (ScalarMetric::TinyFilesDs, &partition.tiny[..], Field::Diskspace),
            (ScalarMetric::SmallFilesMem, &partition.small[..], Field::Memory),
            (ScalarMetric::SmallFilesDs, &partition.small[..], Field::Diskspace),
            (ScalarMetric::EmptyFiles24hMem, &empty_files_w.recent[..], Field::Memory),
            (ScalarMetric::EmptyDirs24hMem, &empty_dirs_w.recent[..], Field::Memory),
            (ScalarMetric::TinyFiles24hMem, &tiny_w.recent[..], Field::Memory),
            (ScalarMetric::SmallFiles24hMem, &small_w.recent[..], Field::Memory),
            (ScalarMetric::TinyFiles24hDs, &tiny_w.recent[..], Field::Diskspace),
            (ScalarMetric::SmallFiles24hDs, &small_w.recent[..], Field::Diskspace),
            (ScalarMetric::OldFiles1yr, &old_1yr[..], Field::Count),
            (ScalarMetric::OldFiles1yrDs, &old_1yr[..], Field::Diskspace),
            (ScalarMetric::OldFiles2yr, &old_2yr[..], Field::Count),
            (ScalarMetric::OldFiles2yrDs, &old_2yr[..], Field::Diskspace),
        ];
        scalars.extend(
            scalar_jobs
                .par_iter()
                .map(|(metric, set, field)| (*metric, histogram::sum(set, *field)))
                .collect::<Vec<_>>(),
        );
        scalars.insert(ScalarMetric::Capacity, input.capacity as i64);
        scalars.insert(ScalarMetric::NumFiles, num_files);
        scalars.insert(ScalarMetric::NumDirs, num_dirs);
        scalars.insert(ScalarMetric::TotalFiles, num_files);
        scalars.insert(ScalarMetric::TotalDirs, num_dirs);
        scalars.insert(ScalarMetric::EmptyFiles, empty_files_count);
        scalars.insert(ScalarMetric::TinyFiles, tiny_count);
        scalars.insert(ScalarMetric::SmallFiles, small_count);
        scalars.insert(ScalarMetric::MediumFiles, medium_count);
        scalars.insert(ScalarMetric::LargeFiles, large_count);

        // Step 2 (cont.): per-user histograms.
        self.checkpoint("users")?;
        let user_jobs: Vec<(GroupedMetric, &[&Entry], Field)> = vec![
            (GroupedMetric::DiskspaceUsers, &files[..], Field::Diskspace),
            (GroupedMetric::NumFilesUsers, &files[..], Field::Count),
            (GroupedMetric::NumDirsUsers, &dirs[..], Field::Count),
            (GroupedMetric::EmptyFilesUsers, &partition.empty[..], Field::Count),
            (GroupedMetric::EmptyDirsUsers, &empty_dirs[..], Field::Count),
            (GroupedMetric::EmptyFilesMemUsers, &partition.empty[..], Field::Memory),
            (GroupedMetric::EmptyDirsMemUsers, &empty_dirs[..], Field::Memory),
            (GroupedMetric::TinyFilesUsers, &partition.tiny[..], Field::Count),
            (GroupedMetric::SmallFilesUsers, &partition.small[..], Field::Count),
            (GroupedMetric::TinyFilesMemUsers, &partition.tiny[..], Field::Memory),
            (GroupedMetric::SmallFilesMemUsers, &partition.small[..], Field::Memory),
            (GroupedMetric::TinyFilesDsUsers, &partition.tiny[..], Field::Diskspace),
            (GroupedMetric::SmallFilesDsUsers, &partition.small[..], Field::Diskspace),
            (GroupedMetric::Diskspace24hUsers, &files_24h[..], Field::Diskspace),
            (GroupedMetric::NumFiles24hUsers, &files_24h[..], Field::Count),
            (GroupedMetric::EmptyFiles24hUsers, &empty_files_w.recent[..], Field::Count),
            (GroupedMetric::EmptyDirs24hUsers, &empty_dirs_w.recent[..], Field::Count),
            (GroupedMetric::EmptyFiles24hMemUsers, &empty_files_w.recent[..], Field::Memory),
            (GroupedMetric::EmptyDirs24hMemUsers, &empty_dirs_w.recent[..], Field::Memory),
            (GroupedMetric::TinyFiles24hUsers, &tiny_w.recent[..], Field::Count),
            (GroupedMetric::SmallFiles24hUsers, &small_w.recent[..], Field::Count),
            (GroupedMetric::TinyFiles24hMemUsers, &tiny_w.recent[..], Field::Memory),
            (GroupedMetric::SmallFiles24hMemUsers, &small_w.recent[..], Field::Memory),
            (GroupedMetric::TinyFiles24hDsUsers, &tiny_w.recent[..], Field::Diskspace),
            (GroupedMetric::SmallFiles24hDsUsers, &small_w.recent[..], Field::Diskspace),
            (GroupedMetric::EmptyFiles1yrUsers, &empty_files_w.stale[..], Field::Count),
            (GroupedMetric::EmptyDirs1yrUsers, &empty_dirs_w.stale[..], Field::Count),
            (GroupedMetric::TinyFiles1yrUsers, &tiny_w.stale[..], Field::Count),
            (GroupedMetric::SmallFiles1yrUsers, &small_w.stale[..], Field::Count),
            (GroupedMetric::MediumFilesUsers, &partition.medium[..], Field::Count),
            (GroupedMetric::OldFiles1yrUsers, &old_1yr[..], Field::Count),
            (GroupedMetric::OldFiles1yrDsUsers, &old_1yr[..], Field::Diskspace),
            (GroupedMetric::OldFiles2yrUsers, &old_2yr[..], Field::Count),
            (GroupedMetric::OldFiles2yrDsUsers, &old_2yr[..], Field::Diskspace),
        ];
        let mut grouped: BTreeMap<GroupedMetric, BTreeMap<String, i64>> = user_jobs
            .par_iter()
            .map(|(metric, set, field)| (*metric, histogram::by_user(set, *field)))
            .collect();

        // Step 3: large files per user, by subtraction.
        let large_users = large_files_per_user(&users, &grouped);
        grouped.insert(GroupedMetric::LargeFilesUsers, large_users);

        // Step 4: directory histograms plus exact watched aggregates.
        self.checkpoint("directories")?;
        let depth = self.config.dir_depth;
        let limit = self.config.dir_limit;
        let ((mut dir_count, mut dir_ds), ((mut dir_count_24h, mut dir_ds_24h), watched)) =
            rayon::join(
                || {
                    rayon::join(
                        || top_dirs(&files, depth, limit, Field::Count),
                        || top_dirs(&files, depth, limit, Field::Diskspace),
                    )
                },
                || {
                    rayon::join(
                        || {
                            rayon::join(
                                || top_dirs(&files_24h, depth, limit, Field::Count),
                                || top_dirs(&files_24h, depth, limit, Field::Diskspace),
                            )
                        },
                        || watched_stats(&files, &classifier, input.watches),
                    )
                },
            );
        for (dir, stats) in &watched {
            dir_count.insert(dir.clone(), stats.count);
            dir_ds.insert(dir.clone(), stats.diskspace);
            dir_count_24h.insert(dir.clone(), stats.count_24h);
            dir_ds_24h.insert(dir.clone(), stats.diskspace_24h);
        }
        grouped.insert(GroupedMetric::DirCount, dir_count);
        grouped.insert(GroupedMetric::DirDs, dir_ds);
        grouped.insert(GroupedMetric::DirCount24h, dir_count_24h);
        grouped.insert(GroupedMetric::DirDs24h, dir_ds_24h);

        // Step 5: quota pressure.
        self.checkpoint("quotas")?;
        let quotas = QuotaReport::of(&dirs, &users);
        scalars.insert(ScalarMetric::NsQuotaCount, quotas.ns_count);
        scalars.insert(ScalarMetric::DsQuotaCount, quotas.ds_count);
        scalars.insert(ScalarMetric::NsQuotaThreshCount, quotas.ns_thresh_count);
        scalars.insert(ScalarMetric::DsQuotaThreshCount, quotas.ds_thresh_count);
        grouped.insert(GroupedMetric::NsQuotaCountsUsers, quotas.ns_counts_users);
        grouped.insert(GroupedMetric::DsQuotaCountsUsers, quotas.ds_counts_users);
        grouped.insert(GroupedMetric::NsQuotaThreshCountsUsers, quotas.ns_thresh_users);
        grouped.insert(GroupedMetric::DsQuotaThreshCountsUsers, quotas.ds_thresh_users);

        // Step 6: modification time histograms.
        self.checkpoint("mod-time")?;
        let (mod_count, mod_ds) = rayon::join(
            || histogram::by_month(&files, Field::Count),
            || histogram::by_month(&files, Field::Diskspace),
        );
        grouped.insert(GroupedMetric::ModTimeCount, mod_count);
        grouped.insert(GroupedMetric::ModTimeDiskspace, mod_ds);

        // Step 7: assemble.
        let time_taken = started.elapsed().as_millis() as i64;
        let report_time = chrono::Utc::now().timestamp_millis();
        scalars.insert(ScalarMetric::TimeTaken, time_taken);
        scalars.insert(ScalarMetric::ReportTime, report_time);

        info!(
            files = num_files,
            dirs = num_dirs,
            watched = watched.len(),
            ms = time_taken,
            "Reloading suggestion matrices finished"
        );

        Ok(Snapshot {
            report_time,
            scalars,
            grouped,
            watched,
            ns_quotas: quotas.ns_ratios,
            ds_quotas: quotas.ds_ratios,
            logins: input.logins.clone(),
            users,
            watches: input.watches.clone(),
        })
    }
}

fn collect_users(files: &[&Entry], dirs: &[&Entry]) -> BTreeSet<String> {
    let (file_users, dir_users) = rayon::join(
        || files.par_iter().map(|e| e.owner.as_str()).collect::<HashSet<&str>>(),
        || dirs.par_iter().map(|e| e.owner.as_str()).collect::<HashSet<&str>>(),
    );
    file_users
        .union(&dir_users)
        .map(|u| u.to_string())
        .collect()
}

fn non_negative(metric: &str, value: i64) -> i64 {
    if value < 0 {
        warn!(metric, value, "Derived bucket went negative, clamping to zero");
        return 0;
    }
    value
}

/// Large files per user = total - empty - tiny - small - medium.
fn large_files_per_user(
    users: &BTreeSet<String>,
    grouped: &BTreeMap<GroupedMetric, BTreeMap<String, i64>>,
) -> BTreeMap<String, i64> {
    let value = |metric: GroupedMetric, user: &str| {
        grouped
            .get(&metric)
            .and_then(|m| m.get(user))
            .copied()
            .unwrap_or(0)
    };
    users
        .iter()
        .map(|user| {
            let large = value(GroupedMetric::NumFilesUsers, user)
                - value(GroupedMetric::EmptyFilesUsers, user)
                - value(GroupedMetric::TinyFilesUsers, user)
                - value(GroupedMetric::SmallFilesUsers, user)
                - value(GroupedMetric::MediumFilesUsers, user);
            (user.clone(), non_negative("largeFilesUsers", large))
        })
        .collect()
}

fn top_dirs(files: &[&Entry], depth: usize, limit: usize, field: Field) -> BTreeMap<String, i64> {
    histogram::slice_to_top(&histogram::by_parent_dir(files, depth, field), limit)
}

/// Exact aggregates for every watched directory.
///
/// The full collection is filtered once per common ancestor; each watched
/// directory is then filtered from its ancestor's subset only.
fn watched_stats(
    files: &[&Entry],
    classifier: &Classifier,
    watches: &BTreeSet<String>,
) -> BTreeMap<String, WatchedDirStats> {
    if watches.is_empty() {
        return BTreeMap::new();
    }
    let ancestors = WatchTree::from_paths(watches).common_ancestors();
    debug!(
        watches = watches.len(),
        ancestors = ancestors.len(),
        "Resolved watched directory ancestors"
    );

    ancestors
        .par_iter()
        .flat_map_iter(|ancestor| {
            let subset = histogram::filter(files, |e| histogram::is_under(&e.path, ancestor));
            watches
                .iter()
                .filter(|dir| histogram::is_under(dir, ancestor))
                .map(|dir| {
                    let inodes = if dir == ancestor {
                        subset.clone()
                    } else {
                        histogram::filter(&subset, |e| histogram::is_under(&e.path, dir))
                    };
                    let recent =
                        histogram::filter(&inodes, |e| classifier.in_window(e, AgeWindow::Recent24h));
                    let stats = WatchedDirStats {
                        count: histogram::sum(&inodes, Field::Count),
                        diskspace: histogram::sum(&inodes, Field::Diskspace),
                        count_24h: histogram::sum(&recent, Field::Count),
                        diskspace_24h: histogram::sum(&recent, Field::Diskspace),
                    };
                    (dir.clone(), stats)
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Quota ratios and threshold counts for every user.
struct QuotaReport {
    ns_ratios: BTreeMap<String, BTreeMap<String, i64>>,
    ds_ratios: BTreeMap<String, BTreeMap<String, i64>>,
    ns_counts_users: BTreeMap<String, i64>,
    ds_counts_users: BTreeMap<String, i64>,
    ns_thresh_users: BTreeMap<String, i64>,
    ds_thresh_users: BTreeMap<String, i64>,
    ns_count: i64,
    ds_count: i64,
    ns_thresh_count: i64,
    ds_thresh_count: i64,
}

impl QuotaReport {
    fn of(dirs: &[&Entry], users: &BTreeSet<String>) -> Self {
        let mut by_owner: HashMap<&str, Vec<&Entry>> = HashMap::new();
        for dir in dirs.iter().filter(|d| d.has_quota()) {
            by_owner.entry(dir.owner.as_str()).or_default().push(*dir);
        }

        let per_user: Vec<(String, BTreeMap<String, i64>, BTreeMap<String, i64>)> = users
            .par_iter()
            .map(|user| {
                let quota_dirs = by_owner.get(user.as_str()).map(Vec::as_slice).unwrap_or(&[]);
                let ns = histogram::quota_ratios(quota_dirs, QuotaMetric::NsQuotaRatioUsed);
                let ds = histogram::quota_ratios(quota_dirs, QuotaMetric::DsQuotaRatioUsed);
                (user.clone(), ns, ds)
            })
            .collect();

        let mut report = QuotaReport {
            ns_ratios: BTreeMap::new(),
            ds_ratios: BTreeMap::new(),
            ns_counts_users: BTreeMap::new(),
            ds_counts_users: BTreeMap::new(),
            ns_thresh_users: BTreeMap::new(),
            ds_thresh_users: BTreeMap::new(),
            ns_count: 0,
            ds_count: 0,
            ns_thresh_count: 0,
            ds_thresh_count: 0,
        };
        for (user, ns, ds) in per_user {
            let ns_exceeded = ns.values().filter(|r| exceeds_quota(**r)).count() as i64;
            let ds_exceeded = ds.values().filter(|r| exceeds_quota(**r)).count() as i64;
            report.ns_count += ns.len() as i64;
            report.ds_count += ds.len() as i64;
            report.ns_thresh_count += ns_exceeded;
            report.ds_thresh_count += ds_exceeded;
            report.ns_counts_users.insert(user.clone(), ns.len() as i64);
            report.ds_counts_users.insert(user.clone(), ds.len() as i64);
            report.ns_thresh_users.insert(user.clone(), ns_exceeded);
            report.ds_thresh_users.insert(user.clone(), ds_exceeded);
            report.ns_ratios.insert(user.clone(), ns);
            report.ds_ratios.insert(user, ds);
        }
        report
    }
}
