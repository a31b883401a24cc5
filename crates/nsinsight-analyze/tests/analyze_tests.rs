use nsinsight_analyze::{
    AgeWindow, Classifier, Entry, Pipeline, PipelineConfig, PipelineInput, SizeBucket, Snapshot,
    WatchTree, canonical_path, histogram,
};
use nsinsight_core::{GroupedMetric, QuotaUsage, ScalarMetric};
use std::collections::{BTreeMap, BTreeSet};

const NOW: i64 = 1_700_000_000_000;
const DAY: i64 = 24 * 60 * 60 * 1000;
const YEAR: i64 = 365 * DAY;

fn run_with(files: &[Entry], dirs: &[Entry], watches: &[&str], capacity: u64) -> Snapshot {
    let watches: BTreeSet<String> = watches.iter().map(|w| w.to_string()).collect();
    let logins = BTreeMap::from([("alice".to_string(), NOW - DAY)]);
    let config = PipelineConfig::builder()
        .reference_time(NOW)
        .dir_limit(1000usize)
        .build()
        .unwrap();

    Pipeline::new(config)
        .run(PipelineInput {
            files,
            dirs,
            capacity,
            watches: &watches,
            logins: &logins,
        })
        .unwrap()
}

/// A mixed population covering every bucket and window.
fn population() -> (Vec<Entry>, Vec<Entry>) {
    let sizes = [
        0u64,
        0,
        1,
        700,
        1024,
        1025,
        500_000,
        1_048_576,
        1_048_577,
        50_000_000,
        134_217_728,
        134_217_729,
        900_000_000,
    ];
    let owners = ["alice", "bob", "carol"];

    let files = sizes
        .iter()
        .enumerate()
        .map(|(i, size)| {
            let owner = owners[i % owners.len()];
            let modified = if i % 2 == 0 { NOW - DAY / 2 } else { NOW - 3 * YEAR };
            let accessed = if i % 3 == 0 { NOW - 3 * YEAR } else { NOW - YEAR - DAY };
            Entry::file(format!("/data/{owner}/proj/sub/file{i}"), owner, *size)
                .with_times(modified, accessed)
                .with_memory(150)
        })
        .collect();

    let dirs = vec![
        Entry::directory("/data", "root", 3).with_times(NOW, NOW),
        Entry::directory("/data/alice", "alice", 1)
            .with_quota(QuotaUsage::new(Some(90), Some(10))),
        Entry::directory("/data/bob", "bob", 0).with_times(NOW - 2 * YEAR, NOW),
        Entry::directory("/data/carol", "carol", 0).with_times(NOW, NOW),
    ];

    (files, dirs)
}

#[test]
fn test_buckets_partition_total() {
    let (files, dirs) = population();
    let snapshot = run_with(&files, &dirs, &[], 0);

    let partitioned = snapshot.scalar(ScalarMetric::EmptyFiles)
        + snapshot.scalar(ScalarMetric::TinyFiles)
        + snapshot.scalar(ScalarMetric::SmallFiles)
        + snapshot.scalar(ScalarMetric::MediumFiles)
        + snapshot.scalar(ScalarMetric::LargeFiles);
    assert_eq!(partitioned, snapshot.scalar(ScalarMetric::NumFiles));
    assert_eq!(snapshot.scalar(ScalarMetric::NumFiles), files.len() as i64);

    assert_eq!(snapshot.scalar(ScalarMetric::EmptyFiles), 2);
    assert_eq!(snapshot.scalar(ScalarMetric::TinyFiles), 3);
    assert_eq!(snapshot.scalar(ScalarMetric::SmallFiles), 3);
    assert_eq!(snapshot.scalar(ScalarMetric::MediumFiles), 3);
    assert_eq!(snapshot.scalar(ScalarMetric::LargeFiles), 2);
}

#[test]
fn test_diskspace_matches_direct_large_filter() {
    let (files, dirs) = population();
    let snapshot = run_with(&files, &dirs, &[], 0);

    let classifier = Classifier::new(NOW);
    let direct_large_ds: i64 = files
        .iter()
        .filter(|f| classifier.size_bucket(f) == SizeBucket::Large)
        .map(|f| f.diskspace as i64)
        .sum();
    let medium_ds: i64 = files
        .iter()
        .filter(|f| classifier.size_bucket(f) == SizeBucket::Medium)
        .map(|f| f.diskspace as i64)
        .sum();
    let empty_ds = 0;

    assert_eq!(
        snapshot.scalar(ScalarMetric::Diskspace),
        empty_ds
            + snapshot.scalar(ScalarMetric::TinyFilesDs)
            + snapshot.scalar(ScalarMetric::SmallFilesDs)
            + medium_ds
            + direct_large_ds
    );
}

#[test]
fn test_large_per_user_is_consistent() {
    let (files, dirs) = population();
    let snapshot = run_with(&files, &dirs, &[], 0);
    let classifier = Classifier::new(NOW);

    for user in &snapshot.users {
        let large = snapshot.grouped_value(GroupedMetric::LargeFilesUsers, user);
        assert!(large >= 0);

        let direct = files
            .iter()
            .filter(|f| f.owner == user.as_str() && classifier.size_bucket(f) == SizeBucket::Large)
            .count() as i64;
        assert_eq!(large, direct, "large files for {user}");
    }
    // Directory-only owners still get an entry.
    assert_eq!(snapshot.grouped_value(GroupedMetric::LargeFilesUsers, "root"), 0);
    assert!(snapshot.users.contains("root"));
}

#[test]
fn test_grouped_keys_are_known_users() {
    let (files, dirs) = population();
    let snapshot = run_with(&files, &dirs, &[], 0);

    for (_, metric) in GroupedMetric::PER_USER {
        if let Some(map) = snapshot.grouped(metric) {
            for user in map.keys() {
                assert!(snapshot.users.contains(user), "{metric:?} has unknown {user}");
            }
        }
    }
}

#[test]
fn test_recent_and_stale_windows() {
    let (files, dirs) = population();
    let snapshot = run_with(&files, &dirs, &[], 0);
    let classifier = Classifier::new(NOW);

    let recent = files
        .iter()
        .filter(|f| classifier.in_window(f, AgeWindow::Recent24h))
        .count() as i64;
    let stale_1yr = files
        .iter()
        .filter(|f| classifier.in_window(f, AgeWindow::Stale1yr))
        .count() as i64;
    let stale_2yr = files
        .iter()
        .filter(|f| classifier.in_window(f, AgeWindow::Stale2yr))
        .count() as i64;

    assert_eq!(snapshot.scalar(ScalarMetric::NumFiles24h), recent);
    assert_eq!(snapshot.scalar(ScalarMetric::OldFiles1yr), stale_1yr);
    assert_eq!(snapshot.scalar(ScalarMetric::OldFiles2yr), stale_2yr);
    // Every file is older than a year by access time.
    assert_eq!(stale_1yr, files.len() as i64);
    assert!(stale_2yr < stale_1yr);
}

#[test]
fn test_empty_dirs_and_windows() {
    let (files, dirs) = population();
    let snapshot = run_with(&files, &dirs, &[], 0);

    assert_eq!(snapshot.scalar(ScalarMetric::EmptyDirs), 2);
    assert_eq!(snapshot.scalar(ScalarMetric::EmptyDirs24h), 1);
    assert_eq!(snapshot.scalar(ScalarMetric::EmptyDirs1yr), 1);
    assert_eq!(snapshot.grouped_value(GroupedMetric::EmptyDirsUsers, "bob"), 1);
    assert_eq!(snapshot.grouped_value(GroupedMetric::EmptyDirs24hUsers, "carol"), 1);
}

#[test]
fn test_quota_only_for_configured_dirs() {
    let (files, dirs) = population();
    let snapshot = run_with(&files, &dirs, &[], 0);

    assert_eq!(snapshot.ns_quotas["alice"].len(), 1);
    assert_eq!(snapshot.ns_quotas["alice"]["/data/alice"], 90);
    assert!(snapshot.ns_quotas["bob"].is_empty());
    assert_eq!(snapshot.scalar(ScalarMetric::NsQuotaThreshCount), 1);
    assert_eq!(snapshot.scalar(ScalarMetric::DsQuotaThreshCount), 0);
}

#[test]
fn test_watched_dirs_exact_aggregates() {
    let (files, dirs) = population();
    let watches = ["/data/alice", "/data/alice/proj/sub", "/data/bob"];
    let snapshot = run_with(&files, &dirs, &watches, 0);

    let ancestors = WatchTree::from_paths(watches).common_ancestors();
    assert_eq!(ancestors, vec!["/data"]);

    let refs: Vec<&Entry> = files.iter().collect();
    for dir in watches {
        let under = histogram::filter(&refs, |e| histogram::is_under(&e.path, dir));
        let stats = &snapshot.watched[dir];
        assert_eq!(stats.count, under.len() as i64);
        assert_eq!(stats.diskspace, histogram::sum(&under, histogram::Field::Diskspace));
        assert_eq!(snapshot.grouped_value(GroupedMetric::DirCount, dir), stats.count);
        assert_eq!(
            snapshot.grouped_value(GroupedMetric::DirDs24h, dir),
            stats.diskspace_24h
        );
    }
    assert_eq!(
        snapshot.watched["/data/alice"].count,
        snapshot.watched["/data/alice/proj/sub"].count
    );
}

#[test]
fn test_common_ancestors_cover_every_watch_once() {
    let cases: &[&[&str]] = &[
        &["/"],
        &["/", "/a", "/b/c"],
        &["/a", "/ab"],
        &["/a/b", "/a/bc"],
        &["/a", "/a/b", "/a/b/c"],
        &["/a//b", "/a/b/c/"],
        &["//x///y", "/x/y/z"],
        &["/a/b/c/d/e/f/g"],
        &["/data/x", "/tmp", "/data/y/z"],
        &["/user/alice/logs", "/user/alice/data", "/user/bob"],
        &["/a/", "/a//", "/b"],
    ];

    for case in cases {
        let watches: BTreeSet<String> = case.iter().map(|w| canonical_path(w)).collect();
        let ancestors = WatchTree::from_paths(&watches).common_ancestors();

        for (i, outer) in ancestors.iter().enumerate() {
            for (j, inner) in ancestors.iter().enumerate() {
                assert!(
                    i == j || !histogram::is_under(inner, outer),
                    "{inner} lies under {outer} for {case:?}"
                );
            }
        }
        for watch in &watches {
            let covering = ancestors
                .iter()
                .filter(|a| histogram::is_under(watch, a))
                .count();
            assert_eq!(covering, 1, "{watch} covered {covering} times for {case:?}");
        }
    }
}

#[test]
fn test_watched_stats_use_canonical_paths() {
    let (files, dirs) = population();
    let watch = canonical_path("/data//alice/");
    let snapshot = run_with(&files, &dirs, &[watch.as_str()], 0);

    let refs: Vec<&Entry> = files.iter().collect();
    let under = histogram::filter(&refs, |e| histogram::is_under(&e.path, "/data/alice"));
    assert!(!under.is_empty());
    assert_eq!(snapshot.watched["/data/alice"].count, under.len() as i64);
}

#[test]
fn test_publishes_capacity_logins_and_times() {
    let (files, dirs) = population();
    let snapshot = run_with(&files, &dirs, &[], 1 << 40);

    assert_eq!(snapshot.scalar(ScalarMetric::Capacity), 1 << 40);
    assert_eq!(snapshot.last_login("alice"), NOW - DAY);
    assert!(snapshot.scalar(ScalarMetric::TimeTaken) >= 0);
    assert_eq!(snapshot.scalar(ScalarMetric::ReportTime), snapshot.report_time);

    let months = snapshot.grouped(GroupedMetric::ModTimeCount).unwrap();
    assert_eq!(months.values().sum::<i64>(), files.len() as i64);
}

#[test]
fn test_three_file_scenario() {
    let files = vec![
        Entry::file("/a/x", "a", 0),
        Entry::file("/a/y", "a", 500),
        Entry::file("/a/z", "a", 1_000_000),
    ];
    let snapshot = run_with(&files, &[], &[], 0);

    assert_eq!(snapshot.scalar(ScalarMetric::EmptyFiles), 1);
    assert_eq!(snapshot.scalar(ScalarMetric::TinyFiles), 1);
    assert_eq!(snapshot.scalar(ScalarMetric::SmallFiles), 1);
    assert_eq!(snapshot.scalar(ScalarMetric::MediumFiles), 0);
    assert_eq!(snapshot.scalar(ScalarMetric::LargeFiles), 0);
    assert_eq!(snapshot.grouped_value(GroupedMetric::EmptyFilesUsers, "a"), 1);
}

#[test]
fn test_empty_population() {
    let snapshot = run_with(&[], &[], &["/nowhere"], 0);
    assert_eq!(snapshot.scalar(ScalarMetric::NumFiles), 0);
    assert_eq!(snapshot.scalar(ScalarMetric::LargeFiles), 0);
    assert!(snapshot.users.is_empty());
    assert_eq!(snapshot.watched["/nowhere"].count, 0);
}
