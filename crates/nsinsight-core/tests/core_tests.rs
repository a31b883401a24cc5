use nsinsight_core::{
    EngineConfig, Entry, EntryKind, GroupedMetric, MemorySource, MetadataSource, QuotaUsage,
    ScalarMetric, Snapshot, SourceConfig, WatchedDirStats,
};
use std::collections::BTreeMap;
use std::str::FromStr;

#[test]
fn test_entry_kind_discrimination() {
    assert!(EntryKind::File.is_file());
    assert!(!EntryKind::File.is_dir());
    assert!(EntryKind::Directory.is_dir());
    assert!(!EntryKind::Directory.is_file());
}

#[test]
fn test_file_entry_builders() {
    let entry = Entry::file("/user/alice/data.csv", "alice", 4096)
        .with_diskspace(3 * 4096)
        .with_memory(150)
        .with_times(1_700_000_000_000, 1_600_000_000_000);

    assert!(entry.is_file());
    assert_eq!(entry.path.as_str(), "/user/alice/data.csv");
    assert_eq!(entry.owner.as_str(), "alice");
    assert_eq!(entry.size, 4096);
    assert_eq!(entry.diskspace, 12288);
    assert_eq!(entry.memory, 150);
    assert_eq!(entry.modified, 1_700_000_000_000);
    assert_eq!(entry.accessed, 1_600_000_000_000);
    assert_eq!(entry.parent(), Some("/user/alice"));
}

#[test]
fn test_directory_entry_with_quota() {
    let dir = Entry::directory("/user/alice", "alice", 12)
        .with_quota(QuotaUsage::new(Some(86), Some(40)));

    assert!(dir.is_dir());
    assert_eq!(dir.child_count, 12);
    assert!(dir.has_quota());

    let quota = dir.quota.unwrap();
    assert_eq!(quota.ns_ratio_used, Some(86));
    assert_eq!(quota.ds_ratio_used, Some(40));
}

#[test]
fn test_entry_serialization() {
    let entry = Entry::directory("/a", "u", 0).with_quota(QuotaUsage::new(None, Some(10)));
    let json = serde_json::to_string(&entry).unwrap();
    assert!(json.contains("\"kind\":\"directory\""));

    let back: Entry = serde_json::from_str(&json).unwrap();
    assert_eq!(back.path, entry.path);
    assert_eq!(back.quota, entry.quota);
}

#[test]
fn test_metric_parsing() {
    assert_eq!(
        GroupedMetric::from_str("emptyFilesUsers").unwrap(),
        GroupedMetric::EmptyFilesUsers
    );
    assert_eq!(
        ScalarMetric::from_str("nsQuotaThreshCount").unwrap(),
        ScalarMetric::NsQuotaThreshCount
    );
    assert!(GroupedMetric::from_str("EmptyFilesUsers").is_err());
    assert!(GroupedMetric::from_str("").is_err());
}

#[test]
fn test_snapshot_json_shape() {
    let mut snapshot = Snapshot::default();
    snapshot.scalars.insert(ScalarMetric::NumFiles, 3);
    snapshot.grouped.insert(
        GroupedMetric::DirCount,
        BTreeMap::from([("/a/b/c".to_string(), 2)]),
    );
    snapshot.watched.insert(
        "/a".to_string(),
        WatchedDirStats {
            count: 2,
            diskspace: 10,
            count_24h: 0,
            diskspace_24h: 0,
        },
    );

    let value = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(value["scalars"]["numFiles"], 3);
    assert_eq!(value["grouped"]["dirCount"]["/a/b/c"], 2);
    assert_eq!(value["watched"]["/a"]["diskspace"], 10);

    let back: Snapshot = serde_json::from_value(value).unwrap();
    assert_eq!(back, snapshot);
}

#[test]
fn test_memory_source_logins() {
    let source = MemorySource::new(Vec::new())
        .with_login("alice", 100)
        .with_login("bob", 200);

    let logins = source.last_login_times().unwrap();
    assert_eq!(logins.len(), 2);
    assert_eq!(logins["bob"], 200);
    assert!(source.list_entries(EntryKind::File).unwrap().is_empty());
}

#[test]
fn test_config_defaults() {
    let engine = EngineConfig::default();
    assert_eq!(engine.dir_depth, 3);
    assert_eq!(engine.dir_limit, 1000);
    assert!(engine.store_path.is_none());

    let source = SourceConfig::new("/data");
    assert!(source.include_hidden);
    assert!(source.capacity.is_none());
    assert!(source.ignore_patterns.is_empty());
}

#[test]
fn test_config_from_toml_like_json() {
    let config: EngineConfig =
        serde_json::from_str(r#"{"store_path": "/tmp/cache.json", "dir_limit": 10}"#).unwrap();
    assert_eq!(config.dir_limit, 10);
    assert_eq!(config.dir_depth, 3);
    assert!(config.restore_snapshot);
}
