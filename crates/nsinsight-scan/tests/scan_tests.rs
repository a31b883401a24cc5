use nsinsight_core::{EntryKind, MetadataSource, SourceConfig, SourceError};
use nsinsight_scan::{ENTRY_MEMORY_ESTIMATE, FsSource};
use std::fs;
use tempfile::TempDir;

fn create_test_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    fs::create_dir(root.join("dir1")).unwrap();
    fs::create_dir(root.join("dir2")).unwrap();
    fs::create_dir(root.join("dir1/subdir")).unwrap();
    fs::create_dir(root.join("empty")).unwrap();

    fs::write(root.join("file1.txt"), "hello").unwrap();
    fs::write(root.join("dir1/file2.txt"), "world world world").unwrap();
    fs::write(root.join("dir1/subdir/file3.txt"), "test").unwrap();
    fs::write(root.join("dir2/file4.txt"), "another file here").unwrap();
    fs::write(root.join("dir2/zero"), "").unwrap();

    temp
}

#[test]
fn test_lists_files_and_dirs() {
    let temp = create_test_tree();
    let source = FsSource::scan(SourceConfig::new(temp.path())).unwrap();

    let files = source.list_entries(EntryKind::File).unwrap();
    let dirs = source.list_entries(EntryKind::Directory).unwrap();

    assert_eq!(files.len(), 5);
    // Root, dir1, dir2, subdir, empty.
    assert_eq!(dirs.len(), 5);
    assert!(files.iter().all(|f| f.is_file() && f.memory == ENTRY_MEMORY_ESTIMATE));
    assert_eq!(source.stats().files, 5);
}

#[test]
fn test_namespace_paths_and_sizes() {
    let temp = create_test_tree();
    let source = FsSource::scan(SourceConfig::new(temp.path())).unwrap();
    let files = source.list_entries(EntryKind::File).unwrap();

    let file3 = files
        .iter()
        .find(|f| f.path == "/dir1/subdir/file3.txt")
        .unwrap();
    assert_eq!(file3.size, 4);
    assert_eq!(file3.parent(), Some("/dir1/subdir"));
    assert!(file3.modified > 0);

    let zero = files.iter().find(|f| f.path == "/dir2/zero").unwrap();
    assert_eq!(zero.size, 0);
}

#[test]
fn test_directory_child_counts() {
    let temp = create_test_tree();
    let source = FsSource::scan(SourceConfig::new(temp.path())).unwrap();
    let dirs = source.list_entries(EntryKind::Directory).unwrap();

    let count = |path: &str| dirs.iter().find(|d| d.path == path).unwrap().child_count;
    assert_eq!(count("/"), 4);
    assert_eq!(count("/dir1"), 2);
    assert_eq!(count("/dir2"), 2);
    assert_eq!(count("/empty"), 0);
    assert!(dirs.iter().all(|d| d.quota.is_none()));
}

#[test]
fn test_ignore_prunes_subtree() {
    let temp = create_test_tree();
    let config = SourceConfig::builder()
        .root(temp.path())
        .ignore_patterns(vec!["dir1".to_string(), "*.txt".to_string()])
        .build()
        .unwrap();
    let source = FsSource::scan(config).unwrap();

    let files = source.list_entries(EntryKind::File).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, "/dir2/zero");

    let dirs = source.list_entries(EntryKind::Directory).unwrap();
    assert!(!dirs.iter().any(|d| d.path.starts_with("/dir1")));
}

#[test]
fn test_capacity_and_logins() {
    let temp = create_test_tree();
    let logins = temp.path().join("logins.json");
    fs::write(&logins, r#"{"alice": 1700000000000, "bob": 5}"#).unwrap();

    let source = FsSource::scan(SourceConfig::new(temp.path())).unwrap();
    assert!(matches!(
        source.total_capacity(),
        Err(SourceError::CapacityUnavailable { .. })
    ));
    assert!(source.last_login_times().unwrap().is_empty());

    let config = SourceConfig::builder()
        .root(temp.path())
        .capacity(Some(1_000_000u64))
        .logins_file(Some(logins))
        .build()
        .unwrap();
    let source = FsSource::scan(config).unwrap();
    assert_eq!(source.total_capacity().unwrap(), 1_000_000);
    assert_eq!(source.last_login_times().unwrap()["alice"], 1_700_000_000_000);
}

#[test]
fn test_missing_root() {
    let temp = TempDir::new().unwrap();
    let result = FsSource::scan(SourceConfig::new(temp.path().join("nope")));
    assert!(matches!(result, Err(SourceError::Io { .. })));
}

#[cfg(unix)]
#[test]
fn test_hardlinks_counted_once() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a"), vec![1u8; 8192]).unwrap();
    fs::hard_link(temp.path().join("a"), temp.path().join("b")).unwrap();

    let source = FsSource::scan(SourceConfig::new(temp.path())).unwrap();
    let files = source.list_entries(EntryKind::File).unwrap();
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|f| f.size == 8192));

    let total: u64 = files.iter().map(|f| f.diskspace).sum();
    let max = files.iter().map(|f| f.diskspace).max().unwrap();
    assert_eq!(total, max);
}
