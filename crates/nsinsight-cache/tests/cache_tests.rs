use nsinsight_analyze::histogram::is_under;
use nsinsight_cache::{EngineState, JsonlHistoryWriter, QuotaView, SuggestionsEngine};
use nsinsight_core::{
    EngineConfig, Entry, GroupedMetric, MemorySource, QuotaUsage, RefreshError, ScalarMetric,
    WatchError,
};
use std::path::Path;
use tempfile::TempDir;

const HOUR: i64 = 60 * 60 * 1000;

fn now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn source() -> MemorySource {
    let t = now() - HOUR;
    MemorySource::new(vec![
        Entry::file("/user/a/empty", "a", 0).with_times(t, t),
        Entry::file("/user/a/tiny", "a", 500).with_times(t, t),
        Entry::file("/user/a/mid", "a", 2_000_000).with_times(t, t),
        Entry::file("/user/b/logs/x.log", "b", 10).with_times(t, t),
        Entry::file("/tmp/scratch", "b", 0).with_times(t, t),
        Entry::directory("/user", "root", 2),
        Entry::directory("/user/a", "a", 3).with_quota(QuotaUsage::new(Some(86), Some(85))),
        Entry::directory("/user/b", "b", 1).with_quota(QuotaUsage::new(Some(40), Some(99))),
        Entry::directory("/user/b/old", "b", 0),
    ])
    .with_capacity(1 << 30)
    .with_login("a", 1_000)
    .with_login("b", 2_000)
}

fn persistent(dir: &Path) -> EngineConfig {
    EngineConfig::builder()
        .store_path(dir.join("cache.json"))
        .history_path(dir.join("history.jsonl"))
        .build()
        .unwrap()
}

#[test]
fn test_queries_before_first_refresh() {
    let engine = SuggestionsEngine::in_memory();
    let q = engine.query();

    assert_eq!(engine.state(), EngineState::Empty);
    assert!(q.suggestions_for_user(None).is_empty());
    assert!(q.directory_metrics(None, "count").unwrap().is_empty());
    assert!(q.top_issues(5, true).is_empty());
    assert!(q.quota_ratios(None, "bogus").is_err());
}

#[test]
fn test_end_to_end_suggestions() {
    let engine = SuggestionsEngine::in_memory();
    engine.refresh(&source()).unwrap();
    let q = engine.query();

    let a = q.suggestions_for_user(Some("a"));
    assert_eq!(a["emptyFiles"], 1);
    assert_eq!(a["tinyFiles"], 1);
    assert_eq!(a["mediumFiles"], 1);
    assert_eq!(a["largeFiles"], 0);
    assert_eq!(a["lastLogin"], 1_000);

    let all = q.suggestions_for_user(None);
    assert_eq!(all["emptyFiles"], 2);
    assert_eq!(all["numFiles"], 5);
    assert_eq!(all["capacity"], 1 << 30);
    assert_eq!(all["emptyDirs"], 1);
}

#[test]
fn test_quota_pressure() {
    let engine = SuggestionsEngine::in_memory();
    let snapshot = engine.refresh(&source()).unwrap();

    assert_eq!(snapshot.scalar(ScalarMetric::NsQuotaThreshCount), 1);
    assert_eq!(snapshot.scalar(ScalarMetric::DsQuotaThreshCount), 1);
    assert_eq!(
        snapshot.grouped_value(GroupedMetric::DsQuotaThreshCountsUsers, "a"),
        0
    );

    let QuotaView::User(ratios) = engine
        .query()
        .quota_ratios(Some("b"), "dsQuotaRatioUsed")
        .unwrap()
    else {
        panic!("expected per-user view");
    };
    assert_eq!(ratios["/user/b"], 99);
}

#[test]
fn test_watches_feed_directory_metrics() {
    let engine = SuggestionsEngine::in_memory();
    engine.add_watch("/user/b/").unwrap();
    engine.add_watch("/user").unwrap();
    assert_eq!(
        engine.add_watch("/user"),
        Err(WatchError::AlreadyWatched {
            path: "/user".to_string()
        })
    );
    assert_eq!(engine.resolve_common_ancestors(), vec!["/user"]);

    engine.refresh(&source()).unwrap();
    let q = engine.query();
    assert_eq!(q.directory_metrics(Some("/user"), "count").unwrap()["/user"], Some(4));
    assert_eq!(
        q.directory_metrics(Some("/user/b"), "diskspaceConsumed").unwrap()["/user/b"],
        Some(10)
    );

    engine.remove_watch("/user/b").unwrap();
    assert!(matches!(
        engine.remove_watch("/user/b"),
        Err(WatchError::NotWatched { .. })
    ));
}

#[test]
fn test_watch_with_repeated_separators_is_aggregated() {
    let engine = SuggestionsEngine::in_memory();
    assert_eq!(engine.add_watch("/a//b").unwrap(), "/a/b");

    let watches = engine.current_watches();
    let ancestors = engine.resolve_common_ancestors();
    for watch in &watches {
        let covering = ancestors.iter().filter(|a| is_under(watch, a)).count();
        assert_eq!(covering, 1, "{watch} covered by {ancestors:?}");
    }

    let source = MemorySource::new(vec![Entry::file("/a/b/x", "a", 10).with_diskspace(30)]);
    let snapshot = engine.refresh(&source).unwrap();
    assert_eq!(snapshot.watched["/a/b"].count, 1);
    assert_eq!(snapshot.watched["/a/b"].diskspace, 30);

    let q = engine.query();
    assert_eq!(q.directory_metrics(Some("/a//b"), "count").unwrap()["/a/b"], Some(1));
    assert_eq!(
        q.directory_metrics(Some("/a/b/"), "diskspaceConsumed").unwrap()["/a/b"],
        Some(30)
    );
}

#[test]
fn test_queries_are_idempotent() {
    let engine = SuggestionsEngine::in_memory();
    engine.refresh(&source()).unwrap();

    let first = engine.query();
    let second = engine.query();
    assert_eq!(first.top_issues(3, false), second.top_issues(3, false));
    assert_eq!(
        first.suggestions_for_user(Some("b")),
        second.suggestions_for_user(Some("b"))
    );
    assert_eq!(first.last_logins(), second.last_logins());
}

#[test]
fn test_refresh_after_cancel_still_runs() {
    let engine = SuggestionsEngine::in_memory();
    engine.cancel();
    // A new pass gets a fresh token.
    assert!(engine.refresh(&source()).is_ok());
}

#[test]
fn test_state_survives_restart() {
    let temp = TempDir::new().unwrap();

    {
        let engine = SuggestionsEngine::start(persistent(temp.path())).unwrap();
        engine.add_watch("/user/a").unwrap();
        engine.refresh(&source()).unwrap();
        engine.stop().unwrap();
    }

    let engine = SuggestionsEngine::start(persistent(temp.path())).unwrap();
    assert_eq!(engine.state(), EngineState::Ready);
    assert!(engine.current_watches().contains("/user/a"));
    assert_eq!(engine.query().last_logins()["b"], 2_000);

    let history = JsonlHistoryWriter::new(temp.path().join("history.jsonl"))
        .read_all()
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].scalars[&ScalarMetric::NumFiles], 5);
}

#[test]
fn test_restore_can_be_disabled() {
    let temp = TempDir::new().unwrap();
    {
        let engine = SuggestionsEngine::start(persistent(temp.path())).unwrap();
        engine.refresh(&source()).unwrap();
        engine.stop().unwrap();
    }

    let mut config = persistent(temp.path());
    config.restore_snapshot = false;
    let engine = SuggestionsEngine::start(config).unwrap();
    assert_eq!(engine.state(), EngineState::Empty);
}

#[test]
fn test_logins_merge_across_refreshes() {
    let engine = SuggestionsEngine::in_memory();
    engine.refresh(&source()).unwrap();
    engine
        .refresh(&MemorySource::new(Vec::new()).with_login("c", 3_000))
        .unwrap();

    let logins = engine.query().last_logins();
    let users: Vec<_> = logins.keys().cloned().collect();
    assert_eq!(users, vec!["c", "b", "a"]);
}

#[test]
fn test_cancelled_error_variant() {
    let err = RefreshError::Cancelled;
    assert_eq!(err.to_string(), "Refresh cancelled");
}
