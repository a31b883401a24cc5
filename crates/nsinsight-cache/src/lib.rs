//! Snapshot publication and queries for nsinsight.
//!
//! - [`SuggestionsEngine`] runs refresh passes and owns long-lived state
//! - [`SnapshotCell`] serves the latest snapshot behind an atomic swap
//! - [`Suggestions`] answers read queries from one snapshot handle
//! - [`WatchSet`] holds the directories that receive exact aggregates
//! - [`CacheStore`] persists state across restarts
//! - [`HistoryWriter`] records every published snapshot
//!
//! ```rust,ignore
//! use nsinsight_cache::SuggestionsEngine;
//! use nsinsight_core::{EngineConfig, MemorySource};
//!
//! let engine = SuggestionsEngine::start(EngineConfig::default())?;
//! engine.add_watch("/user/alice")?;
//! engine.refresh(&source)?;
//!
//! let issues = engine.query().top_issues(10, false);
//! ```

mod engine;
mod history;
mod publisher;
mod query;
mod store;
mod watch;

pub use engine::{LOGINS_KEY, SuggestionsEngine, WATCHES_KEY};
pub use history::{HistoryRecord, HistoryWriter, JsonlHistoryWriter};
pub use publisher::{EngineState, SnapshotCell};
pub use query::{ISSUES, LAST_LOGIN, QuotaView, Suggestions, UsersOrSuggestion};
pub use store::{CacheStore, SharedMap, SharedMapOfMaps, SharedSet};
pub use watch::{WatchSet, normalize};
