//! Engine and metadata source configuration types.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration for the suggestions engine.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// File backing the persistent cache store (None = in-memory only).
    #[builder(default)]
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    /// JSON-lines file receiving one record per refresh (None = disabled).
    #[builder(default)]
    #[serde(default)]
    pub history_path: Option<PathBuf>,

    /// Path depth used by the top-directories histogram.
    #[builder(default = "3")]
    #[serde(default = "default_dir_depth")]
    pub dir_depth: usize,

    /// Number of directories kept by the top-directories histogram.
    #[builder(default = "1000")]
    #[serde(default = "default_dir_limit")]
    pub dir_limit: usize,

    /// Publish the persisted snapshot on start, before the first refresh.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub restore_snapshot: bool,
}

fn default_true() -> bool {
    true
}

fn default_dir_depth() -> usize {
    3
}

fn default_dir_limit() -> usize {
    1000
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.dir_depth == Some(0) {
            return Err("Directory histogram depth must be at least 1".to_string());
        }
        if self.dir_limit == Some(0) {
            return Err("Directory histogram limit must be at least 1".to_string());
        }
        if let Some(Some(ref path)) = self.store_path {
            if path.as_os_str().is_empty() {
                return Err("Store path cannot be empty".to_string());
            }
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Create a new engine config builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Create an in-memory config with default settings.
    pub fn in_memory() -> Self {
        Self {
            store_path: None,
            history_path: None,
            dir_depth: 3,
            dir_limit: 1000,
            restore_snapshot: true,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Configuration for the local filesystem metadata source.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct SourceConfig {
    /// Root path to read.
    pub root: PathBuf,

    /// Follow symbolic links.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Include hidden files (starting with .).
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// Glob patterns matched against entry names; matches are skipped.
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Number of threads for walking (0 = auto-detect).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,

    /// Total capacity reported to the engine. Unset means unavailable.
    #[builder(default)]
    #[serde(default)]
    pub capacity: Option<u64>,

    /// JSON file mapping users to their last login (ms since epoch).
    #[builder(default)]
    #[serde(default)]
    pub logins_file: Option<PathBuf>,
}

impl SourceConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref root) = self.root {
            if root.as_os_str().is_empty() {
                return Err("Root path cannot be empty".to_string());
            }
        } else {
            return Err("Root path is required".to_string());
        }
        Ok(())
    }
}

impl SourceConfig {
    /// Create a new source config builder.
    pub fn builder() -> SourceConfigBuilder {
        SourceConfigBuilder::default()
    }

    /// Create a simple config for reading a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_symlinks: false,
            include_hidden: true,
            ignore_patterns: Vec::new(),
            threads: 0,
            capacity: None,
            logins_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_builder() {
        let config = EngineConfig::builder()
            .store_path(Some(PathBuf::from("/var/lib/nsinsight/cache.json")))
            .dir_limit(50usize)
            .build()
            .unwrap();

        assert_eq!(config.dir_depth, 3);
        assert_eq!(config.dir_limit, 50);
        assert!(config.restore_snapshot);
        assert!(config.history_path.is_none());
    }

    #[test]
    fn test_engine_config_rejects_zero_depth() {
        let result = EngineConfig::builder().dir_depth(0usize).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_source_config_builder() {
        let config = SourceConfig::builder()
            .root("/home/user")
            .threads(4usize)
            .capacity(Some(1_000_000u64))
            .build()
            .unwrap();

        assert_eq!(config.root, PathBuf::from("/home/user"));
        assert_eq!(config.threads, 4);
        assert_eq!(config.capacity, Some(1_000_000));
    }

    #[test]
    fn test_source_config_requires_root() {
        assert!(SourceConfig::builder().build().is_err());
    }
}
