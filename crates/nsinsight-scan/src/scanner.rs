//! JWalk-based metadata source over a local directory tree.

use std::collections::HashMap;
use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use compact_str::CompactString;
use globset::{Glob, GlobSet, GlobSetBuilder};
use jwalk::{Parallelism, WalkDir};
use tracing::{debug, warn};

use nsinsight_core::{Entry, EntryKind, MetadataSource, SourceConfig, SourceError};

use crate::inode::{InodeKey, InodeTracker};
use crate::progress::WalkStats;

/// Estimated in-memory footprint of one namespace entry, in bytes.
pub const ENTRY_MEMORY_ESTIMATE: u64 = 150;

/// Metadata source backed by a one-time walk of a local directory.
///
/// Entry paths are namespace paths relative to the walked root, so the root
/// itself is `/` and `<root>/a/b` is `/a/b`.
#[derive(Debug)]
pub struct FsSource {
    config: SourceConfig,
    files: Vec<Entry>,
    dirs: Vec<Entry>,
    stats: WalkStats,
}

impl FsSource {
    /// Walk `config.root` and capture every file and directory.
    pub fn scan(config: SourceConfig) -> Result<Self, SourceError> {
        let root = config
            .root
            .canonicalize()
            .map_err(|e| SourceError::io(&config.root, e))?;
        if !root.is_dir() {
            return Err(SourceError::Other {
                message: format!("{} is not a directory", root.display()),
            });
        }

        let ignore = build_ignore(&config.ignore_patterns)?;
        let walk = walk(&config, &root, &ignore);
        walk.stats.report(&root.to_string_lossy());

        Ok(Self {
            config,
            files: walk.files,
            dirs: walk.dirs,
            stats: walk.stats,
        })
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Counters from the walk.
    pub fn stats(&self) -> &WalkStats {
        &self.stats
    }
}

impl MetadataSource for FsSource {
    fn list_entries(&self, kind: EntryKind) -> Result<Vec<Entry>, SourceError> {
        Ok(match kind {
            EntryKind::File => self.files.clone(),
            EntryKind::Directory => self.dirs.clone(),
        })
    }

    fn last_login_times(&self) -> Result<HashMap<String, i64>, SourceError> {
        let Some(path) = &self.config.logins_file else {
            return Ok(HashMap::new());
        };
        let contents = std::fs::read_to_string(path).map_err(|e| SourceError::io(path, e))?;
        serde_json::from_str(&contents).map_err(|e| SourceError::Other {
            message: format!("invalid logins file {}: {e}", path.display()),
        })
    }

    fn total_capacity(&self) -> Result<u64, SourceError> {
        self.config
            .capacity
            .ok_or_else(|| SourceError::CapacityUnavailable {
                message: "no capacity configured for local source".to_string(),
            })
    }
}

struct Walk {
    files: Vec<Entry>,
    dirs: Vec<Entry>,
    stats: WalkStats,
}

fn build_ignore(patterns: &[String]) -> Result<GlobSet, SourceError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| SourceError::Other {
            message: format!("invalid ignore pattern {pattern}: {e}"),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| SourceError::Other {
        message: e.to_string(),
    })
}

fn walk(config: &SourceConfig, root: &Path, ignore: &GlobSet) -> Walk {
    let parallelism = match config.threads {
        0 => Parallelism::RayonDefaultPool {
            busy_timeout: std::time::Duration::from_millis(100),
        },
        n => Parallelism::RayonNewPool(n),
    };

    let walker = WalkDir::new(root)
        .parallelism(parallelism)
        .skip_hidden(!config.include_hidden)
        .follow_links(config.follow_symlinks)
        .min_depth(0);

    let tracker = InodeTracker::new();
    let mut stats = WalkStats::new();
    let mut files = Vec::new();
    let mut dirs: Vec<(PathBuf, Entry)> = Vec::new();
    let mut child_counts: HashMap<PathBuf, u64> = HashMap::new();

    for entry_result in walker {
        let entry = match entry_result {
            Ok(e) => e,
            Err(err) => {
                warn!(error = %err, "Failed to read directory entry");
                stats.record_error();
                continue;
            }
        };

        let path = entry.path();
        let Ok(relative) = path.strip_prefix(root) else {
            stats.record_skip();
            continue;
        };
        if is_ignored(relative, ignore) {
            stats.record_skip();
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to read metadata");
                stats.record_error();
                continue;
            }
        };

        let file_type = metadata.file_type();
        if !file_type.is_dir() && !file_type.is_file() {
            stats.record_skip();
            continue;
        }
        if let Some(parent) = path.parent().filter(|_| entry.depth() > 0) {
            *child_counts.entry(parent.to_path_buf()).or_insert(0) += 1;
        }

        let ns_path = namespace_path(relative);
        let owner = owner_of(&metadata);
        let modified = millis(metadata.modified());
        let accessed = millis(metadata.accessed());

        if file_type.is_dir() {
            stats.record_dir();
            let dir = Entry::directory(ns_path, owner, 0)
                .with_times(modified, accessed)
                .with_memory(ENTRY_MEMORY_ESTIMATE);
            dirs.push((path, dir));
        } else {
            let size = metadata.len();
            stats.record_file(size);

            let key = InodeKey::new(get_ino(&metadata), get_dev(&metadata));
            let diskspace = if get_nlink(&metadata) > 1 && !tracker.track(key) {
                0 // Already counted this inode
            } else {
                get_blocks(&metadata) * 512
            };

            files.push(
                Entry::file(ns_path, owner, size)
                    .with_diskspace(diskspace)
                    .with_times(modified, accessed)
                    .with_memory(ENTRY_MEMORY_ESTIMATE),
            );
        }
    }

    let dirs = dirs
        .into_iter()
        .map(|(path, mut dir)| {
            dir.child_count = child_counts.get(&path).copied().unwrap_or(0);
            dir
        })
        .collect();

    debug!(hardlinked = tracker.len(), "Tracked multiply-linked inodes");
    Walk { files, dirs, stats }
}

/// Check whether any component of a root-relative path matches an ignore
/// pattern, so that everything beneath an ignored directory is skipped too.
fn is_ignored(relative: &Path, ignore: &GlobSet) -> bool {
    !ignore.is_empty()
        && relative.components().any(|c| match c {
            Component::Normal(name) => ignore.is_match(Path::new(name)),
            _ => false,
        })
}

/// Namespace path of a root-relative path.
fn namespace_path(relative: &Path) -> CompactString {
    let mut path = CompactString::new("");
    for component in relative.components() {
        if let Component::Normal(name) = component {
            path.push('/');
            path.push_str(&name.to_string_lossy());
        }
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

fn millis(time: std::io::Result<SystemTime>) -> i64 {
    time.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

// Cross-platform metadata helpers

/// Owning user, as a numeric uid.
#[cfg(unix)]
fn owner_of(metadata: &Metadata) -> CompactString {
    compact_str::format_compact!("{}", metadata.uid())
}

#[cfg(not(unix))]
fn owner_of(_metadata: &Metadata) -> CompactString {
    CompactString::new("unknown")
}

#[cfg(unix)]
fn get_dev(metadata: &Metadata) -> u64 {
    metadata.dev()
}

#[cfg(not(unix))]
fn get_dev(_metadata: &Metadata) -> u64 {
    0
}

#[cfg(unix)]
fn get_ino(metadata: &Metadata) -> u64 {
    metadata.ino()
}

#[cfg(not(unix))]
fn get_ino(_metadata: &Metadata) -> u64 {
    0
}

#[cfg(unix)]
fn get_nlink(metadata: &Metadata) -> u64 {
    metadata.nlink()
}

#[cfg(not(unix))]
fn get_nlink(_metadata: &Metadata) -> u64 {
    1
}

/// Get the number of 512-byte blocks from metadata.
#[cfg(unix)]
fn get_blocks(metadata: &Metadata) -> u64 {
    metadata.blocks()
}

#[cfg(not(unix))]
fn get_blocks(metadata: &Metadata) -> u64 {
    metadata.len().div_ceil(512)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_path() {
        assert_eq!(namespace_path(Path::new("")), "/");
        assert_eq!(namespace_path(Path::new("a")), "/a");
        assert_eq!(namespace_path(Path::new("a/b/c.txt")), "/a/b/c.txt");
    }

    #[test]
    fn test_ignore_matches_any_component() {
        let ignore = build_ignore(&["node_modules".to_string(), "*.log".to_string()]).unwrap();
        assert!(is_ignored(Path::new("node_modules"), &ignore));
        assert!(is_ignored(Path::new("web/node_modules/x/y.js"), &ignore));
        assert!(is_ignored(Path::new("var/app.log"), &ignore));
        assert!(!is_ignored(Path::new("src/main.rs"), &ignore));

        let none = build_ignore(&[]).unwrap();
        assert!(!is_ignored(Path::new("anything"), &none));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(build_ignore(&["a[".to_string()]).is_err());
    }

    #[test]
    fn test_millis() {
        assert_eq!(millis(Ok(UNIX_EPOCH)), 0);
        assert_eq!(
            millis(Ok(UNIX_EPOCH + std::time::Duration::from_millis(1_500))),
            1_500
        );
        assert_eq!(millis(Err(std::io::Error::other("no time"))), 0);
    }
}
