//! Local filesystem metadata source for nsinsight.
//!
//! [`FsSource`] walks a directory tree in parallel with jwalk and exposes it
//! as a [`MetadataSource`], so the engine can aggregate over a real
//! directory tree:
//!
//! - **Parallel traversal** via jwalk/rayon
//! - **Hardlink detection** so disk space is counted once per inode
//! - **Ignore globs** that prune whole subtrees
//!
//! # Example
//!
//! ```rust,no_run
//! use nsinsight_scan::{FsSource, SourceConfig};
//! use nsinsight_core::{EntryKind, MetadataSource};
//!
//! let source = FsSource::scan(SourceConfig::new("/path/to/scan")).unwrap();
//! let files = source.list_entries(EntryKind::File).unwrap();
//! println!("{} files", files.len());
//! ```

mod inode;
mod progress;
mod scanner;

pub use inode::{InodeKey, InodeTracker};
pub use progress::WalkStats;
pub use scanner::{ENTRY_MEMORY_ESTIMATE, FsSource};

// Re-export core types for convenience
pub use nsinsight_core::{MetadataSource, SourceConfig, SourceError};
