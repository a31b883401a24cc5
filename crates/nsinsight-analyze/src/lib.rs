//! Aggregation algorithms for nsinsight.
//!
//! This crate turns a flat view of namespace entries into a [`Snapshot`]:
//!
//! - **Classification** - size buckets, age windows and quota pressure
//! - **Histograms** - parallel filter, sum and group-by primitives
//! - **Watch resolution** - common ancestors of watched directories
//! - **Pipeline** - one full aggregation pass
//!
//! # Running a pass
//!
//! ```rust,ignore
//! use std::collections::{BTreeMap, BTreeSet};
//! use nsinsight_analyze::{Pipeline, PipelineConfig, PipelineInput};
//!
//! let pipeline = Pipeline::new(PipelineConfig::default());
//! let snapshot = pipeline.run(PipelineInput {
//!     files: &files,
//!     dirs: &dirs,
//!     capacity: 0,
//!     watches: &BTreeSet::new(),
//!     logins: &BTreeMap::new(),
//! })?;
//!
//! println!("{} empty files", snapshot.scalar(ScalarMetric::EmptyFiles));
//! ```
//!
//! # Size buckets
//!
//! Files fall into exactly one of empty, tiny (up to 1 KiB), small (up to
//! 1 MiB), medium (up to 128 MiB) or large. The large bucket is never
//! filtered directly; it is the remainder after the other four.

pub mod classify;
pub mod histogram;
mod pipeline;
mod watch_tree;

pub use classify::{
    AgeWindow, Bucket, Classifier, QUOTA_THRESHOLD, SizeBucket, exceeds_quota, is_empty_dir,
};
pub use histogram::{Field, slice_to_bottom, slice_to_top, sorted_by_value};
pub use pipeline::{Pipeline, PipelineConfig, PipelineConfigBuilder, PipelineInput};
pub use watch_tree::{WatchTree, canonical_path};

// Re-export core types
pub use nsinsight_core::{Entry, Snapshot};
