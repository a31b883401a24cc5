//! Core types and traits for nsinsight.
//!
//! This crate provides the fundamental data structures shared by the
//! workspace: namespace entries, metric names, published snapshots,
//! configuration and the metadata source abstraction.

mod config;
mod entry;
mod error;
mod metrics;
mod snapshot;
mod source;

pub use config::{EngineConfig, EngineConfigBuilder, SourceConfig, SourceConfigBuilder};
pub use entry::{Entry, EntryKind, QuotaUsage};
pub use error::{QueryError, RefreshError, SourceError, StoreError, WatchError};
pub use metrics::{GroupedMetric, QuotaMetric, ScalarMetric, SumMetric};
pub use snapshot::{Snapshot, WatchedDirStats};
pub use source::{MemorySource, MetadataSource};
