//! Metric names published in a snapshot.
//!
//! Names serialize in camelCase (`emptyFiles24hMem`, `dirCount`, ...) and the
//! same spelling is accepted when parsing query parameters.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};

/// Single-valued metrics covering the whole namespace.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ScalarMetric {
    TimeTaken,
    ReportTime,
    Capacity,
    Diskspace,
    Diskspace24h,
    NumFiles,
    NumFiles24h,
    NumDirs,
    TotalFiles,
    TotalDirs,
    EmptyFiles,
    EmptyDirs,
    TinyFiles,
    SmallFiles,
    MediumFiles,
    LargeFiles,
    EmptyFiles24h,
    EmptyDirs24h,
    TinyFiles24h,
    SmallFiles24h,
    EmptyFiles1yr,
    EmptyDirs1yr,
    TinyFiles1yr,
    SmallFiles1yr,
    EmptyFilesMem,
    EmptyDirsMem,
    TinyFilesMem,
    TinyFilesDs,
    SmallFilesMem,
    SmallFilesDs,
    EmptyFiles24hMem,
    EmptyDirs24hMem,
    TinyFiles24hMem,
    SmallFiles24hMem,
    TinyFiles24hDs,
    SmallFiles24hDs,
    OldFiles1yr,
    OldFiles1yrDs,
    OldFiles2yr,
    OldFiles2yrDs,
    NsQuotaCount,
    DsQuotaCount,
    NsQuotaThreshCount,
    DsQuotaThreshCount,
}

/// Metrics broken down by a group key (a user, a directory or a month).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum GroupedMetric {
    DiskspaceUsers,
    NumFilesUsers,
    NumDirsUsers,
    EmptyFilesUsers,
    EmptyDirsUsers,
    EmptyFilesMemUsers,
    EmptyDirsMemUsers,
    TinyFilesUsers,
    SmallFilesUsers,
    TinyFilesMemUsers,
    SmallFilesMemUsers,
    TinyFilesDsUsers,
    SmallFilesDsUsers,
    Diskspace24hUsers,
    NumFiles24hUsers,
    EmptyFiles24hUsers,
    EmptyDirs24hUsers,
    EmptyFiles24hMemUsers,
    EmptyDirs24hMemUsers,
    TinyFiles24hUsers,
    SmallFiles24hUsers,
    TinyFiles24hMemUsers,
    SmallFiles24hMemUsers,
    TinyFiles24hDsUsers,
    SmallFiles24hDsUsers,
    EmptyFiles1yrUsers,
    EmptyDirs1yrUsers,
    TinyFiles1yrUsers,
    SmallFiles1yrUsers,
    MediumFilesUsers,
    LargeFilesUsers,
    OldFiles1yrUsers,
    OldFiles1yrDsUsers,
    OldFiles2yrUsers,
    OldFiles2yrDsUsers,
    DirCount,
    DirDs,
    DirCount24h,
    DirDs24h,
    ModTimeCount,
    ModTimeDiskspace,
    NsQuotaCountsUsers,
    DsQuotaCountsUsers,
    NsQuotaThreshCountsUsers,
    DsQuotaThreshCountsUsers,
}

impl GroupedMetric {
    /// Per-user metrics paired with the scalar they override in a per-user
    /// suggestions view.
    pub const PER_USER: [(ScalarMetric, GroupedMetric); 39] = [
        (ScalarMetric::Diskspace, GroupedMetric::DiskspaceUsers),
        (ScalarMetric::Diskspace24h, GroupedMetric::Diskspace24hUsers),
        (ScalarMetric::NumFiles, GroupedMetric::NumFilesUsers),
        (ScalarMetric::NumFiles24h, GroupedMetric::NumFiles24hUsers),
        (ScalarMetric::NumDirs, GroupedMetric::NumDirsUsers),
        (ScalarMetric::EmptyFiles, GroupedMetric::EmptyFilesUsers),
        (ScalarMetric::EmptyFiles24h, GroupedMetric::EmptyFiles24hUsers),
        (ScalarMetric::EmptyFiles1yr, GroupedMetric::EmptyFiles1yrUsers),
        (ScalarMetric::EmptyFilesMem, GroupedMetric::EmptyFilesMemUsers),
        (ScalarMetric::EmptyFiles24hMem, GroupedMetric::EmptyFiles24hMemUsers),
        (ScalarMetric::EmptyDirs, GroupedMetric::EmptyDirsUsers),
        (ScalarMetric::EmptyDirs24h, GroupedMetric::EmptyDirs24hUsers),
        (ScalarMetric::EmptyDirs1yr, GroupedMetric::EmptyDirs1yrUsers),
        (ScalarMetric::EmptyDirsMem, GroupedMetric::EmptyDirsMemUsers),
        (ScalarMetric::EmptyDirs24hMem, GroupedMetric::EmptyDirs24hMemUsers),
        (ScalarMetric::TinyFiles, GroupedMetric::TinyFilesUsers),
        (ScalarMetric::TinyFiles24h, GroupedMetric::TinyFiles24hUsers),
        (ScalarMetric::TinyFiles1yr, GroupedMetric::TinyFiles1yrUsers),
        (ScalarMetric::TinyFilesMem, GroupedMetric::TinyFilesMemUsers),
        (ScalarMetric::TinyFiles24hMem, GroupedMetric::TinyFiles24hMemUsers),
        (ScalarMetric::TinyFilesDs, GroupedMetric::TinyFilesDsUsers),
        (ScalarMetric::TinyFiles24hDs, GroupedMetric::TinyFiles24hDsUsers),
        (ScalarMetric::SmallFiles, GroupedMetric::SmallFilesUsers),
        (ScalarMetric::SmallFiles24h, GroupedMetric::SmallFiles24hUsers),
        (ScalarMetric::SmallFiles1yr, GroupedMetric::SmallFiles1yrUsers),
        (ScalarMetric::SmallFilesMem, GroupedMetric::SmallFilesMemUsers),
        (ScalarMetric::SmallFiles24hMem, GroupedMetric::SmallFiles24hMemUsers),
        (ScalarMetric::SmallFilesDs, GroupedMetric::SmallFilesDsUsers),
        (ScalarMetric::SmallFiles24hDs, GroupedMetric::SmallFiles24hDsUsers),
        (ScalarMetric::MediumFiles, GroupedMetric::MediumFilesUsers),
        (ScalarMetric::LargeFiles, GroupedMetric::LargeFilesUsers),
        (ScalarMetric::OldFiles1yr, GroupedMetric::OldFiles1yrUsers),
        (ScalarMetric::OldFiles1yrDs, GroupedMetric::OldFiles1yrDsUsers),
        (ScalarMetric::OldFiles2yr, GroupedMetric::OldFiles2yrUsers),
        (ScalarMetric::OldFiles2yrDs, GroupedMetric::OldFiles2yrDsUsers),
        (ScalarMetric::NsQuotaCount, GroupedMetric::NsQuotaCountsUsers),
        (ScalarMetric::DsQuotaCount, GroupedMetric::DsQuotaCountsUsers),
        (ScalarMetric::NsQuotaThreshCount, GroupedMetric::NsQuotaThreshCountsUsers),
        (ScalarMetric::DsQuotaThreshCount, GroupedMetric::DsQuotaThreshCountsUsers),
    ];

    /// Check if this metric is keyed by user.
    pub fn is_per_user(&self) -> bool {
        !matches!(
            self,
            GroupedMetric::DirCount
                | GroupedMetric::DirDs
                | GroupedMetric::DirCount24h
                | GroupedMetric::DirDs24h
                | GroupedMetric::ModTimeCount
                | GroupedMetric::ModTimeDiskspace
        )
    }
}

/// Quota ratio selector for quota queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum QuotaMetric {
    /// Namespace (item count) quota.
    NsQuotaRatioUsed,
    /// Diskspace quota.
    DsQuotaRatioUsed,
}

/// Aggregated quantity for histogram queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum SumMetric {
    /// Number of entries.
    Count,
    /// Disk space consumed.
    DiskspaceConsumed,
}
