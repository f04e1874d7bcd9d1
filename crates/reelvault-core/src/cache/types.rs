//! Cache entry and report types.

use crate::config::PathsConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What a cached file is for. Each kind lives in its own subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    Thumbnail,
    TempImport,
    DemoAsset,
}

impl CacheKind {
    pub const ALL: [CacheKind; 3] = [CacheKind::Thumbnail, CacheKind::TempImport, CacheKind::DemoAsset];

    pub fn dir_name(&self) -> &'static str {
        match self {
            CacheKind::Thumbnail => PathsConfig::THUMBNAILS_DIR_NAME,
            CacheKind::TempImport => PathsConfig::IMPORTS_DIR_NAME,
            CacheKind::DemoAsset => PathsConfig::DEMO_DIR_NAME,
        }
    }
}

impl std::fmt::Display for CacheKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKind::Thumbnail => write!(f, "thumbnail"),
            CacheKind::TempImport => write!(f, "temp_import"),
            CacheKind::DemoAsset => write!(f, "demo_asset"),
        }
    }
}

/// A file tracked by the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheEntry {
    /// Location of the file inside the cache directory.
    pub path: PathBuf,
    /// Size recorded when the file was added.
    pub size_bytes: u64,
    /// When the file entered the cache. Drives age eviction.
    pub created_at: DateTime<Utc>,
    /// Last recorded access.
    pub last_accessed_at: DateTime<Utc>,
    /// Number of recorded accesses. Drives frequency eviction.
    pub access_count: u64,
    pub kind: CacheKind,
    /// Asset that owns this file, if any.
    #[serde(default)]
    pub asset_id: Option<String>,
}

/// Extra information supplied with a new entry.
#[derive(Debug, Clone, Default)]
pub struct EntryMetadata {
    /// Owning asset.
    pub asset_id: Option<String>,
    /// File name to use inside the cache. Defaults to the source file name.
    pub file_name: Option<String>,
}

impl EntryMetadata {
    pub fn for_asset(asset_id: impl Into<String>) -> Self {
        Self {
            asset_id: Some(asset_id.into()),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }
}

/// Cache usage summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheStats {
    /// Sum of indexed entry sizes.
    pub total_bytes: u64,
    pub entry_count: usize,
    pub max_total_size: u64,
    /// Indexed bytes per kind.
    pub bytes_by_kind: Vec<(CacheKind, u64)>,
    /// Bytes on disk under the kind directories that no entry accounts for.
    pub untracked_bytes: u64,
}

/// What an eviction pass removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EvictionReport {
    /// Entries removed for exceeding the maximum age.
    pub expired: Vec<PathBuf>,
    /// Entries removed to get under the size budget.
    pub evicted: Vec<PathBuf>,
    pub freed_bytes: u64,
    pub total_bytes_after: u64,
}

impl EvictionReport {
    pub fn removed_count(&self) -> usize {
        self.expired.len() + self.evicted.len()
    }
}

/// What an integrity check found.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VerifyReport {
    pub checked: usize,
    /// Entries dropped because their file is missing or changed size.
    pub pruned: Vec<PathBuf>,
    /// Files deleted because no entry referenced them.
    pub orphans_removed: Vec<PathBuf>,
}

/// On-disk form of the index.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct CacheIndex {
    pub version: u32,
    pub entries: Vec<CacheEntry>,
}

impl CacheIndex {
    pub const VERSION: u32 = 1;
}
