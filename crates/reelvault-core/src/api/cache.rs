//! Cache maintenance methods for MediaVault.

use crate::cache::{CacheEntry, CacheKind, CacheStats, EntryMetadata, EvictionReport, VerifyReport};
use crate::error::Result;
use crate::MediaVault;
use std::path::Path;

impl MediaVault {
    /// Current cache usage and budget.
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Drop index entries whose files are gone or changed, and delete files
    /// the index does not know about.
    pub async fn verify_cache(&self) -> Result<VerifyReport> {
        self.cache.verify().await
    }

    /// Run eviction now instead of waiting for the next insert.
    pub async fn evict_cache(&self) -> Result<EvictionReport> {
        self.cache.evict().await
    }

    /// Move a sample file into the cache as a demo asset.
    ///
    /// Demo assets compete for the same budget as imports and are evicted
    /// by the same rules.
    pub async fn add_demo_asset(&self, source: &Path) -> Result<CacheEntry> {
        self.cache
            .add_entry(CacheKind::DemoAsset, source, EntryMetadata::default())
            .await
    }
}
