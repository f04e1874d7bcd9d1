//! Bounded on-disk cache for thumbnails, imported copies and demo assets.

mod manager;
mod types;

pub use manager::{CacheManager, ReleaseListener};
pub use types::{CacheEntry, CacheKind, CacheStats, EntryMetadata, EvictionReport, VerifyReport};
