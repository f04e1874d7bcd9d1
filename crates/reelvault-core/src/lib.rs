//! ReelVault Core - Headless library for local media import, caching and upload.
//!
//! Imported videos are deduplicated by content signature, validated against
//! format, size, orientation, codec and duration limits, given a thumbnail
//! and moved into a bounded on-disk cache. A persisted asset can then be
//! uploaded to remote storage, one transfer at a time.
//!
//! # Example
//!
//! ```rust,ignore
//! use reelvault_core::{MediaDescriptor, MediaVault};
//!
//! #[tokio::main]
//! async fn main() -> reelvault_core::Result<()> {
//!     let vault = MediaVault::builder("/path/to/vault")
//!         .auto_create_dirs(true)
//!         .build()
//!         .await?;
//!
//!     let asset = vault.import(MediaDescriptor::from_path("clip.mp4")).await?;
//!     let task = vault.upload(&asset.id)?.wait().await?;
//!     println!("Uploaded to {:?}", task.remote_url);
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod import;
pub mod media;
pub mod retry;
pub mod signature;
pub mod store;
pub mod upload;
pub mod validation;

mod api;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use cache::{CacheEntry, CacheKind, CacheManager, CacheStats, EvictionReport, VerifyReport};
pub use cancel::CancellationToken;
pub use config::VaultConfig;
pub use error::{ErrorCode, Result, UploadErrorClass, VaultError};
pub use import::{Asset, AssetRegistry, AssetStatus, ImportOrchestrator};
pub use media::{FfmpegThumbnailer, FfprobeProbe, MediaProbe, MediaSpecs, ThumbnailExtractor};
pub use signature::{ContentSignature, FileSignatureService};
pub use upload::{
    LocalObjectStore, RemoteStorage, UploadCoordinator, UploadHandle, UploadState, UploadTask,
};
pub use validation::{MediaDescriptor, ValidationPipeline, ValidationReport};

pub use api::MediaVaultBuilder;

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Main entry point.
///
/// Owns one instance of each component, wired together over a shared
/// metadata store under the vault root:
///
/// - `metadata/` - cache index and asset registry
/// - `cache/` - thumbnails, imported copies, demo assets, staging
/// - `remote/` - default upload target when no remote storage is injected
/// - `config.json` - optional [`VaultConfig`] overrides
pub struct MediaVault {
    root: PathBuf,
    config: VaultConfig,
    cache: Arc<CacheManager>,
    registry: Arc<AssetRegistry>,
    validation: Arc<ValidationPipeline>,
    importer: ImportOrchestrator,
    uploads: UploadCoordinator,
}

impl MediaVault {
    /// Create a builder for MediaVault.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let vault = MediaVault::builder("./vault")
    ///     .auto_create_dirs(true)
    ///     .with_remote_storage(storage)
    ///     .build()
    ///     .await?;
    /// ```
    pub fn builder(root: impl Into<PathBuf>) -> MediaVaultBuilder {
        MediaVaultBuilder::new(root)
    }

    /// Open an existing vault with default collaborators.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        MediaVaultBuilder::new(root).build().await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Effective configuration.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<AssetRegistry> {
        &self.registry
    }

    pub fn validation(&self) -> &Arc<ValidationPipeline> {
        &self.validation
    }
}
