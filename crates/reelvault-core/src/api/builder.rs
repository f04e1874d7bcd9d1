//! Builder for configuring MediaVault initialization.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use crate::cache::{CacheEntry, CacheManager};
use crate::config::{PathsConfig, VaultConfig};
use crate::error::{IoResultExt, Result, VaultError};
use crate::import::{AssetRegistry, ImportOrchestrator};
use crate::media::{FfmpegThumbnailer, FfprobeProbe, MediaProbe, ThumbnailExtractor};
use crate::retry::{Clock, TokioClock};
use crate::store::{FileStore, KeyValueStore};
use crate::upload::{LocalObjectStore, RemoteStorage, UploadCoordinator};
use crate::validation::{QuickCheck, ValidationPipeline};
use crate::MediaVault;

/// Builder for configuring MediaVault initialization.
///
/// Every collaborator has a default: `ffprobe`/`ffmpeg` from `PATH`, a
/// [`LocalObjectStore`] under `remote/`, a [`FileStore`] under `metadata/`
/// and the tokio clock.
///
/// # Example
///
/// ```rust,ignore
/// use reelvault_core::MediaVault;
///
/// let vault = MediaVault::builder("./vault")
///     .auto_create_dirs(true)
///     .with_probe(Arc::new(my_probe))
///     .build()
///     .await?;
/// ```
pub struct MediaVaultBuilder {
    root: PathBuf,
    auto_create_dirs: bool,
    config: Option<VaultConfig>,
    store: Option<Arc<dyn KeyValueStore>>,
    probe: Option<Arc<dyn MediaProbe>>,
    thumbnails: Option<Arc<dyn ThumbnailExtractor>>,
    storage: Option<Arc<dyn RemoteStorage>>,
    clock: Option<Arc<dyn Clock>>,
    quick_checks: Vec<Arc<dyn QuickCheck>>,
}

impl MediaVaultBuilder {
    /// Create a new builder with the vault root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            auto_create_dirs: false,
            config: None,
            store: None,
            probe: None,
            thumbnails: None,
            storage: None,
            clock: None,
            quick_checks: Vec::new(),
        }
    }

    /// Create the root and its subdirectories if they don't exist.
    ///
    /// Default: `false` (the root must exist)
    pub fn auto_create_dirs(mut self, enable: bool) -> Self {
        self.auto_create_dirs = enable;
        self
    }

    /// Use this configuration instead of reading `config.json`.
    pub fn with_config(mut self, config: VaultConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Store for the cache index and asset registry.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn MediaProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_thumbnailer(mut self, thumbnails: Arc<dyn ThumbnailExtractor>) -> Self {
        self.thumbnails = Some(thumbnails);
        self
    }

    pub fn with_remote_storage(mut self, storage: Arc<dyn RemoteStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Clock used for retry backoff.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Extra check run at the end of quick validation.
    pub fn with_quick_check(mut self, check: Arc<dyn QuickCheck>) -> Self {
        self.quick_checks.push(check);
        self
    }

    fn create_directory_structure(root: &Path) -> Result<()> {
        let dirs = [
            root.to_path_buf(),
            root.join(PathsConfig::METADATA_DIR_NAME),
            root.join(PathsConfig::CACHE_DIR_NAME),
            root.join(PathsConfig::REMOTE_DIR_NAME),
        ];

        for dir in &dirs {
            if !dir.exists() {
                std::fs::create_dir_all(dir).with_path(dir)?;
            }
        }

        Ok(())
    }

    /// Build the MediaVault instance.
    ///
    /// Opening the cache verifies it against the disk; a corrupted index is
    /// wiped and rebuilt empty. Assets left mid-import or mid-upload by a
    /// previous process are repaired before the vault is returned.
    pub async fn build(self) -> Result<MediaVault> {
        if self.auto_create_dirs {
            Self::create_directory_structure(&self.root)?;
        } else if !self.root.exists() {
            return Err(VaultError::Config {
                message: format!("Vault root does not exist: {}", self.root.display()),
            });
        }

        let config = match self.config {
            Some(config) => {
                config.validate()?;
                config
            }
            None => VaultConfig::load(&self.root.join(PathsConfig::CONFIG_FILE_NAME))?,
        };

        let store: Arc<dyn KeyValueStore> = match self.store {
            Some(store) => store,
            None => Arc::new(FileStore::new(self.root.join(PathsConfig::METADATA_DIR_NAME))?),
        };

        let cache = Arc::new(
            CacheManager::open(
                self.root.join(PathsConfig::CACHE_DIR_NAME),
                Arc::clone(&store),
                config.cache.clone(),
            )
            .await?,
        );
        let registry = Arc::new(AssetRegistry::load(store)?);
        link_cache_to_registry(&cache, &registry).await?;

        let probe = self
            .probe
            .unwrap_or_else(|| Arc::new(FfprobeProbe::default()));
        let validation = self
            .quick_checks
            .into_iter()
            .fold(
                ValidationPipeline::new(config.validation.clone(), probe),
                ValidationPipeline::with_quick_check,
            );
        let validation = Arc::new(validation);

        let thumbnails = self
            .thumbnails
            .unwrap_or_else(|| Arc::new(FfmpegThumbnailer::default()));
        let importer = ImportOrchestrator::new(
            Arc::clone(&validation),
            Arc::clone(&cache),
            Arc::clone(&registry),
            thumbnails,
            config.import.clone(),
        );

        let storage: Arc<dyn RemoteStorage> = match self.storage {
            Some(storage) => storage,
            None => Arc::new(LocalObjectStore::new(
                self.root.join(PathsConfig::REMOTE_DIR_NAME),
            )?),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(TokioClock));
        let uploads = UploadCoordinator::new(
            storage,
            Arc::clone(&registry),
            Arc::clone(&cache),
            clock,
            config.upload.clone(),
        );

        tracing::info!(
            "Opened media vault at {} ({} assets)",
            self.root.display(),
            registry.list().len()
        );

        Ok(MediaVault {
            root: self.root,
            config,
            cache,
            registry,
            validation,
            importer,
            uploads,
        })
    }
}

/// Keep asset records in step with cache files the cache drops on its own.
async fn link_cache_to_registry(cache: &CacheManager, registry: &Arc<AssetRegistry>) -> Result<()> {
    let tracked: HashSet<PathBuf> = cache.entries().await.into_iter().map(|e| e.path).collect();
    registry.release_untracked(&tracked)?;

    let registry = Arc::clone(registry);
    cache.on_release(Arc::new(move |entry: &CacheEntry| {
        let Some(asset_id) = entry.asset_id.as_deref() else {
            return;
        };
        if let Err(e) = registry.release_cached(asset_id, &entry.path) {
            warn!(
                "Could not update asset {} after dropping {}: {}",
                asset_id,
                entry.path.display(),
                e
            );
        }
    }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_support::{portrait_specs, FakeProbe, FakeThumbnailer};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_root_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let result = MediaVaultBuilder::new(temp_dir.path().join("absent"))
            .build()
            .await;
        assert!(matches!(result, Err(VaultError::Config { .. })));
    }

    #[tokio::test]
    async fn test_auto_create_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("vault");

        let vault = MediaVaultBuilder::new(&root)
            .auto_create_dirs(true)
            .with_probe(Arc::new(FakeProbe::new(portrait_specs())))
            .with_thumbnailer(Arc::new(FakeThumbnailer::new(8)))
            .build()
            .await
            .unwrap();

        assert_eq!(vault.root(), root.as_path());
        assert!(root.join(PathsConfig::METADATA_DIR_NAME).is_dir());
        assert!(root.join(PathsConfig::CACHE_DIR_NAME).is_dir());
        assert!(root.join(PathsConfig::REMOTE_DIR_NAME).is_dir());
    }

    #[tokio::test]
    async fn test_config_file_is_loaded() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(PathsConfig::CONFIG_FILE_NAME),
            r#"{"cache": {"max_total_size": 4096}}"#,
        )
        .unwrap();

        let vault = MediaVaultBuilder::new(temp_dir.path())
            .with_store(Arc::new(MemoryStore::new()))
            .build()
            .await
            .unwrap();

        assert_eq!(vault.config().cache.max_total_size, 4096);
        assert_eq!(vault.cache_stats().await.max_total_size, 4096);
    }

    #[tokio::test]
    async fn test_invalid_injected_config_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = VaultConfig::default();
        config.upload.chunk_size = 0;

        let result = MediaVaultBuilder::new(temp_dir.path())
            .with_config(config)
            .build()
            .await;
        assert!(matches!(result, Err(VaultError::Config { .. })));
    }
}
