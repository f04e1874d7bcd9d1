//! Import pipeline: signature, dedup, validation, thumbnail, persist.

use super::assets::AssetRegistry;
use super::staging::StagedFile;
use super::types::{Asset, AssetError, AssetStatus};
use crate::cache::{CacheKind, CacheManager, EntryMetadata};
use crate::config::ImportConfig;
use crate::error::{Result, VaultError};
use crate::media::ThumbnailExtractor;
use crate::signature::{ContentSignature, FileSignatureService};
use crate::validation::{MediaDescriptor, ValidationPipeline, ValidationReport};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Drives one import at a time per call; calls may run concurrently.
pub struct ImportOrchestrator {
    signatures: FileSignatureService,
    validation: Arc<ValidationPipeline>,
    cache: Arc<CacheManager>,
    registry: Arc<AssetRegistry>,
    thumbnails: Arc<dyn ThumbnailExtractor>,
    config: ImportConfig,
}

impl ImportOrchestrator {
    pub fn new(
        validation: Arc<ValidationPipeline>,
        cache: Arc<CacheManager>,
        registry: Arc<AssetRegistry>,
        thumbnails: Arc<dyn ThumbnailExtractor>,
        config: ImportConfig,
    ) -> Self {
        Self {
            signatures: FileSignatureService::new(),
            validation,
            cache,
            registry,
            thumbnails,
            config,
        }
    }

    /// Import one file.
    ///
    /// Returns the persisted asset, `DuplicateAsset` when a live asset
    /// already holds the same content, or the typed validation/processing
    /// error. The whole pipeline is bounded by the configured timeout.
    pub async fn import(&self, descriptor: MediaDescriptor) -> Result<Asset> {
        let budget = self.config.timeout();
        let mut claimed: Option<String> = None;

        let outcome = timeout(budget, self.run(&descriptor, &mut claimed)).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Import of {} exceeded {:?}",
                    descriptor.path.display(),
                    budget
                );
                Err(VaultError::ImportTimedOut(budget))
            }
        };

        if let (Err(err), Some(asset_id)) = (&result, &claimed) {
            self.record_failure(asset_id, err).await;
        }
        result
    }

    /// Import several files, at most `max_concurrent_imports` at a time.
    /// Results are in input order.
    pub async fn import_batch(&self, descriptors: Vec<MediaDescriptor>) -> Vec<Result<Asset>> {
        let total = descriptors.len();
        let results: Vec<Result<Asset>> = stream::iter(descriptors)
            .map(|descriptor| self.import(descriptor))
            .buffered(self.config.max_concurrent_imports.max(1))
            .collect()
            .await;

        let imported = results.iter().filter(|r| r.is_ok()).count();
        info!("Batch import finished: {}/{} imported", imported, total);
        results
    }

    /// Delete an asset, its cached copy and its thumbnail.
    pub async fn delete_asset(&self, id: &str) -> Result<Asset> {
        let asset = self
            .registry
            .get(id)
            .ok_or_else(|| VaultError::not_found("asset", id))?;

        if asset.status == AssetStatus::Uploading || asset.status.is_importing() {
            return Err(VaultError::InvalidTransition {
                from: asset.status.to_string(),
                to: "deleted".to_string(),
            });
        }

        let removed = self.cache.remove_entries_for(id).await?;
        self.registry.remove(id)?;
        info!("Deleted asset {} ({} cached files)", id, removed.len());
        Ok(asset)
    }

    pub fn asset(&self, id: &str) -> Option<Asset> {
        self.registry.get(id)
    }

    pub fn assets(&self) -> Vec<Asset> {
        self.registry.list()
    }

    async fn run(&self, descriptor: &MediaDescriptor, claimed: &mut Option<String>) -> Result<Asset> {
        let signature = self.signatures.compute_signature(&descriptor.path).await?;

        let asset = Asset::new(signature.clone(), descriptor.source_uri());
        if let Some(previous) = self.registry.claim(asset.clone())? {
            self.release_files(&previous.id).await;
        }
        *claimed = Some(asset.id.clone());
        info!(
            "Importing {} as asset {}",
            descriptor.path.display(),
            asset.id
        );

        self.process(&asset.id, &signature, descriptor).await
    }

    async fn process(
        &self,
        id: &str,
        signature: &ContentSignature,
        descriptor: &MediaDescriptor,
    ) -> Result<Asset> {
        let cached = self.validation.cached(signature);
        let quick = match &cached {
            Some(report) => {
                debug!("Reusing validation report for asset {}", id);
                report.quick.clone()
            }
            None => self.validation.quick_validate(descriptor).await,
        };
        if !quick.passed() {
            let report = match cached {
                Some(report) => report,
                None => self
                    .validation
                    .remember(signature, ValidationReport { quick, deep: None }),
            };
            return Err(validation_error(&report));
        }
        self.registry
            .transition(id, AssetStatus::QuickValidated, |_| {})?;

        let staging_dir = self.cache.staging_dir();
        let extension = descriptor
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        let staged =
            StagedFile::copy_from(&descriptor.path, &staging_dir, &format!("{}.{}", id, extension))
                .await?;

        let report = match cached {
            Some(report) => report,
            None => {
                let deep = self.validation.deep_validate(staged.path()).await;
                self.validation.remember(
                    signature,
                    ValidationReport {
                        quick,
                        deep: Some(deep),
                    },
                )
            }
        };
        if !report.passed() {
            return Err(validation_error(&report));
        }
        let specs = report
            .specs()
            .cloned()
            .ok_or_else(|| VaultError::InvalidFormat {
                message: "Validation produced no stream information".to_string(),
            })?;
        self.registry
            .transition(id, AssetStatus::DeepValidated, |asset| asset.apply_specs(&specs))?;

        let offset = self.config.thumbnail_offset(specs.duration_secs);
        let frame = self
            .thumbnails
            .extract_frame(staged.path(), offset)
            .await
            .map_err(|e| match e {
                VaultError::ThumbnailFailed { .. } => e,
                other => VaultError::ThumbnailFailed {
                    message: other.to_string(),
                },
            })?;
        let thumbnail = StagedFile::write(&staging_dir, &format!("{}.jpg", id), &frame).await?;
        let thumbnail_entry = self
            .cache
            .add_entry(
                CacheKind::Thumbnail,
                thumbnail.path(),
                EntryMetadata::for_asset(id),
            )
            .await
            .map_err(cache_full)?;
        thumbnail.persisted();
        self.registry
            .transition(id, AssetStatus::ThumbnailGenerated, |asset| {
                asset.thumbnail_ref = Some(thumbnail_entry.path.clone());
            })?;

        let video_entry = match self
            .cache
            .add_entry(CacheKind::TempImport, staged.path(), EntryMetadata::for_asset(id))
            .await
        {
            Ok(entry) => entry,
            Err(e) => {
                if let Err(remove_err) = self.cache.remove_entry(&thumbnail_entry.path).await {
                    warn!("Failed to remove thumbnail of asset {}: {}", id, remove_err);
                }
                return Err(cache_full(e));
            }
        };
        staged.persisted();

        let asset = self
            .registry
            .transition(id, AssetStatus::Persisted, |asset| {
                asset.cached_path = Some(video_entry.path.clone());
                asset.last_error = None;
            })?;
        info!("Imported asset {} ({} bytes)", id, asset.size_bytes);
        Ok(asset)
    }

    /// Remove leftover cache files of a superseded record, keeping the record.
    async fn release_files(&self, id: &str) {
        let removed = match self.cache.remove_entries_for(id).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Failed to clear files of superseded asset {}: {}", id, e);
                return;
            }
        };
        for entry in removed {
            if let Err(e) = self.registry.release_cached(id, &entry.path) {
                warn!("Could not update superseded asset {}: {}", id, e);
            }
        }
    }

    /// Move a claimed asset to `Rejected` or `Failed` and drop its files.
    async fn record_failure(&self, id: &str, err: &VaultError) {
        let next = if is_rejection(err) {
            AssetStatus::Rejected
        } else {
            AssetStatus::Failed
        };

        if next == AssetStatus::Failed {
            if let Err(e) = self.cache.remove_entries_for(id).await {
                warn!("Failed to clear files of asset {}: {}", id, e);
            }
        }

        let recorded = AssetError::from(err);
        match self.registry.transition(id, next, |asset| {
            asset.last_error = Some(recorded);
            asset.thumbnail_ref = None;
            asset.cached_path = None;
        }) {
            Ok(_) => info!("Asset {} {}: {}", id, next, err),
            Err(e) => warn!("Could not mark asset {} as {}: {}", id, next, e),
        }
    }
}

fn validation_error(report: &ValidationReport) -> VaultError {
    report
        .to_error()
        .unwrap_or_else(|| VaultError::InvalidFormat {
            message: "Validation did not pass".to_string(),
        })
}

fn cache_full(err: VaultError) -> VaultError {
    match err {
        VaultError::EvictionInsufficient { required_bytes, .. } => {
            VaultError::CacheFull { required_bytes }
        }
        other => other,
    }
}

fn is_rejection(err: &VaultError) -> bool {
    matches!(
        err,
        VaultError::InvalidFormat { .. }
            | VaultError::FileTooLarge { .. }
            | VaultError::AspectRatioRejected { .. }
            | VaultError::CodecRejected { .. }
            | VaultError::DurationExceeded { .. }
            | VaultError::ValidationTimeout { .. }
    )
}
