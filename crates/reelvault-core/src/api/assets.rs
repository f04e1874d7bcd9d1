//! Import and asset methods for MediaVault.

use crate::error::Result;
use crate::import::Asset;
use crate::validation::MediaDescriptor;
use crate::MediaVault;

impl MediaVault {
    /// Import one file into the vault.
    ///
    /// Returns the persisted asset. Content that is already held by a live
    /// asset fails with `DuplicateAsset`; validation failures come back as
    /// their typed error and leave a Rejected record behind.
    pub async fn import(&self, descriptor: MediaDescriptor) -> Result<Asset> {
        self.importer.import(descriptor).await
    }

    /// Import several files concurrently. Results keep the input order.
    pub async fn import_batch(&self, descriptors: Vec<MediaDescriptor>) -> Vec<Result<Asset>> {
        self.importer.import_batch(descriptors).await
    }

    pub fn asset(&self, id: &str) -> Option<Asset> {
        self.importer.asset(id)
    }

    /// All known assets, oldest first.
    pub fn assets(&self) -> Vec<Asset> {
        self.importer.assets()
    }

    /// Delete an asset record and its cached files.
    ///
    /// Assets that are being imported or uploaded cannot be deleted.
    pub async fn delete_asset(&self, id: &str) -> Result<Asset> {
        let asset = self.importer.delete_asset(id).await?;
        self.validation.forget(&asset.content_signature);
        Ok(asset)
    }
}
