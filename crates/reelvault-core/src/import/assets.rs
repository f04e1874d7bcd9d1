//! Durable asset registry with an atomic per-signature claim.

use super::types::{Asset, AssetError, AssetStatus};
use crate::config::ImportLimits;
use crate::error::{Result, VaultError};
use crate::signature::ContentSignature;
use crate::store::KeyValueStore;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
struct RegistryState {
    assets: HashMap<String, Asset>,
    /// Signature key to the id of the asset holding it.
    by_signature: HashMap<String, String>,
}

impl RegistryState {
    /// Add or replace a record. The signature points at the new record
    /// unless a different record still holds it and this one does not.
    fn insert(&mut self, asset: Asset) {
        let key = asset.content_signature.key();
        let keep_holder = self
            .by_signature
            .get(&key)
            .filter(|id| **id != asset.id)
            .and_then(|id| self.assets.get(id))
            .is_some_and(|holder| holder.holds_signature() && !asset.holds_signature());
        if !keep_holder {
            self.by_signature.insert(key, asset.id.clone());
        }
        self.assets.insert(asset.id.clone(), asset);
    }

    fn remove(&mut self, id: &str) -> Option<Asset> {
        let asset = self.assets.remove(id)?;
        let key = asset.content_signature.key();
        if self.by_signature.get(&key).map(String::as_str) == Some(id) {
            self.by_signature.remove(&key);
        }
        Some(asset)
    }
}

/// All known assets, persisted as one JSON document.
///
/// Every mutation is applied in memory, written to the store, and rolled
/// back if the write fails. Writes happen synchronously under the lock so
/// the in-memory map never runs ahead of the stored document; callers on
/// the async runtime accept one small file write per mutation.
pub struct AssetRegistry {
    store: Arc<dyn KeyValueStore>,
    state: Mutex<RegistryState>,
}

impl AssetRegistry {
    /// Load the registry. Assets left mid-import by a previous process are
    /// marked failed; interrupted uploads go back to persisted.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let assets: Vec<Asset> = match store.get(ImportLimits::ASSETS_KEY)? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                error!("Asset registry is unreadable: {}", e);
                VaultError::from(e)
            })?,
            None => Vec::new(),
        };

        let mut state = RegistryState::default();
        let mut repaired = 0;
        for mut asset in assets {
            if asset.status.is_importing() {
                asset.status = AssetStatus::Failed;
                asset.last_error = Some(AssetError {
                    code: crate::error::ErrorCode::ImportTimedOut,
                    message: "Import was interrupted".to_string(),
                });
                asset.updated_at = Utc::now();
                repaired += 1;
            } else if asset.status == AssetStatus::Uploading {
                asset.status = AssetStatus::Persisted;
                asset.updated_at = Utc::now();
                repaired += 1;
            }
            state.insert(asset);
        }

        let registry = Self {
            store,
            state: Mutex::new(state),
        };
        if repaired > 0 {
            warn!("Repaired {} assets left over from an interrupted run", repaired);
            registry.persist(&registry.lock())?;
        }

        info!("Loaded {} assets", registry.lock().assets.len());
        Ok(registry)
    }

    /// Register `asset` as the holder of its signature.
    ///
    /// Fails with `DuplicateAsset` while another record holds the
    /// signature. A rejected or failed holder without a local copy is
    /// superseded: its record stays, the signature moves to `asset`, and the
    /// old record is returned.
    pub fn claim(&self, asset: Asset) -> Result<Option<Asset>> {
        let mut state = self.lock();
        let key = asset.content_signature.key();

        let holder = state
            .by_signature
            .get(&key)
            .and_then(|id| state.assets.get(id))
            .cloned();

        let superseded = match holder {
            Some(existing) if existing.holds_signature() => {
                debug!("Signature {} already held by {}", key, existing.id);
                return Err(VaultError::DuplicateAsset {
                    existing_id: existing.id,
                    signature: key,
                });
            }
            other => other,
        };

        state.insert(asset.clone());
        if let Err(e) = self.persist(&state) {
            state.remove(&asset.id);
            if let Some(previous) = &superseded {
                state.by_signature.insert(key, previous.id.clone());
            }
            return Err(e);
        }

        if let Some(previous) = &superseded {
            info!(
                "Asset {} supersedes {} asset {}",
                asset.id, previous.status, previous.id
            );
        }
        Ok(superseded)
    }

    /// Apply `update` to the asset and move it to `next` atomically.
    pub fn transition(
        &self,
        id: &str,
        next: AssetStatus,
        update: impl FnOnce(&mut Asset),
    ) -> Result<Asset> {
        self.modify(id, |asset| {
            asset.transition(next)?;
            update(asset);
            Ok(())
        })
    }

    /// Apply `update` without a status change.
    pub fn modify(&self, id: &str, update: impl FnOnce(&mut Asset) -> Result<()>) -> Result<Asset> {
        let mut state = self.lock();
        let current = state
            .assets
            .get(id)
            .cloned()
            .ok_or_else(|| VaultError::not_found("asset", id))?;

        let mut updated = current.clone();
        update(&mut updated)?;
        updated.updated_at = Utc::now();
        state.assets.insert(id.to_string(), updated.clone());

        if let Err(e) = self.persist(&state) {
            state.assets.insert(id.to_string(), current);
            return Err(e);
        }
        Ok(updated)
    }

    /// Drop references to a cache file that no longer exists.
    ///
    /// Returns the updated asset, or `None` when nothing pointed at `path`.
    pub fn release_cached(&self, id: &str, path: &Path) -> Result<Option<Asset>> {
        let references = self
            .lock()
            .assets
            .get(id)
            .is_some_and(|a| {
                a.cached_path.as_deref() == Some(path) || a.thumbnail_ref.as_deref() == Some(path)
            });
        if !references {
            return Ok(None);
        }

        let updated = self.modify(id, |asset| {
            if asset.cached_path.as_deref() == Some(path) {
                asset.cached_path = None;
            }
            if asset.thumbnail_ref.as_deref() == Some(path) {
                asset.thumbnail_ref = None;
            }
            Ok(())
        })?;
        debug!("Asset {} no longer references {}", id, path.display());
        Ok(Some(updated))
    }

    /// Clear every cache reference that is not in `tracked`. Returns the
    /// number of assets changed.
    pub fn release_untracked(&self, tracked: &HashSet<PathBuf>) -> Result<usize> {
        let mut state = self.lock();
        let before: Vec<Asset> = state.assets.values().cloned().collect();
        let is_stale = |path: &Option<PathBuf>| path.as_ref().is_some_and(|p| !tracked.contains(p));

        let mut changed = 0;
        for asset in state.assets.values_mut() {
            let stale_copy = is_stale(&asset.cached_path);
            let stale_thumbnail = is_stale(&asset.thumbnail_ref);
            if stale_copy {
                asset.cached_path = None;
            }
            if stale_thumbnail {
                asset.thumbnail_ref = None;
            }
            if stale_copy || stale_thumbnail {
                asset.updated_at = Utc::now();
                changed += 1;
            }
        }

        if changed > 0 {
            if let Err(e) = self.persist(&state) {
                state.assets = before.into_iter().map(|a| (a.id.clone(), a)).collect();
                return Err(e);
            }
            warn!("Cleared missing cache files from {} assets", changed);
        }
        Ok(changed)
    }

    pub fn get(&self, id: &str) -> Option<Asset> {
        self.lock().assets.get(id).cloned()
    }

    /// Current holder of `signature`, live or not.
    pub fn find_by_signature(&self, signature: &ContentSignature) -> Option<Asset> {
        let state = self.lock();
        state
            .by_signature
            .get(&signature.key())
            .and_then(|id| state.assets.get(id))
            .cloned()
    }

    /// All assets, oldest first.
    pub fn list(&self) -> Vec<Asset> {
        let mut assets: Vec<Asset> = self.lock().assets.values().cloned().collect();
        assets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        assets
    }

    pub fn remove(&self, id: &str) -> Result<Option<Asset>> {
        let mut state = self.lock();
        let Some(removed) = state.remove(id) else {
            return Ok(None);
        };
        if let Err(e) = self.persist(&state) {
            state.insert(removed);
            return Err(e);
        }
        Ok(Some(removed))
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // Every mutation rolls back on failure, so a poisoned map is still consistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, state: &RegistryState) -> Result<()> {
        let mut assets: Vec<&Asset> = state.assets.values().collect();
        assets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        self.store
            .set(ImportLimits::ASSETS_KEY, &serde_json::to_vec_pretty(&assets)?)
    }
}
