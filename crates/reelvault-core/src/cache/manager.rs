//! Bounded on-disk cache of derived artifacts.
//!
//! The index lives in a [`KeyValueStore`] under [`CacheLimits::INDEX_KEY`]
//! and is written before any mutation returns. All mutations go through one
//! async mutex.
//!
//! Eviction runs in two phases. Every entry older than the maximum age is
//! removed regardless of the budget. If the cache is still over budget,
//! entries are removed by ascending access count, oldest access first on
//! ties. This is age-then-frequency, not LRU.

use super::types::{
    CacheEntry, CacheIndex, CacheKind, CacheStats, EntryMetadata, EvictionReport, VerifyReport,
};
use crate::config::{CacheConfig, CacheLimits, PathsConfig};
use crate::error::{IoResultExt, Result, VaultError};
use crate::store::KeyValueStore;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<PathBuf, CacheEntry>,
    /// Entries in use by a transfer. Never evicted.
    pinned: HashSet<PathBuf>,
}

impl CacheState {
    fn total_bytes(&self) -> u64 {
        self.entries.values().map(|e| e.size_bytes).sum()
    }
}

/// Called for each entry the cache drops on its own.
pub type ReleaseListener = Arc<dyn Fn(&CacheEntry) + Send + Sync>;

/// Owns the cache directory and its index.
pub struct CacheManager {
    root: PathBuf,
    store: Arc<dyn KeyValueStore>,
    config: CacheConfig,
    state: Mutex<CacheState>,
    release_listener: OnceLock<ReleaseListener>,
}

impl CacheManager {
    /// Load the index, recover from corruption and verify every entry.
    ///
    /// A corrupted index is logged and the cache rebuilt empty; it is never
    /// reported to the caller.
    pub async fn open(
        root: impl Into<PathBuf>,
        store: Arc<dyn KeyValueStore>,
        config: CacheConfig,
    ) -> Result<Self> {
        let root = root.into();
        create_layout(&root)?;
        clear_dir(&root.join(PathsConfig::STAGING_DIR_NAME));

        let entries = match load_index(store.as_ref(), &root) {
            Ok(entries) => entries,
            Err(VaultError::CacheCorrupted { message }) => {
                error!("Cache index corrupted, rebuilding empty cache: {}", message);
                wipe(&root, store.as_ref())?;
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let manager = Self {
            root,
            store,
            config,
            state: Mutex::new(CacheState {
                entries: entries.into_iter().map(|e| (e.path.clone(), e)).collect(),
                pinned: HashSet::new(),
            }),
            release_listener: OnceLock::new(),
        };

        let report = manager.verify().await?;
        info!(
            "Opened cache at {} ({} entries, {} pruned, {} orphans removed)",
            manager.root.display(),
            report.checked - report.pruned.len(),
            report.pruned.len(),
            report.orphans_removed.len()
        );

        Ok(manager)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Register a callback for entries dropped by eviction, by
    /// [`verify`](Self::verify) or by [`recover_cache`](Self::recover_cache).
    /// Explicit removals are not reported. Only the first listener is kept.
    pub fn on_release(&self, listener: ReleaseListener) {
        if self.release_listener.set(listener).is_err() {
            warn!("Cache release listener is already registered");
        }
    }

    /// Scratch directory for files that are not cache entries yet.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(PathsConfig::STAGING_DIR_NAME)
    }

    /// Move `source` into the cache as a new entry.
    ///
    /// Room is made first; the file is only moved once it is known to fit.
    /// A file larger than the whole budget fails without evicting anything.
    ///
    /// The entry is indexed before the file moves, and the index write and
    /// move run together on the blocking pool. Dropping this future midway
    /// still leaves the file tracked.
    pub async fn add_entry(
        &self,
        kind: CacheKind,
        source: &Path,
        metadata: EntryMetadata,
    ) -> Result<CacheEntry> {
        let size_bytes = tokio::fs::metadata(source).await.with_path(source)?.len();
        let max_bytes = self.config.max_total_size;
        if size_bytes > max_bytes {
            return Err(VaultError::EvictionInsufficient {
                required_bytes: size_bytes,
                max_bytes,
            });
        }

        let mut state = self.state.lock().await;

        if state.total_bytes() + size_bytes > max_bytes {
            let report = self.evict_locked(&mut state, size_bytes).await?;
            debug!(
                "Made room for {} bytes by removing {} entries",
                size_bytes,
                report.removed_count()
            );
        }

        let dest = self.destination(&state, kind, source, metadata.file_name.as_deref())?;
        let now = Utc::now();
        let entry = CacheEntry {
            path: dest.clone(),
            size_bytes,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            kind,
            asset_id: metadata.asset_id,
        };
        state.entries.insert(dest.clone(), entry.clone());

        let index = match index_bytes(&state) {
            Ok(index) => index,
            Err(e) => {
                state.entries.remove(&dest);
                return Err(e);
            }
        };
        let store = Arc::clone(&self.store);
        let from = source.to_path_buf();
        let to = dest.clone();
        let committed = tokio::task::spawn_blocking(move || -> Result<()> {
            store.set(CacheLimits::INDEX_KEY, &index)?;
            if from != to {
                move_file(&from, &to)?;
            }
            Ok(())
        })
        .await
        .unwrap_or_else(|e| Err(blocking_failed("Cache insert", e)));

        if let Err(e) = committed {
            state.entries.remove(&dest);
            if let Err(persist_err) = self.persist(&state).await {
                warn!(
                    "Failed to drop {} from the index after a failed insert: {}",
                    dest.display(),
                    persist_err
                );
            }
            return Err(e);
        }

        info!(
            "Cached {} {} ({} bytes)",
            kind,
            dest.display(),
            size_bytes
        );
        Ok(entry)
    }

    /// Run both eviction phases against the configured budget.
    pub async fn evict(&self) -> Result<EvictionReport> {
        let mut state = self.state.lock().await;
        let report = self.evict_locked(&mut state, 0).await?;
        if report.removed_count() > 0 {
            info!(
                "Evicted {} expired and {} infrequent entries, freed {} bytes",
                report.expired.len(),
                report.evicted.len(),
                report.freed_bytes
            );
        }
        Ok(report)
    }

    /// Drop entries whose file is missing or changed size, and delete files
    /// in the kind directories that no entry references.
    pub async fn verify(&self) -> Result<VerifyReport> {
        let mut state = self.state.lock().await;
        let mut report = VerifyReport {
            checked: state.entries.len(),
            ..Default::default()
        };

        let stale: Vec<PathBuf> = state
            .entries
            .values()
            .filter(|e| !file_matches(&e.path, e.size_bytes))
            .map(|e| e.path.clone())
            .collect();
        let mut released = Vec::with_capacity(stale.len());
        for path in stale {
            warn!("Pruning cache entry with missing or changed file: {}", path.display());
            released.extend(remove_locked(&mut state, &path));
            report.pruned.push(path);
        }

        for kind in CacheKind::ALL {
            let dir = self.root.join(kind.dir_name());
            for file in WalkDir::new(&dir)
                .min_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                if !state.entries.contains_key(file.path()) {
                    debug!("Removing untracked cache file {}", file.path().display());
                    remove_file_quietly(file.path());
                    report.orphans_removed.push(file.path().to_path_buf());
                }
            }
        }

        if !report.pruned.is_empty() {
            self.persist(&state).await?;
        }
        self.notify_released(&released);
        Ok(report)
    }

    /// Delete the cache directory and index and start over empty.
    pub async fn recover_cache(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        warn!("Recovering cache at {}", self.root.display());
        wipe(&self.root, self.store.as_ref())?;
        let released: Vec<CacheEntry> = state.entries.drain().map(|(_, e)| e).collect();
        state.pinned.clear();
        self.notify_released(&released);
        Ok(())
    }

    /// Record an access to `path`.
    pub async fn touch(&self, path: &Path) -> Result<Option<CacheEntry>> {
        let mut state = self.state.lock().await;
        let Some(entry) = state.entries.get_mut(path) else {
            return Ok(None);
        };
        entry.access_count += 1;
        entry.last_accessed_at = Utc::now();
        let updated = entry.clone();
        self.persist(&state).await?;
        Ok(Some(updated))
    }

    /// Remove one entry and its file.
    pub async fn remove_entry(&self, path: &Path) -> Result<Option<CacheEntry>> {
        let mut state = self.state.lock().await;
        let removed = remove_locked(&mut state, path);
        if removed.is_some() {
            self.persist(&state).await?;
            debug!("Removed cache entry {}", path.display());
        }
        Ok(removed)
    }

    /// Remove every entry owned by `asset_id`.
    pub async fn remove_entries_for(&self, asset_id: &str) -> Result<Vec<CacheEntry>> {
        let mut state = self.state.lock().await;
        let paths: Vec<PathBuf> = state
            .entries
            .values()
            .filter(|e| e.asset_id.as_deref() == Some(asset_id))
            .map(|e| e.path.clone())
            .collect();

        let removed: Vec<CacheEntry> = paths
            .iter()
            .filter_map(|p| remove_locked(&mut state, p))
            .collect();
        if !removed.is_empty() {
            self.persist(&state).await?;
        }
        Ok(removed)
    }

    /// Exclude an entry from eviction until [`unpin`](Self::unpin).
    pub async fn pin(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.entries.contains_key(path) {
            return Err(VaultError::not_found("cache entry", path.display().to_string()));
        }
        state.pinned.insert(path.to_path_buf());
        Ok(())
    }

    pub async fn unpin(&self, path: &Path) {
        self.state.lock().await.pinned.remove(path);
    }

    pub async fn entry(&self, path: &Path) -> Option<CacheEntry> {
        self.state.lock().await.entries.get(path).cloned()
    }

    /// All entries, oldest first.
    pub async fn entries(&self) -> Vec<CacheEntry> {
        let state = self.state.lock().await;
        let mut entries: Vec<CacheEntry> = state.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.path.cmp(&b.path)));
        entries
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;

        let bytes_by_kind = CacheKind::ALL
            .iter()
            .map(|kind| {
                let bytes: u64 = state
                    .entries
                    .values()
                    .filter(|e| e.kind == *kind)
                    .map(|e| e.size_bytes)
                    .sum();
                (*kind, bytes)
            })
            .collect();

        let untracked_bytes: u64 = CacheKind::ALL
            .iter()
            .flat_map(|kind| {
                WalkDir::new(self.root.join(kind.dir_name()))
                    .min_depth(1)
                    .into_iter()
                    .filter_map(|e| e.ok())
            })
            .filter(|e| e.file_type().is_file() && !state.entries.contains_key(e.path()))
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum();

        CacheStats {
            total_bytes: state.total_bytes(),
            entry_count: state.entries.len(),
            max_total_size: self.config.max_total_size,
            bytes_by_kind,
            untracked_bytes,
        }
    }

    /// Evict until `incoming` more bytes fit. Persists the index whenever
    /// something was removed, including when the result is an error.
    async fn evict_locked(&self, state: &mut CacheState, incoming: u64) -> Result<EvictionReport> {
        let max_bytes = self.config.max_total_size;
        let max_age = self.config.max_file_age();
        let now = Utc::now();
        let mut report = EvictionReport::default();
        let mut released = Vec::new();

        let expired: Vec<PathBuf> = state
            .entries
            .values()
            .filter(|e| !state.pinned.contains(&e.path) && age(e.created_at, now) > max_age)
            .map(|e| e.path.clone())
            .collect();
        for path in expired {
            if let Some(entry) = remove_locked(state, &path) {
                debug!("Evicting expired {}", path.display());
                report.freed_bytes += entry.size_bytes;
                report.expired.push(path);
                released.push(entry);
            }
        }

        let mut total = state.total_bytes();
        if total + incoming > max_bytes {
            let mut candidates: Vec<CacheEntry> = state
                .entries
                .values()
                .filter(|e| !state.pinned.contains(&e.path))
                .cloned()
                .collect();
            candidates.sort_by(|a, b| {
                a.access_count
                    .cmp(&b.access_count)
                    .then(a.last_accessed_at.cmp(&b.last_accessed_at))
                    .then(a.created_at.cmp(&b.created_at))
            });

            for candidate in candidates {
                if total + incoming <= max_bytes {
                    break;
                }
                if let Some(entry) = remove_locked(state, &candidate.path) {
                    debug!(
                        "Evicting {} (accessed {} times)",
                        entry.path.display(),
                        entry.access_count
                    );
                    total -= entry.size_bytes;
                    report.freed_bytes += entry.size_bytes;
                    report.evicted.push(entry.path.clone());
                    released.push(entry);
                }
            }
        }

        report.total_bytes_after = total;

        let persisted = if report.removed_count() > 0 {
            self.persist(state).await
        } else {
            Ok(())
        };
        self.notify_released(&released);

        if total + incoming > max_bytes {
            persisted?;
            return Err(VaultError::EvictionInsufficient {
                required_bytes: incoming,
                max_bytes,
            });
        }

        persisted?;
        Ok(report)
    }

    fn destination(
        &self,
        state: &CacheState,
        kind: CacheKind,
        source: &Path,
        file_name: Option<&str>,
    ) -> Result<PathBuf> {
        let name = file_name
            .map(Path::new)
            .unwrap_or(source)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| VaultError::Io {
                message: "Cache source has no usable file name".to_string(),
                path: Some(source.to_path_buf()),
                source: None,
            })?;

        let dir = self.root.join(kind.dir_name());
        let dest = dir.join(name);
        if dest == source || !(state.entries.contains_key(&dest) || dest.exists()) {
            return Ok(dest);
        }

        let unique = uuid::Uuid::new_v4().simple().to_string();
        Ok(dir.join(format!("{}-{}", &unique[..8], name)))
    }

    /// Write the index on the blocking pool.
    async fn persist(&self, state: &CacheState) -> Result<()> {
        let index = index_bytes(state)?;
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.set(CacheLimits::INDEX_KEY, &index))
            .await
            .unwrap_or_else(|e| Err(blocking_failed("Cache index write", e)))
    }

    fn notify_released(&self, entries: &[CacheEntry]) {
        if let Some(listener) = self.release_listener.get() {
            for entry in entries {
                listener(entry);
            }
        }
    }
}

fn index_bytes(state: &CacheState) -> Result<Vec<u8>> {
    let mut entries: Vec<CacheEntry> = state.entries.values().cloned().collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    let index = CacheIndex {
        version: CacheIndex::VERSION,
        entries,
    };
    Ok(serde_json::to_vec_pretty(&index)?)
}

fn blocking_failed(what: &str, err: tokio::task::JoinError) -> VaultError {
    VaultError::Io {
        message: format!("{} task failed: {}", what, err),
        path: None,
        source: None,
    }
}

fn load_index(store: &dyn KeyValueStore, root: &Path) -> Result<Vec<CacheEntry>> {
    let Some(bytes) = store.get(CacheLimits::INDEX_KEY)? else {
        return Ok(Vec::new());
    };

    let index: CacheIndex =
        serde_json::from_slice(&bytes).map_err(|e| VaultError::CacheCorrupted {
            message: e.to_string(),
        })?;

    if index.version != CacheIndex::VERSION {
        return Err(VaultError::CacheCorrupted {
            message: format!("Unsupported index version {}", index.version),
        });
    }

    Ok(index
        .entries
        .into_iter()
        .filter(|e| {
            let inside = e.path.starts_with(root);
            if !inside {
                warn!("Ignoring cache entry outside {}: {}", root.display(), e.path.display());
            }
            inside
        })
        .collect())
}

fn create_layout(root: &Path) -> Result<()> {
    for dir in CacheKind::ALL
        .iter()
        .map(|k| k.dir_name())
        .chain([PathsConfig::STAGING_DIR_NAME])
    {
        let path = root.join(dir);
        std::fs::create_dir_all(&path).with_path(&path)?;
    }
    Ok(())
}

fn wipe(root: &Path, store: &dyn KeyValueStore) -> Result<()> {
    match std::fs::remove_dir_all(root) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(VaultError::io_with_path(e, root)),
    }
    store.remove(CacheLimits::INDEX_KEY)?;
    create_layout(root)
}

/// Best-effort removal of leftovers from interrupted imports.
fn clear_dir(dir: &Path) {
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let result = if entry.file_type().is_dir() {
            std::fs::remove_dir_all(entry.path())
        } else {
            std::fs::remove_file(entry.path())
        };
        if let Err(e) = result {
            warn!("Failed to remove {}: {}", entry.path().display(), e);
        }
    }
}

fn remove_locked(state: &mut CacheState, path: &Path) -> Option<CacheEntry> {
    let entry = state.entries.remove(path)?;
    state.pinned.remove(path);
    remove_file_quietly(&entry.path);
    Some(entry)
}

fn remove_file_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to delete cached file {}: {}", path.display(), e),
    }
}

fn file_matches(path: &Path, size_bytes: u64) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() == size_bytes)
        .unwrap_or(false)
}

fn age(created_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - created_at).to_std().unwrap_or_default()
}

/// Rename, falling back to copy and unlink across filesystems.
fn move_file(source: &Path, dest: &Path) -> Result<()> {
    if std::fs::rename(source, dest).is_ok() {
        return Ok(());
    }
    std::fs::copy(source, dest).with_path(dest)?;
    if let Err(e) = std::fs::remove_file(source) {
        warn!("Copied {} but could not remove it: {}", source.display(), e);
    }
    Ok(())
}
