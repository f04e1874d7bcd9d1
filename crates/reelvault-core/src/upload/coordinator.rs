//! Single-slot upload coordinator.
//!
//! At most one task is Preparing or Transferring at any time. The slot is
//! released before the terminal state is published, so a caller that sees a
//! finished task can start the next upload immediately.

use super::storage::{ObjectMetadata, ObjectRef, RemoteStorage, UploadSession};
use super::types::{UploadFailure, UploadState, UploadTask};
use crate::cache::CacheManager;
use crate::cancel::CancellationToken;
use crate::config::UploadConfig;
use crate::error::{IoResultExt, Result, VaultError};
use crate::import::{Asset, AssetError, AssetRegistry, AssetStatus};
use crate::retry::{retry_async, Clock, RetryConfig};
use crate::validation::MediaDescriptor;
use bytes::Bytes;
use futures::Stream;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct ActiveUpload {
    task_id: String,
}

struct Inner {
    storage: Arc<dyn RemoteStorage>,
    registry: Arc<AssetRegistry>,
    cache: Arc<CacheManager>,
    clock: Arc<dyn Clock>,
    config: UploadConfig,
    slot: Mutex<Option<ActiveUpload>>,
    tasks: Mutex<HashMap<String, UploadTask>>,
    cancellations: Mutex<HashMap<String, CancellationToken>>,
}

/// Starts, tracks and cancels uploads.
#[derive(Clone)]
pub struct UploadCoordinator {
    inner: Arc<Inner>,
}

/// Caller's view of a running upload.
pub struct UploadHandle {
    task_id: String,
    progress: watch::Receiver<f64>,
    state: watch::Receiver<UploadTask>,
    join: JoinHandle<UploadTask>,
}

impl UploadHandle {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Acknowledged fraction, never decreasing.
    pub fn progress(&self) -> watch::Receiver<f64> {
        self.progress.clone()
    }

    /// Progress changes as a stream. Ends when the task finishes.
    pub fn progress_stream(&self) -> impl Stream<Item = f64> + Send + 'static {
        futures::stream::unfold(self.progress.clone(), |mut rx| async move {
            rx.changed().await.ok()?;
            let value = *rx.borrow_and_update();
            Some((value, rx))
        })
    }

    /// Task snapshots, published on every state change and chunk.
    pub fn state(&self) -> watch::Receiver<UploadTask> {
        self.state.clone()
    }

    /// Wait for the terminal task.
    pub async fn wait(self) -> Result<UploadTask> {
        self.join.await.map_err(|e| VaultError::UploadFailed {
            message: format!("Upload task ended abnormally: {}", e),
        })
    }
}

/// Frees the slot when the transfer task ends, however it ends.
struct SlotGuard {
    inner: Arc<Inner>,
    task_id: String,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut slot = self.inner.lock_slot();
        if slot.as_ref().map(|a| a.task_id.as_str()) == Some(self.task_id.as_str()) {
            *slot = None;
        }
        lock(&self.inner.cancellations).remove(&self.task_id);
    }
}

/// Channels a transfer publishes to.
struct Publisher {
    inner: Arc<Inner>,
    progress: watch::Sender<f64>,
    state: watch::Sender<UploadTask>,
}

impl Publisher {
    fn snapshot(&self, task: &UploadTask) {
        lock(&self.inner.tasks).insert(task.id.clone(), task.clone());
        self.state.send_replace(task.clone());
    }

    fn progress(&self, task: &UploadTask) {
        let fraction = task.progress;
        self.progress.send_if_modified(|current| {
            if fraction > *current {
                *current = fraction;
                true
            } else {
                false
            }
        });
        self.snapshot(task);
    }
}

impl UploadCoordinator {
    pub fn new(
        storage: Arc<dyn RemoteStorage>,
        registry: Arc<AssetRegistry>,
        cache: Arc<CacheManager>,
        clock: Arc<dyn Clock>,
        config: UploadConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                storage,
                registry,
                cache,
                clock,
                config,
                slot: Mutex::new(None),
                tasks: Mutex::new(HashMap::new()),
                cancellations: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Start uploading `asset_id`.
    ///
    /// Fails with `ConcurrentUpload` while another task holds the slot. The
    /// asset must be persisted, or failed with its local copy still present.
    pub fn start(&self, asset_id: &str) -> Result<UploadHandle> {
        let mut slot = self.inner.lock_slot();
        if let Some(active) = slot.as_ref() {
            return Err(VaultError::ConcurrentUpload {
                active_task_id: active.task_id.clone(),
            });
        }

        let asset = self
            .inner
            .registry
            .get(asset_id)
            .ok_or_else(|| VaultError::not_found("asset", asset_id))?;
        if !asset.is_uploadable() {
            return Err(VaultError::InvalidTransition {
                from: asset.status.to_string(),
                to: AssetStatus::Uploading.to_string(),
            });
        }
        let source = asset
            .cached_path
            .clone()
            .ok_or_else(|| VaultError::not_found("cached copy", asset_id))?;

        let asset = self
            .inner
            .registry
            .transition(asset_id, AssetStatus::Uploading, |a| a.last_error = None)?;

        let task = UploadTask::new(asset_id, asset.size_bytes);
        let token = CancellationToken::new();
        *slot = Some(ActiveUpload {
            task_id: task.id.clone(),
        });
        drop(slot);

        lock(&self.inner.cancellations).insert(task.id.clone(), token.clone());
        lock(&self.inner.tasks).insert(task.id.clone(), task.clone());

        let (progress_tx, progress_rx) = watch::channel(0.0);
        let (state_tx, state_rx) = watch::channel(task.clone());
        let guard = SlotGuard {
            inner: Arc::clone(&self.inner),
            task_id: task.id.clone(),
        };
        let publisher = Publisher {
            inner: Arc::clone(&self.inner),
            progress: progress_tx,
            state: state_tx,
        };

        info!("Starting upload {} of asset {}", task.id, asset_id);
        let task_id = task.id.clone();
        let inner = Arc::clone(&self.inner);
        let join = tokio::spawn(async move {
            inner
                .run(task, asset, source, token, publisher, guard)
                .await
        });

        Ok(UploadHandle {
            task_id,
            progress: progress_rx,
            state: state_rx,
            join,
        })
    }

    /// Request cancellation. Returns `false` if the task already finished.
    pub fn cancel(&self, task_id: &str) -> Result<bool> {
        if let Some(token) = lock(&self.inner.cancellations).get(task_id) {
            info!("Cancelling upload {}", task_id);
            token.cancel();
            return Ok(true);
        }
        if lock(&self.inner.tasks).contains_key(task_id) {
            return Ok(false);
        }
        Err(VaultError::not_found("upload task", task_id))
    }

    pub fn task(&self, task_id: &str) -> Option<UploadTask> {
        lock(&self.inner.tasks).get(task_id).cloned()
    }

    /// All tasks of this process, newest first.
    pub fn tasks(&self) -> Vec<UploadTask> {
        let mut tasks: Vec<UploadTask> = lock(&self.inner.tasks).values().cloned().collect();
        tasks.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        tasks
    }

    /// The task holding the slot, if any.
    pub fn active_task(&self) -> Option<UploadTask> {
        let task_id = self.inner.lock_slot().as_ref()?.task_id.clone();
        self.task(&task_id)
    }
}

impl Inner {
    fn lock_slot(&self) -> MutexGuard<'_, Option<ActiveUpload>> {
        lock(&self.slot)
    }

    fn retry_config(&self, attempts: u32) -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(attempts)
            .with_base_delay(Duration::from_millis(self.config.retry_base_delay_ms))
            .with_max_delay(Duration::from_millis(self.config.retry_max_delay_ms))
    }

    async fn run(
        self: Arc<Self>,
        mut task: UploadTask,
        asset: Asset,
        source: PathBuf,
        token: CancellationToken,
        publisher: Publisher,
        guard: SlotGuard,
    ) -> UploadTask {
        let pinned = self.cache.pin(&source).await.is_ok();

        let result = self
            .transfer(&mut task, &asset, &source, &token, &publisher)
            .await;

        if pinned {
            self.cache.unpin(&source).await;
        }

        match result {
            Ok(url) => {
                if let Err(e) = self.cache.remove_entry(&source).await {
                    warn!("Uploaded {} but could not remove local copy: {}", asset.id, e);
                }
                match self.registry.transition(&asset.id, AssetStatus::Uploaded, |a| {
                    a.remote_url = Some(url.clone());
                    a.cached_path = None;
                }) {
                    Ok(_) => {
                        task.remote_url = Some(url);
                        task.advance(task.total_bytes);
                        task.finish(UploadState::Completed);
                        info!("Upload {} completed", task.id);
                    }
                    Err(e) => {
                        warn!("Upload {} committed but asset update failed: {}", task.id, e);
                        task.remote_url = Some(url);
                        task.error = Some(UploadFailure::from(&e));
                        task.finish(UploadState::Failed);
                    }
                }
            }
            Err(VaultError::UploadCancelled) => {
                if let Err(e) = self
                    .registry
                    .transition(&asset.id, AssetStatus::Persisted, |_| {})
                {
                    warn!("Could not restore asset {} after cancel: {}", asset.id, e);
                }
                task.finish(UploadState::Cancelled);
                info!("Upload {} cancelled at {} bytes", task.id, task.bytes_sent);
            }
            Err(e) => {
                let recorded = AssetError::from(&e);
                if let Err(update_err) = self
                    .registry
                    .transition(&asset.id, AssetStatus::Failed, |a| a.last_error = Some(recorded))
                {
                    warn!("Could not mark asset {} failed: {}", asset.id, update_err);
                }
                let failure = UploadFailure::from(&e);
                warn!(
                    "Upload {} failed ({:?}, retryable: {}): {}",
                    task.id, failure.class, failure.retryable, e
                );
                task.error = Some(failure);
                task.finish(UploadState::Failed);
            }
        }

        drop(guard);
        if task.state == UploadState::Completed {
            publisher.progress(&task);
        } else {
            publisher.snapshot(&task);
        }
        task
    }

    /// Session, chunks, commit, URL. Aborts the session on any error.
    async fn transfer(
        &self,
        task: &mut UploadTask,
        asset: &Asset,
        source: &Path,
        token: &CancellationToken,
        publisher: &Publisher,
    ) -> Result<String> {
        token.check()?;
        let total_bytes = tokio::fs::metadata(source).await.with_path(source)?.len();
        task.total_bytes = total_bytes;

        let extension = source.extension().and_then(|e| e.to_str()).unwrap_or("mp4");
        let remote_path = format!("{}/{}.{}", self.config.remote_prefix, asset.id, extension);
        let metadata = ObjectMetadata {
            content_type: MediaDescriptor::from_path(source)
                .mime_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            asset_id: asset.id.clone(),
            size_bytes: total_bytes,
            width: asset.width,
            height: asset.height,
            duration_seconds: asset.duration_seconds,
        };

        let storage = self.storage.as_ref();
        let (session, _) = retry_async(
            &self.retry_config(self.config.chunk_retry_attempts),
            self.clock.as_ref(),
            || storage.begin_upload(&remote_path, &metadata),
            |e: &VaultError| e.upload_class().is_retryable(),
        )
        .await;
        let session = session?;

        task.state = UploadState::Transferring;
        publisher.snapshot(task);

        let object = match self.send_chunks(task, &session, source, token, publisher).await {
            Ok(object) => object,
            Err(e) => {
                if let Err(abort_err) = storage.abort_upload(&session).await {
                    warn!("Failed to abort session {}: {}", session.id, abort_err);
                }
                return Err(e);
            }
        };

        let (url, stats) = retry_async(
            &self.retry_config(self.config.url_poll_attempts),
            self.clock.as_ref(),
            || storage.get_download_url(&object),
            |e: &VaultError| e.upload_class().is_retryable(),
        )
        .await;
        debug!("Resolved download URL after {} attempts", stats.attempts);
        Ok(url?.to_string())
    }

    async fn send_chunks(
        &self,
        task: &mut UploadTask,
        session: &UploadSession,
        source: &Path,
        token: &CancellationToken,
        publisher: &Publisher,
    ) -> Result<ObjectRef> {
        let storage = self.storage.as_ref();
        let retry = self.retry_config(self.config.chunk_retry_attempts);
        let mut file = tokio::fs::File::open(source).await.with_path(source)?;
        let mut buffer = vec![0u8; self.config.chunk_size.max(1)];
        let mut offset = 0u64;

        while offset < task.total_bytes {
            token.check()?;

            file.seek(std::io::SeekFrom::Start(offset))
                .await
                .with_path(source)?;
            let len = read_chunk(&mut file, &mut buffer).await.with_path(source)?;
            if len == 0 {
                return Err(VaultError::UploadFailed {
                    message: format!("{} shrank during upload", source.display()),
                });
            }
            let chunk = Bytes::copy_from_slice(&buffer[..len]);

            let (acknowledged, stats) = retry_async(
                &retry,
                self.clock.as_ref(),
                || storage.upload_chunk(session, offset, chunk.clone()),
                |e: &VaultError| e.upload_class().is_retryable(),
            )
            .await;
            let acknowledged = acknowledged?;
            if stats.attempts > 1 {
                debug!("Chunk at {} needed {} attempts", offset, stats.attempts);
            }
            if acknowledged <= offset {
                return Err(VaultError::UploadFailed {
                    message: format!("Remote acknowledged no bytes at offset {}", offset),
                });
            }
            offset = acknowledged.min(task.total_bytes);

            token.check()?;
            task.advance(offset);
            publisher.progress(task);
        }

        token.check()?;
        storage.commit_upload(session).await
    }
}

/// Fill `buffer` as far as the file allows.
async fn read_chunk(file: &mut tokio::fs::File, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let n = file.read(&mut buffer[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Guarded maps are only replaced wholesale, never left half-updated.
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, ImportConfig, ValidationConfig};
    use crate::error::UploadErrorClass;
    use crate::import::ImportOrchestrator;
    use crate::retry::RecordingClock;
    use crate::store::MemoryStore;
    use crate::test_support::{portrait_specs, FakeProbe, FakeStorage, FakeThumbnailer};
    use crate::validation::ValidationPipeline;
    use futures::StreamExt;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    const VIDEO_SIZE: usize = 10_000;

    struct Fixture {
        temp_dir: TempDir,
        cache: Arc<CacheManager>,
        registry: Arc<AssetRegistry>,
        importer: ImportOrchestrator,
        storage: Arc<FakeStorage>,
        clock: RecordingClock,
        coordinator: UploadCoordinator,
    }

    impl Fixture {
        async fn new(storage: FakeStorage) -> Self {
            let temp_dir = TempDir::new().unwrap();
            let store = Arc::new(MemoryStore::new());
            let cache = Arc::new(
                CacheManager::open(temp_dir.path().join("cache"), store.clone(), CacheConfig::default())
                    .await
                    .unwrap(),
            );
            let registry = Arc::new(AssetRegistry::load(store).unwrap());
            let validation = Arc::new(ValidationPipeline::new(
                ValidationConfig::default(),
                Arc::new(FakeProbe::new(portrait_specs())),
            ));
            let importer = ImportOrchestrator::new(
                validation,
                cache.clone(),
                registry.clone(),
                Arc::new(FakeThumbnailer::new(16)),
                ImportConfig::default(),
            );
            let storage = Arc::new(storage);
            let clock = RecordingClock::new();
            let coordinator = UploadCoordinator::new(
                storage.clone(),
                registry.clone(),
                cache.clone(),
                Arc::new(clock.clone()),
                UploadConfig {
                    chunk_size: 4096,
                    ..Default::default()
                },
            );
            Self {
                temp_dir,
                cache,
                registry,
                importer,
                storage,
                clock,
                coordinator,
            }
        }

        async fn persisted(&self, name: &str) -> Asset {
            let path = self.temp_dir.path().join(name);
            let mut bytes: Vec<u8> = (0..VIDEO_SIZE).map(|i| (i % 251) as u8).collect();
            bytes[..name.len()].copy_from_slice(name.as_bytes());
            std::fs::write(&path, bytes).unwrap();
            self.importer
                .import(MediaDescriptor::new(path).with_mime_type("video/mp4"))
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_upload_completes_and_releases_local_copy() {
        let fx = Fixture::new(FakeStorage::new()).await;
        let asset = fx.persisted("clip.mp4").await;
        let cached = asset.cached_path.clone().unwrap();
        let expected = std::fs::read(&cached).unwrap();

        let handle = fx.coordinator.start(&asset.id).unwrap();
        let task = handle.wait().await.unwrap();

        assert_eq!(task.state, UploadState::Completed);
        assert_eq!(task.progress, 1.0);
        assert_eq!(task.bytes_sent, VIDEO_SIZE as u64);
        let remote_path = format!("videos/{}.mp4", asset.id);
        assert_eq!(fx.storage.object(&remote_path).unwrap(), expected);

        let uploaded = fx.registry.get(&asset.id).unwrap();
        assert_eq!(uploaded.status, AssetStatus::Uploaded);
        assert!(uploaded.remote_url.unwrap().ends_with(&remote_path));
        assert_eq!(uploaded.cached_path, None);
        assert!(!cached.exists());
        assert!(fx.cache.entry(&cached).await.is_none());
        assert!(fx.coordinator.active_task().is_none());
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let fx = Fixture::new(FakeStorage::new()).await;
        let asset = fx.persisted("clip.mp4").await;

        let handle = fx.coordinator.start(&asset.id).unwrap();
        let updates: Vec<f64> = handle.progress_stream().collect().await;
        handle.wait().await.unwrap();

        assert!(updates.windows(2).all(|w| w[0] <= w[1]));
        assert!(updates.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[tokio::test]
    async fn test_second_upload_is_rejected_while_active() {
        let fx = Fixture::new(FakeStorage::new().with_chunk_delay(Duration::from_millis(20))).await;
        let first = fx.persisted("a.mp4").await;
        let second = fx.persisted("b.mp4").await;

        let handle = fx.coordinator.start(&first.id).unwrap();
        let result = fx.coordinator.start(&second.id);
        match result {
            Err(VaultError::ConcurrentUpload { active_task_id }) => {
                assert_eq!(active_task_id, handle.task_id());
            }
            other => panic!("expected ConcurrentUpload, got {:?}", other.map(|h| h.task_id().to_string())),
        }
        assert_eq!(fx.registry.get(&second.id).unwrap().status, AssetStatus::Persisted);

        handle.wait().await.unwrap();
        let task = fx.coordinator.start(&second.id).unwrap().wait().await.unwrap();
        assert_eq!(task.state, UploadState::Completed);
    }

    #[tokio::test]
    async fn test_cancel_keeps_local_copy() {
        let fx = Fixture::new(FakeStorage::new().with_chunk_delay(Duration::from_millis(20))).await;
        let asset = fx.persisted("clip.mp4").await;
        let cached = asset.cached_path.clone().unwrap();

        let handle = fx.coordinator.start(&asset.id).unwrap();
        let mut progress = handle.progress();
        progress.changed().await.unwrap();
        assert!(fx.coordinator.cancel(handle.task_id()).unwrap());

        let task = handle.wait().await.unwrap();
        assert_eq!(task.state, UploadState::Cancelled);
        assert!(task.progress < 1.0);
        assert_eq!(fx.storage.aborts.load(Ordering::SeqCst), 1);
        assert_eq!(fx.storage.open_sessions(), 0);

        let restored = fx.registry.get(&asset.id).unwrap();
        assert_eq!(restored.status, AssetStatus::Persisted);
        assert!(cached.exists());
        assert!(!fx.coordinator.cancel(&task.id).unwrap());
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let storage = FakeStorage::new()
            .fail_chunks([UploadErrorClass::Network, UploadErrorClass::Network])
            .with_url_misses(2);
        let fx = Fixture::new(storage).await;
        let asset = fx.persisted("clip.mp4").await;

        let task = fx.coordinator.start(&asset.id).unwrap().wait().await.unwrap();

        assert_eq!(task.state, UploadState::Completed);
        assert_eq!(fx.clock.sleeps().len(), 4);
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried_and_keeps_file() {
        let fx = Fixture::new(FakeStorage::new().fail_chunks([UploadErrorClass::Auth])).await;
        let asset = fx.persisted("clip.mp4").await;
        let cached = asset.cached_path.clone().unwrap();

        let task = fx.coordinator.start(&asset.id).unwrap().wait().await.unwrap();

        assert_eq!(task.state, UploadState::Failed);
        let failure = task.error.unwrap();
        assert_eq!(failure.class, UploadErrorClass::Auth);
        assert!(!failure.retryable);
        assert_eq!(fx.storage.chunk_calls.load(Ordering::SeqCst), 1);
        assert!(fx.clock.sleeps().is_empty());

        let failed = fx.registry.get(&asset.id).unwrap();
        assert_eq!(failed.status, AssetStatus::Failed);
        assert!(failed.last_error.is_some());
        assert!(cached.exists());

        let retry = fx.coordinator.start(&asset.id).unwrap().wait().await.unwrap();
        assert_eq!(retry.state, UploadState::Completed);
        assert_eq!(fx.registry.get(&asset.id).unwrap().last_error, None);
    }

    #[tokio::test]
    async fn test_reimport_after_failed_upload_is_duplicate() {
        let fx = Fixture::new(FakeStorage::new().fail_chunks([UploadErrorClass::Auth])).await;
        let asset = fx.persisted("clip.mp4").await;
        let cached = asset.cached_path.clone().unwrap();
        let task = fx.coordinator.start(&asset.id).unwrap().wait().await.unwrap();
        assert_eq!(task.state, UploadState::Failed);

        let source = fx.temp_dir.path().join("clip.mp4");
        let result = fx
            .importer
            .import(MediaDescriptor::new(source).with_mime_type("video/mp4"))
            .await;

        match result {
            Err(VaultError::DuplicateAsset { existing_id, .. }) => assert_eq!(existing_id, asset.id),
            other => panic!("expected DuplicateAsset, got {:?}", other.map(|a| a.id)),
        }
        let kept = fx.registry.get(&asset.id).unwrap();
        assert_eq!(kept.status, AssetStatus::Failed);
        assert_eq!(kept.cached_path.as_ref(), Some(&cached));
        assert!(cached.exists());
        assert!(fx.cache.entry(&cached).await.is_some());
        assert_eq!(fx.registry.list().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_as_network() {
        let storage = FakeStorage::new().fail_chunks([UploadErrorClass::Network; 3]);
        let fx = Fixture::new(storage).await;
        let asset = fx.persisted("clip.mp4").await;

        let task = fx.coordinator.start(&asset.id).unwrap().wait().await.unwrap();

        assert_eq!(task.state, UploadState::Failed);
        let failure = task.error.unwrap();
        assert_eq!(failure.class, UploadErrorClass::Network);
        assert!(failure.retryable);
        assert_eq!(fx.clock.sleeps().len(), 2);
    }

    #[tokio::test]
    async fn test_start_requires_persisted_asset() {
        let fx = Fixture::new(FakeStorage::new()).await;
        assert!(matches!(
            fx.coordinator.start("missing"),
            Err(VaultError::NotFound { .. })
        ));

        let asset = fx.persisted("clip.mp4").await;
        fx.coordinator.start(&asset.id).unwrap().wait().await.unwrap();
        assert!(matches!(
            fx.coordinator.start(&asset.id),
            Err(VaultError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_unknown_task() {
        let fx = Fixture::new(FakeStorage::new()).await;
        assert!(matches!(
            fx.coordinator.cancel("nope"),
            Err(VaultError::NotFound { .. })
        ));
    }
}
