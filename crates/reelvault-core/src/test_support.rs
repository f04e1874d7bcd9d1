//! Fakes shared by unit tests.

use crate::error::{Result, UploadErrorClass, VaultError};
use crate::media::{MediaProbe, MediaSpecs, ThumbnailExtractor};
use crate::upload::{ObjectMetadata, ObjectRef, RemoteStorage, UploadSession};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub fn portrait_specs() -> MediaSpecs {
    MediaSpecs {
        width: 720,
        height: 1280,
        codec: "h264".to_string(),
        duration_secs: 45.0,
        fps: Some(30.0),
    }
}

/// Probe returning fixed specs.
pub struct FakeProbe {
    specs: Option<MediaSpecs>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl FakeProbe {
    pub fn new(specs: MediaSpecs) -> Self {
        Self {
            specs: Some(specs),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            specs: None,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl MediaProbe for FakeProbe {
    async fn probe(&self, _path: &Path) -> Result<MediaSpecs> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.specs.clone().ok_or_else(|| VaultError::InvalidFormat {
            message: "moov atom not found".to_string(),
        })
    }
}

/// Thumbnailer returning a fixed number of bytes.
pub struct FakeThumbnailer {
    size: usize,
    fail: bool,
    delay: Duration,
}

impl FakeThumbnailer {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            fail: false,
            delay: Duration::ZERO,
        }
    }

    pub fn failing() -> Self {
        Self {
            size: 0,
            fail: true,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ThumbnailExtractor for FakeThumbnailer {
    async fn extract_frame(&self, _path: &Path, _at_seconds: f64) -> Result<Vec<u8>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(VaultError::ThumbnailFailed {
                message: "decoder error".to_string(),
            });
        }
        Ok(vec![0xFF; self.size])
    }
}

/// In-memory remote storage with scripted failures.
#[derive(Default)]
pub struct FakeStorage {
    sessions: Mutex<HashMap<String, Vec<u8>>>,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    chunk_failures: Mutex<VecDeque<UploadErrorClass>>,
    url_misses: AtomicUsize,
    chunk_delay: Mutex<Duration>,
    pub chunk_calls: AtomicUsize,
    pub aborts: AtomicUsize,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next chunk calls, one per entry, with the given class.
    pub fn fail_chunks(self, failures: impl IntoIterator<Item = UploadErrorClass>) -> Self {
        self.chunk_failures.lock().unwrap().extend(failures);
        self
    }

    /// Report `NotFound` for the first `misses` URL lookups.
    pub fn with_url_misses(self, misses: usize) -> Self {
        self.url_misses.store(misses, Ordering::SeqCst);
        self
    }

    pub fn with_chunk_delay(self, delay: Duration) -> Self {
        *self.chunk_delay.lock().unwrap() = delay;
        self
    }

    pub fn object(&self, remote_path: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(remote_path).cloned()
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteStorage for FakeStorage {
    async fn begin_upload(
        &self,
        remote_path: &str,
        _metadata: &ObjectMetadata,
    ) -> Result<UploadSession> {
        let session = UploadSession {
            id: uuid::Uuid::new_v4().to_string(),
            remote_path: remote_path.to_string(),
        };
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), Vec::new());
        Ok(session)
    }

    async fn upload_chunk(&self, session: &UploadSession, offset: u64, chunk: Bytes) -> Result<u64> {
        self.chunk_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.chunk_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let failure = self.chunk_failures.lock().unwrap().pop_front();
        match failure {
            Some(UploadErrorClass::Network) => {
                return Err(VaultError::Network {
                    message: "connection reset".to_string(),
                })
            }
            Some(UploadErrorClass::Auth) => {
                return Err(VaultError::AuthRequired {
                    message: "token expired".to_string(),
                })
            }
            Some(UploadErrorClass::Unknown) => {
                return Err(VaultError::UploadFailed {
                    message: "bucket is read-only".to_string(),
                })
            }
            None => {}
        }

        let mut sessions = self.sessions.lock().unwrap();
        let data = sessions
            .get_mut(&session.id)
            .ok_or_else(|| VaultError::not_found("upload session", &session.id))?;
        data.truncate(offset as usize);
        data.extend_from_slice(&chunk);
        Ok(data.len() as u64)
    }

    async fn commit_upload(&self, session: &UploadSession) -> Result<ObjectRef> {
        let data = self
            .sessions
            .lock()
            .unwrap()
            .remove(&session.id)
            .ok_or_else(|| VaultError::not_found("upload session", &session.id))?;
        let size_bytes = data.len() as u64;
        self.objects
            .lock()
            .unwrap()
            .insert(session.remote_path.clone(), data);
        Ok(ObjectRef {
            remote_path: session.remote_path.clone(),
            size_bytes,
        })
    }

    async fn abort_upload(&self, session: &UploadSession) -> Result<()> {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        self.sessions.lock().unwrap().remove(&session.id);
        Ok(())
    }

    async fn get_download_url(&self, object: &ObjectRef) -> Result<Url> {
        let pending = self
            .url_misses
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(VaultError::not_found("object", &object.remote_path));
        }
        Url::parse(&format!("https://cdn.example.test/{}", object.remote_path)).map_err(|e| {
            VaultError::UploadFailed {
                message: e.to_string(),
            }
        })
    }
}
