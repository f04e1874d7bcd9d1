//! Directory-backed [`RemoteStorage`].
//!
//! Sessions write to `<root>/.sessions/<id>.part`. Commit renames the part
//! file to `<root>/<remote_path>` and writes a `.meta.json` sidecar.

use super::storage::{ObjectMetadata, ObjectRef, RemoteStorage, UploadSession};
use crate::error::{IoResultExt, Result, VaultError};
use crate::store::atomic_write_json;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::debug;
use url::Url;

const SESSIONS_DIR: &str = ".sessions";

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let sessions = root.join(SESSIONS_DIR);
        std::fs::create_dir_all(&sessions).with_path(&sessions)?;
        let root = std::fs::canonicalize(&root).with_path(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn part_path(&self, session: &UploadSession) -> PathBuf {
        self.root
            .join(SESSIONS_DIR)
            .join(format!("{}.part", session.id))
    }

    fn meta_path(&self, session: &UploadSession) -> PathBuf {
        self.root
            .join(SESSIONS_DIR)
            .join(format!("{}.meta.json", session.id))
    }

    fn object_path(&self, remote_path: &str) -> Result<PathBuf> {
        let relative = Path::new(remote_path);
        let safe = !remote_path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(VaultError::UploadFailed {
                message: format!("Invalid remote path: {}", remote_path),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl RemoteStorage for LocalObjectStore {
    async fn begin_upload(
        &self,
        remote_path: &str,
        metadata: &ObjectMetadata,
    ) -> Result<UploadSession> {
        self.object_path(remote_path)?;
        let session = UploadSession {
            id: uuid::Uuid::new_v4().to_string(),
            remote_path: remote_path.to_string(),
        };

        let part = self.part_path(&session);
        tokio::fs::File::create(&part).await.with_path(&part)?;
        atomic_write_json(&self.meta_path(&session), metadata)?;

        debug!("Opened upload session {} for {}", session.id, remote_path);
        Ok(session)
    }

    async fn upload_chunk(&self, session: &UploadSession, offset: u64, chunk: Bytes) -> Result<u64> {
        let part = self.part_path(session);
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&part)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => VaultError::not_found("upload session", &session.id),
                _ => VaultError::io_with_path(e, &part),
            })?;

        let current = file.metadata().await.with_path(&part)?.len();
        if offset > current {
            return Err(VaultError::UploadFailed {
                message: format!("Chunk at {} leaves a gap after {} bytes", offset, current),
            });
        }

        file.set_len(offset).await.with_path(&part)?;
        file.seek(std::io::SeekFrom::Start(offset))
            .await
            .with_path(&part)?;
        file.write_all(&chunk).await.with_path(&part)?;
        file.flush().await.with_path(&part)?;

        Ok(offset + chunk.len() as u64)
    }

    async fn commit_upload(&self, session: &UploadSession) -> Result<ObjectRef> {
        let part = self.part_path(session);
        let target = self.object_path(&session.remote_path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.with_path(parent)?;
        }

        let size_bytes = tokio::fs::metadata(&part).await.with_path(&part)?.len();
        tokio::fs::rename(&part, &target).await.with_path(&target)?;

        let meta = self.meta_path(session);
        let sidecar = target.with_file_name(format!(
            "{}.meta.json",
            target
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("object")
        ));
        tokio::fs::rename(&meta, &sidecar).await.with_path(&sidecar)?;

        debug!("Committed {} ({} bytes)", session.remote_path, size_bytes);
        Ok(ObjectRef {
            remote_path: session.remote_path.clone(),
            size_bytes,
        })
    }

    async fn abort_upload(&self, session: &UploadSession) -> Result<()> {
        for path in [self.part_path(session), self.meta_path(session)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(VaultError::io_with_path(e, path)),
            }
        }
        debug!("Aborted upload session {}", session.id);
        Ok(())
    }

    async fn get_download_url(&self, object: &ObjectRef) -> Result<Url> {
        let path = self.object_path(&object.remote_path)?;
        if !tokio::fs::try_exists(&path).await.with_path(&path)? {
            return Err(VaultError::not_found("object", &object.remote_path));
        }
        Url::from_file_path(&path).map_err(|_| VaultError::UploadFailed {
            message: format!("Cannot build a URL for {}", path.display()),
        })
    }
}
