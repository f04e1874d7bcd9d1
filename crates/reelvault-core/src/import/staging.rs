//! Scratch files that delete themselves unless handed off.

use crate::error::{IoResultExt, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// A file in the staging directory, removed on drop unless
/// [`persisted`](Self::persisted) was called.
///
/// Dropping the import future (outer timeout, caller gave up) drops the guard
/// too, so no exit path leaves a temp copy behind.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    armed: bool,
}

impl StagedFile {
    /// Copy `source` into `staging_dir/name`.
    pub async fn copy_from(source: &Path, staging_dir: &Path, name: &str) -> Result<Self> {
        let guard = Self::armed(staging_dir.join(name));

        let mut reader = tokio::fs::File::open(source).await.with_path(source)?;
        let mut writer = tokio::fs::File::create(&guard.path)
            .await
            .with_path(&guard.path)?;
        let copied = tokio::io::copy(&mut reader, &mut writer)
            .await
            .with_path(&guard.path)?;
        writer.flush().await.with_path(&guard.path)?;

        debug!(
            "Staged {} bytes from {} at {}",
            copied,
            source.display(),
            guard.path.display()
        );
        Ok(guard)
    }

    /// Write `bytes` to `staging_dir/name`.
    pub async fn write(staging_dir: &Path, name: &str, bytes: &[u8]) -> Result<Self> {
        let guard = Self::armed(staging_dir.join(name));
        tokio::fs::write(&guard.path, bytes)
            .await
            .with_path(&guard.path)?;
        Ok(guard)
    }

    fn armed(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file was moved somewhere permanent; do not delete on drop.
    pub fn persisted(mut self) {
        self.armed = false;
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed staged file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove staged file {}: {}", self.path.display(), e),
        }
    }
}
