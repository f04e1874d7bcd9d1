//! Remote storage contract.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

/// Descriptive metadata stored next to an uploaded object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ObjectMetadata {
    pub content_type: String,
    pub asset_id: String,
    pub size_bytes: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_seconds: Option<f64>,
}

/// An open upload session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub id: String,
    pub remote_path: String,
}

/// A committed object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub remote_path: String,
    pub size_bytes: u64,
}

/// Durable remote storage reached through a chunked, resumable session.
///
/// Failures must be reported as `Network` (transient), `AuthRequired`
/// (credentials rejected) or any other variant (unknown).
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    async fn begin_upload(&self, remote_path: &str, metadata: &ObjectMetadata)
        -> Result<UploadSession>;

    /// Write `chunk` at `offset` and return the total number of bytes the
    /// session now holds. Re-sending a range that was already written is
    /// allowed; it replaces the previous bytes.
    async fn upload_chunk(&self, session: &UploadSession, offset: u64, chunk: Bytes)
        -> Result<u64>;

    async fn commit_upload(&self, session: &UploadSession) -> Result<ObjectRef>;

    /// Discard a session and any partial data.
    async fn abort_upload(&self, session: &UploadSession) -> Result<()>;

    /// Download URL of a committed object. May fail with `NotFound` or
    /// `Network` until the object becomes visible.
    async fn get_download_url(&self, object: &ObjectRef) -> Result<Url>;
}
