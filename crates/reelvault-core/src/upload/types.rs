//! Upload task records.

use crate::error::{ErrorCode, UploadErrorClass, VaultError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Preparing,
    Transferring,
    Cancelled,
    Completed,
    Failed,
}

impl UploadState {
    /// Whether the task occupies the upload slot.
    pub fn is_active(&self) -> bool {
        matches!(self, UploadState::Preparing | UploadState::Transferring)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl std::fmt::Display for UploadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UploadState::Preparing => "preparing",
            UploadState::Transferring => "transferring",
            UploadState::Cancelled => "cancelled",
            UploadState::Completed => "completed",
            UploadState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Classified failure of an upload task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UploadFailure {
    pub code: ErrorCode,
    pub message: String,
    pub class: UploadErrorClass,
    pub retryable: bool,
}

impl From<&VaultError> for UploadFailure {
    fn from(err: &VaultError) -> Self {
        let class = err.upload_class();
        Self {
            code: err.code(),
            message: err.to_string(),
            class,
            retryable: class.is_retryable(),
        }
    }
}

/// One transfer of an asset to remote storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UploadTask {
    pub id: String,
    pub asset_id: String,
    pub state: UploadState,
    /// Fraction of bytes acknowledged by the remote, in `[0, 1]`.
    pub progress: f64,
    pub bytes_sent: u64,
    pub total_bytes: u64,
    pub remote_url: Option<String>,
    pub error: Option<UploadFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl UploadTask {
    pub fn new(asset_id: impl Into<String>, total_bytes: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            asset_id: asset_id.into(),
            state: UploadState::Preparing,
            progress: 0.0,
            bytes_sent: 0,
            total_bytes,
            remote_url: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Record acknowledged bytes. Progress never moves backwards.
    pub fn advance(&mut self, bytes_sent: u64) {
        self.bytes_sent = self.bytes_sent.max(bytes_sent.min(self.total_bytes));
        let fraction = if self.total_bytes == 0 {
            1.0
        } else {
            self.bytes_sent as f64 / self.total_bytes as f64
        };
        self.progress = self.progress.max(fraction.clamp(0.0, 1.0));
    }

    pub fn finish(&mut self, state: UploadState) {
        self.state = state;
        self.finished_at = Some(Utc::now());
    }
}
