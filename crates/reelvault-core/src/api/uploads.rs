//! Upload methods for MediaVault.

use crate::error::Result;
use crate::upload::{UploadHandle, UploadTask};
use crate::MediaVault;

impl MediaVault {
    /// Start uploading a persisted asset.
    ///
    /// Only one upload runs at a time; a second call while one is active
    /// fails with `ConcurrentUpload`.
    pub fn upload(&self, asset_id: &str) -> Result<UploadHandle> {
        self.uploads.start(asset_id)
    }

    /// Cancel a running upload. Returns `false` if it already finished.
    pub fn cancel_upload(&self, task_id: &str) -> Result<bool> {
        self.uploads.cancel(task_id)
    }

    pub fn upload_task(&self, task_id: &str) -> Option<UploadTask> {
        self.uploads.task(task_id)
    }

    pub fn upload_tasks(&self) -> Vec<UploadTask> {
        self.uploads.tasks()
    }

    pub fn active_upload(&self) -> Option<UploadTask> {
        self.uploads.active_task()
    }
}
