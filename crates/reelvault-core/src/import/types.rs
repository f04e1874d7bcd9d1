//! Asset records and their status machine.

use crate::error::{ErrorCode, Result, VaultError};
use crate::media::MediaSpecs;
use crate::signature::ContentSignature;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Lifecycle of an asset.
///
/// Import moves forward through the sequence from `Received` to `Persisted`.
/// `Duplicate` and `Rejected` are absorbing. `Failed` records a processing
/// or transfer failure; a failed asset that kept its local copy may retry
/// the upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Received,
    SignatureComputed,
    Duplicate,
    QuickValidated,
    DeepValidated,
    ThumbnailGenerated,
    Persisted,
    Rejected,
    Uploading,
    Uploaded,
    Failed,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Received => "received",
            AssetStatus::SignatureComputed => "signature_computed",
            AssetStatus::Duplicate => "duplicate",
            AssetStatus::QuickValidated => "quick_validated",
            AssetStatus::DeepValidated => "deep_validated",
            AssetStatus::ThumbnailGenerated => "thumbnail_generated",
            AssetStatus::Persisted => "persisted",
            AssetStatus::Rejected => "rejected",
            AssetStatus::Uploading => "uploading",
            AssetStatus::Uploaded => "uploaded",
            AssetStatus::Failed => "failed",
        }
    }

    /// Whether `next` is a legal successor of this status.
    pub fn can_transition_to(&self, next: AssetStatus) -> bool {
        use AssetStatus::*;
        matches!(
            (self, next),
            (Received, SignatureComputed)
                | (Received, Failed)
                | (SignatureComputed, Duplicate)
                | (SignatureComputed, QuickValidated)
                | (SignatureComputed, Rejected)
                | (SignatureComputed, Failed)
                | (QuickValidated, DeepValidated)
                | (QuickValidated, Rejected)
                | (QuickValidated, Failed)
                | (DeepValidated, ThumbnailGenerated)
                | (DeepValidated, Failed)
                | (ThumbnailGenerated, Persisted)
                | (ThumbnailGenerated, Failed)
                | (Persisted, Uploading)
                | (Uploading, Uploaded)
                | (Uploading, Failed)
                | (Uploading, Persisted)
                | (Failed, Uploading)
        )
    }

    /// Statuses that still occupy their content signature.
    pub fn is_live(&self) -> bool {
        !matches!(
            self,
            AssetStatus::Duplicate | AssetStatus::Rejected | AssetStatus::Failed
        )
    }

    /// Statuses an import is still working through.
    pub fn is_importing(&self) -> bool {
        matches!(
            self,
            AssetStatus::Received
                | AssetStatus::SignatureComputed
                | AssetStatus::QuickValidated
                | AssetStatus::DeepValidated
                | AssetStatus::ThumbnailGenerated
        )
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last failure recorded on an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AssetError {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&VaultError> for AssetError {
    fn from(err: &VaultError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// An imported media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Asset {
    pub id: String,
    pub content_signature: ContentSignature,
    pub source_uri: String,
    /// Cached copy. Set once persisted, cleared after a completed upload.
    pub cached_path: Option<PathBuf>,
    pub size_bytes: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub codec: Option<String>,
    pub status: AssetStatus,
    pub thumbnail_ref: Option<PathBuf>,
    /// Download URL once uploaded.
    pub remote_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_error: Option<AssetError>,
}

impl Asset {
    /// A new asset in `SignatureComputed` with a fresh id.
    pub fn new(signature: ContentSignature, source_uri: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            size_bytes: signature.size_bytes,
            content_signature: signature,
            source_uri: source_uri.into(),
            cached_path: None,
            width: None,
            height: None,
            fps: None,
            duration_seconds: None,
            codec: None,
            status: AssetStatus::SignatureComputed,
            thumbnail_ref: None,
            remote_url: None,
            created_at: now,
            updated_at: now,
            last_error: None,
        }
    }

    /// Move to `next`, or fail with `InvalidTransition`.
    pub fn transition(&mut self, next: AssetStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(VaultError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn apply_specs(&mut self, specs: &MediaSpecs) {
        self.width = Some(specs.width);
        self.height = Some(specs.height);
        self.fps = specs.fps;
        self.duration_seconds = Some(specs.duration_secs);
        self.codec = Some(specs.codec.clone());
    }

    /// Whether an upload may start from the current state.
    pub fn is_uploadable(&self) -> bool {
        matches!(self.status, AssetStatus::Persisted | AssetStatus::Failed)
            && self.cached_path.is_some()
    }

    /// Whether this record blocks another import of the same content.
    ///
    /// A failed upload keeps its local copy for a retry, so it still holds
    /// the signature.
    pub fn holds_signature(&self) -> bool {
        self.status.is_live() || (self.status == AssetStatus::Failed && self.cached_path.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset() -> Asset {
        Asset::new(
            ContentSignature {
                size_bytes: 42,
                modified_ns: 7,
                header_digest: "ff".to_string(),
            },
            "file:///clip.mp4",
        )
    }

    #[test]
    fn test_import_sequence_is_legal() {
        let mut asset = asset();
        for next in [
            AssetStatus::QuickValidated,
            AssetStatus::DeepValidated,
            AssetStatus::ThumbnailGenerated,
            AssetStatus::Persisted,
            AssetStatus::Uploading,
            AssetStatus::Uploaded,
        ] {
            asset.transition(next).unwrap();
        }
        assert_eq!(asset.status, AssetStatus::Uploaded);
    }

    #[test]
    fn test_absorbing_states() {
        for terminal in [AssetStatus::Duplicate, AssetStatus::Rejected, AssetStatus::Uploaded] {
            let mut asset = asset();
            asset.status = terminal;
            assert!(asset.transition(AssetStatus::Uploading).is_err());
            assert!(asset.transition(AssetStatus::Persisted).is_err());
        }
    }

    #[test]
    fn test_uploading_only_from_persisted_or_failed() {
        let mut asset = asset();
        let err = asset.transition(AssetStatus::Uploading).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidTransition);
        assert_eq!(
            err.to_string(),
            "Invalid status transition from signature_computed to uploading"
        );

        asset.status = AssetStatus::Failed;
        assert!(!asset.is_uploadable());
        asset.cached_path = Some(PathBuf::from("/cache/imports/a.mp4"));
        assert!(asset.is_uploadable());
        asset.transition(AssetStatus::Uploading).unwrap();
    }

    #[test]
    fn test_no_skipping_stages() {
        let mut asset = asset();
        assert!(asset.transition(AssetStatus::Persisted).is_err());
        assert!(asset.transition(AssetStatus::DeepValidated).is_err());
    }

    #[test]
    fn test_liveness() {
        assert!(AssetStatus::Persisted.is_live());
        assert!(AssetStatus::Received.is_live());
        assert!(!AssetStatus::Rejected.is_live());
        assert!(!AssetStatus::Failed.is_live());
    }

    #[test]
    fn test_failed_upload_holds_signature() {
        let mut asset = asset();
        asset.status = AssetStatus::Failed;
        assert!(!asset.holds_signature());

        asset.cached_path = Some(PathBuf::from("/cache/imports/a.mp4"));
        assert!(asset.holds_signature());

        asset.status = AssetStatus::Rejected;
        assert!(!asset.holds_signature());
    }

    #[test]
    fn test_persisted_without_local_copy_is_not_uploadable() {
        let mut asset = asset();
        asset.status = AssetStatus::Persisted;
        assert!(!asset.is_uploadable());
        asset.cached_path = Some(PathBuf::from("/cache/imports/a.mp4"));
        assert!(asset.is_uploadable());
    }

    #[test]
    fn test_serde_status_names() {
        assert_eq!(
            serde_json::to_string(&AssetStatus::ThumbnailGenerated).unwrap(),
            "\"thumbnail_generated\""
        );
    }
}
