//! Error types for ReelVault.
//!
//! Every failure that crosses a component boundary is a [`VaultError`]. Each
//! variant maps to a closed [`ErrorCode`], carries a human-readable message
//! and knows whether the caller may retry.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Machine-readable error codes exposed to callers and stored on records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    DuplicateAsset,
    InvalidFormat,
    FileTooLarge,
    AspectRatioRejected,
    CodecRejected,
    DurationExceeded,
    ValidationTimeout,
    IoError,
    AuthRequired,
    NetworkError,
    ConcurrentUploadError,
    EvictionInsufficient,
    CacheCorrupted,
    CacheFull,
    ThumbnailFailed,
    ImportTimedOut,
    UploadCancelled,
    UploadFailed,
    NotFound,
    InvalidTransition,
    SerializationError,
    ConfigError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DuplicateAsset => "DUPLICATE_ASSET",
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::FileTooLarge => "FILE_TOO_LARGE",
            ErrorCode::AspectRatioRejected => "ASPECT_RATIO_REJECTED",
            ErrorCode::CodecRejected => "CODEC_REJECTED",
            ErrorCode::DurationExceeded => "DURATION_EXCEEDED",
            ErrorCode::ValidationTimeout => "VALIDATION_TIMEOUT",
            ErrorCode::IoError => "IO_ERROR",
            ErrorCode::AuthRequired => "AUTH_REQUIRED",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::ConcurrentUploadError => "CONCURRENT_UPLOAD_ERROR",
            ErrorCode::EvictionInsufficient => "EVICTION_INSUFFICIENT",
            ErrorCode::CacheCorrupted => "CACHE_CORRUPTED",
            ErrorCode::CacheFull => "CACHE_FULL",
            ErrorCode::ThumbnailFailed => "THUMBNAIL_FAILED",
            ErrorCode::ImportTimedOut => "IMPORT_TIMED_OUT",
            ErrorCode::UploadCancelled => "UPLOAD_CANCELLED",
            ErrorCode::UploadFailed => "UPLOAD_FAILED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InvalidTransition => "INVALID_TRANSITION",
            ErrorCode::SerializationError => "SERIALIZATION_ERROR",
            ErrorCode::ConfigError => "CONFIG_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an upload failure should be handled by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadErrorClass {
    /// Transient connectivity problem; retry with the same asset.
    Network,
    /// Credentials rejected; requires re-authentication outside this crate.
    Auth,
    /// Anything else. Retried by default.
    Unknown,
}

impl UploadErrorClass {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, UploadErrorClass::Auth)
    }
}

/// Main error type for the ReelVault library.
#[derive(Debug, Error)]
pub enum VaultError {
    // Import errors
    #[error("Asset already imported as {existing_id}")]
    DuplicateAsset {
        existing_id: String,
        signature: String,
    },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("File too large: {size_bytes} bytes exceeds limit of {limit_bytes} bytes")]
    FileTooLarge { size_bytes: u64, limit_bytes: u64 },

    #[error("Video must be portrait, got {width}x{height}")]
    AspectRatioRejected { width: u32, height: u32 },

    #[error("Unsupported codec: {codec}")]
    CodecRejected { codec: String },

    #[error("Video too long: {duration_secs:.1}s exceeds limit of {limit_secs:.1}s")]
    DurationExceeded { duration_secs: f64, limit_secs: f64 },

    #[error("{stage} validation did not finish within {budget:?}")]
    ValidationTimeout { stage: String, budget: Duration },

    #[error("Thumbnail extraction failed: {message}")]
    ThumbnailFailed { message: String },

    #[error("Import did not finish within {0:?}")]
    ImportTimedOut(Duration),

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Cache errors
    #[error("Cannot fit {required_bytes} bytes into a cache of {max_bytes} bytes")]
    EvictionInsufficient { required_bytes: u64, max_bytes: u64 },

    #[error("Cache is full: {required_bytes} bytes could not be stored")]
    CacheFull { required_bytes: u64 },

    #[error("Cache metadata corrupted: {message}")]
    CacheCorrupted { message: String },

    // Upload errors
    #[error("Authentication required: {message}")]
    AuthRequired { message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Upload {active_task_id} is already in progress")]
    ConcurrentUpload { active_task_id: String },

    #[error("Upload cancelled")]
    UploadCancelled,

    #[error("Upload failed: {message}")]
    UploadFailed { message: String },

    // Lookup and state errors
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for ReelVault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        VaultError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        VaultError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

/// Attach a path to `std::io::Result` failures.
pub trait IoResultExt<T> {
    fn with_path(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| VaultError::io_with_path(e, path.as_ref()))
    }
}

impl VaultError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        VaultError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        VaultError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Machine code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            VaultError::DuplicateAsset { .. } => ErrorCode::DuplicateAsset,
            VaultError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            VaultError::FileTooLarge { .. } => ErrorCode::FileTooLarge,
            VaultError::AspectRatioRejected { .. } => ErrorCode::AspectRatioRejected,
            VaultError::CodecRejected { .. } => ErrorCode::CodecRejected,
            VaultError::DurationExceeded { .. } => ErrorCode::DurationExceeded,
            VaultError::ValidationTimeout { .. } => ErrorCode::ValidationTimeout,
            VaultError::ThumbnailFailed { .. } => ErrorCode::ThumbnailFailed,
            VaultError::ImportTimedOut(_) => ErrorCode::ImportTimedOut,
            VaultError::Io { .. } => ErrorCode::IoError,
            VaultError::EvictionInsufficient { .. } => ErrorCode::EvictionInsufficient,
            VaultError::CacheFull { .. } => ErrorCode::CacheFull,
            VaultError::CacheCorrupted { .. } => ErrorCode::CacheCorrupted,
            VaultError::AuthRequired { .. } => ErrorCode::AuthRequired,
            VaultError::Network { .. } => ErrorCode::NetworkError,
            VaultError::ConcurrentUpload { .. } => ErrorCode::ConcurrentUploadError,
            VaultError::UploadCancelled => ErrorCode::UploadCancelled,
            VaultError::UploadFailed { .. } => ErrorCode::UploadFailed,
            VaultError::NotFound { .. } => ErrorCode::NotFound,
            VaultError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            VaultError::Json { .. } => ErrorCode::SerializationError,
            VaultError::Config { .. } => ErrorCode::ConfigError,
        }
    }

    /// Whether the caller can retry, either with new input or the same input
    /// after remediation.
    pub fn is_recoverable(&self) -> bool {
        match self {
            VaultError::AuthRequired { .. }
            | VaultError::InvalidTransition { .. }
            | VaultError::CacheCorrupted { .. }
            | VaultError::Json { .. }
            | VaultError::Config { .. } => false,
            VaultError::DuplicateAsset { .. }
            | VaultError::InvalidFormat { .. }
            | VaultError::FileTooLarge { .. }
            | VaultError::AspectRatioRejected { .. }
            | VaultError::CodecRejected { .. }
            | VaultError::DurationExceeded { .. }
            | VaultError::ValidationTimeout { .. }
            | VaultError::ThumbnailFailed { .. }
            | VaultError::ImportTimedOut(_)
            | VaultError::Io { .. }
            | VaultError::EvictionInsufficient { .. }
            | VaultError::CacheFull { .. }
            | VaultError::Network { .. }
            | VaultError::ConcurrentUpload { .. }
            | VaultError::UploadCancelled
            | VaultError::UploadFailed { .. }
            | VaultError::NotFound { .. } => true,
        }
    }

    /// Classify a transfer failure.
    pub fn upload_class(&self) -> UploadErrorClass {
        match self {
            VaultError::Network { .. } => UploadErrorClass::Network,
            VaultError::AuthRequired { .. } => UploadErrorClass::Auth,
            _ => UploadErrorClass::Unknown,
        }
    }

    /// Remediation hints suitable for showing next to the message.
    pub fn suggestions(&self) -> Vec<String> {
        let hints: &[&str] = match self {
            VaultError::InvalidFormat { .. } => &[
                "Only MP4 videos are accepted",
                "Ensure the video file is not corrupted",
            ],
            VaultError::FileTooLarge { .. } => &[
                "Try compressing the video",
                "Use a lower quality setting when recording",
            ],
            VaultError::AspectRatioRejected { .. } => &[
                "Video must be recorded in portrait mode",
                "Rotate or crop the video with an editor",
            ],
            VaultError::CodecRejected { .. } => &["Re-encode the video as H.264 or HEVC"],
            VaultError::DurationExceeded { .. } => &[
                "Trim your video to be shorter",
                "Split long videos into multiple parts",
            ],
            VaultError::ValidationTimeout { .. } | VaultError::ImportTimedOut(_) => {
                &["Try importing again"]
            }
            VaultError::Network { .. } => &["Check your network connection", "Try uploading again"],
            VaultError::AuthRequired { .. } => &["Sign in again before uploading"],
            VaultError::CacheFull { .. } | VaultError::EvictionInsufficient { .. } => {
                &["Free up space by deleting imported videos"]
            }
            VaultError::ConcurrentUpload { .. } => &["Wait for the current upload to finish"],
            _ => &[],
        };
        hints.iter().map(|s| s.to_string()).collect()
    }
}
