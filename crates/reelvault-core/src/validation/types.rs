//! Validation inputs and results.

use crate::error::{ErrorCode, VaultError};
use crate::media::MediaSpecs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// What the caller knows about a file it wants to import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MediaDescriptor {
    /// Local path of the source file.
    pub path: PathBuf,
    /// Declared MIME type.
    pub mime_type: Option<String>,
    /// Declared size. When absent the file is stat'ed.
    pub size_bytes: Option<u64>,
    /// Where the file originally came from (camera roll URI, share sheet, ...).
    /// Defaults to the path.
    pub source_uri: Option<String>,
}

impl MediaDescriptor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mime_type: None,
            size_bytes: None,
            source_uri: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    pub fn with_source_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_uri = Some(uri.into());
        self
    }

    /// MP4 descriptor guessed from the file extension, for CLI use.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mime_type = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("mp4") | Some("m4v") => Some("video/mp4".to_string()),
            Some("mov") => Some("video/quicktime".to_string()),
            Some("webm") => Some("video/webm".to_string()),
            _ => None,
        };
        Self {
            path,
            mime_type,
            size_bytes: None,
            source_uri: None,
        }
    }

    pub fn source_uri(&self) -> String {
        self.source_uri
            .clone()
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStage {
    Quick,
    Deep,
}

impl std::fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationStage::Quick => write!(f, "quick"),
            ValidationStage::Deep => write!(f, "deep"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    Pass,
    Fail,
    Timeout,
}

/// Why a stage did not pass. Cloneable so reports can be cached and replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationFailure {
    InvalidFormat { message: String },
    FileTooLarge { size_bytes: u64, limit_bytes: u64 },
    AspectRatioRejected { width: u32, height: u32 },
    CodecRejected { codec: String },
    DurationExceeded { duration_secs: f64, limit_secs: f64 },
    Timeout { stage: ValidationStage, budget_ms: u64 },
}

impl ValidationFailure {
    /// Map a check error onto a failure. Errors outside the validation
    /// taxonomy (unreadable file, probe crash) count as an invalid format.
    pub fn from_error(err: &VaultError) -> Self {
        match err {
            VaultError::InvalidFormat { message } => ValidationFailure::InvalidFormat {
                message: message.clone(),
            },
            VaultError::FileTooLarge {
                size_bytes,
                limit_bytes,
            } => ValidationFailure::FileTooLarge {
                size_bytes: *size_bytes,
                limit_bytes: *limit_bytes,
            },
            VaultError::AspectRatioRejected { width, height } => {
                ValidationFailure::AspectRatioRejected {
                    width: *width,
                    height: *height,
                }
            }
            VaultError::CodecRejected { codec } => ValidationFailure::CodecRejected {
                codec: codec.clone(),
            },
            VaultError::DurationExceeded {
                duration_secs,
                limit_secs,
            } => ValidationFailure::DurationExceeded {
                duration_secs: *duration_secs,
                limit_secs: *limit_secs,
            },
            other => ValidationFailure::InvalidFormat {
                message: other.to_string(),
            },
        }
    }

    pub fn to_error(&self) -> VaultError {
        match self {
            ValidationFailure::InvalidFormat { message } => VaultError::InvalidFormat {
                message: message.clone(),
            },
            ValidationFailure::FileTooLarge {
                size_bytes,
                limit_bytes,
            } => VaultError::FileTooLarge {
                size_bytes: *size_bytes,
                limit_bytes: *limit_bytes,
            },
            ValidationFailure::AspectRatioRejected { width, height } => {
                VaultError::AspectRatioRejected {
                    width: *width,
                    height: *height,
                }
            }
            ValidationFailure::CodecRejected { codec } => VaultError::CodecRejected {
                codec: codec.clone(),
            },
            ValidationFailure::DurationExceeded {
                duration_secs,
                limit_secs,
            } => VaultError::DurationExceeded {
                duration_secs: *duration_secs,
                limit_secs: *limit_secs,
            },
            ValidationFailure::Timeout { stage, budget_ms } => VaultError::ValidationTimeout {
                stage: stage.to_string(),
                budget: Duration::from_millis(*budget_ms),
            },
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.to_error().code()
    }
}

/// Result of one validation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ValidationResult {
    pub stage: ValidationStage,
    pub outcome: ValidationOutcome,
    /// Present iff the outcome is `Fail` or `Timeout`.
    pub failure: Option<ValidationFailure>,
    pub measured_duration_ms: u64,
    /// Probe output, on deep results that got that far.
    pub specs: Option<MediaSpecs>,
}

impl ValidationResult {
    pub fn pass(stage: ValidationStage, elapsed: Duration) -> Self {
        Self {
            stage,
            outcome: ValidationOutcome::Pass,
            failure: None,
            measured_duration_ms: elapsed.as_millis() as u64,
            specs: None,
        }
    }

    pub fn fail(stage: ValidationStage, failure: ValidationFailure, elapsed: Duration) -> Self {
        Self {
            stage,
            outcome: ValidationOutcome::Fail,
            failure: Some(failure),
            measured_duration_ms: elapsed.as_millis() as u64,
            specs: None,
        }
    }

    pub fn timeout(stage: ValidationStage, budget: Duration, elapsed: Duration) -> Self {
        Self {
            stage,
            outcome: ValidationOutcome::Timeout,
            failure: Some(ValidationFailure::Timeout {
                stage,
                budget_ms: budget.as_millis() as u64,
            }),
            measured_duration_ms: elapsed.as_millis() as u64,
            specs: None,
        }
    }

    pub fn with_specs(mut self, specs: MediaSpecs) -> Self {
        self.specs = Some(specs);
        self
    }

    pub fn passed(&self) -> bool {
        self.outcome == ValidationOutcome::Pass
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.failure.as_ref().map(|f| f.code())
    }

    /// Human-readable reason for a non-passing result.
    pub fn message(&self) -> Option<String> {
        self.failure.as_ref().map(|f| f.to_error().to_string())
    }

    pub fn to_error(&self) -> Option<VaultError> {
        self.failure.as_ref().map(|f| f.to_error())
    }
}

/// Outcome of running the stages for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ValidationReport {
    pub quick: ValidationResult,
    /// Absent when quick validation did not pass.
    pub deep: Option<ValidationResult>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.quick.passed() && self.deep.as_ref().is_some_and(|d| d.passed())
    }

    /// The first stage that did not pass.
    pub fn failure(&self) -> Option<&ValidationResult> {
        if !self.quick.passed() {
            return Some(&self.quick);
        }
        self.deep.as_ref().filter(|d| !d.passed())
    }

    pub fn is_timeout(&self) -> bool {
        self.failure()
            .is_some_and(|r| r.outcome == ValidationOutcome::Timeout)
    }

    pub fn specs(&self) -> Option<&MediaSpecs> {
        self.deep.as_ref().and_then(|d| d.specs.as_ref())
    }

    pub fn to_error(&self) -> Option<VaultError> {
        self.failure().and_then(|r| r.to_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_error_codes() {
        let failure = ValidationFailure::AspectRatioRejected {
            width: 1920,
            height: 1080,
        };
        assert_eq!(failure.code(), ErrorCode::AspectRatioRejected);
        assert_eq!(
            failure.to_error().to_string(),
            "Video must be portrait, got 1920x1080"
        );

        let timeout = ValidationFailure::Timeout {
            stage: ValidationStage::Quick,
            budget_ms: 100,
        };
        assert_eq!(timeout.code(), ErrorCode::ValidationTimeout);
    }

    #[test]
    fn test_unrelated_errors_become_invalid_format() {
        let err = VaultError::not_found("file", "clip.mp4");
        assert!(matches!(
            ValidationFailure::from_error(&err),
            ValidationFailure::InvalidFormat { .. }
        ));
    }

    #[test]
    fn test_report_failure_is_first_failing_stage() {
        let quick = ValidationResult::pass(ValidationStage::Quick, Duration::from_millis(3));
        let deep = ValidationResult::fail(
            ValidationStage::Deep,
            ValidationFailure::CodecRejected {
                codec: "vp9".to_string(),
            },
            Duration::from_millis(40),
        );
        let report = ValidationReport {
            quick,
            deep: Some(deep),
        };

        assert!(!report.passed());
        assert!(!report.is_timeout());
        assert_eq!(
            report.failure().and_then(|r| r.error_code()),
            Some(ErrorCode::CodecRejected)
        );
    }

    #[test]
    fn test_report_without_deep_stage_has_not_passed() {
        let report = ValidationReport {
            quick: ValidationResult::pass(ValidationStage::Quick, Duration::ZERO),
            deep: None,
        };
        assert!(!report.passed());
        assert!(report.failure().is_none());
    }

    #[test]
    fn test_descriptor_from_path() {
        assert_eq!(
            MediaDescriptor::from_path("/tmp/a.MP4").mime_type.as_deref(),
            Some("video/mp4")
        );
        assert_eq!(MediaDescriptor::from_path("/tmp/a.txt").mime_type, None);
        assert_eq!(MediaDescriptor::new("/tmp/a.mp4").source_uri(), "/tmp/a.mp4");
    }
}
