//! Centralized configuration for ReelVault.
//!
//! Fixed limits live in the const structs below. [`VaultConfig`] is the
//! runtime configuration; every field has a default taken from those limits
//! so a partial JSON file is enough to override a single value.

use crate::error::{Result, VaultError};
use crate::store::atomic_read_json;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Validation limits for imported media.
pub struct ValidationLimits;

impl ValidationLimits {
    pub const MAX_SIZE_BYTES: u64 = 100 * 1024 * 1024;
    pub const ALLOWED_MIME_TYPES: &'static [&'static str] = &["video/mp4"];
    pub const ALLOWED_CODECS: &'static [&'static str] = &["h264", "hevc"];
    pub const MAX_DURATION_SECS: f64 = 60.0;
    pub const QUICK_BUDGET: Duration = Duration::from_millis(100);
    pub const DEEP_BUDGET: Duration = Duration::from_millis(2900);
    pub const RESULT_TTL: Duration = Duration::from_secs(300);
    pub const RESULT_CACHE_CAPACITY: u64 = 1024;
}

/// Cache size and age limits.
pub struct CacheLimits;

impl CacheLimits {
    pub const MAX_TOTAL_SIZE: u64 = 500 * 1024 * 1024;
    pub const MAX_FILE_AGE: Duration = Duration::from_secs(24 * 60 * 60);
    pub const INDEX_KEY: &'static str = "cache_index";
}

/// Import pipeline limits.
pub struct ImportLimits;

impl ImportLimits {
    pub const PIPELINE_TIMEOUT: Duration = Duration::from_secs(120);
    pub const MAX_CONCURRENT_IMPORTS: usize = 4;
    pub const THUMBNAIL_FRACTION: f64 = 0.1;
    pub const THUMBNAIL_MAX_OFFSET_SECS: f64 = 3.0;
    pub const ASSETS_KEY: &'static str = "assets";
}

/// Upload transfer limits.
pub struct UploadLimits;

impl UploadLimits {
    pub const CHUNK_SIZE: usize = 256 * 1024;
    pub const CHUNK_RETRY_ATTEMPTS: u32 = 3;
    pub const URL_POLL_ATTEMPTS: u32 = 5;
    pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
    pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(10);
    pub const REMOTE_PREFIX: &'static str = "videos";
}

/// Directory names under the vault data directory.
pub struct PathsConfig;

impl PathsConfig {
    pub const CACHE_DIR_NAME: &'static str = "cache";
    pub const METADATA_DIR_NAME: &'static str = "metadata";
    pub const STAGING_DIR_NAME: &'static str = "staging";
    pub const THUMBNAILS_DIR_NAME: &'static str = "thumbnails";
    pub const IMPORTS_DIR_NAME: &'static str = "imports";
    pub const DEMO_DIR_NAME: &'static str = "demo";
    pub const REMOTE_DIR_NAME: &'static str = "remote";
    pub const CONFIG_FILE_NAME: &'static str = "config.json";
}

/// Validation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ValidationConfig {
    pub allowed_mime_types: Vec<String>,
    pub max_size_bytes: u64,
    pub allowed_codecs: Vec<String>,
    /// Upper bound on clip length. The product has used both 60 and 300
    /// seconds; pick one per deployment.
    pub max_duration_secs: f64,
    pub quick_budget_ms: u64,
    pub deep_budget_ms: u64,
    pub result_ttl_secs: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            allowed_mime_types: ValidationLimits::ALLOWED_MIME_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_size_bytes: ValidationLimits::MAX_SIZE_BYTES,
            allowed_codecs: ValidationLimits::ALLOWED_CODECS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_duration_secs: ValidationLimits::MAX_DURATION_SECS,
            quick_budget_ms: ValidationLimits::QUICK_BUDGET.as_millis() as u64,
            deep_budget_ms: ValidationLimits::DEEP_BUDGET.as_millis() as u64,
            result_ttl_secs: ValidationLimits::RESULT_TTL.as_secs(),
        }
    }
}

impl ValidationConfig {
    pub fn quick_budget(&self) -> Duration {
        Duration::from_millis(self.quick_budget_ms)
    }

    pub fn deep_budget(&self) -> Duration {
        Duration::from_millis(self.deep_budget_ms)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }
}

/// Cache budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CacheConfig {
    pub max_total_size: u64,
    pub max_file_age_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_total_size: CacheLimits::MAX_TOTAL_SIZE,
            max_file_age_secs: CacheLimits::MAX_FILE_AGE.as_secs(),
        }
    }
}

impl CacheConfig {
    pub fn max_file_age(&self) -> Duration {
        Duration::from_secs(self.max_file_age_secs)
    }
}

/// Import pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ImportConfig {
    pub timeout_secs: u64,
    pub max_concurrent_imports: usize,
    pub thumbnail_fraction: f64,
    pub thumbnail_max_offset_secs: f64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: ImportLimits::PIPELINE_TIMEOUT.as_secs(),
            max_concurrent_imports: ImportLimits::MAX_CONCURRENT_IMPORTS,
            thumbnail_fraction: ImportLimits::THUMBNAIL_FRACTION,
            thumbnail_max_offset_secs: ImportLimits::THUMBNAIL_MAX_OFFSET_SECS,
        }
    }
}

impl ImportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Offset of the thumbnail frame: `min(fraction * duration, max_offset)`.
    pub fn thumbnail_offset(&self, duration_secs: f64) -> f64 {
        (duration_secs * self.thumbnail_fraction)
            .min(self.thumbnail_max_offset_secs)
            .max(0.0)
    }
}

/// Upload transfer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct UploadConfig {
    pub chunk_size: usize,
    pub chunk_retry_attempts: u32,
    pub url_poll_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub remote_prefix: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: UploadLimits::CHUNK_SIZE,
            chunk_retry_attempts: UploadLimits::CHUNK_RETRY_ATTEMPTS,
            url_poll_attempts: UploadLimits::URL_POLL_ATTEMPTS,
            retry_base_delay_ms: UploadLimits::RETRY_BASE_DELAY.as_millis() as u64,
            retry_max_delay_ms: UploadLimits::RETRY_MAX_DELAY.as_millis() as u64,
            remote_prefix: UploadLimits::REMOTE_PREFIX.to_string(),
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct VaultConfig {
    pub validation: ValidationConfig,
    pub cache: CacheConfig,
    pub import: ImportConfig,
    pub upload: UploadConfig,
}

impl VaultConfig {
    /// Load configuration from a JSON file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let config = atomic_read_json::<VaultConfig>(path)?.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make every operation fail.
    pub fn validate(&self) -> Result<()> {
        if self.upload.chunk_size == 0 {
            return Err(VaultError::Config {
                message: "upload.chunk_size must be greater than zero".to_string(),
            });
        }
        if self.import.max_concurrent_imports == 0 {
            return Err(VaultError::Config {
                message: "import.max_concurrent_imports must be greater than zero".to_string(),
            });
        }
        if self.validation.max_duration_secs <= 0.0 {
            return Err(VaultError::Config {
                message: "validation.max_duration_secs must be positive".to_string(),
            });
        }
        Ok(())
    }
}
