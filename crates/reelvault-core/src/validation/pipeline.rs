//! Two-stage validation with hard wall-clock budgets.

use super::types::{
    MediaDescriptor, ValidationFailure, ValidationReport, ValidationResult, ValidationStage,
};
use crate::config::{ValidationConfig, ValidationLimits};
use crate::error::{IoResultExt, Result, VaultError};
use crate::media::{MediaProbe, MediaSpecs};
use crate::signature::ContentSignature;
use async_trait::async_trait;
use mini_moka::sync::Cache;
use std::path::Path;
use std::sync::Arc;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

/// Extra policy run at the end of quick validation.
///
/// Checks share the quick budget with the built-in checks, so they must be
/// cheap (metadata lookups, name rules, quota checks).
#[async_trait]
pub trait QuickCheck: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self, descriptor: &MediaDescriptor) -> Result<()>;
}

/// Runs quick and deep validation and caches reports per content signature.
pub struct ValidationPipeline {
    config: ValidationConfig,
    probe: Arc<dyn MediaProbe>,
    quick_checks: Vec<Arc<dyn QuickCheck>>,
    results: Cache<String, Arc<ValidationReport>>,
}

impl ValidationPipeline {
    pub fn new(config: ValidationConfig, probe: Arc<dyn MediaProbe>) -> Self {
        let results = Cache::builder()
            .max_capacity(ValidationLimits::RESULT_CACHE_CAPACITY)
            .time_to_live(config.result_ttl())
            .build();
        Self {
            config,
            probe,
            quick_checks: Vec::new(),
            results,
        }
    }

    /// Append a policy hook to quick validation.
    pub fn with_quick_check(mut self, check: Arc<dyn QuickCheck>) -> Self {
        self.quick_checks.push(check);
        self
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Field, type and size checks. Never touches file contents.
    pub async fn quick_validate(&self, descriptor: &MediaDescriptor) -> ValidationResult {
        let started = Instant::now();
        let budget = self.config.quick_budget();

        match timeout(budget, self.run_quick_checks(descriptor)).await {
            Ok(Ok(())) => ValidationResult::pass(ValidationStage::Quick, started.elapsed()),
            Ok(Err(e)) => {
                debug!("Quick validation rejected {}: {}", descriptor.path.display(), e);
                ValidationResult::fail(
                    ValidationStage::Quick,
                    ValidationFailure::from_error(&e),
                    started.elapsed(),
                )
            }
            Err(_) => {
                warn!(
                    "Quick validation of {} exceeded {:?}",
                    descriptor.path.display(),
                    budget
                );
                ValidationResult::timeout(ValidationStage::Quick, budget, started.elapsed())
            }
        }
    }

    /// Probe the file and check codec, orientation and duration.
    pub async fn deep_validate(&self, path: &Path) -> ValidationResult {
        let started = Instant::now();
        let budget = self.config.deep_budget();

        match timeout(budget, self.probe.probe(path)).await {
            Ok(Ok(specs)) => match self.check_specs(&specs) {
                Ok(()) => {
                    ValidationResult::pass(ValidationStage::Deep, started.elapsed()).with_specs(specs)
                }
                Err(e) => {
                    debug!("Deep validation rejected {}: {}", path.display(), e);
                    ValidationResult::fail(
                        ValidationStage::Deep,
                        ValidationFailure::from_error(&e),
                        started.elapsed(),
                    )
                    .with_specs(specs)
                }
            },
            Ok(Err(e)) => {
                debug!("Probe failed for {}: {}", path.display(), e);
                ValidationResult::fail(
                    ValidationStage::Deep,
                    ValidationFailure::InvalidFormat {
                        message: format!("Could not read video: {}", e),
                    },
                    started.elapsed(),
                )
            }
            Err(_) => {
                warn!("Deep validation of {} exceeded {:?}", path.display(), budget);
                ValidationResult::timeout(ValidationStage::Deep, budget, started.elapsed())
            }
        }
    }

    /// Quick then deep validation of `descriptor.path`, served from the result
    /// cache when this signature was validated within the TTL.
    pub async fn validate(
        &self,
        signature: &ContentSignature,
        descriptor: &MediaDescriptor,
    ) -> Arc<ValidationReport> {
        if let Some(report) = self.cached(signature) {
            debug!("Validation cache hit for {}", signature);
            return report;
        }

        let quick = self.quick_validate(descriptor).await;
        let deep = if quick.passed() {
            Some(self.deep_validate(&descriptor.path).await)
        } else {
            None
        };

        self.remember(signature, ValidationReport { quick, deep })
    }

    /// Cached report for `signature`, if still within the TTL.
    pub fn cached(&self, signature: &ContentSignature) -> Option<Arc<ValidationReport>> {
        self.results.get(&signature.key())
    }

    /// Store a report and return the shared copy. Timeouts are returned but
    /// not stored: they say nothing about the content.
    pub fn remember(
        &self,
        signature: &ContentSignature,
        report: ValidationReport,
    ) -> Arc<ValidationReport> {
        let report = Arc::new(report);
        if report.is_timeout() {
            return report;
        }
        info!(
            "Validation of {} {}",
            signature,
            if report.passed() { "passed" } else { "failed" }
        );
        self.results.insert(signature.key(), Arc::clone(&report));
        report
    }

    pub fn forget(&self, signature: &ContentSignature) {
        self.results.invalidate(&signature.key());
    }

    async fn run_quick_checks(&self, descriptor: &MediaDescriptor) -> Result<()> {
        if descriptor.path.as_os_str().is_empty() {
            return Err(VaultError::InvalidFormat {
                message: "Missing file path".to_string(),
            });
        }

        let mime_type = descriptor
            .mime_type
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| VaultError::InvalidFormat {
                message: "Missing MIME type".to_string(),
            })?;

        if !self
            .config
            .allowed_mime_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(mime_type))
        {
            return Err(VaultError::InvalidFormat {
                message: format!(
                    "Unsupported type {}, expected one of: {}",
                    mime_type,
                    self.config.allowed_mime_types.join(", ")
                ),
            });
        }

        let size_bytes = match descriptor.size_bytes {
            Some(size) => size,
            None => {
                tokio::fs::metadata(&descriptor.path)
                    .await
                    .with_path(&descriptor.path)?
                    .len()
            }
        };

        if size_bytes == 0 {
            return Err(VaultError::InvalidFormat {
                message: "File is empty".to_string(),
            });
        }
        if size_bytes > self.config.max_size_bytes {
            return Err(VaultError::FileTooLarge {
                size_bytes,
                limit_bytes: self.config.max_size_bytes,
            });
        }

        for check in &self.quick_checks {
            check.check(descriptor).await.map_err(|e| {
                debug!("Quick check '{}' rejected: {}", check.name(), e);
                e
            })?;
        }

        Ok(())
    }

    fn check_specs(&self, specs: &MediaSpecs) -> Result<()> {
        if !self
            .config
            .allowed_codecs
            .iter()
            .any(|codec| codec.eq_ignore_ascii_case(&specs.codec))
        {
            return Err(VaultError::CodecRejected {
                codec: specs.codec.clone(),
            });
        }

        if !specs.is_portrait() {
            return Err(VaultError::AspectRatioRejected {
                width: specs.width,
                height: specs.height,
            });
        }

        if specs.duration_secs > self.config.max_duration_secs {
            return Err(VaultError::DurationExceeded {
                duration_secs: specs.duration_secs,
                limit_secs: self.config.max_duration_secs,
            });
        }

        Ok(())
    }
}
