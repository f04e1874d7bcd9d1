//! `ffmpeg`-backed [`ThumbnailExtractor`].

use super::ThumbnailExtractor;
use crate::error::{Result, VaultError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Extracts one JPEG frame by piping `ffmpeg` output to stdout.
#[derive(Debug, Clone)]
pub struct FfmpegThumbnailer {
    binary: PathBuf,
}

impl Default for FfmpegThumbnailer {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegThumbnailer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl ThumbnailExtractor for FfmpegThumbnailer {
    async fn extract_frame(&self, path: &Path, at_seconds: f64) -> Result<Vec<u8>> {
        debug!("Extracting frame at {:.3}s from {}", at_seconds, path.display());

        let output = Command::new(&self.binary)
            .args(["-v", "error", "-ss"])
            .arg(format!("{:.3}", at_seconds.max(0.0)))
            .arg("-i")
            .arg(path)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "mjpeg", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| VaultError::ThumbnailFailed {
                message: format!("Failed to run {}: {}", self.binary.display(), e),
            })?;

        if !output.status.success() {
            return Err(VaultError::ThumbnailFailed {
                message: format!(
                    "ffmpeg exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        if output.stdout.is_empty() {
            return Err(VaultError::ThumbnailFailed {
                message: "ffmpeg produced no frame".to_string(),
            });
        }

        Ok(output.stdout)
    }
}
