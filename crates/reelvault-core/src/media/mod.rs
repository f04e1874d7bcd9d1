//! Media collaborators: stream probing and frame extraction.
//!
//! The core only depends on the [`MediaProbe`] and [`ThumbnailExtractor`]
//! traits. Default implementations shell out to `ffprobe` and `ffmpeg`.

mod ffmpeg;
mod ffprobe;

pub use ffmpeg::FfmpegThumbnailer;
pub use ffprobe::{parse_ffprobe_output, FfprobeProbe};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Stream properties reported by a probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MediaSpecs {
    /// Display width, after applying any rotation metadata.
    pub width: u32,
    /// Display height, after applying any rotation metadata.
    pub height: u32,
    /// Lowercase codec name, e.g. `h264`.
    pub codec: String,
    pub duration_secs: f64,
    #[serde(default)]
    pub fps: Option<f64>,
}

impl MediaSpecs {
    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }
}

/// Reads stream properties of a media file.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<MediaSpecs>;
}

/// Extracts a single still frame from a video.
#[async_trait]
pub trait ThumbnailExtractor: Send + Sync {
    /// Encoded image bytes of the frame at `at_seconds`.
    async fn extract_frame(&self, path: &Path, at_seconds: f64) -> Result<Vec<u8>>;
}
