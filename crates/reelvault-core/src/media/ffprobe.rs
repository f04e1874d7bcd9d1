//! `ffprobe`-backed [`MediaProbe`].

use super::{MediaProbe, MediaSpecs};
use crate::error::{Result, VaultError};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Probe that runs `ffprobe -print_format json`.
///
/// The child is killed when the probe future is dropped, so a validation
/// timeout does not leave a stray process behind.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: PathBuf,
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl FfprobeProbe {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> Result<MediaSpecs> {
        debug!("Probing {}", path.display());

        let output = Command::new(&self.binary)
            .args(["-v", "error", "-print_format", "json", "-show_streams", "-show_format"])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| VaultError::Io {
                message: format!("Failed to run {}: {}", self.binary.display(), e),
                path: Some(path.to_path_buf()),
                source: Some(e),
            })?;

        if !output.status.success() {
            return Err(VaultError::InvalidFormat {
                message: format!(
                    "ffprobe exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        parse_ffprobe_output(&output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: Option<ProbeTags>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse `ffprobe -print_format json -show_streams -show_format` output.
pub fn parse_ffprobe_output(stdout: &[u8]) -> Result<MediaSpecs> {
    let output: ProbeOutput = serde_json::from_slice(stdout).map_err(|e| {
        VaultError::InvalidFormat {
            message: format!("Unreadable probe output: {}", e),
        }
    })?;

    let stream = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| VaultError::InvalidFormat {
            message: "No video stream found".to_string(),
        })?;

    let (Some(width), Some(height)) = (stream.width, stream.height) else {
        return Err(VaultError::InvalidFormat {
            message: "Video stream has no dimensions".to_string(),
        });
    };

    let duration_secs = output
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(stream.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| VaultError::InvalidFormat {
            message: "Video has no duration".to_string(),
        })?;

    let rotation = stream
        .side_data_list
        .iter()
        .find_map(|d| d.rotation)
        .or_else(|| {
            stream
                .tags
                .as_ref()
                .and_then(|t| t.rotate.as_deref())
                .and_then(|r| r.parse::<i64>().ok())
        })
        .unwrap_or(0);

    let (width, height) = if rotation.rem_euclid(180) == 90 {
        (height, width)
    } else {
        (width, height)
    };

    Ok(MediaSpecs {
        width,
        height,
        codec: stream
            .codec_name
            .as_deref()
            .unwrap_or("unknown")
            .to_ascii_lowercase(),
        duration_secs,
        fps: stream.r_frame_rate.as_deref().and_then(parse_frame_rate),
    })
}

/// Parse a rational frame rate such as `30000/1001`.
fn parse_frame_rate(value: &str) -> Option<f64> {
    let (num, den) = value.split_once('/')?;
    let num: f64 = num.parse().ok()?;
    let den: f64 = den.parse().ok()?;
    if den == 0.0 {
        None
    } else {
        Some(num / den)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PORTRAIT: &str = r#"{
        "streams": [
            {"codec_type": "audio", "codec_name": "aac"},
            {"codec_type": "video", "codec_name": "H264", "width": 720, "height": 1280,
             "r_frame_rate": "30000/1001"}
        ],
        "format": {"duration": "45.000000"}
    }"#;

    #[test]
    fn test_parse_portrait_video() {
        let specs = parse_ffprobe_output(PORTRAIT.as_bytes()).unwrap();
        assert_eq!(specs.width, 720);
        assert_eq!(specs.height, 1280);
        assert_eq!(specs.codec, "h264");
        assert_eq!(specs.duration_secs, 45.0);
        assert!((specs.fps.unwrap() - 29.97).abs() < 0.01);
        assert!(specs.is_portrait());
    }

    #[test]
    fn test_rotation_swaps_dimensions() {
        let json = r#"{
            "streams": [{"codec_type": "video", "codec_name": "hevc", "width": 1920,
                         "height": 1080, "side_data_list": [{"rotation": -90}]}],
            "format": {"duration": "12.5"}
        }"#;
        let specs = parse_ffprobe_output(json.as_bytes()).unwrap();
        assert_eq!((specs.width, specs.height), (1080, 1920));
    }

    #[test]
    fn test_no_video_stream() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "3"}}"#;
        let err = parse_ffprobe_output(json.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("No video stream"));
    }

    #[test]
    fn test_garbage_output() {
        assert!(matches!(
            parse_ffprobe_output(b"not json"),
            Err(VaultError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_frame_rate_parsing() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }
}
