//! Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use reelvault_core::{
    MediaDescriptor, MediaProbe, MediaSpecs, MediaVault, Result, ThumbnailExtractor, VaultError,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Probe that reads the clip description from the first line of the file:
/// `<width>x<height> <codec> <duration>`.
#[derive(Default)]
pub struct HeaderProbe {
    pub calls: AtomicUsize,
}

#[async_trait]
impl MediaProbe for HeaderProbe {
    async fn probe(&self, path: &Path) -> Result<MediaSpecs> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut head = [0u8; 64];
        let len = std::fs::File::open(path)
            .and_then(|mut f| f.read(&mut head))
            .map_err(|e| VaultError::io_with_path(e, path))?;
        let text = String::from_utf8_lossy(&head[..len]);
        let line = text.lines().next().unwrap_or_default();

        let invalid = || VaultError::InvalidFormat {
            message: format!("unrecognised header: {:?}", line),
        };
        let mut parts = line.split_whitespace();
        let (width, height) = parts
            .next()
            .and_then(|d| d.split_once('x'))
            .ok_or_else(invalid)?;
        Ok(MediaSpecs {
            width: width.parse().map_err(|_| invalid())?,
            height: height.parse().map_err(|_| invalid())?,
            codec: parts.next().ok_or_else(invalid)?.to_string(),
            duration_secs: parts
                .next()
                .and_then(|d| d.parse().ok())
                .ok_or_else(invalid)?,
            fps: Some(30.0),
        })
    }
}

pub struct StaticThumbnailer;

#[async_trait]
impl ThumbnailExtractor for StaticThumbnailer {
    async fn extract_frame(&self, _path: &Path, _at_seconds: f64) -> Result<Vec<u8>> {
        Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
    }
}

pub struct TestVault {
    pub temp_dir: TempDir,
    pub probe: Arc<HeaderProbe>,
    pub vault: MediaVault,
}

impl TestVault {
    pub async fn new() -> Self {
        Self::with_builder(|b| b).await
    }

    pub async fn with_builder(
        configure: impl FnOnce(reelvault_core::MediaVaultBuilder) -> reelvault_core::MediaVaultBuilder,
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let probe = Arc::new(HeaderProbe::default());
        let vault = Self::open(temp_dir.path(), probe.clone(), configure).await;
        Self {
            temp_dir,
            probe,
            vault,
        }
    }

    pub async fn open(
        dir: &Path,
        probe: Arc<HeaderProbe>,
        configure: impl FnOnce(reelvault_core::MediaVaultBuilder) -> reelvault_core::MediaVaultBuilder,
    ) -> MediaVault {
        let builder = MediaVault::builder(dir.join("vault"))
            .auto_create_dirs(true)
            .with_probe(probe)
            .with_thumbnailer(Arc::new(StaticThumbnailer));
        configure(builder).build().await.expect("vault should open")
    }

    pub fn vault_dir(&self) -> PathBuf {
        self.temp_dir.path().join("vault")
    }

    /// Write a clip whose header describes it and pad it to `size` bytes.
    pub fn clip(&self, name: &str, header: &str, size: u64) -> MediaDescriptor {
        let dir = self.temp_dir.path().join("camera");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, format!("{}\n{}\n", header, name)).unwrap();
        std::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(size)
            .unwrap();
        MediaDescriptor::from_path(path)
    }

    pub fn probe_calls(&self) -> usize {
        self.probe.calls.load(Ordering::SeqCst)
    }
}

pub const MB: u64 = 1024 * 1024;
pub const PORTRAIT: &str = "720x1280 h264 45";
pub const LANDSCAPE: &str = "1280x720 h264 45";
