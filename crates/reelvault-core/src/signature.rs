//! Bounded-cost content signatures for duplicate detection.
//!
//! A signature is the file size, its modification time and a SHA-256 digest of
//! the first [`HEADER_BYTES`] bytes. Computing one costs a stat plus a single
//! small read regardless of file size. It is an approximate identity, not a
//! content hash: two files are "the same" iff all three parts match.

use crate::error::{IoResultExt, Result, VaultError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Number of leading bytes folded into the signature.
pub const HEADER_BYTES: usize = 1024;

/// Approximate identity of a file's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentSignature {
    pub size_bytes: u64,
    /// Modification time in nanoseconds since the Unix epoch.
    pub modified_ns: u128,
    /// Lowercase hex SHA-256 of the header bytes.
    pub header_digest: String,
}

impl ContentSignature {
    /// Stable string form used as a map key.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ContentSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.size_bytes, self.modified_ns, self.header_digest
        )
    }
}

/// Computes [`ContentSignature`]s. Stateless and safe to share.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSignatureService;

impl FileSignatureService {
    pub fn new() -> Self {
        Self
    }

    /// Compute the signature of the file at `path` on the blocking pool.
    ///
    /// A failure here means the file could not be read; it says nothing about
    /// whether the file is a duplicate.
    pub async fn compute_signature(&self, path: &Path) -> Result<ContentSignature> {
        let path: PathBuf = path.to_path_buf();
        let task_path = path.clone();
        tokio::task::spawn_blocking(move || compute_signature_blocking(&task_path))
            .await
            .map_err(|e| VaultError::Io {
                message: format!("Signature task failed: {}", e),
                path: Some(path),
                source: None,
            })?
    }
}

/// Synchronous signature computation.
pub fn compute_signature_blocking(path: &Path) -> Result<ContentSignature> {
    let metadata = std::fs::metadata(path).with_path(path)?;
    if !metadata.is_file() {
        return Err(VaultError::Io {
            message: "Not a regular file".to_string(),
            path: Some(path.to_path_buf()),
            source: None,
        });
    }

    let modified_ns = metadata
        .modified()
        .with_path(path)?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let file = std::fs::File::open(path).with_path(path)?;
    let mut header = Vec::with_capacity(HEADER_BYTES);
    file.take(HEADER_BYTES as u64)
        .read_to_end(&mut header)
        .with_path(path)?;

    Ok(ContentSignature {
        size_bytes: metadata.len(),
        modified_ns,
        header_digest: hex::encode(Sha256::digest(&header)),
    })
}
