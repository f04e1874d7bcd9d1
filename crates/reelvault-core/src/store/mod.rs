//! Metadata persistence.
//!
//! This module provides:
//! - Atomic file operations (temp file + fsync + rename)
//! - The [`KeyValueStore`] contract used by the cache index and the asset
//!   registry, with file-backed and in-memory implementations

mod atomic;
mod kv;

pub use atomic::{atomic_read_json, atomic_write, atomic_write_json, read_if_exists};
pub use kv::{FileStore, KeyValueStore, MemoryStore};
