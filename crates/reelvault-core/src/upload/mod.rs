//! Chunked, resumable upload of persisted assets.
//!
//! The [`UploadCoordinator`] runs at most one transfer at a time against a
//! [`RemoteStorage`] backend. [`LocalObjectStore`] is the bundled backend; it
//! writes objects under a local directory.

mod coordinator;
mod local;
mod storage;
mod types;

pub use coordinator::{UploadCoordinator, UploadHandle};
pub use local::LocalObjectStore;
pub use storage::{ObjectMetadata, ObjectRef, RemoteStorage, UploadSession};
pub use types::{UploadFailure, UploadState, UploadTask};
