//! Media import.
//!
//! An import computes the content signature, claims it in the
//! [`AssetRegistry`], validates, extracts a thumbnail and moves the file
//! into the cache. Every status change is written to the registry before the
//! next stage starts.

mod assets;
mod orchestrator;
mod staging;
mod types;

pub use assets::AssetRegistry;
pub use orchestrator::ImportOrchestrator;
pub use staging::StagedFile;
pub use types::{Asset, AssetError, AssetStatus};
