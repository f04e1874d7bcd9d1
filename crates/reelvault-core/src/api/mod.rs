//! API implementation submodules.
//!
//! Each submodule contains `impl MediaVault` blocks that extend the public
//! API by concern. The struct definition remains in `lib.rs`.

mod assets;
mod builder;
mod cache;
mod uploads;

pub use builder::MediaVaultBuilder;
