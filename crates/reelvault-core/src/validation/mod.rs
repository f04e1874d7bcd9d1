//! Media validation.
//!
//! Quick validation checks the descriptor and file size within a 100 ms
//! budget. Deep validation probes the file within 2.9 s. Deep never runs
//! unless quick passed. Reports are cached per content signature.

mod pipeline;
mod types;

pub use pipeline::{QuickCheck, ValidationPipeline};
pub use types::{
    MediaDescriptor, ValidationFailure, ValidationOutcome, ValidationReport, ValidationResult,
    ValidationStage,
};
