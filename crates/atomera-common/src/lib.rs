//! atomera-common - Shared types and errors used across all Atomera crates.

pub mod error;
pub mod entities;

// Re-export commonly used types
pub use entities::{
    AffinityMode, Confidence, JobRequest, PocketCandidate, PocketMode, RankedLigand, StructureRef,
    StructureSource,
};
pub use error::{AtomeraError, Result};
