//! SnipSync core library.
//!
//! This crate provides the foundational components for synchronizing code
//! snippet collections across replicas: record models, configuration,
//! field-level diffing, two-way and three-way text merging, conflict
//! classification, and automatic plus interactive resolution.

pub mod config;
pub mod conflict;
pub mod errors;
pub mod models;

// Re-exports for convenience.
pub use config::MergeConfig;
pub use conflict::{
    AutoResolver, ConflictClassifier, ConflictResolutionSession, FieldMergePolicy,
    TextMergeEngine,
};
pub use errors::CoreError;
pub use models::{ConflictDescriptor, ConflictRelation, MergeOutcome, Record, VersionTriple};
