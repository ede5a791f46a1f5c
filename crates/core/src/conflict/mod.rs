//! Conflict detection, three-way merging, and resolution management.
//!
//! The conflict subsystem is responsible for:
//! 1. **Diffing** -- comparing record versions field by field.
//! 2. **Merging** -- two-way and three-way text merges with conflict markup.
//! 3. **Classification** -- naming the relation between local and remote edits.
//! 4. **Resolution** -- the automatic pass and the interactive session that
//!    handles whatever it could not settle.

pub mod classifier;
pub mod differ;
pub mod markers;
pub mod merger;
pub mod resolver;
pub mod session;

pub use classifier::{ConflictClassifier, HistoryResolver};
pub use differ::{FieldMergePolicy, RecordDiffer};
pub use merger::TextMergeEngine;
pub use resolver::{AutoOutcome, AutoResolver, ResolutionBatch};
pub use session::{
    ArtifactEvent, ArtifactHandle, ArtifactStore, ConflictResolutionSession, FsArtifactStore,
    InMemoryArtifactStore, SessionReport,
};
