//! Error types for the snipsync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.
//!
//! By contract, no failure in this crate may crash the host process: the
//! merge engine's primary strategy failure is consumed internally by the
//! fallback, history lookup failures degrade classification instead of
//! aborting it, and artifact validation failures are recoverable.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Merge engine errors
// ---------------------------------------------------------------------------

/// Errors from the text merge engine.
///
/// These never escape the public merge API: the primary diff3 strategy
/// reports failure through this type and the engine answers with the
/// positional fallback instead.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The primary diff3 strategy hit an internal inconsistency.
    #[error("primary diff3 strategy failed: {0}")]
    PrimaryStrategyFailed(String),
}

// ---------------------------------------------------------------------------
// History resolver errors
// ---------------------------------------------------------------------------

/// Errors from the external history source used to recover a base version.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The resolver backing store is not reachable.
    #[error("history resolver unavailable: {0}")]
    Unavailable(String),

    /// The lookup itself failed for a specific path/revision pair.
    #[error("history lookup failed for '{path}' at {revision}: {detail}")]
    LookupFailed {
        path: String,
        revision: String,
        detail: String,
    },
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

/// Errors from the conflict resolution session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// An operation was attempted in a state that does not allow it.
    #[error("invalid session operation '{operation}' in state {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// The given path has no pending conflict in this session.
    #[error("no pending conflict for path: {0}")]
    UnknownPath(String),

    /// The given path was already resolved in this session.
    #[error("conflict already resolved for path: {0}")]
    AlreadyResolved(String),

    /// A finalized artifact failed validation. Recoverable: the descriptor
    /// stays pending and can be re-presented.
    #[error("artifact validation failed for '{path}': {}", errors.join("; "))]
    Validation { path: String, errors: Vec<String> },

    /// The artifact store could not materialize or access an artifact.
    #[error("artifact store error for '{path}': {detail}")]
    ArtifactStore { path: String, detail: String },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
