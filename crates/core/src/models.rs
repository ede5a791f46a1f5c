//! Domain model types used throughout snipsync.
//!
//! These types bridge the classifier, merge engine, resolution session, and
//! any caller that feeds version triples in or consumes resolved records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A structured record under synchronization.
///
/// The `path` is the record's immutable identity: it is the unique key a
/// version triple is assembled under and is stable across replicas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Snippet(Snippet),
    Directory(Directory),
}

impl Record {
    /// The record's unique, replica-stable path.
    pub fn path(&self) -> &str {
        match self {
            Self::Snippet(s) => &s.path,
            Self::Directory(d) => &d.path,
        }
    }

    /// Display name of the record.
    pub fn name(&self) -> &str {
        match self {
            Self::Snippet(s) => &s.name,
            Self::Directory(d) => &d.name,
        }
    }

    /// The textual content channel, present for snippets only.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Snippet(s) => Some(&s.code),
            Self::Directory(_) => None,
        }
    }

    /// Short label for the record kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Snippet(_) => "snippet",
            Self::Directory(_) => "directory",
        }
    }

    /// Copy of this record with its content channel replaced.
    ///
    /// Directories carry no content; they are returned unchanged.
    pub fn with_code(&self, code: String) -> Record {
        match self {
            Self::Snippet(s) => Self::Snippet(Snippet { code, ..s.clone() }),
            Self::Directory(d) => Self::Directory(d.clone()),
        }
    }
}

/// A code snippet record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub path: String,
    pub name: String,
    pub code: String,
    pub language: String,
    pub file_name: String,
    pub file_path: String,
    pub category: String,
    pub order: i64,
    pub create_time: DateTime<Utc>,
}

/// A directory record grouping snippets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    pub path: String,
    pub name: String,
    pub order: i64,
}

// ---------------------------------------------------------------------------
// Version triples
// ---------------------------------------------------------------------------

/// The three versions of one record gathered for a sync run.
///
/// Absence models deletion or non-existence on that side; presence models
/// existence or creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionTriple {
    pub path: String,
    pub base: Option<Record>,
    pub local: Option<Record>,
    pub remote: Option<Record>,
}

impl VersionTriple {
    pub fn new(
        path: impl Into<String>,
        base: Option<Record>,
        local: Option<Record>,
        remote: Option<Record>,
    ) -> Self {
        Self {
            path: path.into(),
            base,
            local,
            remote,
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Git-standard relation between the two sides of a triple.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictRelation {
    /// No genuine conflict; automatic resolution applies.
    None,
    /// Both sides modified the record and the results differ.
    ModifyModify,
    /// Both sides created the record independently with differing content.
    AddAdd,
    /// Local holds the record, remote deleted it.
    ModifyDelete,
    /// Local deleted the record, remote holds it.
    DeleteModify,
}

impl std::fmt::Display for ConflictRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::ModifyModify => write!(f, "modify_modify"),
            Self::AddAdd => write!(f, "add_add"),
            Self::ModifyDelete => write!(f, "modify_delete"),
            Self::DeleteModify => write!(f, "delete_modify"),
        }
    }
}

/// A field both sides changed to different values (or, with no base, any
/// field the two sides disagree on).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConflict {
    pub field: String,
    pub local_value: String,
    pub remote_value: String,
}

// ---------------------------------------------------------------------------
// Merge outcomes
// ---------------------------------------------------------------------------

/// How a textual merge attempt ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
    /// Clean merge, no markers.
    Merged,
    /// Best-effort text with embedded conflict markers; needs confirmation.
    ConflictMarked,
    /// Too many conflicting hunks for useful markup; manual resolution only.
    Failed,
}

impl std::fmt::Display for MergeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Merged => write!(f, "merged"),
            Self::ConflictMarked => write!(f, "conflict_marked"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One marker-wrapped conflict region inside merged output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRegion {
    /// Opaque correlation token, unique within one artifact.
    pub id: String,
    /// First line of the marker block (1-indexed).
    pub start_line: usize,
    /// Last line of the marker block (1-indexed).
    pub end_line: usize,
}

/// The result of a two-way or three-way text merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub status: MergeStatus,
    pub merged_text: String,
    pub conflict_regions: Vec<ConflictRegion>,
}

impl MergeOutcome {
    /// A clean merge with the given text.
    pub fn merged(text: impl Into<String>) -> Self {
        Self {
            status: MergeStatus::Merged,
            merged_text: text.into(),
            conflict_regions: Vec::new(),
        }
    }

    /// A marked merge with embedded conflict regions.
    pub fn marked(text: impl Into<String>, regions: Vec<ConflictRegion>) -> Self {
        Self {
            status: MergeStatus::ConflictMarked,
            merged_text: text.into(),
            conflict_regions: regions,
        }
    }

    /// A failed merge carrying no partial markup.
    pub fn failed() -> Self {
        Self {
            status: MergeStatus::Failed,
            merged_text: String::new(),
            conflict_regions: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.status == MergeStatus::Merged
    }
}

// ---------------------------------------------------------------------------
// Conflict descriptors
// ---------------------------------------------------------------------------

/// A conflict that automatic resolution could not fully settle.
///
/// Created only when the relation is not [`ConflictRelation::None`] and the
/// automatic pass left field or content disagreements behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictDescriptor {
    pub path: String,
    pub relation: ConflictRelation,
    pub base: Option<Record>,
    pub local: Option<Record>,
    pub remote: Option<Record>,
    pub field_conflicts: Vec<FieldConflict>,
    pub content_outcome: Option<MergeOutcome>,
}

impl ConflictDescriptor {
    /// Whether this descriptor carries a textual content conflict (as
    /// opposed to field-level disagreement only).
    pub fn has_content_conflict(&self) -> bool {
        self.content_outcome
            .as_ref()
            .is_some_and(|o| o.status != MergeStatus::Merged)
    }
}

// ---------------------------------------------------------------------------
// Session types
// ---------------------------------------------------------------------------

/// Lifecycle states of a resolution session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    AwaitingUser,
    Completed,
    TimedOut,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::TimedOut | Self::Cancelled)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::AwaitingUser => write!(f, "awaiting_user"),
            Self::Completed => write!(f, "completed"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// What to do with a conflict the user walked away from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AbandonPolicy {
    /// Resolve with the local side's record.
    UseLocal,
    /// Resolve with the remote side's record.
    UseRemote,
    /// Cancel the whole session, discarding all in-flight work.
    CancelAll,
}

/// How a path's resolution was decided.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// One-sided change adopted without user involvement.
    AutoAdopted,
    /// Field and content merge succeeded automatically.
    AutoMerged,
    /// User finalized an edited artifact.
    Finalized,
    /// User abandoned the artifact keeping the local side.
    UsedLocal,
    /// User abandoned the artifact keeping the remote side.
    UsedRemote,
    /// Session ended with the path still pending.
    Unresolved,
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AutoAdopted => write!(f, "auto_adopted"),
            Self::AutoMerged => write!(f, "auto_merged"),
            Self::Finalized => write!(f, "finalized"),
            Self::UsedLocal => write!(f, "used_local"),
            Self::UsedRemote => write!(f, "used_remote"),
            Self::Unresolved => write!(f, "unresolved"),
        }
    }
}

/// Per-path decision log entry for user-facing display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionLogEntry {
    pub path: String,
    pub kind: DecisionKind,
    pub rationale: String,
    pub at: DateTime<Utc>,
}

impl DecisionLogEntry {
    pub fn now(path: impl Into<String>, kind: DecisionKind, rationale: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            rationale: rationale.into(),
            at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snippet(path: &str, name: &str, code: &str) -> Record {
        Record::Snippet(Snippet {
            path: path.to_string(),
            name: name.to_string(),
            code: code.to_string(),
            language: "rust".to_string(),
            file_name: String::new(),
            file_path: String::new(),
            category: String::new(),
            order: 0,
            create_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        })
    }

    #[test]
    fn test_record_accessors() {
        let s = snippet("/a", "Alpha", "fn main() {}");
        assert_eq!(s.path(), "/a");
        assert_eq!(s.name(), "Alpha");
        assert_eq!(s.code(), Some("fn main() {}"));
        assert_eq!(s.kind(), "snippet");

        let d = Record::Directory(Directory {
            path: "/dir".to_string(),
            name: "Dir".to_string(),
            order: 1,
        });
        assert_eq!(d.code(), None);
        assert_eq!(d.kind(), "directory");
    }

    #[test]
    fn test_with_code_replaces_snippet_content_only() {
        let s = snippet("/a", "Alpha", "old");
        let replaced = s.with_code("new".to_string());
        assert_eq!(replaced.code(), Some("new"));
        assert_eq!(replaced.path(), "/a");

        let d = Record::Directory(Directory {
            path: "/dir".to_string(),
            name: "Dir".to_string(),
            order: 1,
        });
        assert_eq!(d.with_code("ignored".to_string()), d);
    }

    #[test]
    fn test_serde_round_trip_tagged_union() {
        let s = snippet("/a", "Alpha", "code");
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"kind\":\"snippet\""));
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_merge_outcome_constructors() {
        assert!(MergeOutcome::merged("x").is_clean());
        let failed = MergeOutcome::failed();
        assert_eq!(failed.status, MergeStatus::Failed);
        assert!(failed.merged_text.is_empty());
        assert!(failed.conflict_regions.is_empty());
    }
}
