//! Interactive conflict resolution sessions.
//!
//! A [`ConflictResolutionSession`] owns the manual half of a sync run: the
//! descriptors the automatic pass could not settle. It materializes one
//! artifact per conflict through an [`ArtifactStore`], then consumes
//! finalize/abandon notifications until every path is decided, the session
//! times out, or the user cancels. One session instance belongs to one sync
//! run; there is no process-wide resolution state.
//!
//! The state machine itself is synchronous and single-threaded by design --
//! all transitions must be serialized by the owner. The optional
//! [`ConflictResolutionSession::drive`] helper wraps it in an event loop
//! fed by a tokio channel and enforces the deadline, so a host can wait for
//! editor events without ever blocking indefinitely.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MergeConfig;
use crate::conflict::differ::{FieldMergePolicy, RecordDiffer};
use crate::conflict::markers;
use crate::errors::SessionError;
use crate::models::{
    AbandonPolicy, ConflictDescriptor, ConflictRelation, DecisionKind, DecisionLogEntry,
    FieldConflict, Record, SessionState,
};

// ---------------------------------------------------------------------------
// Artifact interface
// ---------------------------------------------------------------------------

/// Reference to a materialized resolution artifact.
#[derive(Debug, Clone)]
pub struct ArtifactHandle {
    /// Opaque artifact id.
    pub id: String,
    /// The record path this artifact resolves.
    pub record_path: String,
    /// Where the artifact lives, for stores that have a filesystem home.
    pub location: Option<PathBuf>,
}

/// Host-provided sink for resolution artifacts.
///
/// The session only materializes; finalize/abandon notifications arrive
/// from the host's editor or file event system as direct method calls (or
/// through [`ArtifactEvent`]s when using the driver).
pub trait ArtifactStore {
    fn materialize(&mut self, path: &str, content: &str) -> Result<ArtifactHandle, SessionError>;
}

/// In-memory artifact store, primarily for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    contents: HashMap<String, String>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The materialized content for a record path.
    pub fn content(&self, path: &str) -> Option<&str> {
        self.contents.get(path).map(String::as_str)
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn materialize(&mut self, path: &str, content: &str) -> Result<ArtifactHandle, SessionError> {
        self.contents.insert(path.to_string(), content.to_string());
        Ok(ArtifactHandle {
            id: Uuid::new_v4().to_string(),
            record_path: path.to_string(),
            location: None,
        })
    }
}

/// Artifact store writing `.merge` files under a working directory.
#[derive(Debug)]
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// One flat file per record path. Separators are percent-encoded (and
    /// `%` itself escaped) so distinct record paths never share a file.
    fn file_name(path: &str) -> String {
        let mut sanitized = String::with_capacity(path.len());
        for c in path.chars() {
            match c {
                '%' => sanitized.push_str("%25"),
                '/' => sanitized.push_str("%2F"),
                '\\' => sanitized.push_str("%5C"),
                other => sanitized.push(other),
            }
        }
        format!("{sanitized}.merge")
    }
}

impl ArtifactStore for FsArtifactStore {
    fn materialize(&mut self, path: &str, content: &str) -> Result<ArtifactHandle, SessionError> {
        let store_err = |detail: String| SessionError::ArtifactStore {
            path: path.to_string(),
            detail,
        };
        std::fs::create_dir_all(&self.dir).map_err(|e| store_err(e.to_string()))?;
        let location = self.dir.join(Self::file_name(path));
        std::fs::write(&location, content).map_err(|e| store_err(e.to_string()))?;
        debug!(path, location = %location.display(), "artifact materialized");
        Ok(ArtifactHandle {
            id: Uuid::new_v4().to_string(),
            record_path: path.to_string(),
            location: Some(location),
        })
    }
}

// ---------------------------------------------------------------------------
// Events and reports
// ---------------------------------------------------------------------------

/// Notification from the host about a materialized artifact.
#[derive(Debug, Clone)]
pub enum ArtifactEvent {
    Finalized { path: String, content: String },
    Abandoned { path: String, policy: AbandonPolicy },
}

/// Terminal summary of a session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub state: SessionState,
    /// Final resolution per path; `None` records a kept deletion.
    pub resolved: HashMap<String, Option<Record>>,
    /// Paths still unresolved at the end (timeout or cancellation).
    pub unresolved: Vec<String>,
    pub decisions: Vec<DecisionLogEntry>,
}

/// Structured summary materialized for field-only conflicts.
#[derive(Debug, Serialize)]
struct FieldSummary<'a> {
    path: &'a str,
    relation: ConflictRelation,
    field_conflicts: &'a [FieldConflict],
    local: Option<&'a Record>,
    remote: Option<&'a Record>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// State machine driving manual resolution of a set of conflicts.
pub struct ConflictResolutionSession {
    id: String,
    state: SessionState,
    policy: FieldMergePolicy,
    timeout: Duration,
    deadline: Option<DateTime<Utc>>,
    pending: HashMap<String, ConflictDescriptor>,
    resolved: HashMap<String, Option<Record>>,
    artifacts: HashMap<String, ArtifactHandle>,
    decisions: Vec<DecisionLogEntry>,
}

impl ConflictResolutionSession {
    pub fn new(policy: FieldMergePolicy, timeout: Duration) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: SessionState::Created,
            policy,
            timeout,
            deadline: None,
            pending: HashMap::new(),
            resolved: HashMap::new(),
            artifacts: HashMap::new(),
            decisions: Vec::new(),
        }
    }

    pub fn from_config(config: &MergeConfig) -> Self {
        Self::new(config.merge.field_policy, config.session_timeout())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Paths still awaiting a decision, sorted for stable display.
    pub fn pending_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.pending.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// The materialized artifact for a pending path.
    pub fn artifact(&self, path: &str) -> Option<&ArtifactHandle> {
        self.artifacts.get(path)
    }

    /// The pending descriptor for a path.
    pub fn descriptor(&self, path: &str) -> Option<&ConflictDescriptor> {
        self.pending.get(path)
    }

    /// When the session will time out, once started.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Materialize artifacts for all descriptors and begin awaiting the
    /// user. An empty descriptor set completes immediately.
    pub fn start(
        &mut self,
        descriptors: Vec<ConflictDescriptor>,
        store: &mut dyn ArtifactStore,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Created {
            return Err(self.bad_state("start"));
        }

        for descriptor in descriptors {
            let content = artifact_content(&descriptor);
            let handle = store.materialize(&descriptor.path, &content)?;
            self.artifacts.insert(descriptor.path.clone(), handle);
            self.pending.insert(descriptor.path.clone(), descriptor);
        }

        // Timeouts beyond chrono's range are capped; a year is already
        // far past any useful session lifetime.
        let timeout = chrono::Duration::from_std(self.timeout)
            .unwrap_or_else(|_| chrono::Duration::days(365));
        self.deadline = Some(Utc::now() + timeout);
        if self.pending.is_empty() {
            self.state = SessionState::Completed;
        } else {
            self.state = SessionState::AwaitingUser;
        }
        info!(
            session = %self.id,
            pending = self.pending.len(),
            state = %self.state,
            "session started"
        );
        Ok(())
    }

    /// Accept a finalized artifact for a path.
    ///
    /// Validation failures are recoverable: the error lists what is wrong
    /// and the descriptor stays pending for re-presentation.
    pub fn on_artifact_finalized(
        &mut self,
        path: &str,
        content: &str,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::AwaitingUser {
            return Err(self.bad_state("finalize"));
        }
        if self.resolved.contains_key(path) {
            return Err(SessionError::AlreadyResolved(path.to_string()));
        }
        let Some(descriptor) = self.pending.get(path) else {
            return Err(SessionError::UnknownPath(path.to_string()));
        };

        let errors = markers::validate_resolved(content);
        if !errors.is_empty() {
            warn!(session = %self.id, path, count = errors.len(), "artifact failed validation");
            return Err(SessionError::Validation {
                path: path.to_string(),
                errors,
            });
        }

        // Identity comes from the local side; remaining fields merge under
        // the configured tie-break policy.
        let mut record = match (&descriptor.local, &descriptor.remote) {
            (Some(local), Some(remote)) => {
                RecordDiffer::merge_fields(descriptor.base.as_ref(), local, remote, self.policy)
            }
            (Some(local), None) => local.clone(),
            (None, Some(remote)) => remote.clone(),
            // A descriptor always carries at least one side.
            (None, None) => return Err(SessionError::UnknownPath(path.to_string())),
        };
        // The content channel: a marked or failed outcome was resolved in
        // the artifact itself, while a clean outcome never reached the user
        // and its merged text must still be carried into the record.
        if descriptor.has_content_conflict() {
            record = record.with_code(content.to_string());
        } else if let Some(outcome) = descriptor.content_outcome.as_ref().filter(|o| o.is_clean()) {
            record = record.with_code(outcome.merged_text.clone());
        }

        self.mark_resolved(path, Some(record), DecisionKind::Finalized, "artifact finalized by user");
        self.check_completion();
        Ok(())
    }

    /// Apply an abandon decision for a path.
    pub fn on_artifact_abandoned(
        &mut self,
        path: &str,
        policy: AbandonPolicy,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::AwaitingUser {
            return Err(self.bad_state("abandon"));
        }

        if policy == AbandonPolicy::CancelAll {
            let discarded = self.pending.len() + self.resolved.len();
            self.pending.clear();
            self.resolved.clear();
            self.artifacts.clear();
            self.state = SessionState::Cancelled;
            info!(session = %self.id, discarded, "session cancelled, all state discarded");
            return Ok(());
        }

        if self.resolved.contains_key(path) {
            return Err(SessionError::AlreadyResolved(path.to_string()));
        }
        let Some(descriptor) = self.pending.get(path) else {
            return Err(SessionError::UnknownPath(path.to_string()));
        };

        let (record, kind, rationale) = match policy {
            AbandonPolicy::UseLocal => (
                descriptor.local.clone(),
                DecisionKind::UsedLocal,
                "local side kept on abandon",
            ),
            AbandonPolicy::UseRemote => (
                descriptor.remote.clone(),
                DecisionKind::UsedRemote,
                "remote side kept on abandon",
            ),
            AbandonPolicy::CancelAll => unreachable!(),
        };
        self.mark_resolved(path, record, kind, rationale);
        self.check_completion();
        Ok(())
    }

    /// Transition to `TimedOut` if the deadline has passed.
    ///
    /// Already-resolved work is preserved; remaining pending paths are
    /// logged as unresolved. Returns whether a transition happened.
    pub fn check_timeout(&mut self, now: DateTime<Utc>) -> bool {
        if self.state != SessionState::AwaitingUser {
            return false;
        }
        let Some(deadline) = self.deadline else {
            return false;
        };
        if now < deadline {
            return false;
        }
        for path in self.pending_paths() {
            self.decisions.push(DecisionLogEntry::now(
                &path,
                DecisionKind::Unresolved,
                "session timed out before resolution",
            ));
        }
        self.state = SessionState::TimedOut;
        info!(
            session = %self.id,
            resolved = self.resolved.len(),
            unresolved = self.pending.len(),
            "session timed out"
        );
        true
    }

    /// Terminal (or in-flight) summary of the session.
    pub fn report(&self) -> SessionReport {
        SessionReport {
            state: self.state,
            resolved: self.resolved.clone(),
            unresolved: self.pending_paths(),
            decisions: self.decisions.clone(),
        }
    }

    /// Consume artifact events until the session reaches a terminal state,
    /// enforcing the deadline. Never blocks past the timeout.
    pub async fn drive(&mut self, mut events: mpsc::Receiver<ArtifactEvent>) -> SessionReport {
        while !self.state.is_terminal() {
            let now = Utc::now();
            if self.check_timeout(now) {
                break;
            }
            let remaining = self
                .deadline
                .map(|d| (d - now).to_std().unwrap_or(Duration::ZERO))
                .unwrap_or(Duration::ZERO);

            match tokio::time::timeout(remaining, events.recv()).await {
                Ok(Some(event)) => self.apply_event(event),
                Ok(None) => {
                    // Event source is gone; nothing further can resolve, so
                    // wait out the deadline.
                    tokio::time::sleep(remaining).await;
                    self.check_timeout(self.deadline.unwrap_or(now));
                    break;
                }
                Err(_) => {
                    // The timer elapsing means the deadline has passed.
                    self.check_timeout(self.deadline.unwrap_or(now));
                    break;
                }
            }
        }
        self.report()
    }

    /// Apply one event, logging (not propagating) recoverable failures.
    pub fn apply_event(&mut self, event: ArtifactEvent) {
        let result = match event {
            ArtifactEvent::Finalized { path, content } => {
                self.on_artifact_finalized(&path, &content)
            }
            ArtifactEvent::Abandoned { path, policy } => self.on_artifact_abandoned(&path, policy),
        };
        if let Err(e) = result {
            warn!(session = %self.id, error = %e, "artifact event not applied");
        }
    }

    // -- internals ----------------------------------------------------------

    /// Move a path from pending to resolved. The two maps stay disjoint: a
    /// path is removed from pending in the same step it enters resolved.
    fn mark_resolved(
        &mut self,
        path: &str,
        record: Option<Record>,
        kind: DecisionKind,
        rationale: &str,
    ) {
        self.pending.remove(path);
        self.artifacts.remove(path);
        self.resolved.insert(path.to_string(), record);
        self.decisions
            .push(DecisionLogEntry::now(path, kind, rationale));
        debug!(session = %self.id, path, kind = %kind, "path resolved");
    }

    fn check_completion(&mut self) {
        if self.state == SessionState::AwaitingUser && self.pending.is_empty() {
            self.state = SessionState::Completed;
            info!(session = %self.id, resolved = self.resolved.len(), "session completed");
        }
    }

    fn bad_state(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidState {
            operation,
            state: self.state.to_string(),
        }
    }
}

/// The document materialized for a descriptor.
///
/// Content conflicts get the marked-up merge text; a failed merge (no
/// useful markup) gets a single whole-document region so the artifact is
/// still resolvable by editing. Field-only conflicts get a structured JSON
/// summary whose finalization confirms the field-merge policy.
fn artifact_content(descriptor: &ConflictDescriptor) -> String {
    if descriptor.has_content_conflict() {
        let outcome = descriptor
            .content_outcome
            .as_ref()
            .filter(|o| !o.merged_text.is_empty());
        if let Some(outcome) = outcome {
            return outcome.merged_text.clone();
        }
        let label = format!("{} {}", descriptor.local.as_ref().map_or("record", |r| r.kind()), descriptor.path);
        let local_code = descriptor.local.as_ref().and_then(Record::code).unwrap_or("");
        let remote_code = descriptor.remote.as_ref().and_then(Record::code).unwrap_or("");
        let mut lines: Vec<String> = vec![markers::start_marker(&label, "c1")];
        lines.extend(local_code.lines().map(str::to_string));
        lines.push(markers::SEPARATOR.to_string());
        lines.extend(remote_code.lines().map(str::to_string));
        lines.push(markers::end_marker(&label, "c1"));
        let mut text = lines.join("\n");
        text.push('\n');
        return text;
    }

    let summary = FieldSummary {
        path: &descriptor.path,
        relation: descriptor.relation,
        field_conflicts: &descriptor.field_conflicts,
        local: descriptor.local.as_ref(),
        remote: descriptor.remote.as_ref(),
    };
    // Serialization of plain data cannot fail.
    serde_json::to_string_pretty(&summary).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MergeOutcome, Snippet};
    use chrono::{TimeZone, Utc};

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

    fn content_descriptor(path: &str) -> ConflictDescriptor {
        let marked = format!(
            "a\n{}\nX\n{}\nY\n{}\nc",
            markers::start_marker("local", "c1"),
            markers::SEPARATOR,
            markers::end_marker("remote", "c1"),
        );
        ConflictDescriptor {
            path: path.to_string(),
            relation: ConflictRelation::ModifyModify,
            base: Some(snippet(path, "A", "a\nb\nc")),
            local: Some(snippet(path, "A", "a\nX\nc")),
            remote: Some(snippet(path, "A", "a\nY\nc")),
            field_conflicts: Vec::new(),
            content_outcome: Some(MergeOutcome::marked(
                marked,
                vec![crate::models::ConflictRegion {
                    id: "c1".into(),
                    start_line: 2,
                    end_line: 6,
                }],
            )),
        }
    }

    fn started_session(
        descriptors: Vec<ConflictDescriptor>,
    ) -> (ConflictResolutionSession, InMemoryArtifactStore) {
        let mut session =
            ConflictResolutionSession::new(FieldMergePolicy::PreferRemote, Duration::from_secs(60));
        let mut store = InMemoryArtifactStore::new();
        session.start(descriptors, &mut store).unwrap();
        (session, store)
    }

    #[test]
    fn test_empty_start_completes_immediately() {
        let (session, _) = started_session(vec![]);
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[test]
    fn test_start_materializes_marked_text() {
        let (session, store) = started_session(vec![content_descriptor("/x")]);
        assert_eq!(session.state(), SessionState::AwaitingUser);
        let content = store.content("/x").unwrap();
        assert!(content.contains("<<<<<<< LOCAL"));
        assert!(session.artifact("/x").is_some());
    }

    #[test]
    fn test_start_twice_rejected() {
        let (mut session, mut store) = started_session(vec![content_descriptor("/x")]);
        let err = session.start(vec![], &mut store).unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { .. }));
    }

    #[test]
    fn test_finalize_with_leftover_markers_is_recoverable() {
        let (mut session, store) = started_session(vec![content_descriptor("/x")]);
        let unresolved = store.content("/x").unwrap().to_string();
        let err = session.on_artifact_finalized("/x", &unresolved).unwrap_err();
        match err {
            SessionError::Validation { errors, .. } => assert!(!errors.is_empty()),
            other => panic!("expected validation error, got {other}"),
        }
        // Still pending, still re-presentable.
        assert_eq!(session.state(), SessionState::AwaitingUser);
        assert_eq!(session.pending_paths(), vec!["/x".to_string()]);
    }

    #[test]
    fn test_finalize_builds_record_and_completes() {
        let (mut session, _) = started_session(vec![content_descriptor("/x")]);
        session.on_artifact_finalized("/x", "a\nresolved\nc").unwrap();
        assert_eq!(session.state(), SessionState::Completed);
        let report = session.report();
        let record = report.resolved["/x"].as_ref().unwrap();
        assert_eq!(record.path(), "/x");
        assert_eq!(record.code(), Some("a\nresolved\nc"));
        assert!(report.unresolved.is_empty());
        assert_eq!(report.decisions.len(), 1);
        assert_eq!(report.decisions[0].kind, DecisionKind::Finalized);
    }

    #[test]
    fn test_finalize_round_trip_with_local_side() {
        let descriptor = content_descriptor("/x");
        let local_code = descriptor.local.as_ref().unwrap().code().unwrap().to_string();
        let (mut session, store) = started_session(vec![descriptor]);
        let resolved_text =
            markers::take_side(store.content("/x").unwrap(), markers::Side::Local);
        assert_eq!(resolved_text.trim_end(), local_code);
        session.on_artifact_finalized("/x", &resolved_text).unwrap();
        let report = session.report();
        let record = report.resolved["/x"].as_ref().unwrap();
        assert_eq!(record.code().map(|c| c.trim_end()), Some(local_code.as_str()));
    }

    #[test]
    fn test_unknown_path_and_double_resolution() {
        let (mut session, _) = started_session(vec![content_descriptor("/x")]);
        let err = session.on_artifact_finalized("/y", "text").unwrap_err();
        assert!(matches!(err, SessionError::UnknownPath(_)));

        session
            .on_artifact_abandoned("/x", AbandonPolicy::UseLocal)
            .unwrap();
        // Session completed; a second decision for the path is rejected by
        // the state check.
        let err = session
            .on_artifact_abandoned("/x", AbandonPolicy::UseRemote)
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { .. }));
    }

    #[test]
    fn test_abandon_use_local_and_use_remote() {
        let descriptors = vec![content_descriptor("/a"), content_descriptor("/b")];
        let (mut session, _) = started_session(descriptors);
        session
            .on_artifact_abandoned("/a", AbandonPolicy::UseLocal)
            .unwrap();
        session
            .on_artifact_abandoned("/b", AbandonPolicy::UseRemote)
            .unwrap();
        let report = session.report();
        assert_eq!(report.state, SessionState::Completed);
        assert_eq!(
            report.resolved["/a"].as_ref().unwrap().code(),
            Some("a\nX\nc")
        );
        assert_eq!(
            report.resolved["/b"].as_ref().unwrap().code(),
            Some("a\nY\nc")
        );
    }

    #[test]
    fn test_abandon_use_remote_on_delete_keeps_deletion() {
        let mut descriptor = content_descriptor("/x");
        descriptor.relation = ConflictRelation::ModifyDelete;
        descriptor.remote = None;
        descriptor.content_outcome = None;
        let (mut session, _) = started_session(vec![descriptor]);
        session
            .on_artifact_abandoned("/x", AbandonPolicy::UseRemote)
            .unwrap();
        let report = session.report();
        assert_eq!(report.state, SessionState::Completed);
        assert!(report.resolved["/x"].is_none());
    }

    #[test]
    fn test_cancel_all_discards_everything() {
        let descriptors = vec![content_descriptor("/a"), content_descriptor("/b")];
        let (mut session, _) = started_session(descriptors);
        session.on_artifact_finalized("/a", "kept work").unwrap();
        session
            .on_artifact_abandoned("/b", AbandonPolicy::CancelAll)
            .unwrap();
        let report = session.report();
        assert_eq!(report.state, SessionState::Cancelled);
        assert!(report.resolved.is_empty());
        assert!(report.unresolved.is_empty());
    }

    #[test]
    fn test_timeout_preserves_resolved_work() {
        let descriptors = vec![
            content_descriptor("/a"),
            content_descriptor("/b"),
            content_descriptor("/c"),
        ];
        let (mut session, _) = started_session(descriptors);
        session.on_artifact_finalized("/a", "done a").unwrap();
        session.on_artifact_finalized("/b", "done b").unwrap();

        // Before the deadline nothing happens.
        assert!(!session.check_timeout(Utc::now()));
        let past_deadline = session.deadline().unwrap() + chrono::Duration::seconds(1);
        assert!(session.check_timeout(past_deadline));

        let report = session.report();
        assert_eq!(report.state, SessionState::TimedOut);
        assert_eq!(report.resolved.len(), 2);
        assert_eq!(report.unresolved, vec!["/c".to_string()]);
        assert!(report
            .decisions
            .iter()
            .any(|d| d.path == "/c" && d.kind == DecisionKind::Unresolved));
    }

    #[test]
    fn test_field_only_descriptor_gets_json_summary() {
        let descriptor = ConflictDescriptor {
            path: "/x".into(),
            relation: ConflictRelation::AddAdd,
            base: None,
            local: Some(snippet("/x", "Foo", "code")),
            remote: Some(snippet("/x", "Bar", "code")),
            field_conflicts: vec![FieldConflict {
                field: "name".into(),
                local_value: "Foo".into(),
                remote_value: "Bar".into(),
            }],
            content_outcome: None,
        };
        let (mut session, store) = started_session(vec![descriptor]);
        let content = store.content("/x").unwrap();
        assert!(content.contains("\"relation\": \"add_add\""));
        assert!(content.contains("\"field\": \"name\""));

        // Finalizing the summary applies the field policy (prefer remote)
        // without treating the JSON as snippet content.
        session.on_artifact_finalized("/x", content.to_string().as_str()).unwrap();
        let report = session.report();
        let record = report.resolved["/x"].as_ref().unwrap();
        assert_eq!(record.name(), "Bar");
        assert_eq!(record.code(), Some("code"));
    }

    #[test]
    fn test_finalize_carries_clean_content_merge_alongside_field_conflict() {
        // Fields disagree (so the artifact is a summary, not merge text)
        // while the content channel merged cleanly on its own.
        let merged_code = "remote-line\na\nb\nc\nlocal-line";
        let descriptor = ConflictDescriptor {
            path: "/x".into(),
            relation: ConflictRelation::ModifyModify,
            base: Some(snippet("/x", "Base", "a\nb\nc")),
            local: Some(snippet("/x", "Mine", "a\nb\nc\nlocal-line")),
            remote: Some(snippet("/x", "Theirs", "remote-line\na\nb\nc")),
            field_conflicts: vec![FieldConflict {
                field: "name".into(),
                local_value: "Mine".into(),
                remote_value: "Theirs".into(),
            }],
            content_outcome: Some(MergeOutcome::merged(merged_code)),
        };
        let (mut session, store) = started_session(vec![descriptor]);
        let summary = store.content("/x").unwrap().to_string();
        assert!(summary.contains("\"field\": \"name\""));

        session.on_artifact_finalized("/x", &summary).unwrap();
        let report = session.report();
        let record = report.resolved["/x"].as_ref().unwrap();
        // Both sides' edits survive: the merged content and the policy's
        // field pick.
        assert_eq!(record.code(), Some(merged_code));
        assert_eq!(record.name(), "Theirs");
    }

    #[test]
    fn test_failed_merge_gets_whole_document_region() {
        let mut descriptor = content_descriptor("/x");
        descriptor.content_outcome = Some(MergeOutcome::failed());
        let (_, store) = started_session(vec![descriptor]);
        let content = store.content("/x").unwrap();
        assert!(content.starts_with("<<<<<<< LOCAL (snippet /x) [c1]"));
        assert!(content.contains("a\nX\nc"));
        assert!(content.contains("a\nY\nc"));
        assert!(markers::validate_resolved(content).len() >= 3);
    }

    #[test]
    fn test_fs_store_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsArtifactStore::new(dir.path());
        let handle = store.materialize("/dir/snippet", "content").unwrap();
        let location = handle.location.unwrap();
        assert_eq!(location.file_name().unwrap(), "%2Fdir%2Fsnippet.merge");
        assert_eq!(std::fs::read_to_string(location).unwrap(), "content");
    }

    #[test]
    fn test_fs_store_keeps_similar_paths_apart() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsArtifactStore::new(dir.path());
        let first = store.materialize("/a/b", "slash").unwrap();
        let second = store.materialize("/a_b", "underscore").unwrap();
        let third = store.materialize("/a%2Fb", "literal percent").unwrap();

        let first = first.location.unwrap();
        let second = second.location.unwrap();
        let third = third.location.unwrap();
        assert_ne!(first, second);
        assert_ne!(first, third);
        assert_eq!(std::fs::read_to_string(first).unwrap(), "slash");
        assert_eq!(std::fs::read_to_string(second).unwrap(), "underscore");
        assert_eq!(std::fs::read_to_string(third).unwrap(), "literal percent");
    }

    #[tokio::test]
    async fn test_drive_applies_events_until_complete() {
        let (mut session, _) = started_session(vec![content_descriptor("/x")]);
        let (tx, rx) = mpsc::channel(4);
        tx.send(ArtifactEvent::Finalized {
            path: "/x".into(),
            content: "edited".into(),
        })
        .await
        .unwrap();
        let report = session.drive(rx).await;
        assert_eq!(report.state, SessionState::Completed);
        assert_eq!(
            report.resolved["/x"].as_ref().unwrap().code(),
            Some("edited")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_times_out_without_events() {
        let mut session =
            ConflictResolutionSession::new(FieldMergePolicy::PreferRemote, Duration::from_millis(50));
        let mut store = InMemoryArtifactStore::new();
        session.start(vec![content_descriptor("/x")], &mut store).unwrap();
        let (_tx, rx) = mpsc::channel::<ArtifactEvent>(1);
        let report = session.drive(rx).await;
        assert_eq!(report.state, SessionState::TimedOut);
        assert_eq!(report.unresolved, vec!["/x".to_string()]);
    }
}
