//! End-to-end tests for the resolution pipeline.
//!
//! These tests exercise the real components together:
//! - `AutoResolver` over a batch of version triples
//! - `ConflictResolutionSession` over the descriptors the pass left behind
//! - Artifacts on a real filesystem store via `tempfile`
//!
//! No network I/O and no editors: artifact finalization is simulated by
//! reading the materialized file, resolving its markers, and feeding the
//! result back to the session.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use snipsync_core::conflict::markers::{self, Side};
use snipsync_core::conflict::session::{
    ConflictResolutionSession, FsArtifactStore, InMemoryArtifactStore,
};
use snipsync_core::conflict::{AutoResolver, FieldMergePolicy};
use snipsync_core::models::{
    AbandonPolicy, ConflictRelation, DecisionKind, Record, SessionState, Snippet, VersionTriple,
};

// ===========================================================================
// Helpers
// ===========================================================================

fn snippet(path: &str, name: &str, code: &str) -> Record {
    Record::Snippet(Snippet {
        path: path.to_string(),
        name: name.to_string(),
        code: code.to_string(),
        language: "rust".to_string(),
        file_name: format!("{name}.rs"),
        file_path: String::new(),
        category: String::new(),
        order: 0,
        create_time: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    })
}

fn session(timeout: Duration) -> ConflictResolutionSession {
    ConflictResolutionSession::new(FieldMergePolicy::PreferRemote, timeout)
}

// ===========================================================================
// Auto pass feeding a session
// ===========================================================================

#[test]
fn test_batch_splits_into_auto_and_manual() {
    let base = snippet("/lib/sort", "Sort", "a\nb\nc\nd");
    let triples = vec![
        // Remote-only change: adopted automatically.
        VersionTriple::new(
            "/lib/sort",
            Some(base.clone()),
            Some(base.clone()),
            Some(base.with_code("a\nb\nc\nd\ne".into())),
        ),
        // Both edited the same line: needs a session.
        VersionTriple::new(
            "/lib/search",
            Some(snippet("/lib/search", "Search", "x\ny\nz")),
            Some(snippet("/lib/search", "Search", "x\nLOCAL\nz")),
            Some(snippet("/lib/search", "Search", "x\nREMOTE\nz")),
        ),
        // Deleted locally, edited remotely: always manual.
        VersionTriple::new(
            "/lib/old",
            Some(snippet("/lib/old", "Old", "body")),
            None,
            Some(snippet("/lib/old", "Old", "body v2")),
        ),
    ];

    let resolver = AutoResolver::default();
    let batch = resolver.resolve_all(&triples);

    assert_eq!(batch.resolved.len(), 1);
    assert_eq!(
        batch.resolved["/lib/sort"].as_ref().unwrap().code(),
        Some("a\nb\nc\nd\ne")
    );
    assert_eq!(batch.descriptors.len(), 2);
    let relations: Vec<ConflictRelation> =
        batch.descriptors.iter().map(|d| d.relation).collect();
    assert!(relations.contains(&ConflictRelation::ModifyModify));
    assert!(relations.contains(&ConflictRelation::DeleteModify));
}

#[test]
fn test_session_completes_after_finalize_and_abandon() {
    let resolver = AutoResolver::default();
    let batch = resolver.resolve_all(&[
        VersionTriple::new(
            "/lib/search",
            Some(snippet("/lib/search", "Search", "x\ny\nz")),
            Some(snippet("/lib/search", "Search", "x\nLOCAL\nz")),
            Some(snippet("/lib/search", "Search", "x\nREMOTE\nz")),
        ),
        VersionTriple::new(
            "/lib/old",
            Some(snippet("/lib/old", "Old", "body")),
            None,
            Some(snippet("/lib/old", "Old", "body v2")),
        ),
    ]);

    let mut store = InMemoryArtifactStore::new();
    let mut session = session(Duration::from_secs(300));
    session.start(batch.descriptors, &mut store).unwrap();
    assert_eq!(session.state(), SessionState::AwaitingUser);
    assert_eq!(
        session.pending_paths(),
        vec!["/lib/old".to_string(), "/lib/search".to_string()]
    );

    // Resolve the content conflict by keeping the local side of the markup.
    let marked = store.content("/lib/search").unwrap();
    assert!(marked.contains("<<<<<<< LOCAL"));
    let resolved_text = markers::take_side(marked, Side::Local);
    session
        .on_artifact_finalized("/lib/search", &resolved_text)
        .unwrap();

    // Keep the local deletion for the other path.
    session
        .on_artifact_abandoned("/lib/old", AbandonPolicy::UseLocal)
        .unwrap();

    let report = session.report();
    assert_eq!(report.state, SessionState::Completed);
    assert!(report.unresolved.is_empty());
    assert_eq!(
        report.resolved["/lib/search"]
            .as_ref()
            .unwrap()
            .code()
            .map(str::trim_end),
        Some("x\nLOCAL\nz")
    );
    assert!(report.resolved["/lib/old"].is_none());
    assert_eq!(report.decisions.len(), 2);
}

// ===========================================================================
// Timeout behavior
// ===========================================================================

#[test]
fn test_timeout_keeps_partial_progress() {
    let resolver = AutoResolver::default();
    let paths = ["/a", "/b", "/c"];
    let triples: Vec<VersionTriple> = paths
        .iter()
        .map(|p| {
            VersionTriple::new(
                *p,
                Some(snippet(p, "S", "1\n2\n3")),
                Some(snippet(p, "S", "1\nL\n3")),
                Some(snippet(p, "S", "1\nR\n3")),
            )
        })
        .collect();
    let batch = resolver.resolve_all(&triples);
    assert_eq!(batch.descriptors.len(), 3);

    let mut store = InMemoryArtifactStore::new();
    let mut session = session(Duration::from_secs(60));
    session.start(batch.descriptors, &mut store).unwrap();

    session.on_artifact_finalized("/a", "1\nL\n3").unwrap();
    session.on_artifact_finalized("/b", "1\nR\n3").unwrap();

    let after_deadline = session.deadline().unwrap() + chrono::Duration::seconds(5);
    assert!(session.check_timeout(after_deadline));

    let report = session.report();
    assert_eq!(report.state, SessionState::TimedOut);
    assert_eq!(report.resolved.len(), 2);
    assert_eq!(report.unresolved, vec!["/c".to_string()]);
    let unresolved_entries: Vec<_> = report
        .decisions
        .iter()
        .filter(|d| d.kind == DecisionKind::Unresolved)
        .collect();
    assert_eq!(unresolved_entries.len(), 1);
    assert_eq!(unresolved_entries[0].path, "/c");
}

// ===========================================================================
// Filesystem artifacts
// ===========================================================================

#[test]
fn test_fs_artifact_edit_and_finalize() {
    let dir = TempDir::new().unwrap();
    let mut store = FsArtifactStore::new(dir.path());

    let resolver = AutoResolver::default();
    let batch = resolver.resolve_all(&[VersionTriple::new(
        "/lib/search",
        Some(snippet("/lib/search", "Search", "x\ny\nz")),
        Some(snippet("/lib/search", "Search", "x\nLOCAL\nz")),
        Some(snippet("/lib/search", "Search", "x\nREMOTE\nz")),
    )]);

    let mut session = session(Duration::from_secs(300));
    session.start(batch.descriptors, &mut store).unwrap();

    // The artifact is a real file with the conflict markup.
    let location = session
        .artifact("/lib/search")
        .unwrap()
        .location
        .clone()
        .unwrap();
    let on_disk = std::fs::read_to_string(&location).unwrap();
    assert!(on_disk.contains(">>>>>>> REMOTE"));

    // Feeding the still-marked file back is rejected and leaves the
    // conflict pending.
    assert!(session.on_artifact_finalized("/lib/search", &on_disk).is_err());
    assert_eq!(session.state(), SessionState::AwaitingUser);

    // Simulate the user editing the file, then finalize for real.
    let edited = markers::take_side(&on_disk, Side::Remote);
    std::fs::write(&location, &edited).unwrap();
    let edited = std::fs::read_to_string(&location).unwrap();
    session.on_artifact_finalized("/lib/search", &edited).unwrap();

    let report = session.report();
    assert_eq!(report.state, SessionState::Completed);
    assert_eq!(
        report.resolved["/lib/search"]
            .as_ref()
            .unwrap()
            .code()
            .map(str::trim_end),
        Some("x\nREMOTE\nz")
    );
}

// ===========================================================================
// Cancellation
// ===========================================================================

#[test]
fn test_cancel_all_discards_finalized_work() {
    let resolver = AutoResolver::default();
    let batch = resolver.resolve_all(&[
        VersionTriple::new(
            "/a",
            Some(snippet("/a", "A", "1\n2")),
            Some(snippet("/a", "A", "1\nL")),
            Some(snippet("/a", "A", "1\nR")),
        ),
        VersionTriple::new(
            "/b",
            Some(snippet("/b", "B", "1\n2")),
            Some(snippet("/b", "B", "1\nL")),
            Some(snippet("/b", "B", "1\nR")),
        ),
    ]);

    let mut store = InMemoryArtifactStore::new();
    let mut session = session(Duration::from_secs(60));
    session.start(batch.descriptors, &mut store).unwrap();
    session.on_artifact_finalized("/a", "1\nL").unwrap();

    session
        .on_artifact_abandoned("/b", AbandonPolicy::CancelAll)
        .unwrap();

    let report = session.report();
    assert_eq!(report.state, SessionState::Cancelled);
    assert!(report.resolved.is_empty());
    assert!(report.unresolved.is_empty());

    // A cancelled session accepts nothing further.
    assert!(session.on_artifact_finalized("/b", "1\nR").is_err());
}
