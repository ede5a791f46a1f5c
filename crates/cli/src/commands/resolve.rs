//! Resolve a batch of triples: automatic pass, then an interactive session.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use dialoguer::Select;
use tokio::sync::mpsc;

use snipsync_core::config::MergeConfig;
use snipsync_core::conflict::markers;
use snipsync_core::conflict::session::{
    ArtifactEvent, ConflictResolutionSession, FsArtifactStore,
};
use snipsync_core::conflict::AutoResolver;
use snipsync_core::models::{AbandonPolicy, Record, SessionState};

use super::read_triples;
use crate::style;

pub async fn run(
    input: &Path,
    output: Option<&Path>,
    artifacts_dir: Option<&Path>,
    config: &MergeConfig,
) -> Result<ExitCode> {
    let triples = read_triples(input)?;
    let resolver = AutoResolver::from_config(config);
    let batch = resolver.resolve_all(&triples);

    println!();
    println!(
        "{}",
        style::header(&format!(
            "Automatic pass: {} resolved, {} need attention",
            batch.resolved.len(),
            batch.descriptors.len()
        ))
    );
    if !batch.decisions.is_empty() {
        println!();
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Path", "Decision", "Rationale"]);
        for decision in &batch.decisions {
            table.add_row(vec![
                Cell::new(&decision.path),
                Cell::new(decision.kind.to_string()),
                Cell::new(&decision.rationale),
            ]);
        }
        println!("{table}");
    }

    let mut resolved: HashMap<String, Option<Record>> = batch.resolved;

    if batch.descriptors.is_empty() {
        println!();
        println!("{}", style::success("Nothing left to resolve"));
        write_output(output, &resolved)?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut session = ConflictResolutionSession::from_config(config);
    let dir = artifacts_dir.map(PathBuf::from).unwrap_or_else(|| {
        std::env::temp_dir().join(format!("snipsync-{}", session.id()))
    });
    let mut store = FsArtifactStore::new(&dir);
    session
        .start(batch.descriptors, &mut store)
        .context("failed to start resolution session")?;

    println!();
    println!(
        "{}",
        style::header(&format!(
            "Resolution session {} ({} conflicts, artifacts in {})",
            session.id(),
            session.pending_paths().len(),
            dir.display()
        ))
    );
    if let Some(deadline) = session.deadline() {
        println!(
            "  {}",
            style::dim(&format!(
                "times out at {}",
                deadline.format("%Y-%m-%d %H:%M:%S UTC")
            ))
        );
    }

    // Snapshot what the prompt loop needs; the session itself stays on this
    // task to consume events and enforce the deadline.
    let pending: Vec<(String, Option<PathBuf>)> = session
        .pending_paths()
        .into_iter()
        .map(|path| {
            let location = session.artifact(&path).and_then(|a| a.location.clone());
            (path, location)
        })
        .collect();

    let (tx, rx) = mpsc::channel(16);
    let prompt = tokio::task::spawn_blocking(move || prompt_loop(pending, tx));
    let report = session.drive(rx).await;
    prompt.await.context("prompt loop panicked")??;

    println!();
    match report.state {
        SessionState::Completed => println!("{}", style::success("Session completed")),
        SessionState::TimedOut => println!(
            "{}",
            style::warn(&format!(
                "Session timed out with {} unresolved path(s)",
                report.unresolved.len()
            ))
        ),
        SessionState::Cancelled => {
            println!("{}", style::error("Session cancelled, no changes applied"));
            return Ok(ExitCode::FAILURE);
        }
        other => println!("{}", style::warn(&format!("Session ended in state {other}"))),
    }

    for decision in &report.decisions {
        println!(
            "  {} {} {}",
            style::dim(&decision.kind.to_string()),
            decision.path,
            style::dim(&decision.rationale)
        );
    }

    resolved.extend(report.resolved);
    write_output(output, &resolved)?;

    if report.state == SessionState::Completed {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Prompt for a decision on each conflict, sending events to the session.
///
/// Every path gets a decision or the whole session is cancelled; leaving a
/// path undecided would hold the session open until its deadline.
fn prompt_loop(
    pending: Vec<(String, Option<PathBuf>)>,
    tx: mpsc::Sender<ArtifactEvent>,
) -> Result<()> {
    for (path, location) in pending {
        println!();
        println!("{}", style::header(&format!("Conflict: {path}")));
        if let Some(ref location) = location {
            println!("  artifact: {}", location.display());
        }

        let items = vec![
            "Finalize from edited artifact".to_string(),
            format!("Keep {}", style::local_label()),
            format!("Keep {}", style::remote_label()),
            "Cancel entire session".to_string(),
        ];
        loop {
            let choice = Select::new()
                .with_prompt("Resolution")
                .items(&items)
                .default(0)
                .interact()?;

            match choice {
                0 => {
                    let Some(ref location) = location else {
                        println!("{}", style::error("no artifact file for this conflict"));
                        continue;
                    };
                    open_editor(location);
                    let content = std::fs::read_to_string(location)
                        .with_context(|| format!("failed to read {}", location.display()))?;
                    let errors = markers::validate_resolved(&content);
                    if !errors.is_empty() {
                        println!("{}", style::error("artifact still has conflicts:"));
                        for error in &errors {
                            println!("    {error}");
                        }
                        continue;
                    }
                    if !send(&tx, ArtifactEvent::Finalized { path: path.clone(), content }) {
                        return Ok(());
                    }
                }
                1 => {
                    if !send(&tx, abandon(&path, AbandonPolicy::UseLocal)) {
                        return Ok(());
                    }
                }
                2 => {
                    if !send(&tx, abandon(&path, AbandonPolicy::UseRemote)) {
                        return Ok(());
                    }
                }
                _ => {
                    send(&tx, abandon(&path, AbandonPolicy::CancelAll));
                    return Ok(());
                }
            }
            break;
        }
    }
    Ok(())
}

/// Open the artifact in `$EDITOR` when one is configured; otherwise the
/// user is expected to have edited the file already.
fn open_editor(location: &Path) {
    let Ok(editor) = std::env::var("EDITOR") else {
        return;
    };
    if editor.is_empty() {
        return;
    }
    let status = std::process::Command::new(&editor).arg(location).status();
    if let Err(e) = status {
        println!(
            "{}",
            style::warn(&format!("could not launch {editor}: {e}"))
        );
    }
}

/// Send an event, reporting whether the session is still listening. A
/// closed channel means it reached a terminal state on its own.
fn send(tx: &mpsc::Sender<ArtifactEvent>, event: ArtifactEvent) -> bool {
    if tx.blocking_send(event).is_err() {
        println!("{}", style::warn("session ended before this decision was applied"));
        return false;
    }
    true
}

fn abandon(path: &str, policy: AbandonPolicy) -> ArtifactEvent {
    ArtifactEvent::Abandoned {
        path: path.to_string(),
        policy,
    }
}

/// Write the final path-to-record map as JSON; `null` records deletions.
fn write_output(output: Option<&Path>, resolved: &HashMap<String, Option<Record>>) -> Result<()> {
    let json = serde_json::to_string_pretty(resolved).context("failed to serialize results")?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!();
            println!(
                "{}",
                style::success(&format!("Resolved records written to {}", path.display()))
            );
        }
        None => {
            println!();
            println!("{json}");
        }
    }
    Ok(())
}
