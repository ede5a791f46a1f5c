//! Merge two snippet text files, optionally against a common base.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};

use snipsync_core::config::MergeConfig;
use snipsync_core::conflict::TextMergeEngine;
use snipsync_core::models::MergeStatus;

use crate::style;

pub fn run(
    local: &Path,
    remote: &Path,
    base: Option<&Path>,
    output: Option<&Path>,
    config: &MergeConfig,
) -> Result<ExitCode> {
    let read = |p: &Path| {
        std::fs::read_to_string(p).with_context(|| format!("failed to read {}", p.display()))
    };
    let local_text = read(local)?;
    let remote_text = read(remote)?;

    let engine = TextMergeEngine::new(config.merge.conflict_hunk_limit).with_labels(
        local.display().to_string(),
        remote.display().to_string(),
    );

    let outcome = match base {
        Some(base) => engine.three_way_merge(&local_text, &remote_text, &read(base)?),
        None => engine.two_way_merge(&local_text, &remote_text),
    };

    match outcome.status {
        MergeStatus::Failed => {
            eprintln!(
                "{}",
                style::error("merge failed: too many conflicting hunks for useful markup")
            );
            return Ok(ExitCode::FAILURE);
        }
        MergeStatus::ConflictMarked => {
            eprintln!(
                "{}",
                style::warn(&format!(
                    "{} conflict region(s) marked",
                    outcome.conflict_regions.len()
                ))
            );
            for region in &outcome.conflict_regions {
                eprintln!(
                    "  {} lines {}-{}",
                    style::dim(&region.id),
                    region.start_line,
                    region.end_line
                );
            }
        }
        MergeStatus::Merged => {
            eprintln!("{}", style::success("merged cleanly"));
        }
    }

    match output {
        Some(path) => std::fs::write(path, &outcome.merged_text)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{}", outcome.merged_text),
    }

    if outcome.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
