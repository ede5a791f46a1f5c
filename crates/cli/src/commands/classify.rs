//! Classify the conflict relation of each triple in a batch.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

use snipsync_core::config::MergeConfig;
use snipsync_core::conflict::{ConflictClassifier, RecordDiffer};
use snipsync_core::models::{ConflictRelation, Record};

use super::read_triples;
use crate::style;

pub fn run(input: &Path, _config: &MergeConfig) -> Result<ExitCode> {
    let triples = read_triples(input)?;

    if triples.is_empty() {
        println!();
        println!("{}", style::success("No triples to classify"));
        println!();
        return Ok(ExitCode::SUCCESS);
    }

    println!();
    println!(
        "{}",
        style::header(&format!("Classification ({} triples)", triples.len()))
    );
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Path",
        "Base",
        "Local",
        "Remote",
        "Relation",
        "Conflicting fields",
    ]);

    let mut conflicts = 0usize;
    for triple in &triples {
        let relation = ConflictClassifier::classify(
            triple.base.as_ref(),
            triple.local.as_ref(),
            triple.remote.as_ref(),
        );
        if relation != ConflictRelation::None {
            conflicts += 1;
        }
        let fields = match (&triple.local, &triple.remote) {
            (Some(local), Some(remote)) => {
                let conflicts = RecordDiffer::field_diff(triple.base.as_ref(), local, remote);
                if conflicts.is_empty() {
                    "—".to_string()
                } else {
                    conflicts
                        .iter()
                        .map(|c| c.field.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                }
            }
            _ => "—".to_string(),
        };
        table.add_row(vec![
            Cell::new(&triple.path),
            Cell::new(presence(triple.base.as_ref())),
            Cell::new(presence(triple.local.as_ref())),
            Cell::new(presence(triple.remote.as_ref())),
            Cell::new(relation.to_string()),
            Cell::new(fields),
        ]);
    }

    println!("{table}");
    println!();
    if conflicts == 0 {
        println!("{}", style::success("No conflicts"));
        println!();
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "{}",
            style::warn(&format!("{conflicts} conflicting triple(s)"))
        );
        println!();
        Ok(ExitCode::FAILURE)
    }
}

fn presence(record: Option<&Record>) -> &'static str {
    match record {
        Some(r) => r.kind(),
        None => "—",
    }
}
