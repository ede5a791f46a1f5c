//! Subcommand implementations.

pub mod classify;
pub mod config;
pub mod merge;
pub mod resolve;

use std::path::Path;

use anyhow::{Context, Result};
use snipsync_core::models::VersionTriple;

/// Read a batch of version triples from a JSON file.
pub fn read_triples(path: &Path) -> Result<Vec<VersionTriple>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse triples from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_triples_parses_records() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("triples.json");
        std::fs::write(
            &file,
            r#"[
                {
                    "path": "/lib/sort",
                    "base": null,
                    "local": {
                        "kind": "snippet",
                        "path": "/lib/sort",
                        "name": "Sort",
                        "code": "fn main() {}",
                        "language": "rust",
                        "file_name": "sort.rs",
                        "file_path": "",
                        "category": "",
                        "order": 0,
                        "create_time": "2024-06-01T12:00:00Z"
                    },
                    "remote": null
                }
            ]"#,
        )
        .unwrap();

        let triples = read_triples(&file).unwrap();
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].path, "/lib/sort");
        assert!(triples[0].base.is_none());
        assert_eq!(triples[0].local.as_ref().unwrap().name(), "Sort");
    }

    #[test]
    fn test_read_triples_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("triples.json");
        std::fs::write(&file, "not json").unwrap();
        assert!(read_triples(&file).is_err());
    }
}
