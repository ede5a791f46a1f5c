//! Configuration file generation and validation.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};

use snipsync_core::config::MergeConfig;

use crate::style;

pub fn run_init(output: &PathBuf) -> Result<ExitCode> {
    let default_config = r#"# SnipSync Configuration
# See documentation for all available options.

[merge]
# Maximum conflicting hunks a two-way merge will mark up before giving up.
conflict_hunk_limit = 3
# Tie-break for conflicting scalar fields: "prefer_remote" or "prefer_local".
field_policy = "prefer_remote"

[session]
# Interactive resolution sessions time out after this many seconds.
# Overridable with SNIPSYNC_SESSION_TIMEOUT_SECS.
timeout_secs = 900

[history]
# Revision consulted when a triple arrives without a base version.
base_revision = "HEAD"
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Adjust the merge and session settings for your replicas");
    println!(
        "  2. Validate with: snipsync validate --config {}",
        output.display()
    );

    Ok(ExitCode::SUCCESS)
}

pub fn run_validate(config_path: &Path) -> Result<ExitCode> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config = match MergeConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("  {}", style::error(&format!("{e}")));
            anyhow::bail!("configuration validation failed");
        }
    };

    println!("  {}", style::success("TOML structure is valid"));
    println!("  {}", style::success("All values are within range"));

    println!();
    println!("Configuration summary:");
    println!(
        "  Conflict hunk limit: {}",
        config.merge.conflict_hunk_limit
    );
    println!("  Field policy       : {:?}", config.merge.field_policy);
    println!("  Session timeout    : {}s", config.session.timeout_secs);
    println!("  Base revision      : {}", config.history.base_revision);
    println!();
    println!("Configuration is valid.");

    Ok(ExitCode::SUCCESS)
}
