//! SnipSync command-line conflict resolution tool.
//!
//! Provides subcommands for classifying record version triples, merging
//! snippet text two-way or three-way, running an interactive resolution
//! session over a batch of triples, and generating / validating
//! configuration files.

mod commands;
mod style;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use snipsync_core::config::MergeConfig;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// SnipSync command-line conflict resolution tool.
#[derive(Parser, Debug)]
#[command(
    name = "snipsync",
    version,
    about = "Classify, merge, and resolve snippet sync conflicts"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify the conflict relation of each triple in a batch file.
    Classify {
        /// JSON file holding an array of version triples.
        input: PathBuf,
    },

    /// Merge two snippet text files, optionally against a common base.
    Merge {
        /// Local version of the text.
        local: PathBuf,

        /// Remote version of the text.
        remote: PathBuf,

        /// Common ancestor; omitting it falls back to a two-way merge.
        #[arg(short, long)]
        base: Option<PathBuf>,

        /// Write the merged text here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Resolve a batch of triples: automatic pass, then an interactive
    /// session for whatever remains.
    Resolve {
        /// JSON file holding an array of version triples.
        input: PathBuf,

        /// Write resolved records here as JSON (defaults to stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory for resolution artifacts (defaults to a temp dir).
        #[arg(long)]
        artifacts_dir: Option<PathBuf>,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./snipsync.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    // Minimal logging for CLI
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    tracing::debug!(config = %config_path.display(), "using configuration");

    match cli.command {
        Commands::Classify { input } => {
            let config = MergeConfig::load_or_default(&config_path);
            commands::classify::run(&input, &config)
        }
        Commands::Merge {
            local,
            remote,
            base,
            output,
        } => {
            let config = MergeConfig::load_or_default(&config_path);
            commands::merge::run(&local, &remote, base.as_deref(), output.as_deref(), &config)
        }
        Commands::Resolve {
            input,
            output,
            artifacts_dir,
        } => {
            let config = MergeConfig::load_or_default(&config_path);
            commands::resolve::run(&input, output.as_deref(), artifacts_dir.as_deref(), &config)
                .await
        }
        Commands::Init { output } => commands::config::run_init(&output),
        Commands::Validate => commands::config::run_validate(&config_path),
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("snipsync")
        .join("config.toml")
}
