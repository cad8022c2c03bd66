use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vidrelay")]
#[command(author, version, about = "Relay new channel uploads with an overlay and closing segment")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one relay pass over videos published since the checkpoint
    Run {
        /// List candidates without downloading, publishing or moving the checkpoint
        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect or change the scan checkpoint
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Subcommand)]
pub enum CheckpointAction {
    /// Print the stored checkpoint
    Show,

    /// Store a new checkpoint
    Set {
        /// RFC 3339 timestamp, e.g. 2024-05-01T00:00:00Z
        at: String,
    },

    /// Remove the stored checkpoint so the lookback window applies again
    Reset,
}
