//! Command-line interface definitions using clap
//!
//! Without a subcommand the binary runs in serve mode. Every other command
//! works offline against the snapshot directory: it restores the latest
//! snapshot, applies the change and writes a fresh one.

use clap::{Parser, Subcommand};

use crate::config::DEFAULT_CONFIG_PATH;

/// Linkkeeper - in-memory URL shortener with click analytics
#[derive(Parser, Debug)]
#[command(name = "linkkeeper")]
#[command(version)]
#[command(about = "In-memory URL shortener with click analytics and snapshot backups", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(long, short = 'c', global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the service (periodic memory sweeps and backups)
    Serve,

    /// Shorten a URL
    Add {
        /// Target URL
        url: String,
    },

    /// Remove a short code
    Remove {
        short_code: String,
    },

    /// List all short codes, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show analytics for a short code
    Analytics {
        short_code: String,
    },

    /// Show system and memory statistics
    Stats,

    /// Run a memory sweep immediately
    Sweep,

    /// List snapshot files in the backup directory
    Backups,

    /// Export the index to a JSON snapshot
    Export {
        /// Output file path (default: stdout)
        file_path: Option<String>,
    },

    /// Replace the index with a JSON snapshot
    Import {
        /// Input file path
        file_path: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration management commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: config.example.toml)
        output_path: Option<String>,

        /// Force overwrite if the file exists
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

impl Commands {
    /// Whether the command changes the index and needs a snapshot written afterwards.
    pub fn mutates_index(&self) -> bool {
        matches!(
            self,
            Commands::Add { .. }
                | Commands::Remove { .. }
                | Commands::Sweep
                | Commands::Import { .. }
        )
    }
}
