//! Mode routing
//!
//! - Serve mode: background governor and backup timers until Ctrl+C
//! - CLI mode: one-shot offline commands against the snapshot directory

pub mod cli;
pub mod serve;

pub use cli::{CliError, run_cli_command};
pub use serve::run_server;
