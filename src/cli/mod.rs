//! cli
//!
//! Command-line interface layer for worktreefoundry.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Resolve defaults from `WORKTREEFOUNDRY_*` environment variables
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to
//! the [`crate::repo`] and [`crate::core`] layers. All repository state
//! changes flow through the repository handle's locked operations.

pub mod args;
pub mod commands;

pub use args::Cli;

use anyhow::Result;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    commands::dispatch(cli)
}
