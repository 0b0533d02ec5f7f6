//! cli::commands
//!
//! Command handlers. Each handler opens the repository, calls into the
//! repo/core layers, and formats the result; none of them mutate state
//! directly.

mod export;
mod init;
mod merge;
mod validate;
mod workspace;

use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::cli::args::{Cli, Command};
use crate::repo::Repository;
use crate::ui::output::Verbosity;

/// Dispatch a parsed command line to its handler.
pub fn dispatch(cli: Cli) -> Result<()> {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.debug);
    let ctx = Context {
        repository: cli.repository,
        workspace_root: cli.workspace_root,
        verbosity,
    };

    match cli.command {
        Command::Init { force, no_sample } => init::run(&ctx, force, !no_sample),
        Command::Validate => validate::run(&ctx),
        Command::Export { out } => export::run(&ctx, out),
        Command::Workspace { command } => workspace::run(&ctx, command),
        Command::Merge {
            name,
            resolve,
            manual,
            preview,
        } => merge::run(&ctx, &name, &resolve, &manual, preview),
    }
}

/// Shared handler context derived from global flags.
pub struct Context {
    /// Repository path from flag or environment.
    pub repository: Option<PathBuf>,
    /// Workspace root override.
    pub workspace_root: Option<PathBuf>,
    /// Output verbosity.
    pub verbosity: Verbosity,
}

impl Context {
    /// The repository path, required for every command except init's
    /// error message rendering.
    pub fn repository_path(&self) -> Result<&PathBuf> {
        self.repository
            .as_ref()
            .ok_or_else(|| anyhow!("--repository is required (or WORKTREEFOUNDRY_REPOSITORY)"))
    }

    /// Open the repository handle.
    pub fn open_repository(&self) -> Result<Repository> {
        let root = self.repository_path()?;
        Ok(Repository::open(root, self.workspace_root.as_deref())?)
    }
}
