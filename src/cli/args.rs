//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! - `--repository <path>`: the repository to operate on
//!   (default: `WORKTREEFOUNDRY_REPOSITORY`)
//! - `--workspace-root <path>`: where workspace checkouts live
//!   (default: `WORKTREEFOUNDRY_WORKSPACE_ROOT`, then
//!   `.worktreefoundry/workspaces`)
//! - `--debug`: verbose output
//! - `--quiet` / `-q`: minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// worktreefoundry - schema-driven YAML configuration in a local Git repository
#[derive(Parser, Debug)]
#[command(name = "worktreefoundry")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the repository
    #[arg(long, global = true, env = "WORKTREEFOUNDRY_REPOSITORY")]
    pub repository: Option<PathBuf>,

    /// Workspace worktree root (absolute or relative to the repository)
    #[arg(long, global = true, env = "WORKTREEFOUNDRY_WORKSPACE_ROOT")]
    pub workspace_root: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a repository with sample schema/data
    Init {
        /// Initialize even when the directory is not empty
        #[arg(long)]
        force: bool,

        /// Skip the sample schema, constraints, and objects
        #[arg(long)]
        no_sample: bool,
    },

    /// Validate repository layout, objects, schema, and constraints
    Validate,

    /// Export deterministic JSON artifacts under output/
    Export {
        /// Output path (absolute or relative to the repository)
        #[arg(long, env = "WORKTREEFOUNDRY_OUT")]
        out: Option<PathBuf>,
    },

    /// Manage branch-isolated workspaces
    Workspace {
        #[command(subcommand)]
        command: WorkspaceCommand,
    },

    /// Merge a workspace into main with field-level conflict resolution
    Merge {
        /// Workspace to merge
        name: String,

        /// Resolve a conflict: KEY=main, KEY=workspace, or KEY=manual
        #[arg(long = "resolve", value_name = "KEY=CHOICE")]
        resolve: Vec<String>,

        /// Manual value for a conflict resolved with KEY=manual
        #[arg(long = "manual", value_name = "KEY=VALUE")]
        manual: Vec<String>,

        /// Simulate the merge and report validation issues, changing nothing
        #[arg(long)]
        preview: bool,
    },
}

/// Workspace lifecycle commands.
#[derive(Subcommand, Debug)]
pub enum WorkspaceCommand {
    /// Create a workspace branching from main
    Create {
        /// Workspace name ([A-Za-z0-9._-]+)
        name: String,
    },

    /// Delete a workspace and its branch
    Delete {
        /// Workspace name
        name: String,
    },

    /// List workspaces with their dirty state
    List,

    /// Show uncommitted changes in a workspace
    Status {
        /// Workspace name
        name: String,
    },

    /// Canonicalize, validate, and commit workspace changes
    Save {
        /// Workspace name
        name: String,

        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Restore one object file from the workspace HEAD (or main)
    Restore {
        /// Workspace name
        workspace: String,

        /// Object type
        type_name: String,

        /// Object id
        id: String,
    },
}
