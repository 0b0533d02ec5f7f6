//! init command - Bootstrap a repository

use anyhow::{Context as _, Result};

use crate::repo::init::initialize_repository;
use crate::ui::output;

use super::Context;

/// Initialize a repository, optionally seeding sample schema and data.
pub fn run(ctx: &Context, force: bool, sample: bool) -> Result<()> {
    let root = ctx.repository_path()?;
    initialize_repository(root, force, sample).context("Failed to initialize repository")?;
    output::print(
        format!("initialized repository: {}", root.display()),
        ctx.verbosity,
    );
    Ok(())
}
