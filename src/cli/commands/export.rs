//! export command - Compile the repository to JSON artifacts

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::core::export::export_repository;
use crate::ui::output;

use super::Context;

/// Export one JSON array per schema type under the output directory.
pub fn run(ctx: &Context, out: Option<PathBuf>) -> Result<()> {
    let repo = ctx.open_repository()?;
    let out = match out {
        Some(path) if path.is_absolute() => path,
        Some(path) => repo.root().join(path),
        None => repo.root().join("output"),
    };
    export_repository(repo.root(), &out).context("Failed to export repository")?;
    output::print(format!("export complete: {}", out.display()), ctx.verbosity);
    Ok(())
}
