//! validate command - Run the full validation pipeline

use anyhow::{bail, Result};

use crate::core::validate::validate_repository;
use crate::ui::output;

use super::Context;

/// Validate the repository and print every issue.
pub fn run(ctx: &Context) -> Result<()> {
    let repo = ctx.open_repository()?;
    let result = validate_repository(repo.root());
    if !result.ok() {
        for issue in &result.issues {
            println!("{issue}");
        }
        bail!("validation failed with {} issue(s)", result.issues.len());
    }
    output::print("validation passed", ctx.verbosity);
    Ok(())
}
