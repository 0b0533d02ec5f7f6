//! workspace command - Workspace lifecycle management

use anyhow::{Context as _, Result};

use crate::cli::args::WorkspaceCommand;
use crate::ui::output;

use super::Context;

/// Dispatch a workspace subcommand.
pub fn run(ctx: &Context, command: WorkspaceCommand) -> Result<()> {
    let repo = ctx.open_repository()?;

    match command {
        WorkspaceCommand::Create { name } => {
            repo.create_workspace(&name)
                .context("Failed to create workspace")?;
            output::print(format!("created workspace {name}"), ctx.verbosity);
        }
        WorkspaceCommand::Delete { name } => {
            repo.delete_workspace(&name)
                .context("Failed to delete workspace")?;
            output::print(format!("deleted workspace {name}"), ctx.verbosity);
        }
        WorkspaceCommand::List => {
            let workspaces = repo.list_workspaces()?;
            if workspaces.is_empty() {
                output::print("no workspaces", ctx.verbosity);
                return Ok(());
            }
            for ws in workspaces {
                let state = if ws.dirty { "dirty" } else { "clean" };
                println!("{}\t{}\t{}", ws.name, state, ws.path.display());
            }
        }
        WorkspaceCommand::Status { name } => {
            let path = repo.workspace_path(&name);
            if !path.exists() {
                anyhow::bail!("workspace {name:?} not found");
            }
            let entries = repo.changed_entries(&path)?;
            if entries.is_empty() {
                output::print("clean", ctx.verbosity);
                return Ok(());
            }
            for entry in entries {
                println!("{}\t{}", entry.status, entry.path);
            }
        }
        WorkspaceCommand::Save { name, message } => {
            let changed = repo
                .save_workspace(&name, message.as_deref())
                .context("Failed to save workspace")?;
            output::print(
                format!("saved {} file(s):", changed.len()),
                ctx.verbosity,
            );
            output::print(output::format_list(&changed, "  "), ctx.verbosity);
        }
        WorkspaceCommand::Restore {
            workspace,
            type_name,
            id,
        } => {
            repo.restore_object(&workspace, &type_name, &id)
                .context("Failed to restore object")?;
            output::print(
                format!("restored data/{type_name}/{id}.yaml"),
                ctx.verbosity,
            );
        }
    }
    Ok(())
}
