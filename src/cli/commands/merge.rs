//! merge command - Publish a workspace into main

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Result};

use crate::core::yaml::render_scalar;
use crate::repo::{FieldConflict, Resolution};
use crate::ui::output;

use super::Context;

/// Merge a workspace, or preview the merged result with `--preview`.
///
/// Conflicts print with their resolution keys; re-run with
/// `--resolve KEY=CHOICE` (and `--manual KEY=VALUE` for manual choices)
/// to complete the merge.
pub fn run(
    ctx: &Context,
    name: &str,
    resolve: &[String],
    manual: &[String],
    preview: bool,
) -> Result<()> {
    let repo = ctx.open_repository()?;

    if preview {
        let result = repo.validate_merge_preview(name)?;
        if !result.ok() {
            for issue in &result.issues {
                println!("{issue}");
            }
            bail!("merge preview found {} issue(s)", result.issues.len());
        }
        output::print("merge preview passed", ctx.verbosity);
        return Ok(());
    }

    let resolutions = parse_resolutions(resolve)?;
    let manual_values = parse_pairs(manual)?;
    let outcome = repo.merge_workspace(name, &resolutions, &manual_values)?;

    if !outcome.conflicts.is_empty() {
        println!("{}", outcome.message);
        for conflict in &outcome.conflicts {
            print_conflict(conflict);
        }
        bail!("{} conflict(s) require resolution", outcome.conflicts.len());
    }

    output::print(&outcome.message, ctx.verbosity);
    if outcome.merged {
        output::print(
            format!("merged {} file(s):", outcome.merged_files),
            ctx.verbosity,
        );
        output::print(output::format_list(&outcome.changed, "  "), ctx.verbosity);
    }
    Ok(())
}

fn print_conflict(conflict: &FieldConflict) {
    let render = |value: &Option<crate::core::value::Value>| match value {
        Some(v) => render_scalar(v),
        None => "(absent)".to_string(),
    };
    println!("conflict: {}", conflict.key);
    println!("  base:      {}", render(&conflict.base));
    println!("  main:      {}", render(&conflict.main));
    println!("  workspace: {}", render(&conflict.workspace));
}

fn parse_resolutions(pairs: &[String]) -> Result<BTreeMap<String, Resolution>> {
    let mut resolutions = BTreeMap::new();
    for (key, choice) in parse_pairs(pairs)? {
        let resolution = choice.parse::<Resolution>().map_err(|e| anyhow!(e))?;
        resolutions.insert(key, resolution);
    }
    Ok(resolutions)
}

fn parse_pairs(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got {pair:?}"))?;
        map.insert(key.to_string(), value.to_string());
    }
    Ok(map)
}
