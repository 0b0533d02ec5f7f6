//! repo::merge
//!
//! Field-level three-way merge of a workspace into trunk.
//!
//! # Lifecycle of a publish attempt
//!
//! `Collecting -> Comparing -> {Conflicts | Applying -> Validating ->
//! {Committing -> Deleting workspace | Rolling back}}`
//!
//! For every data file that differs between `main` and the workspace
//! branch, three views are loaded: at the merge base, at `main`, and at
//! the workspace branch. Each field resolves independently; a field on
//! which both sides diverge from the base is a conflict, keyed
//! `file + "::" + field` so a caller can round-trip resolutions through
//! a form or a flag.
//!
//! Trunk files are snapshotted before mutation. Any failure after the
//! first write - apply error or a validator issue - restores the
//! snapshots, so either the merge commits cleanly or trunk's `data/` is
//! byte-identical to its pre-attempt state.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::core::object;
use crate::core::types::WorkspaceName;
use crate::core::validate::{self, Stage, ValidationIssue, ValidationResult};
use crate::core::value::Value;
use crate::core::yaml;
use crate::git::Git;

use super::{RepoError, Repository, TRUNK_BRANCH};

/// A caller-supplied resolution for one conflicted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Keep trunk's value.
    Main,
    /// Keep the workspace's value.
    Workspace,
    /// Use a manually supplied value.
    Manual,
}

impl std::str::FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(Resolution::Main),
            "workspace" => Ok(Resolution::Workspace),
            "manual" => Ok(Resolution::Manual),
            other => Err(format!(
                "unknown resolution {other:?} (expected main, workspace, or manual)"
            )),
        }
    }
}

/// A field on which trunk and workspace both diverge from the base.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldConflict {
    /// Repo-relative file path.
    pub file: String,
    /// The conflicted field.
    pub field: String,
    /// The value at the merge base, if the field existed there.
    pub base: Option<Value>,
    /// The value on `main`, if present.
    pub main: Option<Value>,
    /// The value on the workspace branch, if present.
    pub workspace: Option<Value>,
    /// Stable resolution key: `file + "::" + field`.
    pub key: String,
}

/// The result of a merge attempt.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// Whether a commit was produced.
    pub merged: bool,
    /// The workspace that was merged.
    pub workspace: String,
    /// The data files that differed between trunk and the workspace.
    pub changed: Vec<String>,
    /// Unresolved conflicts; empty when `merged` or when nothing changed.
    pub conflicts: Vec<FieldConflict>,
    /// Human-readable summary.
    pub message: String,
    /// Number of files merged.
    pub merged_files: usize,
}

/// The stable conflict key exposed to callers.
fn conflict_key(file: &str, field: &str) -> String {
    format!("{file}::{field}")
}

impl Repository {
    /// Publish a workspace into trunk via field-level three-way merge.
    ///
    /// When the merge encounters conflicts not covered by `resolutions`,
    /// it returns them without mutating anything; the caller re-invokes
    /// with choices per conflict key. A `manual` choice takes its raw
    /// value from `manual_values` under the same key.
    pub fn merge_workspace(
        &self,
        name: &str,
        resolutions: &BTreeMap<String, Resolution>,
        manual_values: &BTreeMap<String, String>,
    ) -> Result<MergeOutcome, RepoError> {
        let name = WorkspaceName::new(name)?;
        let branch = name.branch();

        let _locks = self.lock_mutations()?;

        if !self.workspace_exists(name.as_str()) {
            return Err(RepoError::WorkspaceNotFound(name.as_str().to_string()));
        }
        let git = self.git();
        let current = git.current_branch()?;
        if current != TRUNK_BRANCH {
            return Err(RepoError::TrunkNotOnMain(current));
        }
        if !self.changed_files(self.root())?.is_empty() {
            return Err(RepoError::TrunkDirty);
        }

        let changed = git.diff_data_files(TRUNK_BRANCH, &branch)?;
        if changed.is_empty() {
            return Ok(MergeOutcome {
                merged: false,
                workspace: name.as_str().to_string(),
                message: "no changes to merge".to_string(),
                ..Default::default()
            });
        }

        // An unreadable or unparseable view at any ref counts as absent.
        let base_ref = git.merge_base(TRUNK_BRANCH, &branch).ok();

        let mut merged_files: BTreeMap<String, Option<BTreeMap<String, Value>>> = BTreeMap::new();
        let mut conflicts = Vec::new();

        for rel in &changed {
            let base = base_ref
                .as_deref()
                .and_then(|sha| read_fields_at_ref(&git, sha, rel));
            let ours = read_fields_at_ref(&git, TRUNK_BRANCH, rel);
            let theirs = read_fields_at_ref(&git, &branch, rel);

            let (merged, file_conflicts) = merge_three_way(
                rel,
                base.as_ref(),
                ours.as_ref(),
                theirs.as_ref(),
                resolutions,
                manual_values,
            );
            if !file_conflicts.is_empty() {
                conflicts.extend(file_conflicts);
                continue;
            }
            merged_files.insert(rel.clone(), merged);
        }

        if !conflicts.is_empty() {
            conflicts.sort_by(|a, b| a.file.cmp(&b.file).then_with(|| a.field.cmp(&b.field)));
            return Ok(MergeOutcome {
                merged: false,
                workspace: name.as_str().to_string(),
                changed,
                conflicts,
                message: "conflicts require resolution".to_string(),
                ..Default::default()
            });
        }

        let backups = backup_paths(self.root(), &changed)?;

        if let Err(e) = self.apply_merged(&changed, &merged_files) {
            let _ = restore_paths(self.root(), &backups);
            return Err(e);
        }

        let result = validate::validate_repository(self.root());
        if let Some(first) = result.first() {
            let _ = restore_paths(self.root(), &backups);
            return Err(RepoError::MergeBlocked(first.to_string()));
        }

        let commit = git
            .add_all()
            .and_then(|()| git.commit(&format!("Merge {branch} into {TRUNK_BRANCH}")));
        if let Err(e) = commit {
            let _ = restore_paths(self.root(), &backups);
            return Err(e.into());
        }

        self.delete_workspace_locked(&name)?;

        Ok(MergeOutcome {
            merged: true,
            workspace: name.as_str().to_string(),
            merged_files: changed.len(),
            changed,
            message: "merge complete".to_string(),
            ..Default::default()
        })
    }

    fn apply_merged(
        &self,
        changed: &[String],
        merged_files: &BTreeMap<String, Option<BTreeMap<String, Value>>>,
    ) -> Result<(), RepoError> {
        for rel in changed {
            match merged_files.get(rel) {
                Some(Some(fields)) if !fields.is_empty() => {
                    let obj = object::object_from_path_and_fields(rel, fields.clone())?;
                    object::write_object(self.root(), &obj)?;
                }
                _ => {
                    let abs = self.root().join(rel);
                    match fs::remove_file(&abs) {
                        Ok(()) => {}
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }
        Ok(())
    }

    /// Simulate the merge and validate the result, mutating nothing.
    ///
    /// Materializes trunk's `config/` and `data/` plus the workspace's
    /// changes into a temporary directory and runs the validator there.
    /// The workspace itself must validate first; a dirty trunk refuses
    /// with a merge-preview issue.
    pub fn validate_merge_preview(&self, name: &str) -> Result<ValidationResult, RepoError> {
        let name = WorkspaceName::new(name)?;
        let path = self.workspace_path(name.as_str());
        if !path.exists() {
            return Err(RepoError::WorkspaceNotFound(name.as_str().to_string()));
        }

        let ws_result = validate::validate_repository(&path);
        if !ws_result.ok() {
            return Ok(ws_result);
        }

        if !self.changed_files(self.root())?.is_empty() {
            let mut result = ValidationResult::new();
            result.add(ValidationIssue {
                stage: Stage::MergePreview,
                path: None,
                field: None,
                message: "main has uncommitted changes; cannot preview merge".to_string(),
            });
            return Ok(result);
        }

        let changed = self.git().diff_data_files(TRUNK_BRANCH, &name.branch())?;
        if changed.is_empty() {
            return Ok(ws_result);
        }

        let preview = tempfile::TempDir::new()?;
        copy_dir(&self.root().join("config"), &preview.path().join("config"))?;
        copy_dir(&self.root().join("data"), &preview.path().join("data"))?;
        // Workspace config changes participate in the preview as well.
        copy_dir(&path.join("config"), &preview.path().join("config"))?;

        for rel in &changed {
            let src = path.join(rel);
            let dst = preview.path().join(rel);
            if !src.exists() {
                // Deleted in the workspace.
                match fs::remove_file(&dst) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                continue;
            }
            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&src, &dst)?;
        }

        Ok(validate::validate_repository(preview.path()))
    }
}

/// Read a file's field map at a ref; any failure means "absent".
fn read_fields_at_ref(git: &Git, refname: &str, rel: &str) -> Option<BTreeMap<String, Value>> {
    let text = git.show(refname, rel).ok()?;
    yaml::parse_object(&text).ok()
}

/// Merge one file field by field.
///
/// Returns the merged field map (`None` means the file is deleted) and
/// any conflicts that were not covered by resolutions.
fn merge_three_way(
    rel: &str,
    base: Option<&BTreeMap<String, Value>>,
    ours: Option<&BTreeMap<String, Value>>,
    theirs: Option<&BTreeMap<String, Value>>,
    resolutions: &BTreeMap<String, Resolution>,
    manual_values: &BTreeMap<String, String>,
) -> (Option<BTreeMap<String, Value>>, Vec<FieldConflict>) {
    let mut fields: BTreeSet<&String> = BTreeSet::new();
    for view in [base, ours, theirs].into_iter().flatten() {
        fields.extend(view.keys());
    }

    let mut merged = BTreeMap::new();
    let mut conflicts = Vec::new();

    for field in fields {
        let b = base.and_then(|m| m.get(field));
        let o = ours.and_then(|m| m.get(field));
        let t = theirs.and_then(|m| m.get(field));

        // An absent field compares equal to an explicit null; presence
        // still decides whether the winning side contributes a value.
        let eq = |x: Option<&Value>, y: Option<&Value>| {
            x.unwrap_or(&Value::Null) == y.unwrap_or(&Value::Null)
        };

        if eq(o, t) {
            if let Some(v) = o {
                merged.insert(field.clone(), v.clone());
            }
            continue;
        }
        if eq(o, b) {
            if let Some(v) = t {
                merged.insert(field.clone(), v.clone());
            }
            continue;
        }
        if eq(t, b) {
            if let Some(v) = o {
                merged.insert(field.clone(), v.clone());
            }
            continue;
        }

        let key = conflict_key(rel, field);
        let unresolved = || FieldConflict {
            file: rel.to_string(),
            field: field.clone(),
            base: b.cloned(),
            main: o.cloned(),
            workspace: t.cloned(),
            key: key.clone(),
        };
        match resolutions.get(&key) {
            Some(Resolution::Main) => {
                if let Some(v) = o {
                    merged.insert(field.clone(), v.clone());
                }
            }
            Some(Resolution::Workspace) => {
                if let Some(v) = t {
                    merged.insert(field.clone(), v.clone());
                }
            }
            Some(Resolution::Manual) => {
                let raw = manual_values.get(&key).map(String::as_str).unwrap_or("");
                match parse_manual_value(raw) {
                    Ok(Some(v)) => {
                        merged.insert(field.clone(), v);
                    }
                    Ok(None) => {} // blank drops the field
                    Err(_) => conflicts.push(unresolved()),
                }
            }
            None => conflicts.push(unresolved()),
        }
    }

    // Losing `_id` when a base version existed means the object was
    // dismantled; treat the file as deleted rather than resurrect a
    // partial record.
    if !merged.contains_key("_id") && base.is_some() {
        return (None, conflicts);
    }
    if merged.is_empty() {
        return (None, conflicts);
    }
    (Some(merged), conflicts)
}

/// Parse a manual resolution value with the codec's scalar rules.
///
/// A comma introduces a sequence; a blank value drops the field. An
/// error here keeps the conflict unresolved rather than surfacing.
fn parse_manual_value(raw: &str) -> Result<Option<Value>, yaml::YamlError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.contains(',') {
        let mut items = Vec::new();
        for part in trimmed.split(',') {
            items.push(yaml::parse_scalar(part.trim())?);
        }
        let seq = Value::sequence(items).map_err(|e| yaml::YamlError::Sequence {
            field: "manual value".to_string(),
            source: e,
        })?;
        return Ok(Some(seq));
    }
    Ok(Some(yaml::parse_scalar(trimmed)?))
}

struct FileBackup {
    rel: String,
    /// The original bytes, or `None` when the file did not exist.
    data: Option<Vec<u8>>,
}

fn backup_paths(root: &Path, rels: &[String]) -> Result<Vec<FileBackup>, RepoError> {
    let mut backups = Vec::with_capacity(rels.len());
    for rel in rels {
        let abs = root.join(rel);
        let data = match fs::read(&abs) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        backups.push(FileBackup {
            rel: rel.clone(),
            data,
        });
    }
    Ok(backups)
}

fn restore_paths(root: &Path, backups: &[FileBackup]) -> Result<(), RepoError> {
    for backup in backups {
        let abs = root.join(&backup.rel);
        match &backup.data {
            Some(bytes) => {
                if let Some(parent) = abs.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&abs, bytes)?;
            }
            None => match fs::remove_file(&abs) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
    }
    Ok(())
}

fn copy_dir(src: &Path, dst: &Path) -> Result<(), RepoError> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn s(text: &str) -> Value {
        Value::String(text.to_string())
    }

    const REL: &str = "data/service/22222222-2222-4222-8222-222222222222.yaml";
    const ID: &str = "22222222-2222-4222-8222-222222222222";

    fn identity() -> Vec<(&'static str, Value)> {
        vec![("_id", s(ID)), ("_type", s("service"))]
    }

    fn with_identity(extra: &[(&str, Value)]) -> BTreeMap<String, Value> {
        let mut all = identity();
        all.extend(extra.iter().map(|(k, v)| (*k, v.clone())));
        fields(&all)
    }

    #[test]
    fn non_overlapping_edits_auto_merge() {
        let base = with_identity(&[("name", s("edge")), ("tier", s("edge"))]);
        let ours = with_identity(&[("name", s("edge")), ("tier", s("core"))]);
        let theirs = with_identity(&[("name", s("edge-gw")), ("tier", s("edge"))]);

        let (merged, conflicts) = merge_three_way(
            REL,
            Some(&base),
            Some(&ours),
            Some(&theirs),
            &BTreeMap::new(),
            &BTreeMap::new(),
        );
        assert!(conflicts.is_empty());
        let merged = merged.unwrap();
        assert_eq!(merged["name"], s("edge-gw"));
        assert_eq!(merged["tier"], s("core"));
    }

    #[test]
    fn double_divergence_is_a_conflict() {
        let base = with_identity(&[("tier", s("edge"))]);
        let ours = with_identity(&[("tier", s("core"))]);
        let theirs = with_identity(&[("tier", s("batch"))]);

        let (_, conflicts) = merge_three_way(
            REL,
            Some(&base),
            Some(&ours),
            Some(&theirs),
            &BTreeMap::new(),
            &BTreeMap::new(),
        );
        assert_eq!(conflicts.len(), 1);
        let conflict = &conflicts[0];
        assert_eq!(conflict.key, format!("{REL}::tier"));
        assert_eq!(conflict.base, Some(s("edge")));
        assert_eq!(conflict.main, Some(s("core")));
        assert_eq!(conflict.workspace, Some(s("batch")));
    }

    #[test]
    fn manual_resolution_wins() {
        let base = with_identity(&[("tier", s("edge"))]);
        let ours = with_identity(&[("tier", s("core"))]);
        let theirs = with_identity(&[("tier", s("batch"))]);

        let key = conflict_key(REL, "tier");
        let resolutions = BTreeMap::from([(key.clone(), Resolution::Manual)]);
        let manual = BTreeMap::from([(key, "edge".to_string())]);

        let (merged, conflicts) =
            merge_three_way(REL, Some(&base), Some(&ours), Some(&theirs), &resolutions, &manual);
        assert!(conflicts.is_empty());
        assert_eq!(merged.unwrap()["tier"], s("edge"));
    }

    #[test]
    fn unparseable_manual_value_keeps_the_conflict() {
        let base = with_identity(&[("tier", s("edge"))]);
        let ours = with_identity(&[("tier", s("core"))]);
        let theirs = with_identity(&[("tier", s("batch"))]);

        let key = conflict_key(REL, "tier");
        let resolutions = BTreeMap::from([(key.clone(), Resolution::Manual)]);
        let manual = BTreeMap::from([(key, "1, two".to_string())]);

        let (_, conflicts) =
            merge_three_way(REL, Some(&base), Some(&ours), Some(&theirs), &resolutions, &manual);
        assert_eq!(conflicts.len(), 1);
    }

    #[test]
    fn workspace_deletion_wins_when_trunk_unchanged() {
        let base = with_identity(&[("tier", s("edge"))]);
        let ours = base.clone();

        let (merged, conflicts) = merge_three_way(
            REL,
            Some(&base),
            Some(&ours),
            None,
            &BTreeMap::new(),
            &BTreeMap::new(),
        );
        assert!(conflicts.is_empty());
        assert!(merged.is_none());
    }

    #[test]
    fn new_file_in_workspace_survives() {
        let theirs = with_identity(&[("tier", s("edge"))]);

        let (merged, conflicts) = merge_three_way(
            REL,
            None,
            None,
            Some(&theirs),
            &BTreeMap::new(),
            &BTreeMap::new(),
        );
        assert!(conflicts.is_empty());
        assert_eq!(merged.unwrap()["tier"], s("edge"));
    }

    #[test]
    fn absent_field_equals_explicit_null() {
        let base = with_identity(&[("note", Value::Null)]);
        let ours = with_identity(&[]);
        let theirs = with_identity(&[("note", s("kept"))]);

        let (merged, conflicts) = merge_three_way(
            REL,
            Some(&base),
            Some(&ours),
            Some(&theirs),
            &BTreeMap::new(),
            &BTreeMap::new(),
        );
        assert!(conflicts.is_empty());
        assert_eq!(merged.unwrap()["note"], s("kept"));
    }

    #[test]
    fn manual_comma_value_parses_as_sequence() {
        let parsed = parse_manual_value("1, 2, 3").unwrap().unwrap();
        assert_eq!(
            parsed,
            Value::sequence(vec![
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(3.0)
            ])
            .unwrap()
        );
    }

    #[test]
    fn blank_manual_value_drops_the_field() {
        assert!(parse_manual_value("   ").unwrap().is_none());
    }

    #[test]
    fn resolution_parses_from_str() {
        assert_eq!("main".parse::<Resolution>(), Ok(Resolution::Main));
        assert_eq!("workspace".parse::<Resolution>(), Ok(Resolution::Workspace));
        assert_eq!("manual".parse::<Resolution>(), Ok(Resolution::Manual));
        assert!("ours".parse::<Resolution>().is_err());
    }
}
