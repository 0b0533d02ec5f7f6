//! repo::workspace
//!
//! Workspace lifecycle: create, list, save, restore, delete.
//!
//! A workspace is a branch `workspace/<name>` plus a dedicated worktree
//! checkout under the workspace root. Dirty state is derived from
//! uncommitted changes in that checkout; it is observed, never stored.
//!
//! State model: `Created -> Dirty <-> Clean -> Merged | Deleted`. The
//! transition to `Merged` is produced by the merge engine.

use std::path::Path;

use crate::core::object::{self, data_relative_path};
use crate::core::types::{ObjectId, TypeName, WorkspaceName};
use crate::core::validate;
use crate::git::{ChangedEntry, GitError};

use super::{RepoError, Repository, TRUNK_BRANCH};

/// A workspace: a branch plus its checkout, with observed dirty state.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// The workspace name.
    pub name: String,
    /// The branch, always `workspace/<name>`.
    pub branch: String,
    /// Absolute path of the checkout.
    pub path: std::path::PathBuf,
    /// Whether the checkout has uncommitted changes.
    pub dirty: bool,
    /// The uncommitted paths, sorted.
    pub changed_files: Vec<String>,
}

impl Repository {
    /// Create a workspace: fork `main` into `workspace/<name>` and
    /// materialize it as a worktree.
    pub fn create_workspace(&self, name: &str) -> Result<(), RepoError> {
        let name = WorkspaceName::new(name)?;
        let path = self.workspace_path(name.as_str());
        if path.exists() {
            return Err(RepoError::WorkspaceExists(name.as_str().to_string()));
        }

        let _locks = self.lock_mutations()?;

        std::fs::create_dir_all(self.workspace_root())?;
        self.git()
            .worktree_add_branch(&name.branch(), &path, TRUNK_BRANCH)?;
        Ok(())
    }

    /// Delete a workspace: remove the worktree and its branch.
    pub fn delete_workspace(&self, name: &str) -> Result<(), RepoError> {
        let name = WorkspaceName::new(name)?;
        let _locks = self.lock_mutations()?;
        self.delete_workspace_locked(&name)
    }

    /// Delete with the mutation lock already held.
    ///
    /// The merge engine calls this after a successful commit. Branch
    /// deletion tolerates "not found" so a half-deleted workspace can be
    /// cleaned up again.
    pub(crate) fn delete_workspace_locked(&self, name: &WorkspaceName) -> Result<(), RepoError> {
        let path = self.workspace_path(name.as_str());
        if path.exists() {
            self.git().worktree_remove(&path)?;
        }
        if let Err(e) = self.git().branch_delete(&name.branch()) {
            if !e.output_contains("not found") && !e.output_contains("not exist") {
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// List all workspaces, sorted by name, each with its dirty state.
    ///
    /// Only worktrees on `workspace/*` branches count; the trunk checkout
    /// and foreign worktrees are invisible here.
    pub fn list_workspaces(&self) -> Result<Vec<Workspace>, RepoError> {
        let listings = self.git().worktree_list()?;
        let mut workspaces = Vec::new();
        for listing in listings {
            let Some(branch) = listing.branch else {
                continue;
            };
            let Some(name) = branch.strip_prefix("workspace/") else {
                continue;
            };
            let changed_files = self.changed_files(&listing.path).unwrap_or_default();
            workspaces.push(Workspace {
                name: name.to_string(),
                branch: branch.clone(),
                path: listing.path,
                dirty: !changed_files.is_empty(),
                changed_files,
            });
        }
        workspaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(workspaces)
    }

    /// Changed entries of a checkout, with statuses.
    pub fn changed_entries(&self, checkout: &Path) -> Result<Vec<ChangedEntry>, GitError> {
        self.git_at(checkout).changed_entries(&self.ignored_prefixes())
    }

    /// Changed paths of a checkout, sorted.
    pub fn changed_files(&self, checkout: &Path) -> Result<Vec<String>, GitError> {
        let mut files: Vec<String> = self
            .changed_entries(checkout)?
            .into_iter()
            .map(|entry| entry.path)
            .collect();
        files.sort();
        Ok(files)
    }

    /// Save a workspace: canonical rewrite, full validation, then commit.
    ///
    /// Returns the changed paths. A clean checkout is an error; an
    /// invalid checkout blocks the commit with the first issue.
    pub fn save_workspace(&self, name: &str, message: Option<&str>) -> Result<Vec<String>, RepoError> {
        let name = WorkspaceName::new(name)?;
        let path = self.workspace_path(name.as_str());
        if !path.exists() {
            return Err(RepoError::WorkspaceNotFound(name.as_str().to_string()));
        }

        let _locks = self.lock_mutations()?;

        let changed = self.changed_files(&path)?;
        if changed.is_empty() {
            return Err(RepoError::NothingToSave);
        }
        object::rewrite_canonical(&path, &changed)?;

        let result = validate::validate_repository(&path);
        if let Some(first) = result.first() {
            return Err(RepoError::ValidationFailed(first.to_string()));
        }

        let git = self.git_at(&path);
        git.add_all()?;
        git.commit(message.unwrap_or("Save workspace changes"))?;
        Ok(changed)
    }

    /// Restore one object file in a workspace.
    ///
    /// First reverts to the workspace HEAD; if the file is unknown there
    /// (for example it was newly created), falls back to trunk. Refuses
    /// to operate on trunk itself.
    pub fn restore_object(
        &self,
        workspace: &str,
        type_name: &str,
        id: &str,
    ) -> Result<(), RepoError> {
        if workspace.is_empty() || workspace == TRUNK_BRANCH {
            return Err(RepoError::RestoreOnTrunk);
        }
        let name = WorkspaceName::new(workspace)?;
        let type_name = TypeName::new(type_name)?;
        let id = ObjectId::new(id)?;
        let path = self.workspace_path(name.as_str());
        if !path.exists() {
            return Err(RepoError::WorkspaceNotFound(name.as_str().to_string()));
        }

        let rel = data_relative_path(type_name.as_str(), id.as_str());
        let git = self.git_at(&path);
        if git.checkout_file(None, &rel).is_ok() {
            return Ok(());
        }
        git.checkout_file(Some(TRUNK_BRANCH), &rel)?;
        Ok(())
    }
}
