//! repo
//!
//! The repository handle and everything that mutates it.
//!
//! # Architecture
//!
//! [`Repository`] is the single entry point for all stateful operations.
//! It owns the trunk checkout path, the workspace root, and the mutex
//! that serializes mutating operations (workspace create/delete/save and
//! merge). Read-only operations do not take the mutex; they observe
//! whatever the filesystem shows.
//!
//! Submodules:
//!
//! - [`lock`] - OS-level advisory lock for cross-process exclusion
//! - [`init`] - repository bootstrap with optional sample data
//! - workspace lifecycle and the merge engine live in sibling files and
//!   hang methods off [`Repository`]

pub mod init;
pub mod lock;

mod merge;
mod workspace;

pub use merge::{FieldConflict, MergeOutcome, Resolution};
pub use workspace::Workspace;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;

use crate::core::constraints::ConstraintsError;
use crate::core::object::{self, Object, StoreError};
use crate::core::schema::SchemaError;
use crate::core::types::{ObjectId, TypeError, TypeName};
use crate::git::{Git, GitError};
use lock::{LockError, RepoLock};

/// Default workspace root, relative to the repository.
pub const DEFAULT_WORKSPACE_ROOT: &str = ".worktreefoundry/workspaces";

/// The trunk branch. The application treats it as read-only; only the
/// merge engine commits to it.
pub const TRUNK_BRANCH: &str = "main";

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// No repository path was provided.
    #[error("repository root required")]
    RootRequired,

    /// The path exists but is not a directory.
    #[error("repository path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The path has no `.git`.
    #[error("repository is not a git checkout: {0}")]
    NotAGitCheckout(PathBuf),

    /// The target directory for init already has contents.
    #[error("directory is not empty: {0} (use --force)")]
    DirectoryNotEmpty(PathBuf),

    /// A name failed validation.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// A workspace with this name already exists.
    #[error("workspace {0:?} already exists")]
    WorkspaceExists(String),

    /// No workspace with this name.
    #[error("workspace {0:?} not found")]
    WorkspaceNotFound(String),

    /// Save was requested with a clean checkout.
    #[error("no changes to save")]
    NothingToSave,

    /// Restore was attempted against trunk.
    #[error("cannot restore in main workspace")]
    RestoreOnTrunk,

    /// Trunk is checked out on the wrong branch.
    #[error("main worktree must be on main branch (current: {0})")]
    TrunkNotOnMain(String),

    /// Trunk has uncommitted changes.
    #[error("main worktree has uncommitted changes")]
    TrunkDirty,

    /// A save or merge was blocked by validation.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// A merge was blocked by post-apply validation.
    #[error("merge blocked by validation: {0}")]
    MergeBlocked(String),

    /// Git failure.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Object store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Schema registry failure.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Constraints registry failure.
    #[error(transparent)]
    Constraints(#[from] ConstraintsError),

    /// Lock acquisition failure.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// JSON serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The repository handle.
///
/// Carries the trunk checkout path, the workspace root, and the mutex
/// that serializes mutating operations. Everything else is parameter
/// passed; there are no process-wide singletons.
#[derive(Debug)]
pub struct Repository {
    root: PathBuf,
    workspace_root: PathBuf,
    mutation: Mutex<()>,
}

impl Repository {
    /// Open the repository at `root`.
    ///
    /// `workspace_root` defaults to `.worktreefoundry/workspaces` inside
    /// the repository; a relative path is resolved against the root. The
    /// workspace root directory is created if needed.
    pub fn open(root: &Path, workspace_root: Option<&Path>) -> Result<Self, RepoError> {
        if root.as_os_str().is_empty() {
            return Err(RepoError::RootRequired);
        }
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };
        if !root.is_dir() {
            return Err(RepoError::NotADirectory(root));
        }
        if !root.join(".git").exists() {
            return Err(RepoError::NotAGitCheckout(root));
        }

        let workspace_root = match workspace_root {
            Some(p) if p.is_absolute() => p.to_path_buf(),
            Some(p) => root.join(p),
            None => root.join(DEFAULT_WORKSPACE_ROOT),
        };
        std::fs::create_dir_all(&workspace_root)?;

        Ok(Self {
            root,
            workspace_root,
            mutation: Mutex::new(()),
        })
    }

    /// The trunk checkout path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory workspace checkouts are materialized under.
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// The checkout path for a workspace name.
    pub fn workspace_path(&self, name: &str) -> PathBuf {
        self.workspace_root.join(name)
    }

    /// Whether a workspace checkout exists on disk.
    pub fn workspace_exists(&self, name: &str) -> bool {
        self.workspace_path(name).exists()
    }

    /// A Git driver bound to the trunk checkout.
    pub fn git(&self) -> Git {
        Git::new(&self.root)
    }

    /// A Git driver bound to an arbitrary checkout.
    pub fn git_at(&self, checkout: &Path) -> Git {
        Git::new(checkout)
    }

    /// Path prefixes excluded from dirty-state computation.
    ///
    /// The workspace root (when it lives inside the repository) and the
    /// export output directory are invisible to status.
    pub fn ignored_prefixes(&self) -> Vec<String> {
        let workspace_prefix = self
            .workspace_root
            .strip_prefix(&self.root)
            .ok()
            .and_then(|rel| rel.components().next())
            .map(|first| format!("{}/", first.as_os_str().to_string_lossy()))
            .unwrap_or_else(|| ".worktreefoundry/".to_string());
        vec![workspace_prefix, "output/".to_string()]
    }

    /// Serialize a mutating operation.
    ///
    /// Takes the in-process mutex, then the OS-level advisory lock, so
    /// neither a second thread nor a second process can interleave.
    pub(crate) fn lock_mutations(&self) -> Result<(MutexGuard<'_, ()>, RepoLock), RepoError> {
        let guard = self
            .mutation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let file_lock = RepoLock::acquire(&self.root.join(".git"))?;
        Ok((guard, file_lock))
    }

    /// Read one object from the trunk checkout.
    ///
    /// Names are validated before they become path components, so a
    /// caller-supplied id or type can never escape `data/`.
    pub fn read_object(&self, type_name: &str, id: &str) -> Result<Object, RepoError> {
        let type_name = TypeName::new(type_name)?;
        let id = ObjectId::new(id)?;
        Ok(object::read_object(&self.root, type_name.as_str(), id.as_str())?)
    }

    /// Write one object to the trunk checkout in canonical form.
    pub fn write_object(&self, obj: &Object) -> Result<(), RepoError> {
        TypeName::new(&obj.type_name)?;
        ObjectId::new(&obj.id)?;
        Ok(object::write_object(&self.root, obj)?)
    }

    /// Delete one object from the trunk checkout.
    pub fn delete_object(&self, type_name: &str, id: &str) -> Result<(), RepoError> {
        let type_name = TypeName::new(type_name)?;
        let id = ObjectId::new(id)?;
        Ok(object::delete_object(&self.root, type_name.as_str(), id.as_str())?)
    }

    /// List the objects of one type in the trunk checkout.
    pub fn list_objects_for_type(&self, type_name: &str) -> Result<Vec<Object>, RepoError> {
        let type_name = TypeName::new(type_name)?;
        Ok(object::list_objects_for_type(&self.root, type_name.as_str())?)
    }
}
