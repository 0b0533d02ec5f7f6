//! repo::lock
//!
//! OS-level advisory lock for repository mutations.
//!
//! # Storage
//!
//! - `.git/worktreefoundry/lock` - lock file with an exclusive flock
//!
//! # Invariants
//!
//! - The lock is held for the entire mutating operation
//! - The lock is released on drop (RAII)
//! - Acquisition is non-blocking: a second process fails fast instead of
//!   queueing behind an operation of unknown duration

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("repository is locked by another worktreefoundry process")]
    AlreadyLocked,

    /// The lock file or its directory could not be created.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// The OS lock could not be acquired.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),
}

/// An exclusive lock on the repository.
///
/// Released automatically when dropped, including on panic.
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
    file: Option<File>,
}

impl RepoLock {
    /// Attempt to acquire the repository lock under `git_dir`.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] on any other locking failure
    pub fn acquire(git_dir: &Path) -> Result<Self, LockError> {
        let lock_dir = git_dir.join("worktreefoundry");
        fs::create_dir_all(&lock_dir).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {e}", lock_dir.display()))
        })?;

        let path = lock_dir.join("lock");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| LockError::CreateFailed(format!("cannot open {}: {e}", path.display())))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                file: Some(file),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(LockError::AlreadyLocked),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Whether this guard currently holds the lock.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// The lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}
