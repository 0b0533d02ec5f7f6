//! git::driver
//!
//! Subprocess driver for the installed Git tool.
//!
//! The driver is bound to one checkout directory and exposes only the
//! semantic operations the core needs. Command stdout and stderr are
//! captured together so a failure can be reported exactly as Git printed
//! it, prefixed by the command line that produced it.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

/// Identity used for system-generated commits.
pub const COMMIT_USER_NAME: &str = "worktreefoundry";
/// Email used for system-generated commits.
pub const COMMIT_USER_EMAIL: &str = "worktreefoundry@local";

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The `git` binary could not be spawned.
    #[error("failed to run git {command}: {source}")]
    Spawn {
        /// The arguments that were attempted.
        command: String,
        /// The underlying spawn error.
        source: std::io::Error,
    },

    /// Git exited non-zero.
    #[error("git {command} failed: {output}")]
    Command {
        /// The arguments that were run.
        command: String,
        /// Combined stdout and stderr, trimmed.
        output: String,
    },
}

impl GitError {
    /// Check whether the captured output contains a marker string.
    ///
    /// Callers use this to tolerate benign failures such as deleting a
    /// branch that is already gone.
    pub fn output_contains(&self, marker: &str) -> bool {
        match self {
            GitError::Command { output, .. } => output.contains(marker),
            GitError::Spawn { .. } => false,
        }
    }
}

/// The normalized status of a changed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    /// Added or untracked.
    Added,
    /// Deleted.
    Deleted,
    /// Modified.
    Modified,
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = match self {
            ChangeStatus::Added => "A",
            ChangeStatus::Deleted => "D",
            ChangeStatus::Modified => "M",
        };
        write!(f, "{token}")
    }
}

/// One entry of a porcelain status listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedEntry {
    /// Repo-relative path with forward-slash separators.
    pub path: String,
    /// The normalized status.
    pub status: ChangeStatus,
}

/// One worktree from `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeListing {
    /// Absolute path of the worktree.
    pub path: PathBuf,
    /// Branch checked out there, without the `refs/heads/` prefix.
    pub branch: Option<String>,
}

/// Outcome of a commit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A commit was created.
    Committed,
    /// The index matched HEAD; nothing was committed.
    NothingToCommit,
}

/// The Git driver, bound to one checkout directory.
#[derive(Debug, Clone)]
pub struct Git {
    checkout: PathBuf,
}

impl Git {
    /// Create a driver for the checkout at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            checkout: dir.into(),
        }
    }

    /// The checkout directory this driver runs in.
    pub fn checkout(&self) -> &Path {
        &self.checkout
    }

    /// Run `git` with the given arguments, returning combined output.
    ///
    /// Non-zero exit becomes [`GitError::Command`] carrying the command
    /// line and everything Git printed.
    pub fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let command = args.join(" ");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.checkout)
            .output()
            .map_err(|source| GitError::Spawn {
                command: command.clone(),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(GitError::Command {
                command,
                output: combined.trim().to_string(),
            });
        }
        Ok(combined)
    }

    /// The branch HEAD is on, e.g. `main`.
    pub fn current_branch(&self) -> Result<String, GitError> {
        let out = self.run(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    /// Changed entries from porcelain status, ignoring the given prefixes.
    ///
    /// Untracked paths map to [`ChangeStatus::Added`]; renames report the
    /// destination path.
    pub fn changed_entries(&self, ignored: &[String]) -> Result<Vec<ChangedEntry>, GitError> {
        let out = self.run(&["status", "--porcelain"])?;
        let mut entries = Vec::new();
        for line in out.lines() {
            if line.trim().is_empty() || line.len() < 4 {
                continue;
            }
            let token = &line[..2];
            let mut path = line[3..].trim().to_string();
            if let Some((_, dest)) = path.rsplit_once(" -> ") {
                path = dest.to_string();
            }
            // Porcelain quotes paths with special characters; strip the
            // quotes so prefixes compare cleanly.
            if path.starts_with('"') && path.ends_with('"') && path.len() >= 2 {
                path = path[1..path.len() - 1].to_string();
            }
            if ignored.iter().any(|prefix| path.starts_with(prefix)) {
                continue;
            }
            entries.push(ChangedEntry {
                path,
                status: status_from_token(token),
            });
        }
        Ok(entries)
    }

    /// Create a branch at `base` and attach a new worktree for it.
    pub fn worktree_add_branch(
        &self,
        branch: &str,
        path: &Path,
        base: &str,
    ) -> Result<(), GitError> {
        let path = path.to_string_lossy();
        self.run(&["worktree", "add", "-b", branch, &path, base])?;
        Ok(())
    }

    /// Remove a worktree, discarding local modifications.
    pub fn worktree_remove(&self, path: &Path) -> Result<(), GitError> {
        let path = path.to_string_lossy();
        self.run(&["worktree", "remove", "--force", &path])?;
        Ok(())
    }

    /// List all worktrees with their checked-out branches.
    pub fn worktree_list(&self) -> Result<Vec<WorktreeListing>, GitError> {
        let out = self.run(&["worktree", "list", "--porcelain"])?;
        let mut listings = Vec::new();
        for block in out.trim().split("\n\n") {
            if block.trim().is_empty() {
                continue;
            }
            let mut path = None;
            let mut branch = None;
            for line in block.lines() {
                if let Some(rest) = line.strip_prefix("worktree ") {
                    path = Some(PathBuf::from(rest));
                } else if let Some(rest) = line.strip_prefix("branch refs/heads/") {
                    branch = Some(rest.to_string());
                }
            }
            if let Some(path) = path {
                listings.push(WorktreeListing { path, branch });
            }
        }
        Ok(listings)
    }

    /// Delete a local branch.
    pub fn branch_delete(&self, branch: &str) -> Result<(), GitError> {
        self.run(&["branch", "-D", branch])?;
        Ok(())
    }

    /// The content of a file at a ref, e.g. `show("main", "data/x.yaml")`.
    pub fn show(&self, refname: &str, rel: &str) -> Result<String, GitError> {
        self.run(&["show", &format!("{refname}:{rel}")])
    }

    /// The merge base of two refs.
    pub fn merge_base(&self, a: &str, b: &str) -> Result<String, GitError> {
        let out = self.run(&["merge-base", a, b])?;
        Ok(out.trim().to_string())
    }

    /// Data-file paths whose content differs between two refs, sorted.
    ///
    /// Filtered to `data/**/*.yaml`.
    pub fn diff_data_files(&self, from: &str, to: &str) -> Result<Vec<String>, GitError> {
        let range = format!("{from}..{to}");
        let out = self.run(&["diff", "--name-only", &range, "--", "data"])?;
        let mut files: Vec<String> = out
            .lines()
            .map(str::trim)
            .filter(|line| {
                !line.is_empty() && line.starts_with("data/") && line.ends_with(".yaml")
            })
            .map(String::from)
            .collect();
        files.sort();
        Ok(files)
    }

    /// Stage all changes.
    pub fn add_all(&self) -> Result<(), GitError> {
        self.run(&["add", "-A"])?;
        Ok(())
    }

    /// Commit staged changes with the fixed tool identity.
    pub fn commit(&self, message: &str) -> Result<CommitOutcome, GitError> {
        let user = format!("user.name={COMMIT_USER_NAME}");
        let email = format!("user.email={COMMIT_USER_EMAIL}");
        match self.run(&["-c", &user, "-c", &email, "commit", "-m", message]) {
            Ok(_) => Ok(CommitOutcome::Committed),
            Err(e) if e.output_contains("nothing to commit") => Ok(CommitOutcome::NothingToCommit),
            Err(e) => Err(e),
        }
    }

    /// Check out a file from a ref, or from the index when `refname` is None.
    pub fn checkout_file(&self, refname: Option<&str>, rel: &str) -> Result<(), GitError> {
        match refname {
            Some(refname) => self.run(&["checkout", refname, "--", rel])?,
            None => self.run(&["checkout", "--", rel])?,
        };
        Ok(())
    }
}

fn status_from_token(token: &str) -> ChangeStatus {
    if token == "??" {
        ChangeStatus::Added
    } else if token.contains('D') {
        ChangeStatus::Deleted
    } else if token.contains('A') {
        ChangeStatus::Added
    } else {
        ChangeStatus::Modified
    }
}
