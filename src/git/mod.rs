//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **only doorway** to Git. All repository reads and
//! writes that go through version control flow through [`Git`], which
//! shells out to the installed `git` binary against a specific checkout
//! directory and normalizes failures into [`GitError`].
//!
//! # Responsibilities
//!
//! - Branch queries (current branch, merge-base)
//! - Worktree lifecycle (add with branch, remove, list)
//! - Status and diff queries scoped to data files
//! - Historical file content (`show`)
//! - Staging, committing with the fixed tool identity, and file checkout
//!
//! # Invariants
//!
//! - Every operation is synchronous; the subprocess blocks until done
//! - Errors carry the full command line and the combined captured output
//! - No other module spawns `git`

mod driver;

pub use driver::{ChangeStatus, ChangedEntry, CommitOutcome, Git, GitError, WorktreeListing};
