//! worktreefoundry - schema-driven YAML configuration in a local Git repository
//!
//! worktreefoundry manages a repository of YAML configuration objects that is
//! backed by Git. Every object lives in `data/<type>/<uuid>.yaml`, is
//! constrained by a per-type schema under `config/schemas/`, and is edited in
//! branch-isolated workspaces that are published back to the protected `main`
//! branch through a field-level three-way merge.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to repo)
//! - [`repo`] - Repository handle, locking, workspace lifecycle, merge engine
//! - [`core`] - Value model, YAML codec, schemas, constraints, validation
//! - [`git`] - Single interface for all Git operations (subprocess driver)
//! - [`ui`] - Output formatting utilities
//!
//! # Correctness Invariants
//!
//! worktreefoundry maintains the following invariants:
//!
//! 1. Every object write emits the single canonical serialization
//! 2. `main` is never mutated except through the merge engine
//! 3. Workspace save and merge refuse to commit a repository that does not
//!    validate cleanly
//! 4. A failed merge restores trunk's `data/` files to their pre-attempt bytes

pub mod cli;
pub mod core;
pub mod git;
pub mod repo;
pub mod ui;
