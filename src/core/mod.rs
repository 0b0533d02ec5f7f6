//! core
//!
//! Domain types and the validation pipeline.
//!
//! # Responsibilities
//!
//! - Canonical value model for object fields ([`value`])
//! - Parser and canonical emitter for the restricted YAML subset ([`yaml`])
//! - Object store over `data/<type>/<uuid>.yaml` ([`object`])
//! - Schema and constraint registries ([`schema`], [`constraints`])
//! - The multi-stage repository validator ([`validate`])
//! - Deterministic JSON export ([`export`])
//!
//! Nothing in this module touches Git; the [`crate::repo`] layer composes
//! these pieces with the [`crate::git`] driver.

pub mod constraints;
pub mod export;
pub mod object;
pub mod schema;
pub mod types;
pub mod validate;
pub mod value;
pub mod yaml;
