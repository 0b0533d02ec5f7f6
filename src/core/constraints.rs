//! core::constraints
//!
//! Repository-wide constraint declarations from `config/constraints.json`.
//!
//! An absent file is equivalent to an empty declaration set. Parse errors
//! are fatal. Referential integrity of the declarations themselves is
//! exercised during validation, not at load time.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from constraints loading.
#[derive(Debug, Error)]
pub enum ConstraintsError {
    /// `config/constraints.json` is not well-formed JSON.
    #[error("parse constraints: {0}")]
    Parse(String),

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A uniqueness declaration: the field's scalar value must be unique
/// across all objects of the type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    /// The constrained type.
    #[serde(rename = "type")]
    pub type_name: String,
    /// The constrained field.
    pub field: String,
}

/// A foreign-key declaration: every non-null source value must equal some
/// target value among currently loaded objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyConstraint {
    /// The referencing type.
    #[serde(rename = "fromType")]
    pub from_type: String,
    /// The referencing field.
    #[serde(rename = "fromField")]
    pub from_field: String,
    /// The referenced type.
    #[serde(rename = "toType")]
    pub to_type: String,
    /// The referenced field.
    #[serde(rename = "toField")]
    pub to_field: String,
    /// Optional display field for UI collaborators.
    #[serde(rename = "toDisplayField", skip_serializing_if = "Option::is_none")]
    pub to_display_field: Option<String>,
}

/// All constraint declarations for a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    /// Uniqueness declarations.
    pub unique: Vec<UniqueConstraint>,
    /// Foreign-key declarations.
    #[serde(rename = "foreignKeys")]
    pub foreign_keys: Vec<ForeignKeyConstraint>,
}

/// Load `config/constraints.json`; a missing file yields the empty set.
pub fn load_constraints(root: &Path) -> Result<Constraints, ConstraintsError> {
    let path = root.join("config").join("constraints.json");
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Constraints::default());
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&text).map_err(|e| ConstraintsError::Parse(e.to_string()))
}
