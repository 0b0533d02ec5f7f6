//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`ObjectId`] - Canonical UUID identifying an object
//! - [`TypeName`] - Name of an object type (a directory under `data/`)
//! - [`WorkspaceName`] - Name of a workspace branch/checkout
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of path and branch
//! name bugs.
//!
//! # Examples
//!
//! ```
//! use worktreefoundry::core::types::{ObjectId, WorkspaceName};
//!
//! let id = ObjectId::new("11111111-1111-4111-8111-111111111111").unwrap();
//! assert_eq!(id.as_str(), "11111111-1111-4111-8111-111111111111");
//!
//! assert!(ObjectId::new("not-a-uuid").is_err());
//! assert!(WorkspaceName::new("feature-x").is_ok());
//! assert!(WorkspaceName::new("has space").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object id: {0}")]
    InvalidObjectId(String),

    #[error("invalid type name: {0}")]
    InvalidTypeName(String),

    #[error("workspace name {0:?} is invalid")]
    InvalidWorkspaceName(String),
}

/// Check a string against the canonical UUID shape: 8-4-4-4-12 hex groups
/// with a version digit in 1..=5 and an RFC 4122 variant digit.
pub fn is_canonical_uuid(s: &str) -> bool {
    if s.len() != 36 {
        return false;
    }
    for (i, c) in s.bytes().enumerate() {
        match i {
            8 | 13 | 18 | 23 => {
                if c != b'-' {
                    return false;
                }
            }
            _ => {
                if !c.is_ascii_hexdigit() {
                    return false;
                }
            }
        }
    }
    let Ok(parsed) = uuid::Uuid::parse_str(s) else {
        return false;
    };
    (1..=5).contains(&parsed.get_version_num())
        && parsed.get_variant() == uuid::Variant::RFC4122
}

/// A validated object identifier.
///
/// Object ids are canonical UUID strings; they double as file basenames
/// under `data/<type>/`, so the hyphenated 8-4-4-4-12 form is required.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// Create a new validated object id.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if !is_canonical_uuid(&id) {
            return Err(TypeError::InvalidObjectId(id));
        }
        Ok(Self(id))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ObjectId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated object type name.
///
/// Type names are directory names directly under `data/`, so path
/// separators and dot components are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeName(String);

impl TypeName {
    /// Create a new validated type name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0')
        {
            return Err(TypeError::InvalidTypeName(name));
        }
        Ok(Self(name))
    }

    /// Get the type name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TypeName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<TypeName> for String {
    fn from(name: TypeName) -> Self {
        name.0
    }
}

impl std::fmt::Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated workspace name.
///
/// Workspace names become branch names (`workspace/<name>`) and checkout
/// directory names, so they are restricted to `[A-Za-z0-9._-]+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkspaceName(String);

impl WorkspaceName {
    /// Create a new validated workspace name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(TypeError::InvalidWorkspaceName(name));
        }
        Ok(Self(name))
    }

    /// Get the workspace name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The branch the workspace lives on.
    pub fn branch(&self) -> String {
        format!("workspace/{}", self.0)
    }
}

impl TryFrom<String> for WorkspaceName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<WorkspaceName> for String {
    fn from(name: WorkspaceName) -> Self {
        name.0
    }
}

impl std::fmt::Display for WorkspaceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
