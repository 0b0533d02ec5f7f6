//! core::object
//!
//! Object store over `data/<type>/<uuid>.yaml`.
//!
//! # Invariants
//!
//! - `_id` equals the file basename without `.yaml`
//! - `_type` equals the immediate parent directory name
//! - Every write emits the canonical serialization
//!
//! Reads verify the path-identity invariants and surface specific errors
//! naming the offending field. Writes create parent directories and
//! truncate-replace the file, which is atomic enough for the local
//! single-user deployment.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::value::Value;
use crate::core::yaml::{self, YamlError};

/// Errors from object store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The document failed to parse.
    #[error("parse YAML: {0}")]
    Parse(#[from] YamlError),

    /// The document parsed to an empty field map.
    #[error("YAML root must contain fields")]
    EmptyDocument,

    /// `_id` is missing or not a non-empty string.
    #[error("missing _id string")]
    MissingId,

    /// `_type` is missing or not a non-empty string.
    #[error("missing _type string")]
    MissingType,

    /// `_id` disagrees with the file basename.
    #[error("_id {found:?} does not match filename {expected:?}")]
    IdMismatch {
        /// The `_id` value found in the document.
        found: String,
        /// The id implied by the path.
        expected: String,
    },

    /// `_type` disagrees with the parent directory.
    #[error("_type {found:?} does not match folder {expected:?}")]
    TypeMismatch {
        /// The `_type` value found in the document.
        found: String,
        /// The type implied by the path.
        expected: String,
    },

    /// An object was handed to `write_object` without identity.
    #[error("object missing id/type")]
    MissingIdentity,

    /// A repo-relative path does not have the `data/<type>/<id>.yaml` shape.
    #[error("invalid data path {0:?}")]
    InvalidDataPath(String),

    /// A canonical rewrite failed on a specific file.
    #[error("canonicalize {path}: {source}")]
    Canonicalize {
        /// The repo-relative path that failed.
        path: String,
        /// The underlying store error.
        source: Box<StoreError>,
    },

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A configuration object: identity plus a normalized field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    /// The object id (`_id`, also the file basename).
    pub id: String,
    /// The object type (`_type`, also the parent directory name).
    pub type_name: String,
    /// All fields, including the identity fields.
    pub fields: BTreeMap<String, Value>,
    /// Repo-relative path with forward-slash separators.
    pub path: String,
}

/// The repo-relative path of an object file.
pub fn data_relative_path(type_name: &str, id: &str) -> String {
    format!("data/{type_name}/{id}.yaml")
}

/// The absolute path of an object file.
fn data_absolute_path(root: &Path, type_name: &str, id: &str) -> PathBuf {
    root.join("data").join(type_name).join(format!("{id}.yaml"))
}

/// Parse document text and verify identity against the expected path parts.
///
/// Empty `expected_type`/`expected_id` skip the corresponding check, which
/// the merge engine uses when reading historical file contents.
pub fn parse_object_text(
    text: &str,
    expected_type: &str,
    expected_id: &str,
) -> Result<Object, StoreError> {
    let fields = yaml::parse_object(text)?;
    if fields.is_empty() {
        return Err(StoreError::EmptyDocument);
    }

    let id = match fields.get("_id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return Err(StoreError::MissingId),
    };
    let type_name = match fields.get("_type").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => return Err(StoreError::MissingType),
    };
    if !expected_id.is_empty() && id != expected_id {
        return Err(StoreError::IdMismatch {
            found: id,
            expected: expected_id.to_string(),
        });
    }
    if !expected_type.is_empty() && type_name != expected_type {
        return Err(StoreError::TypeMismatch {
            found: type_name,
            expected: expected_type.to_string(),
        });
    }

    Ok(Object {
        id,
        type_name,
        fields,
        path: String::new(),
    })
}

/// Parse the object file at an absolute path, verifying identity.
pub fn parse_object_file(
    path: &Path,
    expected_type: &str,
    expected_id: &str,
) -> Result<Object, StoreError> {
    let text = fs::read_to_string(path)?;
    parse_object_text(&text, expected_type, expected_id)
}

/// Read one object by type and id.
pub fn read_object(root: &Path, type_name: &str, id: &str) -> Result<Object, StoreError> {
    let abs = data_absolute_path(root, type_name, id);
    let mut obj = parse_object_file(&abs, type_name, id)?;
    obj.path = data_relative_path(type_name, id);
    Ok(obj)
}

/// Write an object in canonical form, creating parent directories.
///
/// Identity fields inside the map are cross-checked against the object's
/// identity before anything touches disk.
pub fn write_object(root: &Path, obj: &Object) -> Result<(), StoreError> {
    if obj.id.is_empty() || obj.type_name.is_empty() {
        return Err(StoreError::MissingIdentity);
    }
    if let Some(found) = obj.fields.get("_id").and_then(Value::as_str) {
        if found != obj.id {
            return Err(StoreError::IdMismatch {
                found: found.to_string(),
                expected: obj.id.clone(),
            });
        }
    }
    if let Some(found) = obj.fields.get("_type").and_then(Value::as_str) {
        if found != obj.type_name {
            return Err(StoreError::TypeMismatch {
                found: found.to_string(),
                expected: obj.type_name.clone(),
            });
        }
    }

    let abs = data_absolute_path(root, &obj.type_name, &obj.id);
    if let Some(parent) = abs.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&abs, yaml::emit_object(&obj.fields))?;
    Ok(())
}

/// Delete one object file. A missing file is success.
pub fn delete_object(root: &Path, type_name: &str, id: &str) -> Result<(), StoreError> {
    let abs = data_absolute_path(root, type_name, id);
    match fs::remove_file(&abs) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// List the objects of one type, ordered by id ascending.
///
/// A missing type directory yields an empty list.
pub fn list_objects_for_type(root: &Path, type_name: &str) -> Result<Vec<Object>, StoreError> {
    let dir = root.join("data").join(type_name);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(e.into()),
    };

    let mut objects = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if entry.file_type()?.is_dir() {
            continue;
        }
        let Some(id) = name.strip_suffix(".yaml") else {
            continue;
        };
        let mut obj = parse_object_file(&entry.path(), type_name, id)?;
        obj.path = data_relative_path(type_name, id);
        objects.push(obj);
    }
    objects.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(objects)
}

/// Load every object, grouped by type, each group ordered by id.
///
/// A missing `data/` directory yields an empty map.
pub fn load_objects(root: &Path) -> Result<BTreeMap<String, Vec<Object>>, StoreError> {
    let data_dir = root.join("data");
    let entries = match fs::read_dir(&data_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(e.into()),
    };

    let mut objects = BTreeMap::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let type_name = entry.file_name().to_string_lossy().to_string();
        let list = list_objects_for_type(root, &type_name)?;
        objects.insert(type_name, list);
    }
    Ok(objects)
}

/// Re-parse and re-emit changed data files in canonical form.
///
/// Used as the pre-commit step of a workspace save. Paths outside
/// `data/*.yaml` and files that no longer exist are skipped.
pub fn rewrite_canonical(root: &Path, changed: &[String]) -> Result<(), StoreError> {
    for rel in changed {
        if !rel.starts_with("data/") || !rel.ends_with(".yaml") {
            continue;
        }
        let abs = root.join(rel);
        if !abs.exists() {
            continue;
        }
        let (type_name, id) = match split_data_path(rel) {
            Some(parts) => parts,
            None => continue,
        };
        let obj =
            parse_object_file(&abs, type_name, id).map_err(|e| StoreError::Canonicalize {
                path: rel.clone(),
                source: Box::new(e),
            })?;
        fs::write(&abs, yaml::emit_object(&obj.fields))?;
    }
    Ok(())
}

/// Build an object from a repo-relative path and a merged field map.
///
/// Identity fields are inferred from the path when absent and
/// cross-checked when present. The merge engine uses this before writing
/// a merged result.
pub fn object_from_path_and_fields(
    rel: &str,
    mut fields: BTreeMap<String, Value>,
) -> Result<Object, StoreError> {
    let (type_name, id) =
        split_data_path(rel).ok_or_else(|| StoreError::InvalidDataPath(rel.to_string()))?;

    if let Some(found) = fields.get("_id").and_then(Value::as_str) {
        if !found.is_empty() && found != id {
            return Err(StoreError::IdMismatch {
                found: found.to_string(),
                expected: id.to_string(),
            });
        }
    }
    if let Some(found) = fields.get("_type").and_then(Value::as_str) {
        if !found.is_empty() && found != type_name {
            return Err(StoreError::TypeMismatch {
                found: found.to_string(),
                expected: type_name.to_string(),
            });
        }
    }
    fields
        .entry("_id".to_string())
        .or_insert_with(|| Value::String(id.to_string()));
    fields
        .entry("_type".to_string())
        .or_insert_with(|| Value::String(type_name.to_string()));

    Ok(Object {
        id: id.to_string(),
        type_name: type_name.to_string(),
        fields,
        path: rel.to_string(),
    })
}

/// Split `data/<type>/<id>.yaml` into its type and id parts.
fn split_data_path(rel: &str) -> Option<(&str, &str)> {
    let mut parts = rel.split('/');
    if parts.next() != Some("data") {
        return None;
    }
    let type_name = parts.next()?;
    let file = parts.next()?;
    if parts.next().is_some() || type_name.is_empty() {
        return None;
    }
    let id = file.strip_suffix(".yaml")?;
    if id.is_empty() {
        return None;
    }
    Some((type_name, id))
}
