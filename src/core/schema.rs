//! core::schema
//!
//! Per-type schema registry over `config/schemas/*.schema.json`.
//!
//! # Supported subset
//!
//! A schema document must declare root kind `object` and may carry a
//! `required` list plus `properties`. Property kinds are limited to
//! `string`, `number`, `integer`, `boolean`, and `array`; arrays must name
//! an `items.type` of `string`, `number`, or `integer`. Length bounds are
//! valid only for strings, numeric bounds only for numerics, `enum` only
//! for strings. `_id` and `_type` may not appear as properties.
//!
//! Schema validity is checked here, at load time; schema application to
//! objects happens in [`crate::core::validate`].

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors from schema loading.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// `config/schemas/` does not exist.
    #[error("missing schema directory: {0}")]
    MissingDirectory(String),

    /// The directory exists but holds no `*.schema.json` files.
    #[error("no schema files found in {0}")]
    NoSchemas(String),

    /// A schema file is not well-formed JSON.
    #[error("parse schema {file}: {message}")]
    Parse {
        /// The schema file name.
        file: String,
        /// The JSON error.
        message: String,
    },

    /// A schema file parsed but violates the supported subset.
    #[error("schema {file}: {message}")]
    Invalid {
        /// The schema file name.
        file: String,
        /// What rule it broke.
        message: String,
    },

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The kind of a schema property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
}

impl PropertyKind {
    fn from_raw(raw: &str) -> Option<Self> {
        match raw {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            _ => None,
        }
    }
}

/// The element kind of an array property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    String,
    Number,
    Integer,
}

impl ItemKind {
    fn from_raw(raw: &str) -> Option<Self> {
        match raw {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            _ => None,
        }
    }
}

/// A validated property descriptor.
#[derive(Debug, Clone)]
pub struct SchemaProperty {
    /// The property kind.
    pub kind: PropertyKind,
    /// Allowed values (strings only), sorted for determinism.
    pub enum_values: Vec<String>,
    /// Minimum string length.
    pub min_length: Option<i64>,
    /// Maximum string length.
    pub max_length: Option<i64>,
    /// Minimum numeric value.
    pub minimum: Option<f64>,
    /// Maximum numeric value.
    pub maximum: Option<f64>,
    /// Element kind, present exactly for arrays.
    pub items: Option<ItemKind>,
}

/// A validated per-type schema.
#[derive(Debug, Clone)]
pub struct Schema {
    /// The type this schema describes (the filename stem).
    pub type_name: String,
    /// Names of required fields.
    pub required: BTreeSet<String>,
    /// Property descriptors by field name.
    pub properties: BTreeMap<String, SchemaProperty>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSchema {
    #[serde(rename = "type")]
    kind: String,
    required: Vec<String>,
    properties: BTreeMap<String, RawProperty>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProperty {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "enum")]
    enum_values: Vec<String>,
    #[serde(rename = "minLength")]
    min_length: Option<i64>,
    #[serde(rename = "maxLength")]
    max_length: Option<i64>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    items: Option<RawItems>,
}

#[derive(Debug, Deserialize)]
struct RawItems {
    #[serde(rename = "type", default)]
    kind: String,
}

/// Load every schema under `config/schemas/`.
///
/// The type name is the filename stem before `.schema.json`. Any load or
/// validation failure is fatal; zero schemas is also fatal.
pub fn load_schemas(root: &Path) -> Result<BTreeMap<String, Schema>, SchemaError> {
    let schema_dir = root.join("config").join("schemas");
    let entries = match fs::read_dir(&schema_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SchemaError::MissingDirectory(
                schema_dir.display().to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let mut schemas = BTreeMap::new();
    for entry in entries {
        let entry = entry?;
        let file = entry.file_name().to_string_lossy().to_string();
        if entry.file_type()?.is_dir() {
            continue;
        }
        let Some(type_name) = file.strip_suffix(".schema.json") else {
            continue;
        };
        let text = fs::read_to_string(entry.path())?;
        let raw: RawSchema = serde_json::from_str(&text).map_err(|e| SchemaError::Parse {
            file: file.clone(),
            message: e.to_string(),
        })?;
        let schema = normalize_schema(type_name, raw).map_err(|message| SchemaError::Invalid {
            file: file.clone(),
            message,
        })?;
        schemas.insert(type_name.to_string(), schema);
    }

    if schemas.is_empty() {
        return Err(SchemaError::NoSchemas(schema_dir.display().to_string()));
    }
    Ok(schemas)
}

fn normalize_schema(type_name: &str, raw: RawSchema) -> Result<Schema, String> {
    if raw.kind != "object" {
        return Err("root type must be object".to_string());
    }

    let mut properties = BTreeMap::new();
    for (field, prop) in raw.properties {
        let kind = PropertyKind::from_raw(&prop.kind)
            .ok_or_else(|| format!("field {field}: unsupported type {:?}", prop.kind))?;

        let items = if kind == PropertyKind::Array {
            let raw_items = prop
                .items
                .as_ref()
                .ok_or_else(|| format!("field {field}: array missing items.type"))?;
            Some(ItemKind::from_raw(&raw_items.kind).ok_or_else(|| {
                format!("field {field}: array items.type must be string/number/integer")
            })?)
        } else {
            None
        };

        if kind == PropertyKind::Array && !prop.enum_values.is_empty() {
            return Err(format!("field {field}: enum not supported for array"));
        }
        if kind != PropertyKind::String
            && (prop.min_length.is_some() || prop.max_length.is_some())
        {
            return Err(format!(
                "field {field}: minLength/maxLength only valid for string"
            ));
        }
        if kind != PropertyKind::Number
            && kind != PropertyKind::Integer
            && (prop.minimum.is_some() || prop.maximum.is_some())
        {
            return Err(format!(
                "field {field}: minimum/maximum only valid for number/integer"
            ));
        }

        let mut enum_values = prop.enum_values;
        enum_values.sort();

        properties.insert(
            field,
            SchemaProperty {
                kind,
                enum_values,
                min_length: prop.min_length,
                max_length: prop.max_length,
                minimum: prop.minimum,
                maximum: prop.maximum,
                items,
            },
        );
    }

    if properties.contains_key("_id") {
        return Err("_id must not appear in schema properties".to_string());
    }
    if properties.contains_key("_type") {
        return Err("_type must not appear in schema properties".to_string());
    }

    Ok(Schema {
        type_name: type_name.to_string(),
        required: raw.required.into_iter().collect(),
        properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_schema(dir: &Path, type_name: &str, body: &str) {
        let schemas = dir.join("config").join("schemas");
        fs::create_dir_all(&schemas).unwrap();
        fs::write(schemas.join(format!("{type_name}.schema.json")), body).unwrap();
    }

    #[test]
    fn loads_a_valid_schema() {
        let dir = TempDir::new().unwrap();
        write_schema(
            dir.path(),
            "team",
            r#"{
              "type": "object",
              "required": ["name", "code"],
              "properties": {
                "name": {"type": "string", "minLength": 1},
                "code": {"type": "string", "minLength": 2, "maxLength": 16},
                "tier": {"type": "string", "enum": ["edge", "core", "batch"]},
                "ports": {"type": "array", "items": {"type": "integer"}}
              }
            }"#,
        );

        let schemas = load_schemas(dir.path()).unwrap();
        let team = &schemas["team"];
        assert!(team.required.contains("name"));
        assert_eq!(team.properties["code"].max_length, Some(16));
        assert_eq!(
            team.properties["tier"].enum_values,
            vec!["batch", "core", "edge"]
        );
        assert_eq!(team.properties["ports"].items, Some(ItemKind::Integer));
    }

    #[test]
    fn rejects_non_object_root() {
        let dir = TempDir::new().unwrap();
        write_schema(dir.path(), "team", r#"{"type": "array"}"#);
        let err = load_schemas(dir.path()).unwrap_err();
        assert!(err.to_string().contains("root type must be object"));
    }

    #[test]
    fn rejects_unsupported_property_kind() {
        let dir = TempDir::new().unwrap();
        write_schema(
            dir.path(),
            "team",
            r#"{"type": "object", "properties": {"x": {"type": "oddity"}}}"#,
        );
        let err = load_schemas(dir.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported type"));
    }

    #[test]
    fn rejects_array_without_items() {
        let dir = TempDir::new().unwrap();
        write_schema(
            dir.path(),
            "team",
            r#"{"type": "object", "properties": {"x": {"type": "array"}}}"#,
        );
        let err = load_schemas(dir.path()).unwrap_err();
        assert!(err.to_string().contains("array missing items.type"));
    }

    #[test]
    fn rejects_bounds_on_wrong_kinds() {
        let dir = TempDir::new().unwrap();
        write_schema(
            dir.path(),
            "team",
            r#"{"type": "object", "properties": {"x": {"type": "number", "minLength": 1}}}"#,
        );
        let err = load_schemas(dir.path()).unwrap_err();
        assert!(err.to_string().contains("only valid for string"));

        write_schema(
            dir.path(),
            "team",
            r#"{"type": "object", "properties": {"x": {"type": "string", "minimum": 1}}}"#,
        );
        let err = load_schemas(dir.path()).unwrap_err();
        assert!(err.to_string().contains("only valid for number/integer"));
    }

    #[test]
    fn rejects_identity_properties() {
        let dir = TempDir::new().unwrap();
        write_schema(
            dir.path(),
            "team",
            r#"{"type": "object", "properties": {"_id": {"type": "string"}}}"#,
        );
        let err = load_schemas(dir.path()).unwrap_err();
        assert!(err.to_string().contains("_id must not appear"));
    }

    #[test]
    fn zero_schemas_is_fatal() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("config").join("schemas")).unwrap();
        assert!(matches!(
            load_schemas(dir.path()),
            Err(SchemaError::NoSchemas(_))
        ));
    }

    #[test]
    fn missing_directory_is_fatal() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load_schemas(dir.path()),
            Err(SchemaError::MissingDirectory(_))
        ));
    }
}
