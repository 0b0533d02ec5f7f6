//! core::validate
//!
//! The multi-stage repository validator.
//!
//! # Stages
//!
//! 1. **Layout** - directory shape of `data/` and `config/`
//! 2. **Parse** - every object file parses and satisfies path identity
//! 3. **Schema** - fields against the per-type schema
//! 4. **Constraints** - uniqueness and foreign keys across objects
//!
//! Stages run in order and all of them run even when earlier stages add
//! issues, so one call reports every problem. The exception is a loader
//! failure (unloadable schemas or constraints), which short-circuits as a
//! single config-stage issue because nothing downstream is meaningful.
//!
//! The validator never mutates the repository.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::core::constraints::{self, Constraints};
use crate::core::object::{self, Object};
use crate::core::schema::{self, ItemKind, PropertyKind, Schema, SchemaProperty};
use crate::core::types::is_canonical_uuid;
use crate::core::value::{is_integral, ArrayItem, Value};
use crate::core::yaml::format_number;

/// The validation stage an issue was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Layout,
    Parse,
    Schema,
    Constraints,
    Config,
    MergePreview,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Layout => "layout",
            Stage::Parse => "parse",
            Stage::Schema => "schema",
            Stage::Constraints => "constraints",
            Stage::Config => "config",
            Stage::MergePreview => "merge-preview",
        };
        write!(f, "{name}")
    }
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// The stage that produced the issue.
    pub stage: Stage,
    /// Repo-relative path, when the issue is tied to a file or directory.
    pub path: Option<String>,
    /// Field name, when the issue is tied to one field.
    pub field: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            path: None,
            field: None,
            message: message.into(),
        }
    }

    fn at_path(stage: Stage, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage,
            path: Some(path.into()),
            field: None,
            message: message.into(),
        }
    }

    fn at_field(
        stage: Stage,
        path: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            path: Some(path.into()),
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.path, &self.field) {
            (Some(path), Some(field)) => {
                write!(f, "[{}] {} ({}): {}", self.stage, path, field, self.message)
            }
            (Some(path), None) => write!(f, "[{}] {}: {}", self.stage, path, self.message),
            _ => write!(f, "[{}] {}", self.stage, self.message),
        }
    }
}

/// The accumulated findings of one validator run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    /// All issues, in stage order.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// A result with no issues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one issue.
    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// True iff no issues were recorded.
    pub fn ok(&self) -> bool {
        self.issues.is_empty()
    }

    /// The first issue, used for single-line blocking errors.
    pub fn first(&self) -> Option<&ValidationIssue> {
        self.issues.first()
    }
}

/// Validate the repository at `root`, accumulating issues across stages.
pub fn validate_repository(root: &Path) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_layout(root, &mut result);

    let schemas = match schema::load_schemas(root) {
        Ok(schemas) => schemas,
        Err(e) => {
            result.add(ValidationIssue::new(Stage::Config, e.to_string()));
            return result;
        }
    };
    let constraints = match constraints::load_constraints(root) {
        Ok(constraints) => constraints,
        Err(e) => {
            result.add(ValidationIssue::at_path(
                Stage::Config,
                "config/constraints.json",
                e.to_string(),
            ));
            return result;
        }
    };

    let objects_by_type = load_objects_with_issues(root, &mut result);

    for (type_name, objects) in &objects_by_type {
        let Some(schema) = schemas.get(type_name) else {
            result.add(ValidationIssue::at_path(
                Stage::Schema,
                format!("data/{type_name}"),
                format!("missing schema file config/schemas/{type_name}.schema.json"),
            ));
            continue;
        };
        for obj in objects {
            validate_object_invariants(obj, &mut result);
            validate_object_schema(obj, schema, &mut result);
        }
    }

    validate_constraints(&objects_by_type, &constraints, &mut result);
    result
}

fn validate_layout(root: &Path, result: &mut ValidationResult) {
    let data_dir = root.join("data");
    if !data_dir.is_dir() {
        result.add(ValidationIssue::at_path(
            Stage::Layout,
            "data",
            "missing data directory",
        ));
    } else if let Ok(entries) = fs::read_dir(&data_dir) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            let rel = format!("data/{name}");
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                result.add(ValidationIssue::at_path(
                    Stage::Layout,
                    rel,
                    "only type directories are allowed directly under data/",
                ));
                continue;
            }
            if let Ok(files) = fs::read_dir(entry.path()) {
                for file in files.flatten() {
                    let file_name = file.file_name().to_string_lossy().to_string();
                    let rel_file = format!("data/{name}/{file_name}");
                    let file_is_dir = file.file_type().map(|t| t.is_dir()).unwrap_or(false);
                    if file_is_dir {
                        result.add(ValidationIssue::at_path(
                            Stage::Layout,
                            rel_file,
                            "nested directories under data/<type>/ are not allowed",
                        ));
                        continue;
                    }
                    let Some(id) = file_name.strip_suffix(".yaml") else {
                        result.add(ValidationIssue::at_path(
                            Stage::Layout,
                            rel_file,
                            "only .yaml files are allowed in data/<type>/",
                        ));
                        continue;
                    };
                    if !is_canonical_uuid(id) {
                        result.add(ValidationIssue::at_path(
                            Stage::Layout,
                            rel_file,
                            "filename must be a UUID",
                        ));
                    }
                }
            }
        }
    }

    let config_dir = root.join("config");
    if !config_dir.is_dir() {
        result.add(ValidationIssue::at_path(
            Stage::Layout,
            "config",
            "missing config directory",
        ));
    } else if let Ok(entries) = fs::read_dir(&config_dir) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            match (is_dir, name.as_str()) {
                (true, "schemas") => validate_schema_layout(root, result),
                (false, "constraints.json") => {}
                // The UI config is an opaque collaborator input.
                (false, "ui.json") => {}
                _ => {
                    result.add(ValidationIssue::at_path(
                        Stage::Layout,
                        format!("config/{name}"),
                        "file is not allowed under config/",
                    ));
                }
            }
        }
    }
}

fn validate_schema_layout(root: &Path, result: &mut ValidationResult) {
    let schema_dir = root.join("config").join("schemas");
    let entries = match fs::read_dir(&schema_dir) {
        Ok(entries) => entries,
        Err(_) => {
            result.add(ValidationIssue::at_path(
                Stage::Layout,
                "config/schemas",
                "cannot read schemas directory",
            ));
            return;
        }
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let rel = format!("config/schemas/{name}");
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            result.add(ValidationIssue::at_path(
                Stage::Layout,
                rel,
                "nested directories are not allowed in config/schemas",
            ));
            continue;
        }
        if !name.ends_with(".schema.json") {
            result.add(ValidationIssue::at_path(
                Stage::Layout,
                rel,
                "schema filename must end with .schema.json",
            ));
        }
    }
}

/// Walk every `data/<type>/*.yaml`, converting parse failures to issues.
fn load_objects_with_issues(
    root: &Path,
    result: &mut ValidationResult,
) -> BTreeMap<String, Vec<Object>> {
    let mut objects: BTreeMap<String, Vec<Object>> = BTreeMap::new();

    let data_dir = root.join("data");
    let types = match fs::read_dir(&data_dir) {
        Ok(types) => types,
        Err(e) => {
            result.add(ValidationIssue::at_path(Stage::Parse, "data", e.to_string()));
            return objects;
        }
    };

    for type_entry in types.flatten() {
        let is_dir = type_entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir {
            continue;
        }
        let type_name = type_entry.file_name().to_string_lossy().to_string();
        let files = match fs::read_dir(type_entry.path()) {
            Ok(files) => files,
            Err(e) => {
                result.add(ValidationIssue::at_path(
                    Stage::Parse,
                    format!("data/{type_name}"),
                    e.to_string(),
                ));
                continue;
            }
        };
        let mut loaded = Vec::new();
        for file in files.flatten() {
            let file_name = file.file_name().to_string_lossy().to_string();
            let file_is_dir = file.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if file_is_dir {
                continue;
            }
            let Some(id) = file_name.strip_suffix(".yaml") else {
                continue;
            };
            let rel = format!("data/{type_name}/{file_name}");
            match object::parse_object_file(&file.path(), &type_name, id) {
                Ok(mut obj) => {
                    obj.path = rel;
                    loaded.push(obj);
                }
                Err(e) => {
                    result.add(ValidationIssue::at_path(Stage::Parse, rel, e.to_string()));
                }
            }
        }
        loaded.sort_by(|a, b| a.id.cmp(&b.id));
        // An empty type directory is not a used type.
        if !loaded.is_empty() {
            objects.insert(type_name, loaded);
        }
    }

    objects
}

fn validate_object_invariants(obj: &Object, result: &mut ValidationResult) {
    if !is_canonical_uuid(&obj.id) {
        result.add(ValidationIssue::at_field(
            Stage::Parse,
            obj.path.clone(),
            "_id",
            "must be a UUID",
        ));
    }
    if obj.type_name.is_empty() {
        result.add(ValidationIssue::at_field(
            Stage::Parse,
            obj.path.clone(),
            "_type",
            "must be non-empty",
        ));
    }
}

fn validate_object_schema(obj: &Object, schema: &Schema, result: &mut ValidationResult) {
    for required in &schema.required {
        match obj.fields.get(required) {
            Some(Value::Null) | None => {
                result.add(ValidationIssue::at_field(
                    Stage::Schema,
                    obj.path.clone(),
                    required.clone(),
                    "required field is missing",
                ));
            }
            Some(_) => {}
        }
    }

    for (field, value) in &obj.fields {
        if field == "_id" || field == "_type" {
            continue;
        }
        let Some(prop) = schema.properties.get(field) else {
            result.add(ValidationIssue::at_field(
                Stage::Schema,
                obj.path.clone(),
                field.clone(),
                "field is not defined in schema",
            ));
            continue;
        };
        validate_property(field, value, prop, &obj.path, result);
    }
}

fn validate_property(
    field: &str,
    value: &Value,
    prop: &SchemaProperty,
    path: &str,
    result: &mut ValidationResult,
) {
    if matches!(value, Value::Null) {
        return;
    }
    let issue = |message: String| ValidationIssue::at_field(Stage::Schema, path, field, message);

    match prop.kind {
        PropertyKind::String => {
            let Value::String(s) = value else {
                result.add(issue("must be a string".to_string()));
                return;
            };
            if let Some(min) = prop.min_length {
                if (s.len() as i64) < min {
                    result.add(issue(format!("length must be >= {min}")));
                }
            }
            if let Some(max) = prop.max_length {
                if (s.len() as i64) > max {
                    result.add(issue(format!("length must be <= {max}")));
                }
            }
            if !prop.enum_values.is_empty() && !prop.enum_values.iter().any(|e| e == s) {
                result.add(issue("value must be one of enum values".to_string()));
            }
        }
        PropertyKind::Number | PropertyKind::Integer => {
            let Value::Number(n) = value else {
                result.add(issue("must be a number".to_string()));
                return;
            };
            if prop.kind == PropertyKind::Integer && !is_integral(*n) {
                result.add(issue("must be an integer".to_string()));
            }
            if let Some(min) = prop.minimum {
                if *n < min {
                    result.add(issue(format!("must be >= {}", format_number(min))));
                }
            }
            if let Some(max) = prop.maximum {
                if *n > max {
                    result.add(issue(format!("must be <= {}", format_number(max))));
                }
            }
        }
        PropertyKind::Boolean => {
            if !matches!(value, Value::Bool(_)) {
                result.add(issue("must be a boolean".to_string()));
            }
        }
        PropertyKind::Array => {
            let Value::Array(items) = value else {
                result.add(issue("must be an array".to_string()));
                return;
            };
            for item in items {
                match prop.items {
                    Some(ItemKind::String) => {
                        if !matches!(item, ArrayItem::String(_)) {
                            result.add(issue("array items must be strings".to_string()));
                        }
                    }
                    Some(ItemKind::Number) | Some(ItemKind::Integer) => {
                        let ArrayItem::Number(n) = item else {
                            result.add(issue("array items must be numbers".to_string()));
                            continue;
                        };
                        if prop.items == Some(ItemKind::Integer) && !is_integral(*n) {
                            result.add(issue("array items must be integers".to_string()));
                        }
                    }
                    None => {}
                }
            }
        }
    }
}

fn validate_constraints(
    objects: &BTreeMap<String, Vec<Object>>,
    constraints: &Constraints,
    result: &mut ValidationResult,
) {
    static NO_OBJECTS: Vec<Object> = Vec::new();

    for unique in &constraints.unique {
        let mut seen: BTreeMap<String, String> = BTreeMap::new();
        for obj in objects.get(&unique.type_name).unwrap_or(&NO_OBJECTS) {
            let Some(value) = obj.fields.get(&unique.field) else {
                continue;
            };
            if matches!(value, Value::Null) {
                continue;
            }
            let Some(key) = constraint_value_key(value) else {
                result.add(ValidationIssue::at_field(
                    Stage::Constraints,
                    obj.path.clone(),
                    unique.field.clone(),
                    "unique constraint requires scalar field",
                ));
                continue;
            };
            if let Some(prior) = seen.get(&key) {
                result.add(ValidationIssue::at_field(
                    Stage::Constraints,
                    obj.path.clone(),
                    unique.field.clone(),
                    format!("duplicate value also used by {prior}"),
                ));
            } else {
                seen.insert(key, obj.path.clone());
            }
        }
    }

    for fk in &constraints.foreign_keys {
        let mut targets: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
        for target in objects.get(&fk.to_type).unwrap_or(&NO_OBJECTS) {
            let Some(value) = target.fields.get(&fk.to_field) else {
                continue;
            };
            if matches!(value, Value::Null) {
                continue;
            }
            if let Some(key) = constraint_value_key(value) {
                targets.insert(key);
            }
        }
        for source in objects.get(&fk.from_type).unwrap_or(&NO_OBJECTS) {
            let Some(value) = source.fields.get(&fk.from_field) else {
                continue;
            };
            if matches!(value, Value::Null) {
                continue;
            }
            let Some(key) = constraint_value_key(value) else {
                result.add(ValidationIssue::at_field(
                    Stage::Constraints,
                    source.path.clone(),
                    fk.from_field.clone(),
                    "foreign key must be a scalar value",
                ));
                continue;
            };
            if !targets.contains(&key) {
                result.add(ValidationIssue::at_field(
                    Stage::Constraints,
                    source.path.clone(),
                    fk.from_field.clone(),
                    format!("reference does not exist in {}.{}", fk.to_type, fk.to_field),
                ));
            }
        }
    }
}

/// Encode a scalar for constraint comparison.
///
/// The kind tag keeps a string `"1"` and a number `1` from colliding.
/// Arrays and nulls are not eligible constraint values.
fn constraint_value_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(format!("s:{s}")),
        Value::Number(n) => Some(format!("n:{}", format_number(*n))),
        Value::Bool(b) => Some(format!("b:{b}")),
        Value::Null | Value::Array(_) => None,
    }
}
