//! core::export
//!
//! Deterministic JSON export of a validated repository.
//!
//! One `<type>.json` file per schema type, each an array of objects sorted
//! by id with the identity fields stripped. An invalid repository refuses
//! to export.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::core::object::{self, StoreError};
use crate::core::schema::{self, SchemaError};
use crate::core::validate;

/// Errors from export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The repository does not validate cleanly.
    #[error("cannot export invalid repository: {0}")]
    InvalidRepository(String),

    /// Schemas failed to load.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Objects failed to load.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// JSON serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Export every schema type to `<out_dir>/<type>.json`.
pub fn export_repository(root: &Path, out_dir: &Path) -> Result<(), ExportError> {
    let result = validate::validate_repository(root);
    if let Some(first) = result.first() {
        return Err(ExportError::InvalidRepository(first.to_string()));
    }

    let schemas = schema::load_schemas(root)?;
    let objects_by_type = object::load_objects(root)?;
    fs::create_dir_all(out_dir)?;

    for type_name in schemas.keys() {
        let rows: Vec<serde_json::Value> = objects_by_type
            .get(type_name)
            .map(|objects| {
                objects
                    .iter()
                    .map(|obj| {
                        let row: serde_json::Map<String, serde_json::Value> = obj
                            .fields
                            .iter()
                            .filter(|(key, _)| key.as_str() != "_id" && key.as_str() != "_type")
                            .map(|(key, value)| (key.clone(), value.to_json()))
                            .collect();
                        serde_json::Value::Object(row)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut body = serde_json::to_string_pretty(&rows)?;
        body.push('\n');
        fs::write(out_dir.join(format!("{type_name}.json")), body)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEAM_ID: &str = "11111111-1111-4111-8111-111111111111";

    #[test]
    fn exports_sorted_rows_without_identity() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("config/schemas")).unwrap();
        fs::create_dir_all(dir.path().join("data/team")).unwrap();
        fs::write(
            dir.path().join("config/schemas/team.schema.json"),
            r#"{"type": "object", "required": ["name"], "properties": {"name": {"type": "string"}}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("data/team").join(format!("{TEAM_ID}.yaml")),
            format!("_id: {TEAM_ID}\n_type: team\nname: Platform\n"),
        )
        .unwrap();

        let out = dir.path().join("output");
        export_repository(dir.path(), &out).unwrap();

        let body = fs::read_to_string(out.join("team.json")).unwrap();
        let rows: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
        assert_eq!(rows, vec![serde_json::json!({"name": "Platform"})]);
    }

    #[test]
    fn refuses_invalid_repository() {
        let dir = TempDir::new().unwrap();
        let err = export_repository(dir.path(), &dir.path().join("output")).unwrap_err();
        assert!(matches!(err, ExportError::InvalidRepository(_)));
    }
}
