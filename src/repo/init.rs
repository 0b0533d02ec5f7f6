//! repo::init
//!
//! Repository bootstrap: git init on `main`, layout directories,
//! `.gitignore` defaults, optional sample schema and data, and an initial
//! commit. A thin adapter over the store; the core never depends on it.

use std::fs;
use std::path::Path;

use crate::core::constraints::{Constraints, ForeignKeyConstraint, UniqueConstraint};
use crate::core::object::{self, Object};
use crate::core::value::Value;
use crate::git::Git;

use super::RepoError;

const SAMPLE_TEAM_ID: &str = "11111111-1111-4111-8111-111111111111";
const SAMPLE_SERVICE_ID: &str = "22222222-2222-4222-8222-222222222222";

/// Initialize a repository at `root`.
///
/// Refuses a non-empty directory unless `force` is set. With `sample`,
/// seeds the team/service schemas, constraints, and two objects.
pub fn initialize_repository(root: &Path, force: bool, sample: bool) -> Result<(), RepoError> {
    let root = if root.is_absolute() {
        root.to_path_buf()
    } else {
        std::env::current_dir()?.join(root)
    };

    match fs::metadata(&root) {
        Ok(meta) => {
            if !meta.is_dir() {
                return Err(RepoError::NotADirectory(root));
            }
            let occupied = fs::read_dir(&root)?.next().is_some();
            if occupied && !force {
                return Err(RepoError::DirectoryNotEmpty(root));
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::create_dir_all(&root)?;

    let git = Git::new(&root);
    if !root.join(".git").exists() {
        git.run(&["init"])?;
        git.run(&["checkout", "-B", "main"])?;
    }

    fs::create_dir_all(root.join("config/schemas"))?;
    fs::create_dir_all(root.join("data/team"))?;
    fs::create_dir_all(root.join("data/service"))?;
    fs::create_dir_all(root.join("output"))?;

    if sample {
        write_sample_schemas(&root)?;
        write_sample_constraints(&root)?;
        write_sample_objects(&root)?;
    }
    ensure_gitignore_defaults(&root)?;

    git.add_all()?;
    git.commit("Initialize worktreefoundry repository")?;
    Ok(())
}

fn write_sample_schemas(root: &Path) -> Result<(), RepoError> {
    let team = serde_json::json!({
        "type": "object",
        "required": ["name", "code"],
        "properties": {
            "name": {"type": "string", "minLength": 1},
            "code": {"type": "string", "minLength": 2, "maxLength": 16}
        }
    });
    let service = serde_json::json!({
        "type": "object",
        "required": ["name", "teamId", "tier"],
        "properties": {
            "name": {"type": "string", "minLength": 1},
            "teamId": {"type": "string"},
            "tier": {"type": "string", "enum": ["core", "edge", "batch"]},
            "ports": {"type": "array", "items": {"type": "integer"}}
        }
    });
    write_json_file(&root.join("config/schemas/team.schema.json"), &team)?;
    write_json_file(&root.join("config/schemas/service.schema.json"), &service)?;
    Ok(())
}

fn write_sample_constraints(root: &Path) -> Result<(), RepoError> {
    let constraints = Constraints {
        unique: vec![
            UniqueConstraint {
                type_name: "team".to_string(),
                field: "code".to_string(),
            },
            UniqueConstraint {
                type_name: "service".to_string(),
                field: "name".to_string(),
            },
        ],
        foreign_keys: vec![ForeignKeyConstraint {
            from_type: "service".to_string(),
            from_field: "teamId".to_string(),
            to_type: "team".to_string(),
            to_field: "_id".to_string(),
            to_display_field: None,
        }],
    };
    let value = serde_json::to_value(&constraints)?;
    write_json_file(&root.join("config/constraints.json"), &value)
}

fn write_sample_objects(root: &Path) -> Result<(), RepoError> {
    let team = Object {
        id: SAMPLE_TEAM_ID.to_string(),
        type_name: "team".to_string(),
        fields: [
            ("_id", Value::String(SAMPLE_TEAM_ID.to_string())),
            ("_type", Value::String("team".to_string())),
            ("name", Value::String("Platform".to_string())),
            ("code", Value::String("PLAT".to_string())),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect(),
        path: object::data_relative_path("team", SAMPLE_TEAM_ID),
    };
    let service = Object {
        id: SAMPLE_SERVICE_ID.to_string(),
        type_name: "service".to_string(),
        fields: [
            ("_id", Value::String(SAMPLE_SERVICE_ID.to_string())),
            ("_type", Value::String("service".to_string())),
            ("name", Value::String("edge-gateway".to_string())),
            ("teamId", Value::String(SAMPLE_TEAM_ID.to_string())),
            ("tier", Value::String("edge".to_string())),
            (
                "ports",
                Value::sequence(vec![Value::Number(443.0), Value::Number(8443.0)])
                    .unwrap_or(Value::Array(vec![])),
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect(),
        path: object::data_relative_path("service", SAMPLE_SERVICE_ID),
    };
    object::write_object(root, &team)?;
    object::write_object(root, &service)?;
    Ok(())
}

/// Make sure `.gitignore` hides the export output and workspace checkouts.
fn ensure_gitignore_defaults(root: &Path) -> Result<(), RepoError> {
    let path = root.join(".gitignore");
    let mut content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    for line in ["output/", ".worktreefoundry/"] {
        if !content.lines().any(|l| l.trim() == line) {
            content.push_str(line);
            content.push('\n');
        }
    }
    fs::write(&path, content)?;
    Ok(())
}

fn write_json_file(path: &Path, value: &serde_json::Value) -> Result<(), RepoError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');
    fs::write(path, body)?;
    Ok(())
}
