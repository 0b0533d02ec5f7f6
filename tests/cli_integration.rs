//! Integration tests for the CLI binary surface.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

const SERVICE_ID: &str = "22222222-2222-4222-8222-222222222222";

fn bin() -> Command {
    Command::cargo_bin("worktreefoundry").expect("binary should build")
}

fn init_repo() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("repo");
    bin()
        .args(["init", "--repository"])
        .arg(&root)
        .assert()
        .success();
    (dir, root)
}

fn repo_arg(root: &Path) -> String {
    root.display().to_string()
}

#[test]
fn init_then_validate_passes() {
    let (_dir, root) = init_repo();
    let assert = bin()
        .args(["validate", "--repository", &repo_arg(&root)])
        .assert()
        .success();
    let output = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(output.contains("validation passed"), "{output}");
}

#[test]
fn validate_reports_issues_and_fails() {
    let (_dir, root) = init_repo();
    fs::write(root.join("config/extra.txt"), "x").unwrap();

    let assert = bin()
        .args(["validate", "--repository", &repo_arg(&root)])
        .assert()
        .failure();
    let output = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(output.contains("[layout] config/extra.txt"), "{output}");
}

#[test]
fn export_writes_type_artifacts() {
    let (_dir, root) = init_repo();
    bin()
        .args(["export", "--repository", &repo_arg(&root)])
        .assert()
        .success();

    let teams = fs::read_to_string(root.join("output/team.json")).unwrap();
    assert!(teams.contains("\"Platform\""));
    let services = fs::read_to_string(root.join("output/service.json")).unwrap();
    assert!(services.contains("\"edge-gateway\""));
}

#[test]
fn workspace_lifecycle_through_the_cli() {
    let (_dir, root) = init_repo();
    let repo = repo_arg(&root);

    bin()
        .args(["workspace", "create", "draft", "--repository", &repo])
        .assert()
        .success();

    let assert = bin()
        .args(["workspace", "list", "--repository", &repo])
        .assert()
        .success();
    let listing = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(listing.contains("draft"), "{listing}");
    assert!(listing.contains("clean"), "{listing}");

    // Edit the workspace, check status, save, and merge.
    let ws = root.join(".worktreefoundry/workspaces/draft");
    let service = ws.join(format!("data/service/{SERVICE_ID}.yaml"));
    let text = fs::read_to_string(&service).unwrap();
    fs::write(&service, text.replace("name: edge-gateway", "name: edge-gw")).unwrap();

    let assert = bin()
        .args(["workspace", "status", "draft", "--repository", &repo])
        .assert()
        .success();
    let status = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(status.contains("M\t"), "{status}");

    bin()
        .args([
            "workspace", "save", "draft", "--message", "rename", "--repository", &repo,
        ])
        .assert()
        .success();

    bin()
        .args(["merge", "draft", "--repository", &repo])
        .assert()
        .success();

    let merged = fs::read_to_string(root.join(format!("data/service/{SERVICE_ID}.yaml"))).unwrap();
    assert!(merged.contains("name: edge-gw"), "{merged}");
}

#[test]
fn merge_prints_conflicts_with_keys() {
    let (_dir, root) = init_repo();
    let repo = repo_arg(&root);

    bin()
        .args(["workspace", "create", "draft", "--repository", &repo])
        .assert()
        .success();

    let rel = format!("data/service/{SERVICE_ID}.yaml");
    let ws_service = root.join(".worktreefoundry/workspaces/draft").join(&rel);
    let text = fs::read_to_string(&ws_service).unwrap();
    fs::write(&ws_service, text.replace("tier: edge", "tier: batch")).unwrap();
    bin()
        .args([
            "workspace", "save", "draft", "--message", "retier", "--repository", &repo,
        ])
        .assert()
        .success();

    // Diverge trunk the incompatible way.
    let trunk_service = root.join(&rel);
    let text = fs::read_to_string(&trunk_service).unwrap();
    fs::write(&trunk_service, text.replace("tier: edge", "tier: core")).unwrap();
    std::process::Command::new("git")
        .args(["add", "-A"])
        .current_dir(&root)
        .status()
        .unwrap();
    std::process::Command::new("git")
        .args([
            "-c",
            "user.name=test",
            "-c",
            "user.email=test@example.com",
            "commit",
            "-m",
            "retier trunk",
        ])
        .current_dir(&root)
        .status()
        .unwrap();

    let assert = bin()
        .args(["merge", "draft", "--repository", &repo])
        .assert()
        .failure();
    let output = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    let key = format!("{rel}::tier");
    assert!(output.contains(&key), "{output}");

    // Resolve in favor of the workspace and finish the merge.
    bin()
        .args([
            "merge",
            "draft",
            "--resolve",
            &format!("{key}=workspace"),
            "--repository",
            &repo,
        ])
        .assert()
        .success();

    let merged = fs::read_to_string(root.join(&rel)).unwrap();
    assert!(merged.contains("tier: batch"), "{merged}");
}

#[test]
fn merge_preview_passes_for_valid_workspace() {
    let (_dir, root) = init_repo();
    let repo = repo_arg(&root);

    bin()
        .args(["workspace", "create", "draft", "--repository", &repo])
        .assert()
        .success();

    let assert = bin()
        .args(["merge", "draft", "--preview", "--repository", &repo])
        .assert()
        .success();
    let output = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(output.contains("merge preview passed"), "{output}");
}
