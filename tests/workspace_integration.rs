//! Integration tests for the workspace lifecycle.
//!
//! These tests use real git repositories created via tempfile to verify
//! that workspace create, list, save, restore, and delete behave against
//! actual git worktrees.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use worktreefoundry::core::object::data_relative_path;
use worktreefoundry::git::{ChangeStatus, Git};
use worktreefoundry::repo::{init::initialize_repository, RepoError, Repository};

const SERVICE_ID: &str = "22222222-2222-4222-8222-222222222222";

/// Test fixture that initializes a real repository with sample data.
struct TestRepo {
    _dir: TempDir,
    root: PathBuf,
}

impl TestRepo {
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let root = dir.path().join("repo");
        initialize_repository(&root, false, true).expect("failed to initialize repo");
        Self { _dir: dir, root }
    }

    fn repo(&self) -> Repository {
        Repository::open(&self.root, None).expect("failed to open repo")
    }

    fn service_rel() -> String {
        data_relative_path("service", SERVICE_ID)
    }

    /// Replace the service tier in the given checkout.
    fn set_service_tier(checkout: &Path, tier: &str) {
        let path = checkout.join(Self::service_rel());
        let text = fs::read_to_string(&path).unwrap();
        let replaced = text.replace("tier: edge", &format!("tier: {tier}"));
        assert_ne!(text, replaced, "expected to replace the tier");
        fs::write(&path, replaced).unwrap();
    }
}

#[test]
fn initialized_repository_validates_and_commits() {
    let fixture = TestRepo::new();
    let repo = fixture.repo();

    let result = worktreefoundry::core::validate::validate_repository(repo.root());
    assert!(result.ok(), "unexpected issues: {:?}", result.issues);

    let git = Git::new(repo.root());
    assert_eq!(git.current_branch().unwrap(), "main");
    assert!(repo.changed_files(repo.root()).unwrap().is_empty());
}

#[test]
fn create_lists_a_clean_workspace() {
    let fixture = TestRepo::new();
    let repo = fixture.repo();

    repo.create_workspace("draft").unwrap();

    let workspaces = repo.list_workspaces().unwrap();
    assert_eq!(workspaces.len(), 1);
    assert_eq!(workspaces[0].name, "draft");
    assert_eq!(workspaces[0].branch, "workspace/draft");
    assert!(!workspaces[0].dirty);
    assert!(workspaces[0].path.exists());
}

#[test]
fn create_refuses_duplicates_and_bad_names() {
    let fixture = TestRepo::new();
    let repo = fixture.repo();

    repo.create_workspace("draft").unwrap();
    assert!(matches!(
        repo.create_workspace("draft"),
        Err(RepoError::WorkspaceExists(_))
    ));
    assert!(matches!(
        repo.create_workspace("has space"),
        Err(RepoError::Type(_))
    ));
    assert!(matches!(
        repo.create_workspace("a/b"),
        Err(RepoError::Type(_))
    ));
}

#[test]
fn editing_makes_a_workspace_dirty() {
    let fixture = TestRepo::new();
    let repo = fixture.repo();
    repo.create_workspace("draft").unwrap();
    let path = repo.workspace_path("draft");

    TestRepo::set_service_tier(&path, "core");

    let workspaces = repo.list_workspaces().unwrap();
    assert!(workspaces[0].dirty);
    assert_eq!(workspaces[0].changed_files, vec![TestRepo::service_rel()]);

    let entries = repo.changed_entries(&path).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, ChangeStatus::Modified);
}

#[test]
fn status_reports_added_and_deleted() {
    let fixture = TestRepo::new();
    let repo = fixture.repo();
    repo.create_workspace("draft").unwrap();
    let path = repo.workspace_path("draft");

    let new_id = "33333333-3333-4333-8333-333333333333";
    fs::write(
        path.join("data/team").join(format!("{new_id}.yaml")),
        format!("_id: {new_id}\n_type: team\ncode: INFR\nname: Infra\n"),
    )
    .unwrap();
    fs::remove_file(path.join(TestRepo::service_rel())).unwrap();

    let entries = repo.changed_entries(&path).unwrap();
    let by_path: std::collections::BTreeMap<_, _> = entries
        .into_iter()
        .map(|e| (e.path.clone(), e.status))
        .collect();
    assert_eq!(
        by_path.get(&format!("data/team/{new_id}.yaml")),
        Some(&ChangeStatus::Added)
    );
    assert_eq!(
        by_path.get(&TestRepo::service_rel()),
        Some(&ChangeStatus::Deleted)
    );
}

#[test]
fn save_canonicalizes_validates_and_commits() {
    let fixture = TestRepo::new();
    let repo = fixture.repo();
    repo.create_workspace("draft").unwrap();
    let path = repo.workspace_path("draft");

    // Rewrite the service file with unordered keys and a changed tier.
    let rel = TestRepo::service_rel();
    fs::write(
        path.join(&rel),
        format!(
            "tier: core\nname: edge-gateway\nteamId: 11111111-1111-4111-8111-111111111111\n_type: service\n_id: {SERVICE_ID}\nports:\n  - 443\n  - 8443\n"
        ),
    )
    .unwrap();

    let changed = repo.save_workspace("draft", Some("retier")).unwrap();
    assert_eq!(changed, vec![rel.clone()]);

    // Canonical form on disk: keys sorted, identity first.
    let saved = fs::read_to_string(path.join(&rel)).unwrap();
    assert!(saved.starts_with(&format!("_id: {SERVICE_ID}\n_type: service\n")));

    // Committed: the checkout is clean again.
    assert!(repo.changed_files(&path).unwrap().is_empty());
    assert!(!repo.list_workspaces().unwrap()[0].dirty);
}

#[test]
fn save_refuses_a_clean_workspace() {
    let fixture = TestRepo::new();
    let repo = fixture.repo();
    repo.create_workspace("draft").unwrap();

    assert!(matches!(
        repo.save_workspace("draft", None),
        Err(RepoError::NothingToSave)
    ));
}

#[test]
fn save_blocks_on_validation_failure() {
    let fixture = TestRepo::new();
    let repo = fixture.repo();
    repo.create_workspace("draft").unwrap();
    let path = repo.workspace_path("draft");

    // "turbo" is outside the tier enum.
    TestRepo::set_service_tier(&path, "turbo");

    let err = repo.save_workspace("draft", None).unwrap_err();
    match err {
        RepoError::ValidationFailed(message) => {
            assert!(message.contains("tier"), "unexpected message: {message}");
        }
        other => panic!("expected ValidationFailed, got {other:?}"),
    }

    // Nothing was committed.
    assert!(!repo.changed_files(&path).unwrap().is_empty());
}

#[test]
fn restore_reverts_to_workspace_head() {
    let fixture = TestRepo::new();
    let repo = fixture.repo();
    repo.create_workspace("draft").unwrap();
    let path = repo.workspace_path("draft");

    let rel = TestRepo::service_rel();
    let original = fs::read_to_string(path.join(&rel)).unwrap();
    TestRepo::set_service_tier(&path, "core");

    repo.restore_object("draft", "service", SERVICE_ID).unwrap();
    assert_eq!(fs::read_to_string(path.join(&rel)).unwrap(), original);
    assert!(repo.changed_files(&path).unwrap().is_empty());
}

#[test]
fn restore_refuses_trunk() {
    let fixture = TestRepo::new();
    let repo = fixture.repo();

    assert!(matches!(
        repo.restore_object("main", "service", SERVICE_ID),
        Err(RepoError::RestoreOnTrunk)
    ));
    assert!(matches!(
        repo.restore_object("", "service", SERVICE_ID),
        Err(RepoError::RestoreOnTrunk)
    ));
}

#[test]
fn delete_removes_worktree_and_branch() {
    let fixture = TestRepo::new();
    let repo = fixture.repo();
    repo.create_workspace("draft").unwrap();
    let path = repo.workspace_path("draft");
    assert!(path.exists());

    repo.delete_workspace("draft").unwrap();

    assert!(!path.exists());
    assert!(repo.list_workspaces().unwrap().is_empty());
    let branches = Git::new(repo.root())
        .run(&["branch", "--list", "workspace/draft"])
        .unwrap();
    assert!(branches.trim().is_empty());
}

#[test]
fn repository_object_surface_round_trips() {
    let fixture = TestRepo::new();
    let repo = fixture.repo();

    let mut obj = repo.read_object("service", SERVICE_ID).unwrap();
    assert_eq!(obj.type_name, "service");

    let new_id = "44444444-4444-4444-8444-444444444444";
    obj.id = new_id.to_string();
    obj.fields.insert(
        "_id".to_string(),
        worktreefoundry::core::value::Value::String(new_id.into()),
    );
    obj.fields.insert(
        "name".to_string(),
        worktreefoundry::core::value::Value::String("edge-copy".into()),
    );
    repo.write_object(&obj).unwrap();

    let ids: Vec<String> = repo
        .list_objects_for_type("service")
        .unwrap()
        .into_iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(ids, vec![SERVICE_ID.to_string(), new_id.to_string()]);

    repo.delete_object("service", new_id).unwrap();
    assert_eq!(repo.list_objects_for_type("service").unwrap().len(), 1);

    // Identifiers are validated before they become path components.
    assert!(matches!(
        repo.read_object("../secrets", SERVICE_ID),
        Err(RepoError::Type(_))
    ));
    assert!(matches!(
        repo.delete_object("service", "not-a-uuid"),
        Err(RepoError::Type(_))
    ));
}

#[test]
fn workspace_root_is_invisible_to_trunk_status() {
    let fixture = TestRepo::new();
    let repo = fixture.repo();
    repo.create_workspace("draft").unwrap();
    TestRepo::set_service_tier(&repo.workspace_path("draft"), "core");

    // A dirty workspace under .worktreefoundry/ does not dirty trunk.
    assert!(repo.changed_files(repo.root()).unwrap().is_empty());
}
