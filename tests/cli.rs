//! CLI integration tests for the folio binary.
//!
//! Each test uses an isolated temp directory for the database, ensuring tests
//! can run in parallel safely.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

use std::path::PathBuf;
use std::sync::Arc;

use assert_cmd::Command;
use assert_fs::TempDir;
use folio::store::{SqliteStore, Store};
use folio::types::{NewFolder, NewPage};
use folio::workspace::Workspace;
use predicates::prelude::*;

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn db_path(&self) -> PathBuf {
        self.temp_dir.path().join("nested").join("folio.db")
    }

    fn db_str(&self) -> String {
        self.db_path().to_string_lossy().to_string()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("folio").expect("failed to find binary");
        cmd.env("NO_COLOR", "1").env_remove("DATABASE_URL");
        cmd
    }

    fn init(&self) -> assert_cmd::assert::Assert {
        self.cmd()
            .args(["init", "--database", &self.db_str()])
            .assert()
    }

    fn admin(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.cmd()
            .args(["admin", "--database", &self.db_str()])
            .args(args)
            .assert()
    }

    fn store(&self) -> SqliteStore {
        SqliteStore::new(self.db_path()).expect("failed to open store")
    }
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("folio")
        .expect("failed to find binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("admin"));
}

#[test]
fn test_init_creates_database() {
    let ctx = TestContext::new();

    ctx.init()
        .success()
        .stdout(predicate::str::contains("Initialized database"));
    assert!(ctx.db_path().exists());

    // Running it again is harmless
    ctx.init().success();
}

#[test]
fn test_init_accepts_sqlite_url() {
    let ctx = TestContext::new();
    let url = format!("sqlite://{}", ctx.db_str());

    ctx.cmd()
        .args(["init", "--database", &url])
        .assert()
        .success();
    assert!(ctx.db_path().exists());
}

#[test]
fn test_admin_requires_initialized_database() {
    let ctx = TestContext::new();

    ctx.admin(&["add-org", "org-1"])
        .failure()
        .stderr(predicate::str::contains("folio init"));
}

#[test]
fn test_serve_requires_initialized_database() {
    let ctx = TestContext::new();

    ctx.cmd()
        .args(["serve", "--database", &ctx.db_str(), "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("folio init"));
}

#[test]
fn test_serve_rejects_wildcard_origin_with_credentials() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.cmd()
        .args(["serve", "--database", &ctx.db_str(), "--port", "0"])
        .args(["--cors-origin", "*"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("allow_credentials"));
}

#[test]
fn test_register_and_remove_organization() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.admin(&["add-org", "org-1", "--name", "Acme", "--slug", "acme"])
        .success()
        .stdout(predicate::str::contains("Registered organization 'org-1'"));
    // Registration is idempotent
    ctx.admin(&["add-org", "org-1"]).success();

    let org = ctx
        .store()
        .get_organization("org-1")
        .unwrap()
        .expect("organization registered");
    assert_eq!(org.name.as_deref(), Some("Acme"));

    let store: Arc<dyn Store> = Arc::new(ctx.store());
    let ws = Workspace::new(Arc::clone(&store));
    let folder = ws
        .folders
        .create_folder(NewFolder {
            organization_id: "org-1".to_string(),
            name: "Docs".to_string(),
            ..NewFolder::default()
        })
        .unwrap();
    drop(ws);
    drop(store);

    ctx.admin(&["remove-org", "org-1"])
        .success()
        .stdout(predicate::str::contains("Deleted organization"));

    let store = ctx.store();
    assert!(store.get_organization("org-1").unwrap().is_none());
    assert!(store.get_folder(&folder.id).unwrap().is_none());

    ctx.admin(&["remove-org", "org-1"])
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_remove_user_keeps_content() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.admin(&["add-org", "org-1"]).success();
    ctx.admin(&["add-user", "user-1", "--name", "Ada"]).success();

    let ws = Workspace::new(Arc::new(ctx.store()));
    let page = ws
        .pages
        .create_page(NewPage {
            organization_id: "org-1".to_string(),
            title: "Notes".to_string(),
            created_by_id: Some("user-1".to_string()),
            ..NewPage::default()
        })
        .unwrap();
    drop(ws);

    ctx.admin(&["remove-user", "user-1"]).success();

    let page = ctx.store().get_page(&page.id).unwrap().expect("page kept");
    assert!(page.created_by_id.is_none());
    assert!(page.updated_by_id.is_none());
}
