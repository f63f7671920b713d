//! End-to-end tests for the `datagest` binary.
//!
//! Only commands that never reach a remote are exercised here; workflow
//! behavior is covered against the in-memory substrates.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn datagest() -> Command {
    let mut cmd = Command::cargo_bin("datagest").unwrap();
    cmd.env_remove("DATAGEST_CONFIG").env_remove("RUST_LOG");
    cmd
}

fn toml_path(path: &Path) -> String {
    format!("{:?}", path.display().to_string())
}

/// A config pointing at a one-project registry and a lock directory.
struct Setup {
    temp: TempDir,
}

impl Setup {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let registry = temp.path().join("registry.json");
        let body = serde_json::json!({
            "version": "1",
            "projects": [{
                "project_id": "vision",
                "name": "Vision",
                "description": "",
                "git_remote": "/mnt/projects/vision/repo.git",
                "dvc_remote": "/mnt/projects/vision/storage",
                "datasets": [{
                    "dataset_id": "street",
                    "name": "Street",
                    "description": "",
                    "source": "line 1"
                }]
            }]
        });
        fs::write(&registry, serde_json::to_vec_pretty(&body).unwrap()).unwrap();

        let config = format!(
            "workspace_root = {}\nregistry_path = {}\nlocks_path = {}\n",
            toml_path(&temp.path().join("workspaces")),
            toml_path(&registry),
            toml_path(&temp.path().join("locks")),
        );
        fs::write(temp.path().join("config.toml"), config).unwrap();
        Self { temp }
    }

    fn config(&self) -> PathBuf {
        self.temp.path().join("config.toml")
    }

    fn cmd(&self) -> Command {
        let mut cmd = datagest();
        cmd.arg("--config").arg(self.config());
        cmd
    }

    fn write_lock(&self, user: &str) {
        let path = self.temp.path().join("locks/vision/street.lock");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let body = serde_json::json!({
            "dataset_id": "street",
            "username": user,
            "machine": "elsewhere",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "app_version": "0.3.1",
            "ttl_hours": 4.0,
        });
        fs::write(path, serde_json::to_vec_pretty(&body).unwrap()).unwrap();
    }
}

mod basics {
    use super::*;

    #[test]
    fn help_describes_the_tool() {
        datagest()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Collaborative versioning"));
    }

    #[test]
    fn version_flag_works() {
        datagest()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("datagest"));
    }

    #[test]
    fn completion_script_for_bash() {
        datagest()
            .args(["completion", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("datagest"));
    }

    #[test]
    fn unknown_subcommand_is_a_usage_error() {
        datagest().arg("frobnicate").assert().failure();
    }
}

mod config {
    use super::*;

    #[test]
    fn init_then_path_and_list() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/config.toml");

        datagest()
            .arg("--config")
            .arg(&path)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));

        datagest()
            .arg("--config")
            .arg(&path)
            .args(["config", "init"])
            .assert()
            .success();
        assert!(path.is_file());

        datagest()
            .arg("--config")
            .arg(&path)
            .args(["config", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("lock_ttl_hours = 4"))
            .stdout(predicate::str::contains("admin_mode = false"));
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let setup = Setup::new();
        setup
            .cmd()
            .args(["config", "init"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));
        setup
            .cmd()
            .args(["config", "init", "--force"])
            .assert()
            .success();
    }

    #[test]
    fn unknown_key_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "no_such_key = 1\n").unwrap();
        datagest()
            .arg("--config")
            .arg(&path)
            .args(["config", "list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("error:"));
    }
}

mod registry {
    use super::*;

    #[test]
    fn missing_registry_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let config = format!(
            "registry_path = {}\n",
            toml_path(&temp.path().join("absent/registry.json"))
        );
        fs::write(&path, config).unwrap();

        datagest()
            .arg("--config")
            .arg(&path)
            .arg("status")
            .assert()
            .code(1)
            .stderr(predicate::str::contains("registry"));
    }

    #[test]
    fn unknown_project_lists_available() {
        let setup = Setup::new();
        setup
            .cmd()
            .args(["--project", "audio", "lock", "status", "--dataset", "street"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("vision"));
    }
}

mod locks {
    use super::*;

    #[test]
    fn status_of_free_dataset() {
        let setup = Setup::new();
        setup
            .cmd()
            .args(["lock", "status", "--dataset", "street"])
            .assert()
            .success()
            .stdout(predicate::str::contains("street: not locked"));
    }

    #[test]
    fn status_names_the_holder() {
        let setup = Setup::new();
        setup.write_lock("someone-else");
        setup
            .cmd()
            .args(["lock", "status", "--dataset", "street"])
            .assert()
            .success()
            .stdout(predicate::str::contains("locked by someone-else@elsewhere"));
    }

    #[test]
    fn unlock_needs_force_for_foreign_lock() {
        let setup = Setup::new();
        setup.write_lock("someone-else");
        setup
            .cmd()
            .args(["lock", "unlock", "--dataset", "street"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--force"));

        setup
            .cmd()
            .args(["lock", "unlock", "--dataset", "street", "--force"])
            .assert()
            .success();
        assert!(!setup.temp.path().join("locks/vision/street.lock").exists());
    }

    #[test]
    fn invalid_dataset_id_is_rejected() {
        let setup = Setup::new();
        setup
            .cmd()
            .args(["lock", "status", "--dataset", "../escape"])
            .assert()
            .failure();
    }
}

mod setup {
    use super::*;
    use datagest::core::registry::read_registry;

    fn setup_cmd(base: &Path, datasets: &str) -> Command {
        let mut cmd = datagest();
        cmd.arg("setup")
            .arg("--base-path")
            .arg(base)
            .args(["--project-id", "vision", "--project-name", "Vision"])
            .args(["--datasets", datasets]);
        cmd
    }

    #[test]
    fn provisions_then_merges() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("share");

        setup_cmd(&base, "street,night_shots")
            .assert()
            .success()
            .stdout(predicate::str::contains("Shared store ready"))
            .stdout(predicate::str::contains("Registered  : street, night_shots"));

        let head = fs::read_to_string(base.join("git_remote/vision.git/HEAD")).unwrap();
        assert_eq!(head.trim(), "ref: refs/heads/main");
        assert!(base.join("dvc_remote/vision").is_dir());
        assert!(base.join("locks/vision").is_dir());

        setup_cmd(&base, "street, rain")
            .assert()
            .success()
            .stdout(predicate::str::contains("Registered  : rain"));

        let snapshot = read_registry(&base.join("registry/registry.json")).unwrap();
        assert_eq!(snapshot.projects.len(), 1);
        let ids: Vec<&str> = snapshot.projects[0]
            .datasets
            .iter()
            .map(|d| d.dataset_id.as_str())
            .collect();
        assert_eq!(ids, vec!["street", "night_shots", "rain"]);
        assert_eq!(
            snapshot.projects[0].git_remote,
            base.join("git_remote/vision.git").display().to_string()
        );
    }

    #[test]
    fn invalid_dataset_id_is_rejected() {
        let temp = TempDir::new().unwrap();
        setup_cmd(temp.path(), "street,../etc")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid dataset id"));
        assert!(!temp.path().join("registry").exists());
    }
}
