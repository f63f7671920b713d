//! server
//!
//! Bootstrap of the shared store that clients synchronize against.
//!
//! # Layout
//!
//! ```text
//! <base>/git_remote/<project>.git   bare metadata repository, HEAD -> main
//! <base>/dvc_remote/<project>/      content store
//! <base>/locks/<project>/           dataset lock files
//! <base>/registry/registry.json     project registry
//! ```
//!
//! Every step is idempotent: running setup again for the same project adds
//! only the datasets that are not registered yet.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::core::registry::{self, ProjectEntry, RegistryError};
use crate::core::types::{DatasetId, ProjectId};
use crate::process::{self, CommandSpec, ProcessError};
use crate::workspace::MAIN_BRANCH;

/// Errors from shared-store setup.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("at least one dataset id is required")]
    NoDatasets,

    #[error("failed to create {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("{command} failed: {message}")]
    Git { command: String, message: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Where one project's shared resources live under a base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedLayout {
    pub base: PathBuf,
    pub git_remote: PathBuf,
    pub dvc_remote: PathBuf,
    pub locks: PathBuf,
    pub registry: PathBuf,
}

impl SharedLayout {
    pub fn new(base: impl Into<PathBuf>, project: &ProjectId) -> Self {
        let base = base.into();
        Self {
            git_remote: base.join("git_remote").join(format!("{project}.git")),
            dvc_remote: base.join("dvc_remote").join(project.as_str()),
            locks: base.join("locks").join(project.as_str()),
            registry: base.join("registry").join("registry.json"),
            base,
        }
    }
}

/// What to provision.
#[derive(Debug, Clone)]
pub struct SetupRequest {
    pub base: PathBuf,
    pub project_id: ProjectId,
    pub project_name: String,
    pub datasets: Vec<DatasetId>,
    pub git_executable: String,
}

/// Result of a setup run.
#[derive(Debug, Clone)]
pub struct SetupReport {
    pub layout: SharedLayout,
    /// The bare repository did not exist before.
    pub created_repository: bool,
    /// Datasets newly added to the registry.
    pub added_datasets: Vec<DatasetId>,
}

/// Create or complete the shared store for one project.
pub fn setup_shared_store(request: &SetupRequest) -> Result<SetupReport, SetupError> {
    if request.datasets.is_empty() {
        return Err(SetupError::NoDatasets);
    }
    let layout = SharedLayout::new(&request.base, &request.project_id);

    for dir in [&layout.dvc_remote, &layout.locks] {
        create_dir(dir)?;
    }
    let created_repository = ensure_bare_repo(&request.git_executable, &layout.git_remote)?;

    let mut document = registry::read_registry_document(&layout.registry)?;
    let added_datasets = registry::upsert_project(
        &mut document,
        &ProjectEntry {
            project_id: request.project_id.clone(),
            name: request.project_name.clone(),
            git_remote: layout.git_remote.display().to_string(),
            dvc_remote: layout.dvc_remote.display().to_string(),
            datasets: request.datasets.clone(),
        },
    )?;
    registry::write_registry(&layout.registry, &document)?;

    info!(
        project = %request.project_id,
        base = %layout.base.display(),
        added = added_datasets.len(),
        "shared store ready"
    );
    Ok(SetupReport {
        layout,
        created_repository,
        added_datasets,
    })
}

fn create_dir(path: &Path) -> Result<(), SetupError> {
    fs::create_dir_all(path).map_err(|source| SetupError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Initialize a bare repository if missing and point its HEAD at main.
///
/// Returns whether the repository was created.
fn ensure_bare_repo(git: &str, repo: &Path) -> Result<bool, SetupError> {
    let created = !repo.join("HEAD").exists();
    let parent = repo.parent().unwrap_or(repo);
    if created {
        create_dir(parent)?;
        run_git(git, parent, &["init", "--bare", &repo.display().to_string()])?;
    }
    let head = format!("refs/heads/{MAIN_BRANCH}");
    run_git(
        git,
        parent,
        &["--git-dir", &repo.display().to_string(), "symbolic-ref", "HEAD", &head],
    )?;
    Ok(created)
}

fn run_git(git: &str, cwd: &Path, args: &[&str]) -> Result<(), SetupError> {
    let spec = CommandSpec::new(git, cwd).args(args.iter().copied());
    let output = process::run(&spec)?;
    if output.success() {
        Ok(())
    } else {
        Err(SetupError::Git {
            command: spec.display(),
            message: output.error_text(),
        })
    }
}
