//! workspace
//!
//! Lifecycle of a project's local mirror.
//!
//! # Guarantee
//!
//! After [`WorkspaceManager::init_workspace`] returns `Ok`, the mirror for
//! the project exists, is trusted, has both substrates initialized and has
//! at least one revision to pull from and push to.
//!
//! # States
//!
//! [`WorkspaceState`] is derived on every call, never stored:
//!
//! ```text
//! NotCloned -> Corrupt -> Detached -> Dirty -> Ready
//! ```
//!
//! The first condition that applies wins.
//!
//! # Binding
//!
//! One manager serves every project under a workspace root. Each call that
//! takes a project rebinds both substrate clients to that project's mirror
//! before touching it.

mod backup;
pub mod remote;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use backup::backup_invalid_mirror;

use crate::content::{ContentClient, ContentError};
use crate::core::dataset::load_dataset_config;
use crate::core::files::count_files;
use crate::core::identity::Identity;
use crate::core::model::{DatasetInfo, LocalState, ProjectConfig};
use crate::core::paths::MirrorPaths;
use crate::core::types::DatasetId;
use crate::git::{safe_directory_value, CommitOutcome, GitError, MetadataClient};

/// Name of the content remote the mirror pushes to.
pub const CONTENT_REMOTE_NAME: &str = "storage";

/// Branch every mirror publishes to.
pub const MAIN_BRANCH: &str = "main";

const BOOTSTRAP_MESSAGE: &str = "Initialize DataGest workspace";

/// Errors from mirror management.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("No Git remote configured for project {project}")]
    NoGitRemote { project: String },

    #[error("No DVC remote configured for project {project}")]
    NoContentRemote { project: String },

    /// Every metadata remote candidate failed.
    #[error("Unable to clone project {project} from configured sources:\n{}", attempts.join("\n"))]
    CloneFailed {
        project: String,
        /// One line per candidate: what was tried and why it failed
        attempts: Vec<String>,
    },

    #[error("Invalid workspace: missing .git in {}", path.display())]
    MissingGitDir { path: PathBuf },

    #[error("Failed to backup invalid workspace {}: {source}", path.display())]
    Backup {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to backup invalid workspace {}: no available backup name", path.display())]
    BackupNamesExhausted { path: PathBuf },

    #[error("workspace I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Content(#[from] ContentError),
}

/// Derived state of a mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceState {
    Ready,
    Dirty,
    Detached,
    Corrupt,
    NotCloned,
}

impl WorkspaceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceState::Ready => "READY",
            WorkspaceState::Dirty => "DIRTY",
            WorkspaceState::Detached => "DETACHED",
            WorkspaceState::Corrupt => "CORRUPT",
            WorkspaceState::NotCloned => "NOT_CLONED",
        }
    }
}

impl std::fmt::Display for WorkspaceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remotes resolved by the last successful initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRemotes {
    pub git: String,
    pub content: String,
}

/// Owns the mirrors under one workspace root.
pub struct WorkspaceManager {
    root: PathBuf,
    identity: Identity,
    git: Box<dyn MetadataClient>,
    content: Box<dyn ContentClient>,
    active: Option<ActiveRemotes>,
}

impl std::fmt::Debug for WorkspaceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceManager")
            .field("root", &self.root)
            .field("identity", &self.identity)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl WorkspaceManager {
    pub fn new(
        root: impl Into<PathBuf>,
        identity: Identity,
        git: Box<dyn MetadataClient>,
        content: Box<dyn ContentClient>,
    ) -> Self {
        Self {
            root: root.into(),
            identity,
            git,
            content,
            active: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Paths of `project`'s mirror.
    pub fn mirror(&self, project: &ProjectConfig) -> MirrorPaths {
        MirrorPaths::for_project(&self.root, &project.project_id)
    }

    pub fn git(&self) -> &dyn MetadataClient {
        self.git.as_ref()
    }

    pub fn content(&self) -> &dyn ContentClient {
        self.content.as_ref()
    }

    pub fn active_remotes(&self) -> Option<&ActiveRemotes> {
        self.active.as_ref()
    }

    /// Point both clients at `project`'s mirror.
    pub fn bind(&mut self, project: &ProjectConfig) -> MirrorPaths {
        let mirror = self.mirror(project);
        self.git.set_workdir(mirror.root().to_path_buf());
        self.content.set_workdir(mirror.root().to_path_buf());
        mirror
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Ensure a ready mirror for `project`, cloning or repairing as needed.
    pub fn init_workspace(&mut self, project: &ProjectConfig) -> Result<(), WorkspaceError> {
        fs::create_dir_all(&self.root).map_err(|source| WorkspaceError::Io {
            path: self.root.clone(),
            source,
        })?;

        let mirror = self.bind(project);
        let root = mirror.root().to_path_buf();
        let content_remote = remote::select_remote(&project.dvc_remote_candidates()).ok_or_else(|| {
            WorkspaceError::NoContentRemote {
                project: project.project_id.to_string(),
            }
        })?;

        let mut git_remote = None;
        if root.exists() && !mirror.git_dir().exists() {
            let backup = backup_invalid_mirror(&root, Local::now())?;
            warn!(mirror = %root.display(), backup = %backup.display(), "mirror has no .git, moved aside");
            git_remote = Some(self.clone_with_fallback(project, &root)?);
        } else if !root.exists() {
            git_remote = Some(self.clone_with_fallback(project, &root)?);
        }

        if !mirror.git_dir().exists() {
            return Err(WorkspaceError::MissingGitDir { path: root });
        }

        self.ensure_trusted(&root);

        if let Err(err) = self.git.run_raw(&["rev-parse", "--is-inside-work-tree"]) {
            match err {
                GitError::DubiousOwnership { .. } => {
                    debug!(mirror = %root.display(), "ownership refused, re-asserting trust");
                    self.ensure_trusted(&root);
                    self.git.run_raw(&["rev-parse", "--is-inside-work-tree"])?;
                }
                other => {
                    let backup = backup_invalid_mirror(&root, Local::now())?;
                    warn!(
                        mirror = %root.display(),
                        backup = %backup.display(),
                        error = %other,
                        "mirror failed validation, re-cloning"
                    );
                    git_remote = Some(self.clone_with_fallback(project, &root)?);
                    self.bind(project);
                    self.ensure_trusted(&root);
                    self.git.run_raw(&["rev-parse", "--is-inside-work-tree"])?;
                }
            }
        }

        let git_remote = match git_remote {
            Some(remote) => remote,
            None => match self.git.run_raw(&["remote", "get-url", "origin"]) {
                Ok(url) if !url.trim().is_empty() => url.trim().to_string(),
                _ => project.git_remote.clone(),
            },
        };

        let email = self.identity.email();
        self.git.run_raw(&["config", "user.name", &self.identity.username])?;
        self.git.run_raw(&["config", "user.email", &email])?;
        self.git.run_raw(&["config", "core.longpaths", "true"])?;

        let mut initialized_content = false;
        if !mirror.dvc_dir().exists() {
            self.content.init()?;
            initialized_content = true;
        }
        self.content
            .set_default_remote(CONTENT_REMOTE_NAME, &content_remote)?;

        let datasets = mirror.datasets_root();
        fs::create_dir_all(&datasets).map_err(|source| WorkspaceError::Io {
            path: datasets,
            source,
        })?;

        if initialized_content || !self.has_commits() {
            self.bootstrap_initial_commit(&mirror)?;
        }

        info!(
            project = %project.project_id,
            git = %git_remote,
            content = %content_remote,
            "workspace ready"
        );
        self.active = Some(ActiveRemotes {
            git: git_remote,
            content: content_remote,
        });
        Ok(())
    }

    /// Clone from the first metadata remote that works.
    fn clone_with_fallback(&self, project: &ProjectConfig, target: &Path) -> Result<String, WorkspaceError> {
        let candidates = project.git_remote_candidates();
        if candidates.is_empty() {
            return Err(WorkspaceError::NoGitRemote {
                project: project.project_id.to_string(),
            });
        }

        let mut attempts = Vec::new();
        for candidate in &candidates {
            if !remote::remote_accessible(candidate) {
                attempts.push(format!("{candidate} (path inaccessible)"));
                continue;
            }
            if target.exists() {
                if let Err(e) = fs::remove_dir_all(target) {
                    warn!(target = %target.display(), error = %e, "could not clear clone target");
                    attempts.push(format!("{candidate} -> could not clear {}: {e}", target.display()));
                    continue;
                }
            }
            match self.git.clone_repo(candidate, target) {
                Ok(()) => {
                    info!(remote = %candidate, target = %target.display(), "cloned project");
                    return Ok(candidate.clone());
                }
                Err(e) => {
                    warn!(remote = %candidate, error = %e, "clone failed");
                    attempts.push(format!("{candidate} -> {e}"));
                }
            }
        }
        Err(WorkspaceError::CloneFailed {
            project: project.project_id.to_string(),
            attempts,
        })
    }

    /// Add the mirror to the global trust list. Best effort.
    fn ensure_trusted(&self, mirror: &Path) {
        let entry = safe_directory_value(mirror).unwrap_or_else(|| mirror.display().to_string());
        let known = match self
            .git
            .run_raw(&["config", "--global", "--get-all", "safe.directory"])
        {
            Ok(text) => text,
            Err(GitError::CommandFailed { code: 1, .. }) => String::new(),
            Err(e) => {
                debug!(error = %e, "could not read safe.directory list");
                return;
            }
        };
        let wanted = entry.to_lowercase();
        if known.lines().any(|l| l.trim().to_lowercase() == wanted) {
            return;
        }
        if let Err(e) = self
            .git
            .run_raw(&["config", "--global", "--add", "safe.directory", &entry])
        {
            warn!(error = %e, "could not persist safe.directory; relying on per-command trust");
        }
    }

    fn has_commits(&self) -> bool {
        self.git.run_raw(&["rev-parse", "--verify", "HEAD"]).is_ok()
    }

    fn remote_branch_exists(&self, branch: &str) -> bool {
        self.git
            .run_raw(&["ls-remote", "--heads", "origin", branch])
            .map(|out| !out.trim().is_empty())
            .unwrap_or(false)
    }

    fn bootstrap_initial_commit(&self, mirror: &MirrorPaths) -> Result<(), WorkspaceError> {
        let remote_has_main = self.remote_branch_exists(MAIN_BRANCH);
        if remote_has_main {
            self.git.run_raw(&["fetch", "origin", MAIN_BRANCH])?;
            self.git
                .run_raw(&["checkout", "-B", MAIN_BRANCH, "origin/main"])?;
        } else {
            self.git.run_raw(&["checkout", "-B", MAIN_BRANCH])?;
        }

        let baseline = [".dvc/config", ".dvc/.gitignore", ".gitignore"];
        let paths: Vec<String> = baseline
            .iter()
            .filter(|p| mirror.root().join(p).exists())
            .map(|p| p.to_string())
            .collect();
        self.git.add(&paths)?;
        if self.git.commit(BOOTSTRAP_MESSAGE)? == CommitOutcome::NoChanges {
            debug!("bootstrap: nothing to commit");
        }

        if remote_has_main {
            match self.git.push("origin", MAIN_BRANCH) {
                Err(GitError::PushRejected { .. }) => {
                    self.git.run_raw(&["fetch", "origin", MAIN_BRANCH])?;
                    self.git.run_raw(&["rebase", "origin/main"])?;
                    self.git.push("origin", MAIN_BRANCH)?;
                }
                other => other?,
            }
        } else {
            self.git.run_raw(&["push", "-u", "origin", MAIN_BRANCH])?;
        }
        Ok(())
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Both substrates present and the metadata repository usable.
    pub fn verify_integrity(&mut self, project: &ProjectConfig) -> bool {
        let mirror = self.bind(project);
        mirror.git_dir().exists()
            && mirror.dvc_dir().exists()
            && self.git.run_raw(&["rev-parse", "--is-inside-work-tree"]).is_ok()
    }

    pub fn get_state(&mut self, project: &ProjectConfig) -> Result<WorkspaceState, WorkspaceError> {
        let mirror = self.bind(project);
        if !mirror.root().exists() || !mirror.git_dir().exists() {
            return Ok(WorkspaceState::NotCloned);
        }
        if !self.verify_integrity(project) {
            return Ok(WorkspaceState::Corrupt);
        }
        let status = self.git.status()?;
        Ok(if status.detached {
            WorkspaceState::Detached
        } else if !status.clean {
            WorkspaceState::Dirty
        } else {
            WorkspaceState::Ready
        })
    }

    /// Datasets present in the mirror, in directory-name order.
    ///
    /// Lock status is left unset; the orchestrator fills it in.
    pub fn list_datasets(&mut self, project: &ProjectConfig) -> Result<Vec<DatasetInfo>, WorkspaceError> {
        let mirror = self.bind(project);
        let root = mirror.datasets_root();
        if !root.exists() {
            return Ok(Vec::new());
        }

        let modified = self.modified_datasets();
        let entries = fs::read_dir(&root).map_err(|source| WorkspaceError::Io {
            path: root.clone(),
            source,
        })?;
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();

        let mut out = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let id = match DatasetId::new(name.as_str()) {
                Ok(id) => id,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "skipping dataset directory");
                    continue;
                }
            };

            let (config, issue) = load_dataset_config(&mirror.metadata_file(&id), &id);
            if let Some(issue) = issue {
                warn!(dataset = %id, %issue, "dataset metadata unusable, using defaults");
            }

            let data_dir = mirror.data_dir(&id);
            let tally = count_files(&data_dir, false);

            let (last_updated, last_author) = match self.git.log(Some(&MirrorPaths::rel_dataset(&id)), 1) {
                Ok(commits) => match commits.into_iter().next() {
                    Some(c) => (Some(c.timestamp), Some(c.author)),
                    None => (None, None),
                },
                Err(e) => {
                    debug!(dataset = %id, error = %e, "history lookup failed");
                    (None, None)
                }
            };

            let local_state = if modified.iter().any(|m| m == id.as_str()) {
                LocalState::Modified
            } else if data_dir.exists() {
                LocalState::Clean
            } else {
                LocalState::NotDownloaded
            };

            out.push(DatasetInfo {
                config,
                file_count: tally.count,
                total_size_bytes: tally.bytes,
                last_updated,
                last_author,
                is_locked: false,
                locked_by: None,
                local_state,
            });
        }
        Ok(out)
    }

    /// Dataset ids the content substrate reports as changed.
    fn modified_datasets(&self) -> Vec<String> {
        match self.content.status() {
            Ok(text) => modified_from_status(&text),
            Err(e) => {
                warn!(mirror = %self.content.workdir().display(), error = %e, "content status failed");
                Vec::new()
            }
        }
    }
}

/// Dataset ids named by `datasets/<id>/...` paths in status output.
pub fn modified_from_status(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for line in text.lines() {
        let normalized = line.trim().replace('\\', "/");
        let Some(start) = normalized.find("datasets/") else {
            continue;
        };
        let rest = &normalized[start + "datasets/".len()..];
        if let Some(end) = rest.find('/') {
            let id = &rest[..end];
            if !id.is_empty() && !out.iter().any(|o| o == id) {
                out.push(id.to_string());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::mock::{ContentCall, MockContent};
    use crate::core::types::ProjectId;
    use crate::git::mock::{GitCall, GitOp, MockGit, ScriptedFailure};
    use crate::git::RejectReason;
    use tempfile::TempDir;

    fn project(remote: &str) -> ProjectConfig {
        ProjectConfig {
            project_id: ProjectId::new("vision").unwrap(),
            name: "Vision".into(),
            description: String::new(),
            git_remote: remote.into(),
            dvc_remote: "s3://bucket/vision".into(),
            datasets: Vec::new(),
            git_remote_sources: Vec::new(),
            dvc_remote_sources: Vec::new(),
        }
    }

    fn manager(root: &Path) -> (WorkspaceManager, MockGit, MockContent) {
        let git = MockGit::new(root);
        let content = MockContent::new(root);
        let mgr = WorkspaceManager::new(
            root,
            Identity::new("ana", "ws-07"),
            Box::new(git.clone()),
            Box::new(content.clone()),
        );
        (mgr, git, content)
    }

    fn raw(call: &GitCall) -> Option<String> {
        match call {
            GitCall::RunRaw(args) => Some(args.join(" ")),
            _ => None,
        }
    }

    mod init {
        use super::*;

        #[test]
        fn fresh_clone_bootstraps() {
            let temp = TempDir::new().unwrap();
            let (mut mgr, git, content) = manager(temp.path());
            git.set_remote_has_main(false);
            git.set_has_commits(false);

            mgr.init_workspace(&project("ssh://host/vision.git")).unwrap();

            let root = temp.path().join("vision");
            assert!(root.join(".git").is_dir());
            assert!(root.join(".dvc/config").is_file());
            assert!(root.join("datasets").is_dir());
            assert_eq!(git.bound_workdir(), root);
            assert_eq!(content.bound_workdir(), root);

            let raws: Vec<String> = git.calls().iter().filter_map(raw).collect();
            assert!(raws.contains(&"config user.name ana".to_string()));
            assert!(raws.contains(&"config user.email ana@ws-07".to_string()));
            assert!(raws.contains(&"config core.longpaths true".to_string()));
            assert!(raws.contains(&"checkout -B main".to_string()));
            assert!(raws.contains(&"push -u origin main".to_string()));
            assert_eq!(git.trusted().len(), 1);

            assert!(content.calls().contains(&ContentCall::SetDefaultRemote {
                name: "storage".into(),
                url: "s3://bucket/vision".into()
            }));
            let active = mgr.active_remotes().unwrap();
            assert_eq!(active.git, "ssh://host/vision.git");
        }

        #[test]
        fn existing_mirror_skips_clone_and_bootstrap() {
            let temp = TempDir::new().unwrap();
            let root = temp.path().join("vision");
            fs::create_dir_all(root.join(".git")).unwrap();
            fs::create_dir_all(root.join(".dvc")).unwrap();
            let (mut mgr, git, content) = manager(temp.path());
            git.set_origin_url(Some("ssh://actual/vision.git"));

            mgr.init_workspace(&project("ssh://host/vision.git")).unwrap();

            assert_eq!(git.count(|c| matches!(c, GitCall::Clone { .. })), 0);
            assert_eq!(git.count(|c| matches!(c, GitCall::Commit(_))), 0);
            assert_eq!(content.count(|c| *c == ContentCall::Init), 0);
            assert_eq!(mgr.active_remotes().unwrap().git, "ssh://actual/vision.git");
        }

        #[test]
        fn mirror_without_git_is_backed_up() {
            let temp = TempDir::new().unwrap();
            let root = temp.path().join("vision");
            fs::create_dir_all(&root).unwrap();
            fs::write(root.join("stray.txt"), "x").unwrap();
            let (mut mgr, git, _) = manager(temp.path());

            mgr.init_workspace(&project("ssh://host/vision.git")).unwrap();

            assert_eq!(git.count(|c| matches!(c, GitCall::Clone { .. })), 1);
            let backups: Vec<_> = fs::read_dir(temp.path())
                .unwrap()
                .filter_map(Result::ok)
                .filter(|e| e.file_name().to_string_lossy().starts_with("vision_corrupt_"))
                .collect();
            assert_eq!(backups.len(), 1);
            assert!(backups[0].path().join("stray.txt").exists());
        }

        #[test]
        fn falls_back_to_next_remote() {
            let temp = TempDir::new().unwrap();
            let (mut mgr, git, _) = manager(temp.path());
            git.fail_next(GitOp::Clone, ScriptedFailure::Failed("repository not found".into()));
            let mut p = project("ssh://primary/vision.git");
            p.git_remote_sources = vec!["ssh://mirror/vision.git".into()];

            mgr.init_workspace(&p).unwrap();
            assert_eq!(mgr.active_remotes().unwrap().git, "ssh://mirror/vision.git");
        }

        #[test]
        fn all_remotes_failing_lists_each() {
            let temp = TempDir::new().unwrap();
            let (mut mgr, git, _) = manager(temp.path());
            git.fail_always(GitOp::Clone, ScriptedFailure::Failed("unreachable".into()));
            let mut p = project("ssh://primary/vision.git");
            p.git_remote_sources = vec![temp.path().join("gone").display().to_string()];

            let err = mgr.init_workspace(&p).unwrap_err();
            let text = err.to_string();
            assert!(text.contains("Unable to clone project vision"));
            assert!(text.contains("ssh://primary/vision.git -> unreachable"));
            assert!(text.contains("(path inaccessible)"));
        }

        #[test]
        fn uncleared_target_is_reported() {
            let temp = TempDir::new().unwrap();
            let target = temp.path().join("vision");
            fs::write(&target, "not a directory").unwrap();
            let (mgr, git, _) = manager(temp.path());

            let err = mgr
                .clone_with_fallback(&project("ssh://host/vision.git"), &target)
                .unwrap_err();

            assert!(
                err.to_string().contains("ssh://host/vision.git -> could not clear"),
                "{err}"
            );
            assert_eq!(git.count(|c| matches!(c, GitCall::Clone { .. })), 0);
        }

        #[test]
        fn unusable_repository_is_recloned_once() {
            let temp = TempDir::new().unwrap();
            let root = temp.path().join("vision");
            fs::create_dir_all(root.join(".git")).unwrap();
            fs::create_dir_all(root.join(".dvc")).unwrap();
            let (mut mgr, git, _) = manager(temp.path());
            git.respond_raw(
                "rev-parse --is-inside-work-tree",
                Err(ScriptedFailure::Failed("fatal: not a git repository".into())),
            );

            mgr.init_workspace(&project("ssh://host/vision.git")).unwrap();
            assert_eq!(git.count(|c| matches!(c, GitCall::Clone { .. })), 1);
        }

        #[test]
        fn ownership_refusal_retries_after_trust() {
            let temp = TempDir::new().unwrap();
            let root = temp.path().join("vision");
            fs::create_dir_all(root.join(".git")).unwrap();
            fs::create_dir_all(root.join(".dvc")).unwrap();
            let (mut mgr, git, _) = manager(temp.path());
            git.respond_raw(
                "rev-parse --is-inside-work-tree",
                Err(ScriptedFailure::DubiousOwnership),
            );

            mgr.init_workspace(&project("ssh://host/vision.git")).unwrap();
            assert_eq!(git.count(|c| matches!(c, GitCall::Clone { .. })), 0);
        }

        #[test]
        fn bootstrap_push_rejection_rebases_once() {
            let temp = TempDir::new().unwrap();
            let (mut mgr, git, _) = manager(temp.path());
            git.fail_next(GitOp::Push, ScriptedFailure::Rejected(RejectReason::NonFastForward));

            mgr.init_workspace(&project("ssh://host/vision.git")).unwrap();

            let raws: Vec<String> = git.calls().iter().filter_map(raw).collect();
            assert!(raws.contains(&"rebase origin/main".to_string()));
            assert_eq!(git.count(|c| matches!(c, GitCall::Push { .. })), 2);
        }

        #[test]
        fn missing_content_remote() {
            let temp = TempDir::new().unwrap();
            let (mut mgr, _, _) = manager(temp.path());
            let mut p = project("ssh://host/vision.git");
            p.dvc_remote = String::new();
            assert!(matches!(
                mgr.init_workspace(&p),
                Err(WorkspaceError::NoContentRemote { .. })
            ));
        }
    }

    mod state {
        use super::*;

        fn cloned(temp: &TempDir) {
            let root = temp.path().join("vision");
            fs::create_dir_all(root.join(".git")).unwrap();
            fs::create_dir_all(root.join(".dvc")).unwrap();
        }

        #[test]
        fn not_cloned() {
            let temp = TempDir::new().unwrap();
            let (mut mgr, _, _) = manager(temp.path());
            assert_eq!(
                mgr.get_state(&project("r")).unwrap(),
                WorkspaceState::NotCloned
            );
        }

        #[test]
        fn corrupt_without_content_dir() {
            let temp = TempDir::new().unwrap();
            fs::create_dir_all(temp.path().join("vision/.git")).unwrap();
            let (mut mgr, _, _) = manager(temp.path());
            assert_eq!(mgr.get_state(&project("r")).unwrap(), WorkspaceState::Corrupt);
        }

        #[test]
        fn detached_dirty_ready() {
            let temp = TempDir::new().unwrap();
            cloned(&temp);
            let (mut mgr, git, _) = manager(temp.path());
            let p = project("r");

            assert_eq!(mgr.get_state(&p).unwrap(), WorkspaceState::Ready);
            git.set_dirty(true);
            assert_eq!(mgr.get_state(&p).unwrap(), WorkspaceState::Dirty);
            git.set_branch(None);
            assert_eq!(mgr.get_state(&p).unwrap(), WorkspaceState::Detached);
        }
    }

    mod listing {
        use super::*;
        use crate::core::model::CommitInfo;
        use chrono::{TimeZone, Utc};

        #[test]
        fn lists_with_fallbacks_and_states() {
            let temp = TempDir::new().unwrap();
            let datasets = temp.path().join("vision/datasets");
            fs::create_dir_all(datasets.join("cats/data")).unwrap();
            fs::write(datasets.join("cats/data/a.png"), b"1234").unwrap();
            fs::write(
                datasets.join("cats/dataset.yaml"),
                "dataset_id: cats\nname: Cats\ndescription: d\nsource: s\ncreated: '2024-01-01T00:00:00Z'\n",
            )
            .unwrap();
            fs::create_dir_all(datasets.join("dogs")).unwrap();
            fs::write(datasets.join("dogs/dataset.yaml"), ": : not yaml [").unwrap();
            fs::create_dir_all(datasets.join("owls/data")).unwrap();

            let (mut mgr, git, content) = manager(temp.path());
            content.set_status("datasets/owls/data.dvc:\n\tchanged outs:\n");
            git.set_log(
                Some("datasets/cats"),
                vec![CommitInfo {
                    id: "a".repeat(40),
                    short_id: "aaaaaaa".into(),
                    author: "ana".into(),
                    timestamp: Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap(),
                    message: "Import: 1 images into Cats".into(),
                    files_changed: 2,
                    images_added: 0,
                    images_removed: 0,
                }],
            );

            let list = mgr.list_datasets(&project("r")).unwrap();
            assert_eq!(list.len(), 3);

            assert_eq!(list[0].config.name, "Cats");
            assert_eq!(list[0].file_count, 1);
            assert_eq!(list[0].total_size_bytes, 4);
            assert_eq!(list[0].last_author.as_deref(), Some("ana"));
            assert_eq!(list[0].local_state, LocalState::Clean);

            assert_eq!(list[1].config.name, "dogs");
            assert_eq!(list[1].local_state, LocalState::NotDownloaded);

            assert_eq!(list[2].local_state, LocalState::Modified);
        }

        #[test]
        fn status_failure_does_not_fail_listing() {
            let temp = TempDir::new().unwrap();
            fs::create_dir_all(temp.path().join("vision/datasets/cats")).unwrap();
            let (mut mgr, _, content) = manager(temp.path());
            content.fail_always(
                crate::content::mock::ContentOp::Status,
                ScriptedFailure::Failed("dvc broke".into()),
            );
            let list = mgr.list_datasets(&project("r")).unwrap();
            assert_eq!(list.len(), 1);
        }

        #[test]
        fn no_datasets_root() {
            let temp = TempDir::new().unwrap();
            let (mut mgr, _, _) = manager(temp.path());
            assert!(mgr.list_datasets(&project("r")).unwrap().is_empty());
        }

        #[test]
        fn status_parsing() {
            let text = "datasets\\cats\\data.dvc:\n  changed outs:\n    modified: datasets/dogs/data\nother/file\n";
            assert_eq!(modified_from_status(text), vec!["cats", "dogs"]);
        }
    }
}
