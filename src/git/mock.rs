//! git::mock
//!
//! In-memory [`MetadataClient`] for deterministic tests.
//!
//! # Design
//!
//! State lives behind `Arc<Mutex<...>>` so a test keeps a clone of the mock
//! for assertions after handing the other clone to the code under test.
//! Every call is recorded as a [`GitCall`]; failures are scripted per
//! operation with [`MockGit::fail_next`] (one-shot, FIFO) or
//! [`MockGit::fail_always`].
//!
//! The mock touches the filesystem only where callers inspect it: `clone`
//! creates the target directory and its `.git`.
//!
//! # Example
//!
//! ```
//! use datagest::git::mock::{GitCall, GitOp, MockGit, ScriptedFailure};
//! use datagest::git::MetadataClient;
//!
//! let git = MockGit::new("/tmp/mirror");
//! git.fail_next(GitOp::Pull, ScriptedFailure::Network("Connection reset by peer".into()));
//!
//! assert!(git.pull(true).is_err());
//! assert!(git.pull(true).is_ok());
//! assert_eq!(git.count(|c| matches!(c, GitCall::Pull { .. })), 2);
//! ```

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::interface::{CommitOutcome, GitError, GitStatus, MetadataClient, RejectReason};
use crate::core::model::CommitInfo;

/// Operations that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GitOp {
    Clone,
    Add,
    Commit,
    Push,
    Pull,
    Checkout,
    CurrentBranch,
    Status,
    Log,
    RunRaw,
}

/// A failure to inject. Converted into a fresh [`GitError`] per use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedFailure {
    /// A transient-looking network error.
    Network(String),
    /// A command timeout.
    Timeout,
    /// A refused push.
    Rejected(RejectReason),
    /// Ownership refusal.
    DubiousOwnership,
    /// A plain non-retryable failure.
    Failed(String),
}

impl ScriptedFailure {
    pub fn to_git_error(&self) -> GitError {
        match self {
            ScriptedFailure::Network(msg) => GitError::CommandFailed {
                code: 128,
                message: msg.clone(),
            },
            ScriptedFailure::Timeout => GitError::Timeout {
                command: "git (mock)".to_string(),
                seconds: 0,
            },
            ScriptedFailure::Rejected(reason) => GitError::PushRejected {
                reason: *reason,
                message: "! [rejected] main -> main".to_string(),
            },
            ScriptedFailure::DubiousOwnership => GitError::DubiousOwnership {
                message: "fatal: detected dubious ownership in repository".to_string(),
            },
            ScriptedFailure::Failed(msg) => GitError::CommandFailed {
                code: 1,
                message: msg.clone(),
            },
        }
    }
}

/// Recorded call, for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitCall {
    Clone { remote: String, target: PathBuf },
    Add(Vec<String>),
    Commit(String),
    Push { remote: String, branch: String },
    Pull { rebase: bool },
    Checkout(String),
    CurrentBranch,
    Status,
    Log { path: Option<String>, max_count: usize },
    RunRaw(Vec<String>),
    ShowFile { rev: String, path: String },
    FirstParent(String),
}

#[derive(Debug)]
struct MockGitInner {
    workdir: PathBuf,
    calls: Vec<GitCall>,
    one_shot: HashMap<GitOp, VecDeque<ScriptedFailure>>,
    sticky: HashMap<GitOp, ScriptedFailure>,
    branch: Option<String>,
    known_branches: Vec<String>,
    dirty: bool,
    has_commits: bool,
    commit_outcome: CommitOutcome,
    remote_has_main: bool,
    origin_url: Option<String>,
    trusted: Vec<String>,
    raw_responses: HashMap<String, VecDeque<Result<String, ScriptedFailure>>>,
    logs: HashMap<Option<String>, Vec<CommitInfo>>,
    files: HashMap<(String, String), String>,
    parents: HashMap<String, String>,
}

/// Mock metadata client.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone)]
pub struct MockGit {
    inner: Arc<Mutex<MockGitInner>>,
    workdir: PathBuf,
}

impl MockGit {
    /// A mock bound to `workdir`, on branch `main`, clean, with history.
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        let workdir = workdir.into();
        Self {
            workdir: workdir.clone(),
            inner: Arc::new(Mutex::new(MockGitInner {
                workdir,
                calls: Vec::new(),
                one_shot: HashMap::new(),
                sticky: HashMap::new(),
                branch: Some("main".to_string()),
                known_branches: vec!["main".to_string()],
                dirty: false,
                has_commits: true,
                commit_outcome: CommitOutcome::Committed,
                remote_has_main: true,
                origin_url: None,
                trusted: Vec::new(),
                raw_responses: HashMap::new(),
                logs: HashMap::new(),
                files: HashMap::new(),
                parents: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockGitInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // =========================================================================
    // Scripting
    // =========================================================================

    /// Fail the next call of `op` once.
    pub fn fail_next(&self, op: GitOp, failure: ScriptedFailure) {
        self.lock().one_shot.entry(op).or_default().push_back(failure);
    }

    /// Fail every call of `op` until cleared.
    pub fn fail_always(&self, op: GitOp, failure: ScriptedFailure) {
        self.lock().sticky.insert(op, failure);
    }

    pub fn clear_failures(&self) {
        let mut inner = self.lock();
        inner.one_shot.clear();
        inner.sticky.clear();
    }

    /// Put HEAD on `branch`, or detach it with `None`.
    pub fn set_branch(&self, branch: Option<&str>) {
        let mut inner = self.lock();
        inner.branch = branch.map(str::to_string);
        if let Some(b) = branch {
            if !inner.known_branches.iter().any(|k| k == b) {
                inner.known_branches.push(b.to_string());
            }
        }
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.lock().dirty = dirty;
    }

    pub fn set_has_commits(&self, has_commits: bool) {
        self.lock().has_commits = has_commits;
    }

    /// Outcome returned by `commit` when no failure is scripted.
    pub fn set_commit_outcome(&self, outcome: CommitOutcome) {
        self.lock().commit_outcome = outcome;
    }

    /// Whether `ls-remote --heads origin main` finds the branch.
    pub fn set_remote_has_main(&self, present: bool) {
        self.lock().remote_has_main = present;
    }

    /// URL answered by `remote get-url origin`.
    pub fn set_origin_url(&self, url: Option<&str>) {
        self.lock().origin_url = url.map(str::to_string);
    }

    /// Queue a response for `run_raw(args)` (matched on the space-joined args).
    pub fn respond_raw(&self, args: &str, response: Result<String, ScriptedFailure>) {
        self.lock()
            .raw_responses
            .entry(args.to_string())
            .or_default()
            .push_back(response);
    }

    /// History returned by `log(path, _)`.
    pub fn set_log(&self, path: Option<&str>, commits: Vec<CommitInfo>) {
        self.lock().logs.insert(path.map(str::to_string), commits);
    }

    /// Content of `path` at `rev`.
    pub fn set_file(&self, rev: &str, path: &str, content: &str) {
        self.lock()
            .files
            .insert((rev.to_string(), path.to_string()), content.to_string());
    }

    /// First parent of `rev`.
    pub fn set_parent(&self, rev: &str, parent: &str) {
        self.lock().parents.insert(rev.to_string(), parent.to_string());
    }

    // =========================================================================
    // Verification
    // =========================================================================

    pub fn calls(&self) -> Vec<GitCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&GitCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    /// Entries added to the trust list via `config --global --add`.
    pub fn trusted(&self) -> Vec<String> {
        self.lock().trusted.clone()
    }

    pub fn branch(&self) -> Option<String> {
        self.lock().branch.clone()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn begin(&self, call: GitCall, op: Option<GitOp>) -> Result<MutexGuard<'_, MockGitInner>, GitError> {
        let mut inner = self.lock();
        inner.calls.push(call);
        if let Some(op) = op {
            if let Some(failure) = inner.one_shot.get_mut(&op).and_then(VecDeque::pop_front) {
                return Err(failure.to_git_error());
            }
            if let Some(failure) = inner.sticky.get(&op) {
                return Err(failure.to_git_error());
            }
        }
        Ok(inner)
    }
}

impl MetadataClient for MockGit {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn set_workdir(&mut self, workdir: PathBuf) {
        self.lock().workdir = workdir.clone();
        self.workdir = workdir;
    }

    fn clone_repo(&self, remote: &str, target: &Path) -> Result<(), GitError> {
        let mut inner = self.begin(
            GitCall::Clone {
                remote: remote.to_string(),
                target: target.to_path_buf(),
            },
            Some(GitOp::Clone),
        )?;
        std::fs::create_dir_all(target.join(".git")).map_err(|e| GitError::Internal {
            message: e.to_string(),
        })?;
        inner.branch = Some("main".to_string());
        inner.origin_url.get_or_insert_with(|| remote.to_string());
        Ok(())
    }

    fn add(&self, paths: &[String]) -> Result<(), GitError> {
        self.begin(GitCall::Add(paths.to_vec()), Some(GitOp::Add))
            .map(|_| ())
    }

    fn commit(&self, message: &str) -> Result<CommitOutcome, GitError> {
        let mut inner = self.begin(GitCall::Commit(message.to_string()), Some(GitOp::Commit))?;
        let outcome = inner.commit_outcome.clone();
        if outcome == CommitOutcome::Committed {
            inner.has_commits = true;
            inner.dirty = false;
        }
        Ok(outcome)
    }

    fn push(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.begin(
            GitCall::Push {
                remote: remote.to_string(),
                branch: branch.to_string(),
            },
            Some(GitOp::Push),
        )
        .map(|_| ())
    }

    fn pull(&self, rebase: bool) -> Result<(), GitError> {
        self.begin(GitCall::Pull { rebase }, Some(GitOp::Pull))
            .map(|_| ())
    }

    fn checkout(&self, reference: &str) -> Result<(), GitError> {
        let mut inner = self.begin(GitCall::Checkout(reference.to_string()), Some(GitOp::Checkout))?;
        if inner.known_branches.iter().any(|b| b == reference) {
            inner.branch = Some(reference.to_string());
        } else {
            inner.branch = None;
        }
        Ok(())
    }

    fn current_branch(&self) -> Result<Option<String>, GitError> {
        let inner = self.begin(GitCall::CurrentBranch, Some(GitOp::CurrentBranch))?;
        Ok(inner.branch.clone())
    }

    fn status(&self) -> Result<GitStatus, GitError> {
        let inner = self.begin(GitCall::Status, Some(GitOp::Status))?;
        Ok(GitStatus {
            clean: !inner.dirty,
            detached: inner.branch.is_none(),
            branch: inner.branch.clone(),
            raw: String::new(),
        })
    }

    fn log(&self, path: Option<&str>, max_count: usize) -> Result<Vec<CommitInfo>, GitError> {
        let inner = self.begin(
            GitCall::Log {
                path: path.map(str::to_string),
                max_count,
            },
            Some(GitOp::Log),
        )?;
        let mut commits = inner
            .logs
            .get(&path.map(str::to_string))
            .cloned()
            .unwrap_or_default();
        commits.truncate(max_count);
        Ok(commits)
    }

    fn run_raw(&self, args: &[&str]) -> Result<String, GitError> {
        let mut inner = self.begin(
            GitCall::RunRaw(args.iter().map(|a| a.to_string()).collect()),
            Some(GitOp::RunRaw),
        )?;

        let key = args.join(" ");
        if let Some(response) = inner.raw_responses.get_mut(&key).and_then(VecDeque::pop_front) {
            return response.map_err(|f| f.to_git_error());
        }

        let not_found = |code: i32| GitError::CommandFailed {
            code,
            message: String::new(),
        };
        match args {
            ["config", "--global", "--get-all", "safe.directory"] => {
                if inner.trusted.is_empty() {
                    Err(not_found(1))
                } else {
                    Ok(inner.trusted.join("\n"))
                }
            }
            ["config", "--global", "--add", "safe.directory", path] => {
                inner.trusted.push(path.to_string());
                Ok(String::new())
            }
            ["rev-parse", "--is-inside-work-tree"] => Ok("true".to_string()),
            ["rev-parse", "--verify", "HEAD"] => {
                if inner.has_commits {
                    Ok("0000000000000000000000000000000000000000".to_string())
                } else {
                    Err(not_found(128))
                }
            }
            ["remote", "get-url", "origin"] => inner.origin_url.clone().ok_or_else(|| not_found(2)),
            ["ls-remote", "--heads", "origin", "main"] => Ok(if inner.remote_has_main {
                "0000000000000000000000000000000000000000\trefs/heads/main".to_string()
            } else {
                String::new()
            }),
            ["checkout", "-B", branch, ..] => {
                let branch = branch.to_string();
                if !inner.known_branches.contains(&branch) {
                    inner.known_branches.push(branch.clone());
                }
                inner.branch = Some(branch);
                Ok(String::new())
            }
            _ => Ok(String::new()),
        }
    }

    fn show_file(&self, rev: &str, path: &str) -> Result<Option<String>, GitError> {
        let inner = self.begin(
            GitCall::ShowFile {
                rev: rev.to_string(),
                path: path.to_string(),
            },
            None,
        )?;
        Ok(inner.files.get(&(rev.to_string(), path.to_string())).cloned())
    }

    fn first_parent(&self, rev: &str) -> Result<Option<String>, GitError> {
        let inner = self.begin(GitCall::FirstParent(rev.to_string()), None)?;
        Ok(inner.parents.get(rev).cloned())
    }
}

impl MockGit {
    /// The mirror the most recent rebinding of any clone points at.
    pub fn bound_workdir(&self) -> PathBuf {
        self.lock().workdir.clone()
    }
}
