//! git::interface
//!
//! The metadata-substrate capability consumed by the workspace and the
//! orchestrator.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::model::CommitInfo;
use crate::process::ProcessError;

/// Errors from metadata-substrate operations.
///
/// Variants that callers act on (rejected push, ownership refusal,
/// timeout) are distinct so no caller has to match on message text.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was inspected
        path: PathBuf,
    },

    /// The remote refused the push.
    #[error("push rejected ({reason}): {message}")]
    PushRejected {
        reason: RejectReason,
        /// Raw substrate output
        message: String,
    },

    /// Git refused to operate on a directory owned by someone else.
    #[error("detected dubious ownership: {message}")]
    DubiousOwnership { message: String },

    /// The command ran past its deadline.
    #[error("git command timed out after {seconds}s: {command}")]
    Timeout { command: String, seconds: u64 },

    /// The command exited non-zero.
    #[error("{message}")]
    CommandFailed {
        /// Exit code
        code: i32,
        /// stderr, else stdout, else a generic text
        message: String,
    },

    /// The binary could not be run at all.
    #[error("failed to run git: {message}")]
    Spawn { message: String },

    /// Output could not be understood.
    #[error("unexpected git output: {message}")]
    Parse { message: String },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal { message: String },
}

impl GitError {
    /// Exit code, for failures that have one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            GitError::CommandFailed { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Classify a failed command's output.
    pub fn from_failure(code: i32, message: String, push: bool) -> Self {
        let lowered = message.to_lowercase();
        if lowered.contains("detected dubious ownership") {
            return GitError::DubiousOwnership { message };
        }
        if push && (lowered.contains("[rejected]") || lowered.contains("failed to push")) {
            let reason = if lowered.contains("non-fast-forward")
                || lowered.contains("fetch first")
                || lowered.contains("updates were rejected because the remote")
                || lowered.contains("tip of your current branch is behind")
            {
                RejectReason::NonFastForward
            } else {
                RejectReason::Other
            };
            return GitError::PushRejected { reason, message };
        }
        let message = if message.trim().is_empty() {
            "Git command failed".to_string()
        } else {
            message
        };
        GitError::CommandFailed { code, message }
    }
}

impl From<ProcessError> for GitError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Timeout { command, after } => GitError::Timeout {
                command,
                seconds: after.as_secs(),
            },
            ProcessError::Spawn { program, source } => GitError::Spawn {
                message: format!("{program}: {source}"),
            },
            other => GitError::Internal {
                message: other.to_string(),
            },
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

/// Why a push was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The remote has commits the mirror does not.
    NonFastForward,
    /// Any other refusal (hooks, permissions, protected branch).
    Other,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::NonFastForward => write!(f, "non-fast-forward"),
            RejectReason::Other => write!(f, "rejected"),
        }
    }
}

/// Result of a commit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A commit was created.
    Committed,
    /// Nothing was staged; no commit was created.
    NoChanges,
}

/// Summary of the working tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitStatus {
    /// No staged, unstaged, or untracked entries.
    pub clean: bool,
    /// HEAD is not on a named branch.
    pub detached: bool,
    /// Current branch, when on one.
    pub branch: Option<String>,
    /// Raw porcelain output.
    pub raw: String,
}

impl GitStatus {
    /// Parse `git status --porcelain --branch` output.
    pub fn parse(raw: &str) -> Self {
        let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
        let header = lines.first().copied().unwrap_or("");

        let mut branch = None;
        let mut detached = false;
        if let Some(rest) = header.strip_prefix("## ") {
            if rest.starts_with("HEAD (no branch)") || rest == "HEAD" {
                detached = true;
            } else {
                let name = rest
                    .strip_prefix("No commits yet on ")
                    .or_else(|| rest.strip_prefix("Initial commit on "))
                    .unwrap_or(rest);
                let name = name.split("...").next().unwrap_or("");
                let name = name.split(" [").next().unwrap_or("").trim();
                if !name.is_empty() && name != "HEAD" {
                    branch = Some(name.to_string());
                }
            }
        }

        let entries = if header.starts_with("## ") {
            lines.len().saturating_sub(1)
        } else {
            lines.len()
        };

        Self {
            clean: entries == 0,
            detached,
            branch,
            raw: raw.to_string(),
        }
    }
}

/// Metadata-substrate capability.
///
/// Every path-scoped operation runs in the bound working directory
/// ([`MetadataClient::workdir`]). `clone_repo` is the exception: it creates
/// the working directory.
pub trait MetadataClient: Send {
    /// The mirror this client operates on.
    fn workdir(&self) -> &Path;

    /// Rebind the client to another mirror.
    fn set_workdir(&mut self, workdir: PathBuf);

    /// Clone `remote` into `target`.
    fn clone_repo(&self, remote: &str, target: &Path) -> Result<(), GitError>;

    /// Stage `paths`. Staging nothing is a no-op.
    fn add(&self, paths: &[String]) -> Result<(), GitError>;

    /// Commit the index.
    fn commit(&self, message: &str) -> Result<CommitOutcome, GitError>;

    /// Push `branch` to `remote`.
    ///
    /// # Errors
    ///
    /// - [`GitError::PushRejected`] when the remote refuses the update
    fn push(&self, remote: &str, branch: &str) -> Result<(), GitError>;

    /// Pull from the tracking remote.
    fn pull(&self, rebase: bool) -> Result<(), GitError>;

    /// Check out a branch or revision.
    fn checkout(&self, reference: &str) -> Result<(), GitError>;

    /// Current branch; `None` when detached.
    fn current_branch(&self) -> Result<Option<String>, GitError>;

    fn status(&self) -> Result<GitStatus, GitError>;

    /// Newest-first history, optionally limited to commits touching `path`.
    fn log(&self, path: Option<&str>, max_count: usize) -> Result<Vec<CommitInfo>, GitError>;

    /// Run an arbitrary subcommand in the working directory.
    fn run_raw(&self, args: &[&str]) -> Result<String, GitError>;

    /// Contents of `path` at revision `rev`; `None` if it does not exist there.
    fn show_file(&self, rev: &str, path: &str) -> Result<Option<String>, GitError> {
        let spec = format!("{rev}:{path}");
        match self.run_raw(&["show", &spec]) {
            Ok(text) => Ok(Some(text)),
            Err(GitError::CommandFailed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// First parent of `rev`; `None` for a root commit.
    fn first_parent(&self, rev: &str) -> Result<Option<String>, GitError> {
        let out = self.run_raw(&["rev-list", "--parents", "-n", "1", rev])?;
        Ok(out.split_whitespace().nth(1).map(str::to_string))
    }
}
