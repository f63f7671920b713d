//! engine::orchestrator
//!
//! [`SyncOrchestrator`]: the shared workflow skeleton and the read-only
//! entry points (`status`, `list_datasets`).
//!
//! # Skeleton
//!
//! Every workflow runs through [`SyncOrchestrator::execute`]:
//!
//! 1. Refuse to start if another workflow is active ([`WorkflowError::Busy`])
//! 2. Run the body with a [`Run`] that emits progress and polls cancellation
//! 3. Classify the outcome into a [`WorkflowResult`]; any error once the
//!    token is set counts as a cancellation, and only failures are
//!    reported through [`ProgressSink::error`]
//!
//! Cleanup owned by a body (the import lock) is held in RAII guards, so it
//! runs on every exit path.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use super::progress::{CancellationToken, ProgressSink};
use super::retry::{RetryClassify, RetryPolicy};
use crate::content::ContentError;
use crate::core::files::FilesError;
use crate::core::model::{DatasetInfo, ProjectConfig};
use crate::core::ops::{format_age, DatasetLock, LockError, LockInfo, LockManager};
use crate::core::types::{DatasetId, ProjectId};
use crate::git::GitError;
use crate::workspace::{WorkspaceError, WorkspaceManager, WorkspaceState};

/// Why a workflow did not succeed.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The caller cancelled. Not a failure.
    #[error("Cancelled by user.")]
    Cancelled,

    /// Another workflow is active on this workspace.
    #[error("Another operation is already running on this workspace.")]
    Busy,

    /// Bad input or a precondition that does not hold.
    #[error("{0}")]
    Validation(String),

    /// A fresh lock is held by someone else.
    #[error("Dataset locked by {holder} on {machine} since {since}{}.", age_note(.age))]
    LockHeld {
        holder: String,
        machine: String,
        /// `%Y-%m-%d %H:%M UTC`, or the raw timestamp if unreadable
        since: String,
        age: Option<chrono::Duration>,
    },

    /// The lock could not be taken (lost a race, or an unreadable lock file).
    #[error("Could not acquire dataset lock.")]
    LockUnavailable,

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Files(#[from] FilesError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl WorkflowError {
    pub(crate) fn lock_held(lock: &LockInfo) -> Self {
        let since = lock
            .acquired_at()
            .map(|ts| ts.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| lock.timestamp.clone());
        WorkflowError::LockHeld {
            holder: lock.username.clone(),
            machine: lock.machine.clone(),
            since,
            age: lock.age_at(Utc::now()),
        }
    }
}

fn age_note(age: &Option<chrono::Duration>) -> String {
    age.map(|a| format!(" ({})", format_age(a))).unwrap_or_default()
}

/// Terminal state of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStatus {
    Succeeded,
    Failed,
    Cancelled,
}

/// Outcome of a workflow: a status, a human-readable message and, on
/// success, the workflow's output.
#[derive(Debug, Clone)]
pub struct WorkflowResult<T = ()> {
    pub status: WorkflowStatus,
    pub message: String,
    pub output: Option<T>,
}

impl<T> WorkflowResult<T> {
    pub fn is_success(&self) -> bool {
        self.status == WorkflowStatus::Succeeded
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == WorkflowStatus::Cancelled
    }
}

/// Whether imports take a dataset lock.
#[derive(Debug, Clone)]
pub enum Locking {
    Enabled(LockManager),
    /// Imports proceed unlocked (logged).
    Disabled,
}

impl Locking {
    pub fn manager(&self) -> Option<&LockManager> {
        match self {
            Locking::Enabled(manager) => Some(manager),
            Locking::Disabled => None,
        }
    }
}

/// Snapshot of a project's mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStatus {
    pub project_id: ProjectId,
    pub workspace_path: PathBuf,
    pub state: WorkspaceState,
    pub branch: Option<String>,
    pub clean: bool,
    pub active_git_remote: Option<String>,
    pub active_dvc_remote: Option<String>,
    pub dataset_count: usize,
}

/// Progress and cancellation for one workflow run.
pub struct Run<'a> {
    sink: &'a mut dyn ProgressSink,
    cancel: &'a CancellationToken,
}

impl<'a> Run<'a> {
    pub fn new(sink: &'a mut dyn ProgressSink, cancel: &'a CancellationToken) -> Self {
        Self { sink, cancel }
    }

    pub fn check(&self) -> Result<(), WorkflowError> {
        if self.cancel.is_cancelled() {
            Err(WorkflowError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Check cancellation, then report a phase.
    pub fn emit(&mut self, message: &str, percent: u8) -> Result<(), WorkflowError> {
        self.check()?;
        self.sink.progress(message, percent.min(100));
        Ok(())
    }

    /// Forward substrate progress; `false` once cancelled.
    pub fn relay(&mut self, message: &str, percent: u8) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.sink.progress(message, percent.min(100));
        true
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        self.cancel
    }
}

/// Run a network operation under `policy`.
///
/// Transient failures are retried with backoff; a retry notice is emitted
/// at 0%. Cancellation stops retrying and is returned as
/// [`WorkflowError::Cancelled`].
pub fn with_retry<T, E>(
    policy: &RetryPolicy,
    run: &mut Run<'_>,
    label: &str,
    mut op: impl FnMut(&mut Run<'_>) -> Result<T, E>,
) -> Result<T, WorkflowError>
where
    E: RetryClassify + std::fmt::Display + Into<WorkflowError>,
{
    let attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        run.check()?;
        let err = match op(&mut *run) {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        run.check()?;
        if attempt >= attempts || !err.is_transient() {
            return Err(err.into());
        }

        let delay = policy.delay_for(attempt);
        let text = err.to_string();
        let first_line = text
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("network error");
        warn!(operation = label, attempt, error = %first_line, "transient failure, retrying");
        run.emit(
            &format!(
                "{label} failed ({first_line}). Retrying in {:.1}s (attempt {}/{attempts})",
                delay.as_secs_f64(),
                attempt + 1
            ),
            0,
        )?;
        if !run.cancel.sleep(delay) {
            return Err(WorkflowError::Cancelled);
        }
        attempt += 1;
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Composes the workspace and the substrates into named workflows.
///
/// One workflow at a time per orchestrator; a second caller gets
/// [`WorkflowError::Busy`] instead of waiting.
#[derive(Debug)]
pub struct SyncOrchestrator {
    workspace: Mutex<WorkspaceManager>,
    locking: Locking,
    pub(crate) retry: RetryPolicy,
    busy: AtomicBool,
}

impl SyncOrchestrator {
    pub fn new(workspace: WorkspaceManager, locking: Locking) -> Self {
        Self {
            workspace: Mutex::new(workspace),
            locking,
            retry: RetryPolicy::default(),
            busy: AtomicBool::new(false),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn locking(&self) -> &Locking {
        &self.locking
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Whether a workflow is running.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn begin(&self) -> Result<BusyGuard<'_>, WorkflowError> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| BusyGuard(&self.busy))
            .map_err(|_| WorkflowError::Busy)
    }

    fn workspace(&self) -> MutexGuard<'_, WorkspaceManager> {
        self.workspace.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run a workflow body inside the shared skeleton.
    pub(crate) fn execute<T>(
        &self,
        name: &'static str,
        sink: &mut dyn ProgressSink,
        cancel: &CancellationToken,
        body: impl FnOnce(&mut WorkspaceManager, &mut Run<'_>) -> Result<(String, T), WorkflowError>,
    ) -> WorkflowResult<T> {
        let outcome = match self.begin() {
            Ok(_busy) => {
                let mut workspace = self.workspace();
                let mut run = Run::new(&mut *sink, cancel);
                body(&mut *workspace, &mut run)
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok((message, output)) => {
                info!(workflow = name, %message, "workflow finished");
                WorkflowResult {
                    status: WorkflowStatus::Succeeded,
                    message,
                    output: Some(output),
                }
            }
            // A child interrupted along with us fails; that is still a cancellation.
            Err(e) if matches!(e, WorkflowError::Cancelled) || cancel.is_cancelled() => {
                info!(workflow = name, "workflow cancelled");
                WorkflowResult {
                    status: WorkflowStatus::Cancelled,
                    message: WorkflowError::Cancelled.to_string(),
                    output: None,
                }
            }
            Err(e) => {
                let message = e.to_string();
                warn!(workflow = name, error = %message, "workflow failed");
                sink.error(&message);
                WorkflowResult {
                    status: WorkflowStatus::Failed,
                    message,
                    output: None,
                }
            }
        }
    }

    /// Take the dataset lock for an import.
    ///
    /// `Ok(None)` when locking is disabled.
    pub(crate) fn acquire_dataset_lock(
        &self,
        project: &ProjectId,
        dataset: &DatasetId,
    ) -> Result<Option<DatasetLock<'_>>, WorkflowError> {
        let manager = match &self.locking {
            Locking::Enabled(manager) => manager,
            Locking::Disabled => {
                warn!(%project, %dataset, "locking disabled; importing without a dataset lock");
                return Ok(None);
            }
        };
        if let Some(existing) = manager.check(project, dataset) {
            if !manager.is_stale(&existing) {
                return Err(WorkflowError::lock_held(&existing));
            }
        }
        manager
            .acquire_guard(project, dataset)?
            .map(Some)
            .ok_or(WorkflowError::LockUnavailable)
    }

    // =========================================================================
    // Read-only entry points
    // =========================================================================

    /// Initialize the mirror and summarize it.
    pub fn status(&self, project: &ProjectConfig) -> Result<CoreStatus, WorkflowError> {
        let _busy = self.begin()?;
        let mut workspace = self.workspace();
        workspace.init_workspace(project)?;
        let git_status = workspace.git().status()?;
        let state = workspace.get_state(project)?;
        let datasets = workspace.list_datasets(project)?;
        let active = workspace.active_remotes().cloned();
        Ok(CoreStatus {
            project_id: project.project_id.clone(),
            workspace_path: workspace.mirror(project).root().to_path_buf(),
            state,
            branch: git_status.branch,
            clean: git_status.clean,
            active_git_remote: active.as_ref().map(|a| a.git.clone()),
            active_dvc_remote: active.map(|a| a.content),
            dataset_count: datasets.len(),
        })
    }

    /// Datasets in the mirror, annotated with lock status.
    pub fn list_datasets(&self, project: &ProjectConfig) -> Result<Vec<DatasetInfo>, WorkflowError> {
        let _busy = self.begin()?;
        let mut workspace = self.workspace();
        workspace.init_workspace(project)?;
        let mut datasets = workspace.list_datasets(project)?;
        if let Locking::Enabled(manager) = &self.locking {
            for info in &mut datasets {
                if let Some(lock) = manager.check(&project.project_id, &info.config.dataset_id) {
                    if !manager.is_stale(&lock) {
                        info.is_locked = true;
                        info.locked_by = Some(lock.holder());
                    }
                }
            }
        }
        Ok(datasets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentError;
    use crate::engine::progress::RecordingSink;
    use crate::git::RejectReason;

    fn transient() -> GitError {
        GitError::CommandFailed {
            code: 128,
            message: "fatal: unable to access 'https://h/': Connection reset by peer".into(),
        }
    }

    mod retry_loop {
        use super::*;

        #[test]
        fn succeeds_after_transient_failure() {
            let mut sink = RecordingSink::new();
            let cancel = CancellationToken::new();
            let mut run = Run::new(&mut sink, &cancel);
            let mut calls = 0;

            let result = with_retry(&RetryPolicy::immediate(), &mut run, "Git pull", |_| {
                calls += 1;
                if calls == 1 {
                    Err(transient())
                } else {
                    Ok(())
                }
            });

            assert!(result.is_ok());
            assert_eq!(calls, 2);
            assert_eq!(sink.events.len(), 1);
            assert!(sink.events[0].0.starts_with("Git pull failed (fatal: unable to access"));
            assert!(sink.events[0].0.ends_with("(attempt 2/3)"));
            assert_eq!(sink.events[0].1, 0);
        }

        #[test]
        fn permanent_failure_is_not_retried() {
            let mut sink = RecordingSink::new();
            let cancel = CancellationToken::new();
            let mut run = Run::new(&mut sink, &cancel);
            let mut calls = 0;

            let result: Result<(), _> = with_retry(&RetryPolicy::immediate(), &mut run, "Git push", |_| {
                calls += 1;
                Err(GitError::PushRejected {
                    reason: RejectReason::Other,
                    message: "hook declined".into(),
                })
            });

            assert!(matches!(result, Err(WorkflowError::Git(GitError::PushRejected { .. }))));
            assert_eq!(calls, 1);
        }

        #[test]
        fn gives_up_after_budget() {
            let mut sink = RecordingSink::new();
            let cancel = CancellationToken::new();
            let mut run = Run::new(&mut sink, &cancel);
            let mut calls = 0;

            let result: Result<(), _> = with_retry(&RetryPolicy::immediate(), &mut run, "DVC pull", |_| {
                calls += 1;
                Err(ContentError::Timeout {
                    command: "dvc pull".into(),
                    seconds: 1,
                })
            });

            assert!(matches!(result, Err(WorkflowError::Content(ContentError::Timeout { .. }))));
            assert_eq!(calls, 3);
            assert_eq!(sink.events.len(), 2);
        }

        #[test]
        fn cancellation_stops_retrying() {
            let mut sink = RecordingSink::new();
            let cancel = CancellationToken::new();
            let mut calls = 0;
            let result: Result<(), _> = {
                let mut run = Run::new(&mut sink, &cancel);
                with_retry(&RetryPolicy::immediate(), &mut run, "Git pull", |r| {
                    calls += 1;
                    r.cancel_token().cancel();
                    Err(transient())
                })
            };
            assert!(matches!(result, Err(WorkflowError::Cancelled)));
            assert_eq!(calls, 1);
            assert!(sink.events.is_empty());
        }
    }

    mod outcome {
        use super::*;
        use crate::content::MockContent;
        use crate::core::identity::Identity;
        use crate::git::MockGit;

        fn orchestrator(root: &std::path::Path) -> SyncOrchestrator {
            let workspace = WorkspaceManager::new(
                root,
                Identity::new("ana", "ws-07"),
                Box::new(MockGit::new(root)),
                Box::new(MockContent::new(root)),
            );
            SyncOrchestrator::new(workspace, Locking::Disabled)
        }

        #[test]
        fn failure_after_interrupt_is_cancelled() {
            let temp = tempfile::TempDir::new().unwrap();
            let orch = orchestrator(temp.path());
            let mut sink = RecordingSink::new();
            let cancel = CancellationToken::new();

            let result: WorkflowResult = orch.execute("fetch", &mut sink, &cancel, |_, run| {
                run.cancel_token().cancel();
                Err(WorkflowError::Git(GitError::CommandFailed {
                    code: -1,
                    message: "git pull terminated by signal".into(),
                }))
            });

            assert_eq!(result.status, WorkflowStatus::Cancelled);
            assert_eq!(result.message, "Cancelled by user.");
            assert!(sink.errors.is_empty());
            assert!(!orch.is_busy());
        }

        #[test]
        fn failure_without_interrupt_is_reported() {
            let temp = tempfile::TempDir::new().unwrap();
            let orch = orchestrator(temp.path());
            let mut sink = RecordingSink::new();

            let result: WorkflowResult =
                orch.execute("fetch", &mut sink, &CancellationToken::new(), |_, _| {
                    Err(WorkflowError::Validation("bad folder".into()))
                });

            assert_eq!(result.status, WorkflowStatus::Failed);
            assert_eq!(sink.errors, vec!["bad folder".to_string()]);
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn lock_held_message_formats_time() {
            let lock = LockInfo {
                dataset_id: "cats".into(),
                username: "bo".into(),
                machine: "ws-02".into(),
                timestamp: "2024-05-06T07:08:09+00:00".into(),
                app_version: "0.3.1".into(),
                ttl_hours: 4.0,
            };
            let err = WorkflowError::lock_held(&lock);
            assert!(
                err.to_string()
                    .starts_with("Dataset locked by bo on ws-02 since 2024-05-06 07:08 UTC ("),
                "{err}"
            );
        }

        #[test]
        fn lock_held_message_shows_age() {
            let lock = LockInfo {
                dataset_id: "cats".into(),
                username: "bo".into(),
                machine: "ws-02".into(),
                timestamp: (Utc::now() - chrono::Duration::minutes(90)).to_rfc3339(),
                app_version: "0.3.1".into(),
                ttl_hours: 4.0,
            };
            assert!(WorkflowError::lock_held(&lock)
                .to_string()
                .ends_with(" (1.5h old)."));
        }

        #[test]
        fn lock_held_keeps_unreadable_timestamp() {
            let lock = LockInfo {
                dataset_id: "cats".into(),
                username: "bo".into(),
                machine: "ws-02".into(),
                timestamp: "yesterday".into(),
                app_version: "0.3.1".into(),
                ttl_hours: 4.0,
            };
            assert!(WorkflowError::lock_held(&lock)
                .to_string()
                .ends_with("since yesterday."));
        }

        #[test]
        fn result_flags() {
            let ok: WorkflowResult = WorkflowResult {
                status: WorkflowStatus::Succeeded,
                message: "done".into(),
                output: Some(()),
            };
            assert!(ok.is_success());
            assert!(!ok.is_cancelled());
        }
    }
}
