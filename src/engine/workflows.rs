//! engine::workflows
//!
//! The named multi-step workflows. Each one sequences primitive substrate
//! calls inside [`SyncOrchestrator::execute`].
//!
//! | Workflow | Phases |
//! |---|---|
//! | fetch | init -> dirty check -> pull metadata -> pull content -> checkout content |
//! | publish | init -> branch check -> stage -> commit -> rebase -> push content -> push metadata |
//! | import | init -> validate -> lock -> pull -> copy -> metadata -> track -> commit -> push |
//! | restore | init -> checkout revision -> checkout content |
//! | return to latest | init -> checkout main -> pull metadata -> pull content -> checkout content |
//! | history | init -> log -> image deltas |

use std::fs;
use std::path::PathBuf;

use chrono::Utc;

use super::history::populate_image_deltas;
use super::orchestrator::{with_retry, SyncOrchestrator, WorkflowError, WorkflowResult};
use super::progress::{CancellationToken, ProgressSink};
use crate::core::dataset::DatasetMetadata;
use crate::core::files::{clear_folder, copy_files, validate_image_folder};
use crate::core::model::{CommitInfo, DatasetConfig, ProjectConfig};
use crate::core::paths::MirrorPaths;
use crate::core::types::DatasetId;
use crate::git::{CommitOutcome, GitError, RejectReason};
use crate::workspace::MAIN_BRANCH;

/// Inputs to [`SyncOrchestrator::publish`].
#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    pub message: String,
    /// Track this dataset's content first and stage only its directory.
    pub dataset: Option<DatasetId>,
    /// Paths to stage when no dataset is given; empty means everything.
    pub paths: Vec<String>,
}

/// Inputs to [`SyncOrchestrator::import_dataset`].
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub dataset: DatasetConfig,
    pub source: PathBuf,
    /// Recorded as `import_note`; defaults to "Import into <name>".
    pub note: Option<String>,
    /// Clear the dataset's existing content before copying.
    pub replace: bool,
}

impl SyncOrchestrator {
    /// Bring the mirror up to the remote tip.
    pub fn fetch(
        &self,
        project: &ProjectConfig,
        allow_dirty: bool,
        sink: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> WorkflowResult {
        let policy = self.retry;
        self.execute("fetch", sink, cancel, |ws, run| {
            run.emit("Preparing workspace", 5)?;
            ws.init_workspace(project)?;
            run.check()?;

            let status = ws.git().status()?;
            if !status.clean && !allow_dirty {
                return Err(WorkflowError::Validation(
                    "Workspace has local changes. Commit or discard them before fetching latest.".into(),
                ));
            }

            run.emit("Pulling latest Git commits", 30)?;
            with_retry(&policy, run, "Git pull", |_| ws.git().pull(true))?;

            run.emit("Pulling latest DVC objects", 55)?;
            with_retry(&policy, run, "DVC pull", |r| {
                ws.content().pull(&mut |m, p| r.relay(m, p))
            })?;

            run.emit("Checking out data", 80)?;
            ws.content().checkout(&mut |m, p| run.relay(m, p))?;

            let branch = ws
                .git()
                .current_branch()?
                .unwrap_or_else(|| "detached".to_string());
            run.emit("Fetch complete", 100)?;
            Ok((format!("Workspace synced on {branch}."), ()))
        })
    }

    /// Commit local changes and push them to both remotes.
    pub fn publish(
        &self,
        project: &ProjectConfig,
        request: &PublishRequest,
        sink: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> WorkflowResult {
        let policy = self.retry;
        self.execute("publish", sink, cancel, |ws, run| {
            run.emit("Preparing workspace", 5)?;
            ws.init_workspace(project)?;
            run.check()?;

            let Some(branch) = ws.git().current_branch()? else {
                return Err(WorkflowError::Validation(
                    "Workspace is on a restored commit (detached HEAD). Return to latest before publishing."
                        .into(),
                ));
            };
            if branch != MAIN_BRANCH {
                run.emit("Switching to main", 10)?;
                ws.git().checkout(MAIN_BRANCH)?;
                run.check()?;
            }

            let mut stage = if request.paths.is_empty() {
                vec![".".to_string()]
            } else {
                request.paths.clone()
            };
            if let Some(dataset) = &request.dataset {
                run.emit("Tracking dataset changes with DVC", 18)?;
                ws.content()
                    .add(&[MirrorPaths::rel_data(dataset)], &mut |m, p| run.relay(m, p))?;
                stage = vec!["-A".to_string(), MirrorPaths::rel_dataset(dataset)];
            }

            run.emit("Staging files", 30)?;
            ws.git().add(&stage)?;
            run.check()?;

            run.emit("Creating commit", 45)?;
            if ws.git().commit(&request.message)? == CommitOutcome::NoChanges {
                run.emit("No changes to publish", 100)?;
                return Ok(("No local change detected.".to_string(), ()));
            }

            run.emit("Rebasing on latest main", 62)?;
            with_retry(&policy, run, "Git pull", |_| ws.git().pull(true))?;

            run.emit("Pushing DVC data", 78)?;
            with_retry(&policy, run, "DVC push", |r| {
                ws.content().push(&mut |m, p| r.relay(m, p))
            })?;

            run.emit("Pushing Git commit", 90)?;
            match with_retry(&policy, run, "Git push", |_| ws.git().push("origin", MAIN_BRANCH)) {
                Err(WorkflowError::Git(GitError::PushRejected {
                    reason: RejectReason::NonFastForward,
                    ..
                })) => {
                    run.emit("Remote moved, rebasing and retrying push", 94)?;
                    with_retry(&policy, run, "Git pull", |_| ws.git().pull(true))?;
                    with_retry(&policy, run, "Git push", |_| ws.git().push("origin", MAIN_BRANCH))?;
                }
                other => other?,
            }

            run.emit("Publish complete", 100)?;
            Ok(("Changes published.".to_string(), ()))
        })
    }

    /// Copy a folder of images into a dataset and publish it, under the
    /// dataset lock.
    pub fn import_dataset(
        &self,
        project: &ProjectConfig,
        request: &ImportRequest,
        sink: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> WorkflowResult {
        let policy = self.retry;
        self.execute("import", sink, cancel, |ws, run| {
            let dataset = &request.dataset;
            let id = &dataset.dataset_id;

            run.emit("Preparing workspace", 2)?;
            ws.init_workspace(project)?;

            run.emit("Validating image folder", 8)?;
            let tally = validate_image_folder(&request.source)?;

            run.emit("Acquiring dataset lock", 12)?;
            // Released on drop, on every exit path below.
            let _lock = self.acquire_dataset_lock(&project.project_id, id)?;

            run.emit("Synchronizing workspace", 20)?;
            with_retry(&policy, run, "Git pull", |_| ws.git().pull(true))?;
            with_retry(&policy, run, "DVC pull", |r| {
                ws.content().pull(&mut |m, p| r.relay(m, p))
            })?;
            run.check()?;

            let mirror = ws.mirror(project);
            let data_dir = mirror.data_dir(id);
            fs::create_dir_all(&data_dir).map_err(|source| WorkflowError::Io {
                context: format!("creating {}", data_dir.display()),
                source,
            })?;

            let mut removed = 0;
            if request.replace {
                run.emit("Cleaning existing dataset files", 30)?;
                removed = clear_folder(&data_dir)?;
            }

            run.emit("Copying image files", 40)?;
            copy_files(&request.source, &data_dir, &mut |m, p| run.relay(m, p))?;
            run.check()?;

            let metadata_path = mirror.metadata_file(id);
            DatasetMetadata::for_import(dataset, request.note.as_deref(), Utc::now())
                .write(&metadata_path)
                .map_err(|source| WorkflowError::Io {
                    context: format!("writing {}", metadata_path.display()),
                    source,
                })?;

            run.emit("Tracking data with DVC", 65)?;
            ws.content()
                .add(&[MirrorPaths::rel_data(id)], &mut |m, p| run.relay(m, p))?;
            run.check()?;

            run.emit("Creating commit", 80)?;
            let candidates = [
                (MirrorPaths::rel_marker(id), mirror.marker_file(id)),
                (MirrorPaths::rel_metadata(id), mirror.metadata_file(id)),
                (MirrorPaths::rel_dataset_gitignore(id), mirror.dataset_gitignore(id)),
                (".gitignore".to_string(), mirror.root_gitignore()),
            ];
            let stage: Vec<String> = candidates
                .into_iter()
                .filter(|(_, abs)| abs.exists())
                .map(|(rel, _)| rel)
                .collect();
            if stage.is_empty() {
                return Err(WorkflowError::Validation(
                    "No files available to stage for commit.".into(),
                ));
            }
            ws.git().add(&stage)?;

            let verb = if request.replace { "Replace" } else { "Import" };
            let message = format!("{verb}: {} images into {}", tally.count, dataset.name);
            let committed = ws.git().commit(&message)? == CommitOutcome::Committed;

            if committed {
                run.emit("Pushing data to DVC remote", 88)?;
                with_retry(&policy, run, "DVC push", |r| {
                    ws.content().push(&mut |m, p| r.relay(m, p))
                })?;
                run.emit("Pushing commit to Git remote", 95)?;
                with_retry(&policy, run, "Git push", |_| ws.git().push("origin", MAIN_BRANCH))?;
            } else {
                run.emit("No changes to push", 95)?;
            }

            run.emit("Import complete", 100)?;
            let summary = if request.replace {
                format!(
                    "Replaced dataset with {} images (removed {removed} previous files).",
                    tally.count
                )
            } else if committed {
                format!("Imported and published {} images.", tally.count)
            } else {
                "No dataset change detected; data already up to date.".to_string()
            };
            Ok((summary, ()))
        })
    }

    /// Put the mirror at a historical revision (detached).
    pub fn restore(
        &self,
        project: &ProjectConfig,
        revision: &str,
        sink: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> WorkflowResult {
        self.execute("restore", sink, cancel, |ws, run| {
            run.emit("Preparing workspace", 15)?;
            ws.init_workspace(project)?;
            run.check()?;

            run.emit("Checking out commit", 45)?;
            ws.git().checkout(revision)?;
            run.check()?;

            run.emit("Restoring files with DVC", 75)?;
            ws.content().checkout(&mut |m, p| run.relay(m, p))?;
            run.check()?;

            run.emit("Restore complete", 100)?;
            Ok((format!("Restored {revision}"), ()))
        })
    }

    /// Put the mirror back on main at the remote tip.
    pub fn return_to_latest(
        &self,
        project: &ProjectConfig,
        sink: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> WorkflowResult {
        let policy = self.retry;
        self.execute("return_to_latest", sink, cancel, |ws, run| {
            run.emit("Preparing workspace", 10)?;
            ws.init_workspace(project)?;
            run.check()?;

            run.emit("Checking out main", 30)?;
            ws.git().checkout(MAIN_BRANCH)?;
            run.check()?;

            run.emit("Pulling latest Git", 50)?;
            with_retry(&policy, run, "Git pull", |_| ws.git().pull(true))?;

            run.emit("Pulling latest DVC", 70)?;
            with_retry(&policy, run, "DVC pull", |r| {
                ws.content().pull(&mut |m, p| r.relay(m, p))
            })?;

            run.emit("Applying data checkout", 90)?;
            ws.content().checkout(&mut |m, p| run.relay(m, p))?;
            run.check()?;

            run.emit("Workspace on latest", 100)?;
            Ok(("Returned to latest main".to_string(), ()))
        })
    }

    /// Revisions touching a dataset, newest first, with image deltas.
    pub fn load_history(
        &self,
        project: &ProjectConfig,
        dataset: &DatasetId,
        max_count: usize,
        sink: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> WorkflowResult<Vec<CommitInfo>> {
        self.execute("history", sink, cancel, |ws, run| {
            run.emit("Preparing workspace", 10)?;
            ws.init_workspace(project)?;
            run.check()?;

            run.emit("Loading history", 60)?;
            let mut commits = ws
                .git()
                .log(Some(&MirrorPaths::rel_dataset(dataset)), max_count)?;
            run.check()?;

            run.emit("Analyzing image changes", 80)?;
            populate_image_deltas(ws.git(), dataset, &mut commits);

            run.emit("History loaded", 100)?;
            Ok((format!("Loaded {} commits.", commits.len()), commits))
        })
    }
}
