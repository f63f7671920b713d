//! content::traits
//!
//! Content-substrate capability: tracking large binary files through
//! content-addressed pointers synced to a separate remote.
//!
//! # Progress
//!
//! Long-running operations take a progress callback `(label, percent)`.
//! Returning `false` from it asks the client to stop; the operation then
//! fails with [`ContentError::Aborted`].

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::process::ProcessError;

/// Errors from content-substrate operations.
#[derive(Debug, Error)]
pub enum ContentError {
    /// The command exited non-zero.
    #[error("{message}")]
    CommandFailed {
        /// Exit code
        code: i32,
        /// stderr, else stdout, else a generic text
        message: String,
    },

    /// The command ran past its deadline.
    #[error("dvc command timed out after {seconds}s: {command}")]
    Timeout { command: String, seconds: u64 },

    /// The binary could not be run at all.
    #[error("failed to run dvc: {message}")]
    Spawn { message: String },

    /// The progress callback asked to stop.
    #[error("content operation aborted")]
    Aborted,

    /// Local filesystem failure while preparing or repairing state.
    #[error("content I/O error: {message}")]
    Io { message: String },
}

impl From<ProcessError> for ContentError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Timeout { command, after } => ContentError::Timeout {
                command,
                seconds: after.as_secs(),
            },
            ProcessError::Spawn { program, source } => ContentError::Spawn {
                message: format!("{program}: {source}"),
            },
            ProcessError::Aborted { .. } => ContentError::Aborted,
            ProcessError::Wait { command, source } => ContentError::Io {
                message: format!("{command}: {source}"),
            },
        }
    }
}

/// Progress callback: `(label, percent)`; return `false` to abort.
pub type ProgressFn<'a> = dyn FnMut(&str, u8) -> bool + 'a;

/// Content-substrate capability.
///
/// Every operation runs in the bound working directory.
pub trait ContentClient: Send {
    /// The mirror this client operates on.
    fn workdir(&self) -> &Path;

    /// Rebind the client to another mirror.
    fn set_workdir(&mut self, workdir: PathBuf);

    /// Initialize the substrate inside the mirror.
    fn init(&self) -> Result<(), ContentError>;

    /// Start tracking `paths` (relative to the mirror).
    fn add(&self, paths: &[String], progress: &mut ProgressFn<'_>) -> Result<(), ContentError>;

    /// Upload tracked content to the default remote.
    fn push(&self, progress: &mut ProgressFn<'_>) -> Result<(), ContentError>;

    /// Download content for the checked-out revision.
    fn pull(&self, progress: &mut ProgressFn<'_>) -> Result<(), ContentError>;

    /// Materialize tracked content from the local cache.
    fn checkout(&self, progress: &mut ProgressFn<'_>) -> Result<(), ContentError>;

    /// Human-readable status; lists locally modified tracked paths.
    fn status(&self) -> Result<String, ContentError>;

    /// Point the default remote `name` at `url`, creating it if needed.
    fn set_default_remote(&self, name: &str, url: &str) -> Result<(), ContentError>;
}
