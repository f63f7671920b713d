//! engine
//!
//! Composes the workspace, the dataset lock and the two substrates into
//! named workflows: fetch, publish, import, restore, return to latest and
//! history.
//!
//! # Architecture
//!
//! ```text
//! cli -> SyncOrchestrator -> WorkspaceManager -> MetadataClient / ContentClient
//!                         -> LockManager
//! ```
//!
//! # Invariants
//!
//! - At most one workflow runs per orchestrator; others get `Busy`
//! - Cancellation is polled before every phase and every substrate call
//! - Only transient network failures are retried
//! - An import holds its dataset lock until the workflow ends, on every path
//!
//! # Example
//!
//! ```ignore
//! use datagest::engine::{CancellationToken, Locking, NullSink, SyncOrchestrator};
//!
//! let orchestrator = SyncOrchestrator::new(workspace, Locking::Disabled);
//! let result = orchestrator.fetch(&project, false, &mut NullSink, &CancellationToken::new());
//! println!("{}", result.message);
//! ```

pub mod history;
pub mod orchestrator;
pub mod progress;
pub mod retry;
pub mod workflows;

pub use history::populate_image_deltas;
pub use orchestrator::{
    with_retry, CoreStatus, Locking, Run, SyncOrchestrator, WorkflowError, WorkflowResult,
    WorkflowStatus,
};
pub use progress::{CancellationToken, NullSink, ProgressSink, RecordingSink};
pub use retry::{is_transient_message, RetryClassify, RetryPolicy};
pub use workflows::{ImportRequest, PublishRequest};

use std::path::PathBuf;

/// Execution context for commands.
///
/// Global settings derived from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Explicit config file (`--config`).
    pub config: Option<PathBuf>,
    /// Project to operate on (`--project`).
    pub project: Option<String>,
    /// Debug logging enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    mod context {
        use super::*;

        #[test]
        fn default_values() {
            let ctx = Context::default();
            assert!(ctx.config.is_none());
            assert!(ctx.project.is_none());
            assert!(!ctx.debug);
            assert!(!ctx.quiet);
        }

        #[test]
        fn custom_values() {
            let ctx = Context {
                config: Some(PathBuf::from("/etc/datagest.toml")),
                project: Some("vision".into()),
                debug: true,
                quiet: true,
            };
            assert_eq!(ctx.config, Some(PathBuf::from("/etc/datagest.toml")));
            assert_eq!(ctx.project.as_deref(), Some("vision"));
            assert!(ctx.debug);
            assert!(ctx.quiet);
        }
    }

    mod re_exports {
        use super::*;

        #[test]
        fn sinks_accessible() {
            let _ = NullSink;
            let _ = RecordingSink::new();
            let _ = CancellationToken::new();
        }

        #[test]
        fn policy_accessible() {
            assert_eq!(RetryPolicy::default().max_attempts, 3);
            assert!(is_transient_message("Connection timed out"));
        }
    }
}
