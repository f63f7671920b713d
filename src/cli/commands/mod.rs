//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Opens a [`Session`] (config, registry project, orchestrator)
//! 3. Runs one orchestrator entry point and formats the result
//!
//! Handlers never call the substrates directly.

mod completion;
mod config_cmd;
mod datasets;
mod fetch;
mod history;
mod import;
mod lock;
mod publish;
mod restore;
mod setup;
mod status;
mod sync;

// Re-export command functions for testing and direct invocation
pub use completion::completion;
pub use config_cmd::{init as config_init, list as config_list, path as config_path};
pub use datasets::datasets;
pub use fetch::fetch;
pub use history::history;
pub use import::import;
pub use lock::{lock_status, unlock};
pub use publish::publish;
pub use restore::{latest, restore};
pub use setup::setup;
pub use status::status;
pub use sync::sync;

use crate::cli::args::{Command, ConfigAction, LockAction};
use crate::content::Dvc;
use crate::core::config::Config;
use crate::core::identity::Identity;
use crate::core::model::ProjectConfig;
use crate::core::ops::LockManager;
use crate::core::registry::{select_project, RegistryLoader};
use crate::core::types::DatasetId;
use crate::engine::{
    CancellationToken, Context, Locking, NullSink, ProgressSink, SyncOrchestrator, WorkflowResult,
    WorkflowStatus,
};
use crate::git::Git;
use crate::ui::output::{self, Verbosity};
use crate::ui::progress::TerminalProgress;
use crate::workspace::WorkspaceManager;
use anyhow::{bail, Context as _, Result};
use tracing::debug;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Status => status::status(ctx),
        Command::Datasets => datasets::datasets(ctx),
        Command::Fetch { allow_dirty } => fetch::fetch(ctx, allow_dirty),
        Command::Publish {
            message,
            dataset,
            paths,
        } => publish::publish(ctx, &message, dataset.as_deref(), paths),
        Command::Sync {
            allow_dirty,
            fetch_only,
            dataset,
            message,
            paths,
        } => sync::sync(
            ctx,
            sync::SyncArgs {
                allow_dirty,
                fetch_only,
                dataset,
                message,
                paths,
            },
        ),
        Command::Import {
            dataset,
            folder,
            name,
            description,
            source,
            note,
            replace,
        } => import::import(
            ctx,
            import::ImportArgs {
                dataset,
                folder,
                name,
                description,
                source,
                note,
                replace,
            },
        ),
        Command::History { dataset, max_count } => history::history(ctx, &dataset, max_count),
        Command::Restore { revision } => restore::restore(ctx, &revision),
        Command::Latest => restore::latest(ctx),
        Command::Lock { action } => match action {
            LockAction::Status { dataset } => lock::lock_status(ctx, &dataset),
            LockAction::Unlock { dataset, force } => lock::unlock(ctx, &dataset, force),
        },
        Command::Config { action } => match action {
            ConfigAction::List => config_cmd::list(ctx),
            ConfigAction::Path => config_cmd::path(ctx),
            ConfigAction::Init { force } => config_cmd::init(ctx, force),
        },
        Command::Setup {
            base_path,
            project_id,
            project_name,
            datasets,
            git_executable,
        } => setup::setup(
            ctx,
            setup::SetupArgs {
                base_path,
                project_id,
                project_name,
                datasets,
                git_executable,
            },
        ),
        Command::Completion { shell } => completion::completion(shell),
    }
}

/// Everything a workflow command needs, built from config and registry.
pub struct Session {
    pub config: Config,
    pub project: ProjectConfig,
    pub orchestrator: SyncOrchestrator,
    pub verbosity: Verbosity,
    /// Set by Ctrl-C.
    pub cancel: CancellationToken,
}

impl Session {
    /// Load config, pick the project, and wire up the real substrates.
    pub fn open(ctx: &Context) -> Result<Self> {
        let config = Config::load(ctx.config.as_deref()).context("Failed to load config")?;

        let mut registry = RegistryLoader::new(config.registry_sources());
        let projects = registry.load().context("Failed to load project registry")?;
        let project = select_project(&projects, ctx.project.as_deref())?.clone();

        let identity = Identity::from_env();
        let root = config.workspace_root();
        let git = Git::new(&root)
            .with_executable(config.git_executable())
            .with_timeout(config.git_timeout())
            .with_global_config(config.git_global_config());
        let dvc = Dvc::new(&root)
            .with_executable(config.dvc_executable())
            .with_timeout(config.dvc_timeout());
        let workspace = WorkspaceManager::new(root, identity.clone(), Box::new(git), Box::new(dvc));

        let locking = match config.locks_path() {
            Some(locks) => Locking::Enabled(
                LockManager::new(
                    locks,
                    identity,
                    config.lock_ttl_hours(),
                    env!("CARGO_PKG_VERSION"),
                )
                .with_admin_mode(config.admin_mode()),
            ),
            None => Locking::Disabled,
        };

        let cancel = CancellationToken::new();
        if let Err(e) = ctrlc::set_handler(interrupt_handler(cancel.clone())) {
            debug!(error = %e, "could not install Ctrl-C handler");
        }

        Ok(Self {
            config,
            project,
            orchestrator: SyncOrchestrator::new(workspace, locking),
            verbosity: Verbosity::from_flags(ctx.quiet, ctx.debug),
            cancel,
        })
    }

    /// Run a workflow with a terminal progress bar (unless quiet).
    pub fn run_workflow<T>(
        &self,
        workflow: impl FnOnce(&SyncOrchestrator, &mut dyn ProgressSink, &CancellationToken) -> WorkflowResult<T>,
    ) -> WorkflowResult<T> {
        if self.verbosity.shows_progress() {
            let mut bar = TerminalProgress::stderr();
            let result = workflow(&self.orchestrator, &mut bar, &self.cancel);
            bar.finish();
            result
        } else {
            workflow(&self.orchestrator, &mut NullSink, &self.cancel)
        }
    }

    /// The project's lock manager, or an error when locking is disabled.
    pub fn lock_manager(&self) -> Result<&LockManager> {
        match self.orchestrator.locking().manager() {
            Some(manager) => Ok(manager),
            None => bail!("Dataset locking is disabled: no locks_path is configured."),
        }
    }
}

/// First Ctrl-C cancels the running workflow; a second one exits at once.
fn interrupt_handler(cancel: CancellationToken) -> impl Fn() + Send + 'static {
    move || {
        if cancel.is_cancelled() {
            std::process::exit(130);
        }
        cancel.cancel();
    }
}

/// Print a workflow's message and return its output; failures become errors.
pub fn finish<T>(result: WorkflowResult<T>, verbosity: Verbosity) -> Result<Option<T>> {
    match result.status {
        WorkflowStatus::Succeeded => {
            output::print(&result.message, verbosity);
            Ok(result.output)
        }
        WorkflowStatus::Failed | WorkflowStatus::Cancelled => bail!(result.message),
    }
}

/// Parse a dataset id argument.
pub fn parse_dataset(id: &str) -> Result<DatasetId> {
    DatasetId::new(id).with_context(|| format!("Invalid dataset id '{id}'"))
}
