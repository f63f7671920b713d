//! cli
//!
//! Command-line interface layer for datagest.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install the log subscriber
//! - Delegate to command handlers
//! - Does NOT touch mirrors, remotes, or locks directly
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to the
//! [`crate::engine`] for execution. Every mirror change flows through the
//! orchestrator's workflows.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use crate::core::config::Config;
use crate::engine::{self, Context};
use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let ctx = engine::Context {
        config: cli.config.clone(),
        project: cli.project.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
    };

    // A broken config is reported by the command that needs it.
    let configured = Config::load(ctx.config.as_deref())
        .map(|c| c.log_level().to_string())
        .unwrap_or_else(|_| "info".to_string());
    init_tracing(&ctx, &configured);

    commands::dispatch(cli.command, &ctx)
}

/// Default filter directive: `--debug`, else `--quiet`, else the configured level.
pub fn default_filter(ctx: &Context, configured: &str) -> String {
    if ctx.debug {
        "debug".to_string()
    } else if ctx.quiet {
        "error".to_string()
    } else {
        configured.to_string()
    }
}

/// Install the stderr log subscriber. `RUST_LOG` wins over everything.
fn init_tracing(ctx: &Context, configured: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(ctx, configured)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
