//! cli::commands::setup
//!
//! Provision the shared store for a project. Runs on the storage side and
//! needs no client config or registry.

use std::path::PathBuf;

use crate::core::types::{DatasetId, ProjectId};
use crate::engine::Context;
use crate::server::{setup_shared_store, SetupRequest};
use crate::ui::output::{self, Verbosity};
use anyhow::{Context as _, Result};

/// Arguments of `datagest setup`.
#[derive(Debug, Clone)]
pub struct SetupArgs {
    pub base_path: PathBuf,
    pub project_id: String,
    pub project_name: String,
    pub datasets: Vec<String>,
    pub git_executable: String,
}

/// Run the setup command.
pub fn setup(ctx: &Context, args: SetupArgs) -> Result<()> {
    let project_id = ProjectId::new(args.project_id.trim())
        .with_context(|| format!("Invalid project id '{}'", args.project_id))?;
    let datasets = args
        .datasets
        .iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .map(|d| DatasetId::new(d).with_context(|| format!("Invalid dataset id '{d}'")))
        .collect::<Result<Vec<_>>>()?;

    let report = setup_shared_store(&SetupRequest {
        base: args.base_path,
        project_id,
        project_name: args.project_name,
        datasets,
        git_executable: args.git_executable,
    })
    .context("Shared store setup failed")?;

    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let layout = &report.layout;
    output::print("Shared store ready", verbosity);
    output::print(format!("Base path   : {}", layout.base.display()), verbosity);
    output::print(format!("Git remote  : {}", layout.git_remote.display()), verbosity);
    output::print(format!("DVC remote  : {}", layout.dvc_remote.display()), verbosity);
    output::print(format!("Locks folder: {}", layout.locks.display()), verbosity);
    output::print(format!("Registry    : {}", layout.registry.display()), verbosity);
    if !report.added_datasets.is_empty() {
        let added: Vec<&str> = report.added_datasets.iter().map(DatasetId::as_str).collect();
        output::print(format!("Registered  : {}", added.join(", ")), verbosity);
    }
    Ok(())
}
