//! cli::commands::status
//!
//! Show the project's mirror, its state and the active remotes.

use super::Session;
use crate::engine::{Context, CoreStatus};
use crate::ui::output;
use anyhow::Result;

/// Run the status command.
pub fn status(ctx: &Context) -> Result<()> {
    let session = Session::open(ctx)?;
    let status = session.orchestrator.status(&session.project)?;
    output::result(format_status(&status));
    Ok(())
}

pub fn format_status(status: &CoreStatus) -> String {
    let none = || "(none)".to_string();
    [
        format!("project:     {}", status.project_id),
        format!("workspace:   {}", status.workspace_path.display()),
        format!("state:       {}", status.state),
        format!(
            "branch:      {}",
            status.branch.clone().unwrap_or_else(|| "(detached)".to_string())
        ),
        format!("clean:       {}", if status.clean { "yes" } else { "no" }),
        format!(
            "git remote:  {}",
            status.active_git_remote.clone().unwrap_or_else(none)
        ),
        format!(
            "dvc remote:  {}",
            status.active_dvc_remote.clone().unwrap_or_else(none)
        ),
        format!("datasets:    {}", status.dataset_count),
    ]
    .join("\n")
}
