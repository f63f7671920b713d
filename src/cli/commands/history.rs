//! cli::commands::history
//!
//! Show revisions that touched a dataset, newest first.

use super::{finish, parse_dataset, Session};
use crate::core::model::CommitInfo;
use crate::engine::Context;
use crate::ui::output;
use anyhow::Result;

/// Run the history command.
pub fn history(ctx: &Context, dataset: &str, max_count: usize) -> Result<()> {
    let id = parse_dataset(dataset)?;
    let session = Session::open(ctx)?;
    let result = session.run_workflow(|o, sink, cancel| {
        o.load_history(&session.project, &id, max_count, sink, cancel)
    });
    let commits = finish(result, session.verbosity)?.unwrap_or_default();

    if commits.is_empty() {
        output::print(format!("No history for dataset {id}."), session.verbosity);
    }
    for commit in &commits {
        output::result(format_commit(commit));
    }
    Ok(())
}

/// One history line: id, time, author, image delta, subject.
pub fn format_commit(commit: &CommitInfo) -> String {
    let subject = commit.message.lines().next().unwrap_or("");
    format!(
        "{}  {}  {:<16}  +{}/-{}  {}",
        commit.short_id,
        output::format_timestamp(&commit.timestamp),
        commit.author,
        commit.images_added,
        commit.images_removed,
        subject
    )
}
