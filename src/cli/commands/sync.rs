//! cli::commands::sync
//!
//! Fetch, then publish local changes.
//!
//! # Example
//!
//! ```bash
//! # Pull the latest, then publish anything changed locally
//! datagest sync -m "Relabel street set"
//!
//! # Only pull
//! datagest sync --fetch-only
//! ```

use super::{finish, parse_dataset, Session};
use crate::engine::{Context, PublishRequest};
use anyhow::Result;

/// Arguments of `datagest sync`.
#[derive(Debug, Clone)]
pub struct SyncArgs {
    pub allow_dirty: bool,
    pub fetch_only: bool,
    pub dataset: Option<String>,
    pub message: String,
    pub paths: Vec<String>,
}

/// Run the sync command.
pub fn sync(ctx: &Context, args: SyncArgs) -> Result<()> {
    let dataset = args.dataset.as_deref().map(parse_dataset).transpose()?;
    let session = Session::open(ctx)?;

    let fetched = session
        .run_workflow(|o, sink, cancel| o.fetch(&session.project, args.allow_dirty, sink, cancel));
    finish(fetched, session.verbosity)?;
    if args.fetch_only {
        return Ok(());
    }

    let request = PublishRequest {
        message: args.message,
        dataset,
        paths: args.paths,
    };
    let published =
        session.run_workflow(|o, sink, cancel| o.publish(&session.project, &request, sink, cancel));
    finish(published, session.verbosity)?;
    Ok(())
}
