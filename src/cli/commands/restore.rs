//! cli::commands::restore
//!
//! Move the mirror to a historical revision and back.

use super::{finish, Session};
use crate::engine::Context;
use anyhow::{bail, Result};

/// Check out a historical revision (detached).
pub fn restore(ctx: &Context, revision: &str) -> Result<()> {
    let revision = revision.trim();
    if revision.is_empty() || revision.starts_with('-') {
        bail!("Invalid revision '{revision}'.");
    }
    let session = Session::open(ctx)?;
    let result =
        session.run_workflow(|o, sink, cancel| o.restore(&session.project, revision, sink, cancel));
    finish(result, session.verbosity)?;
    Ok(())
}

/// Return the mirror to the latest main.
pub fn latest(ctx: &Context) -> Result<()> {
    let session = Session::open(ctx)?;
    let result =
        session.run_workflow(|o, sink, cancel| o.return_to_latest(&session.project, sink, cancel));
    finish(result, session.verbosity)?;
    Ok(())
}
