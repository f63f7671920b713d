//! cli::commands::fetch
//!
//! Pull the latest metadata and content into the mirror.

use super::{finish, Session};
use crate::engine::Context;
use anyhow::Result;

/// Run the fetch command.
pub fn fetch(ctx: &Context, allow_dirty: bool) -> Result<()> {
    let session = Session::open(ctx)?;
    let result =
        session.run_workflow(|o, sink, cancel| o.fetch(&session.project, allow_dirty, sink, cancel));
    finish(result, session.verbosity)?;
    Ok(())
}
