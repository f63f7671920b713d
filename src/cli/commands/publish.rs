//! cli::commands::publish
//!
//! Commit local changes and push them to both remotes.
//!
//! # Example
//!
//! ```bash
//! datagest publish -m "Fix labels" --path datasets/street/dataset.yaml
//! ```

use super::{finish, parse_dataset, Session};
use crate::engine::{Context, PublishRequest};
use anyhow::{bail, Result};

/// Run the publish command.
pub fn publish(ctx: &Context, message: &str, dataset: Option<&str>, paths: Vec<String>) -> Result<()> {
    if message.trim().is_empty() {
        bail!("Commit message cannot be empty.");
    }
    let dataset = dataset.map(parse_dataset).transpose()?;
    let session = Session::open(ctx)?;

    let request = PublishRequest {
        message: message.to_string(),
        dataset,
        paths,
    };
    let result =
        session.run_workflow(|o, sink, cancel| o.publish(&session.project, &request, sink, cancel));
    finish(result, session.verbosity)?;
    Ok(())
}
