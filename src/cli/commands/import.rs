//! cli::commands::import
//!
//! Import a folder of images into a dataset and publish it.
//!
//! Dataset details come from the registry entry when there is one; flags
//! override them. A dataset the registry does not know is named after its
//! id.

use std::path::PathBuf;

use super::{finish, parse_dataset, Session};
use crate::core::model::DatasetConfig;
use crate::engine::{Context, ImportRequest};
use anyhow::{bail, Result};

/// Arguments of `datagest import`.
#[derive(Debug, Clone)]
pub struct ImportArgs {
    pub dataset: String,
    pub folder: PathBuf,
    pub name: Option<String>,
    pub description: Option<String>,
    pub source: Option<String>,
    pub note: Option<String>,
    pub replace: bool,
}

/// Run the import command.
pub fn import(ctx: &Context, args: ImportArgs) -> Result<()> {
    let id = parse_dataset(&args.dataset)?;
    if !args.folder.is_dir() {
        bail!("Image folder not found: {}", args.folder.display());
    }
    let session = Session::open(ctx)?;

    let mut dataset = session
        .project
        .dataset(&id)
        .cloned()
        .unwrap_or_else(|| DatasetConfig::from_id(id));
    if let Some(name) = args.name {
        dataset.name = name;
    }
    if let Some(description) = args.description {
        dataset.description = description;
    }
    if let Some(source) = args.source {
        dataset.source = source;
    }

    let request = ImportRequest {
        dataset,
        source: args.folder,
        note: args.note,
        replace: args.replace,
    };
    let result = session
        .run_workflow(|o, sink, cancel| o.import_dataset(&session.project, &request, sink, cancel));
    finish(result, session.verbosity)?;
    Ok(())
}
