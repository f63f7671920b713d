//! engine::history
//!
//! Image deltas for dataset history, derived from the `nfiles` count in
//! each revision's `data.dvc` marker and its first parent's.

use tracing::debug;

use crate::core::dataset::{image_delta, marker_nfiles};
use crate::core::model::CommitInfo;
use crate::core::paths::MirrorPaths;
use crate::core::types::DatasetId;
use crate::git::MetadataClient;

/// Fill `images_added` / `images_removed` on every commit.
///
/// Lookups that fail are treated as a missing marker; history is never
/// refused because one revision is unreadable.
pub fn populate_image_deltas(git: &dyn MetadataClient, dataset: &DatasetId, commits: &mut [CommitInfo]) {
    let marker = MirrorPaths::rel_marker(dataset);
    let nfiles_at = |rev: &str| -> Option<u64> {
        match git.show_file(rev, &marker) {
            Ok(text) => text.as_deref().and_then(marker_nfiles),
            Err(e) => {
                debug!(rev, error = %e, "marker lookup failed");
                None
            }
        }
    };

    for commit in commits.iter_mut() {
        let current = nfiles_at(&commit.id);
        let parent = git.first_parent(&commit.id).unwrap_or_else(|e| {
            debug!(rev = %commit.id, error = %e, "parent lookup failed");
            None
        });
        // A root commit starts from zero images.
        let previous = match parent {
            Some(parent) => nfiles_at(&parent),
            None => Some(0),
        };
        let (added, removed) = image_delta(current, previous);
        commit.images_added = added;
        commit.images_removed = removed;
    }
}
