//! core::paths
//!
//! Centralized path routing for mirror and lock storage locations.
//!
//! # Layout
//!
//! A mirror lives at `<workspace_root>/<project_id>/`:
//! - `.git/` - metadata substrate
//! - `.dvc/` - content substrate
//! - `datasets/<dataset_id>/dataset.yaml` - dataset metadata
//! - `datasets/<dataset_id>/data/` - tracked content
//! - `datasets/<dataset_id>/data.dvc` - content marker (carries `nfiles`)
//!
//! Locks live on shared storage at `<locks_root>/<project_id>/<dataset_id>.lock`.
//!
//! **Hard rule:** no code outside this module joins `"datasets"`, `"data"`
//! or `".lock"` onto a path by hand.
//!
//! # Example
//!
//! ```
//! use datagest::core::paths::MirrorPaths;
//! use datagest::core::types::DatasetId;
//! use std::path::PathBuf;
//!
//! let paths = MirrorPaths::new(PathBuf::from("/ws/vision"));
//! let ds = DatasetId::new("camera_1").unwrap();
//! assert_eq!(paths.data_dir(&ds), PathBuf::from("/ws/vision/datasets/camera_1/data"));
//! assert_eq!(MirrorPaths::rel_marker(&ds), "datasets/camera_1/data.dvc");
//! ```

use std::path::{Path, PathBuf};

use crate::core::types::{DatasetId, ProjectId};

/// Name of the directory holding all datasets inside a mirror.
pub const DATASETS_DIR: &str = "datasets";

/// Name of the per-dataset metadata file.
pub const DATASET_META_FILE: &str = "dataset.yaml";

/// Name of the per-dataset content directory.
pub const DATA_DIR: &str = "data";

/// Paths inside one project mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorPaths {
    root: PathBuf,
}

impl MirrorPaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Mirror for `project` under `workspace_root`.
    pub fn for_project(workspace_root: &Path, project: &ProjectId) -> Self {
        Self::new(workspace_root.join(project.as_str()))
    }

    /// The mirror root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/.git`
    pub fn git_dir(&self) -> PathBuf {
        self.root.join(".git")
    }

    /// `<root>/.dvc`
    pub fn dvc_dir(&self) -> PathBuf {
        self.root.join(".dvc")
    }

    /// `<root>/.gitignore`
    pub fn root_gitignore(&self) -> PathBuf {
        self.root.join(".gitignore")
    }

    /// `<root>/datasets`
    pub fn datasets_root(&self) -> PathBuf {
        self.root.join(DATASETS_DIR)
    }

    /// `<root>/datasets/<id>`
    pub fn dataset_dir(&self, id: &DatasetId) -> PathBuf {
        self.datasets_root().join(id.as_str())
    }

    /// `<root>/datasets/<id>/data`
    pub fn data_dir(&self, id: &DatasetId) -> PathBuf {
        self.dataset_dir(id).join(DATA_DIR)
    }

    /// `<root>/datasets/<id>/dataset.yaml`
    pub fn metadata_file(&self, id: &DatasetId) -> PathBuf {
        self.dataset_dir(id).join(DATASET_META_FILE)
    }

    /// `<root>/datasets/<id>/data.dvc`
    pub fn marker_file(&self, id: &DatasetId) -> PathBuf {
        self.dataset_dir(id).join(format!("{DATA_DIR}.dvc"))
    }

    /// `<root>/datasets/<id>/.gitignore`
    pub fn dataset_gitignore(&self, id: &DatasetId) -> PathBuf {
        self.dataset_dir(id).join(".gitignore")
    }

    // =========================================================================
    // Mirror-relative paths, as passed to the substrate clients
    // =========================================================================

    /// `datasets/<id>`
    pub fn rel_dataset(id: &DatasetId) -> String {
        format!("{DATASETS_DIR}/{id}")
    }

    /// `datasets/<id>/data`
    pub fn rel_data(id: &DatasetId) -> String {
        format!("{DATASETS_DIR}/{id}/{DATA_DIR}")
    }

    /// `datasets/<id>/data.dvc`
    pub fn rel_marker(id: &DatasetId) -> String {
        format!("{DATASETS_DIR}/{id}/{DATA_DIR}.dvc")
    }

    /// `datasets/<id>/dataset.yaml`
    pub fn rel_metadata(id: &DatasetId) -> String {
        format!("{DATASETS_DIR}/{id}/{DATASET_META_FILE}")
    }

    /// `datasets/<id>/.gitignore`
    pub fn rel_dataset_gitignore(id: &DatasetId) -> String {
        format!("{DATASETS_DIR}/{id}/.gitignore")
    }
}

/// Path of the lock file for one dataset.
///
/// This is `<locks_root>/<project_id>/<dataset_id>.lock`.
pub fn lock_file(locks_root: &Path, project: &ProjectId, dataset: &DatasetId) -> PathBuf {
    locks_root
        .join(project.as_str())
        .join(format!("{}.lock", dataset.as_str()))
}
