//! core::model
//!
//! Domain records shared by the workspace, the orchestrator, and the CLI.
//!
//! - [`ProjectConfig`] / [`DatasetConfig`] come from the registry and are
//!   immutable for the duration of a session.
//! - [`DatasetInfo`] is recomputed on demand by scanning a mirror.
//! - [`CommitInfo`] is produced by history queries and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{DatasetId, ProjectId};

/// One trackable dataset within a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub dataset_id: DatasetId,
    pub name: String,
    pub description: String,
    /// Free-form label describing where the data comes from.
    pub source: String,
}

impl DatasetConfig {
    /// Config derived from a dataset directory name alone.
    pub fn from_id(dataset_id: DatasetId) -> Self {
        Self {
            name: dataset_id.to_string(),
            dataset_id,
            description: String::new(),
            source: String::new(),
        }
    }
}

/// A dataset collection with one or more metadata/content remotes.
///
/// Field names follow the registry's JSON keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project_id: ProjectId,
    pub name: String,
    pub description: String,
    /// Primary metadata remote.
    pub git_remote: String,
    /// Primary content remote.
    pub dvc_remote: String,
    pub datasets: Vec<DatasetConfig>,
    /// Fallback metadata remotes, tried in order after the primary.
    #[serde(default)]
    pub git_remote_sources: Vec<String>,
    /// Fallback content remotes, tried in order after the primary.
    #[serde(default)]
    pub dvc_remote_sources: Vec<String>,
}

impl ProjectConfig {
    /// Metadata remotes in preference order, trimmed and de-duplicated.
    pub fn git_remote_candidates(&self) -> Vec<String> {
        candidates(&self.git_remote, &self.git_remote_sources)
    }

    /// Content remotes in preference order, trimmed and de-duplicated.
    pub fn dvc_remote_candidates(&self) -> Vec<String> {
        candidates(&self.dvc_remote, &self.dvc_remote_sources)
    }

    /// Find a registered dataset by id.
    pub fn dataset(&self, id: &DatasetId) -> Option<&DatasetConfig> {
        self.datasets.iter().find(|d| &d.dataset_id == id)
    }
}

fn candidates(primary: &str, fallbacks: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in std::iter::once(primary).chain(fallbacks.iter().map(String::as_str)) {
        let text = item.trim();
        if !text.is_empty() && !out.iter().any(|c| c == text) {
            out.push(text.to_string());
        }
    }
    out
}

/// Local state of a dataset's content in the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalState {
    /// No data directory present.
    NotDownloaded,
    /// Data present and matching the tracked content.
    Clean,
    /// The content substrate reports local modifications.
    Modified,
}

impl LocalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocalState::NotDownloaded => "not_downloaded",
            LocalState::Clean => "clean",
            LocalState::Modified => "modified",
        }
    }
}

impl std::fmt::Display for LocalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime view of a dataset's local state.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetInfo {
    pub config: DatasetConfig,
    pub file_count: u64,
    pub total_size_bytes: u64,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_author: Option<String>,
    pub is_locked: bool,
    /// `user@machine` of the lock holder, when locked.
    pub locked_by: Option<String>,
    pub local_state: LocalState,
}

/// One historical revision affecting a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub id: String,
    pub short_id: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub files_changed: usize,
    pub images_added: u64,
    pub images_removed: u64,
}
