//! core::dataset
//!
//! Per-dataset files inside a mirror.
//!
//! - `dataset.yaml` - human-edited metadata, rewritten on every import
//! - `data.dvc` - content marker; its first `outs[].nfiles` is the tracked
//!   file count at that revision
//!
//! Reading metadata never fails: a missing, unparseable, or incomplete file
//! falls back to values derived from the directory name and is reported as
//! a [`MetadataIssue`] for the caller to log.

use std::fs;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::model::DatasetConfig;
use super::types::DatasetId;

/// Keys a complete `dataset.yaml` must carry.
pub const METADATA_REQUIRED_KEYS: &[&str] =
    &["dataset_id", "name", "description", "source", "created"];

/// Contents of `datasets/<id>/dataset.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub dataset_id: String,
    pub name: String,
    pub description: String,
    pub source: String,
    /// ISO-8601 time of the import that wrote this file.
    pub created: String,
    #[serde(default)]
    pub linked_models: Vec<String>,
    #[serde(default)]
    pub import_note: String,
}

impl DatasetMetadata {
    /// Metadata for an import of `config` happening at `now`.
    pub fn for_import(config: &DatasetConfig, note: Option<&str>, now: DateTime<Utc>) -> Self {
        let note = note
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Import into {}", config.name));
        Self {
            dataset_id: config.dataset_id.to_string(),
            name: config.name.clone(),
            description: config.description.clone(),
            source: config.source.clone(),
            created: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            linked_models: Vec::new(),
            import_note: note,
        }
    }

    /// Write as YAML to `path`.
    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        let text = serde_yaml::to_string(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, text)
    }
}

/// Why a `dataset.yaml` could not be used as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataIssue {
    Unreadable(String),
    InvalidYaml(String),
    MissingKeys(Vec<String>),
}

impl std::fmt::Display for MetadataIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataIssue::Unreadable(e) => write!(f, "unreadable: {e}"),
            MetadataIssue::InvalidYaml(e) => write!(f, "invalid YAML: {e}"),
            MetadataIssue::MissingKeys(keys) => write!(f, "missing keys: {}", keys.join(", ")),
        }
    }
}

/// Load the dataset config for the directory named `dir_id`.
///
/// A missing file is not an issue; it yields the directory defaults.
pub fn load_dataset_config(
    metadata_path: &Path,
    dir_id: &DatasetId,
) -> (DatasetConfig, Option<MetadataIssue>) {
    let defaults = DatasetConfig::from_id(dir_id.clone());
    if !metadata_path.exists() {
        return (defaults, None);
    }

    let text = match fs::read_to_string(metadata_path) {
        Ok(text) => text,
        Err(e) => return (defaults, Some(MetadataIssue::Unreadable(e.to_string()))),
    };

    let mut issue = None;
    let mapping = match serde_yaml::from_str::<serde_yaml::Value>(&text) {
        Ok(serde_yaml::Value::Mapping(map)) => map,
        Ok(_) => serde_yaml::Mapping::new(),
        Err(e) => {
            issue = Some(MetadataIssue::InvalidYaml(e.to_string()));
            serde_yaml::Mapping::new()
        }
    };

    let field = |key: &str| -> Option<String> {
        mapping.get(key).and_then(|v| match v {
            serde_yaml::Value::String(s) => Some(s.clone()),
            serde_yaml::Value::Number(n) => Some(n.to_string()),
            serde_yaml::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    };

    if issue.is_none() {
        let missing: Vec<String> = METADATA_REQUIRED_KEYS
            .iter()
            .filter(|k| !mapping.contains_key(*k))
            .map(|k| k.to_string())
            .collect();
        if !missing.is_empty() {
            issue = Some(MetadataIssue::MissingKeys(missing));
        }
    }

    let dataset_id = field("dataset_id")
        .and_then(|id| DatasetId::new(id).ok())
        .unwrap_or_else(|| dir_id.clone());

    let config = DatasetConfig {
        dataset_id,
        name: field("name").unwrap_or(defaults.name),
        description: field("description").unwrap_or_default(),
        source: field("source").unwrap_or_default(),
    };
    (config, issue)
}

/// The tracked file count recorded in a `data.dvc` marker.
///
/// Returns `None` when the text is not a marker or carries no count.
pub fn marker_nfiles(text: &str) -> Option<u64> {
    #[derive(Deserialize)]
    struct Marker {
        #[serde(default)]
        outs: Vec<Out>,
    }
    #[derive(Deserialize)]
    struct Out {
        nfiles: Option<u64>,
    }

    let marker: Marker = serde_yaml::from_str(text).ok()?;
    marker.outs.first().and_then(|o| o.nfiles)
}

/// Image counts added and removed between two revisions' markers.
///
/// Unreadable markers count as zero; if both are unreadable there is no
/// delta.
pub fn image_delta(current: Option<u64>, previous: Option<u64>) -> (u64, u64) {
    if current.is_none() && previous.is_none() {
        return (0, 0);
    }
    let current = current.unwrap_or(0) as i128;
    let previous = previous.unwrap_or(0) as i128;
    let delta = current - previous;
    (delta.max(0) as u64, (-delta).max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(s: &str) -> DatasetId {
        DatasetId::new(s).unwrap()
    }

    #[test]
    fn metadata_roundtrip_through_loader() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dataset.yaml");
        let config = DatasetConfig {
            dataset_id: id("cam"),
            name: "Camera".into(),
            description: "front".into(),
            source: "line 1".into(),
        };
        DatasetMetadata::for_import(&config, None, Utc::now())
            .write(&path)
            .unwrap();

        let (loaded, issue) = load_dataset_config(&path, &id("cam"));
        assert_eq!(loaded, config);
        assert!(issue.is_none());

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("import_note: Import into Camera"));
        assert!(text.contains("linked_models: []"));
    }

    #[test]
    fn missing_file_uses_directory_name() {
        let temp = TempDir::new().unwrap();
        let (config, issue) = load_dataset_config(&temp.path().join("dataset.yaml"), &id("raw"));
        assert_eq!(config, DatasetConfig::from_id(id("raw")));
        assert!(issue.is_none());
    }

    #[test]
    fn broken_yaml_falls_back_with_issue() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dataset.yaml");
        fs::write(&path, "name: [unterminated").unwrap();

        let (config, issue) = load_dataset_config(&path, &id("raw"));
        assert_eq!(config.name, "raw");
        assert!(matches!(issue, Some(MetadataIssue::InvalidYaml(_))));
    }

    #[test]
    fn partial_file_keeps_present_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dataset.yaml");
        fs::write(&path, "name: Pretty Name\nsource: 42\n").unwrap();

        let (config, issue) = load_dataset_config(&path, &id("raw"));
        assert_eq!(config.dataset_id.as_str(), "raw");
        assert_eq!(config.name, "Pretty Name");
        assert_eq!(config.source, "42");
        match issue {
            Some(MetadataIssue::MissingKeys(keys)) => {
                assert!(keys.contains(&"created".to_string()));
                assert!(!keys.contains(&"name".to_string()));
            }
            other => panic!("expected missing keys, got {other:?}"),
        }
    }

    #[test]
    fn nfiles_read_from_first_out() {
        let text = "outs:\n- md5: abc.dir\n  size: 1234\n  nfiles: 12\n  hash: md5\n  path: data\n";
        assert_eq!(marker_nfiles(text), Some(12));
        assert_eq!(marker_nfiles("outs: []\n"), None);
        assert_eq!(marker_nfiles("not: [a marker"), None);
        assert_eq!(marker_nfiles("outs:\n- path: data\n"), None);
    }

    #[test]
    fn delta_examples() {
        assert_eq!(image_delta(Some(12), Some(10)), (2, 0));
        assert_eq!(image_delta(Some(8), Some(10)), (0, 2));
        assert_eq!(image_delta(Some(10), Some(0)), (10, 0));
        assert_eq!(image_delta(None, None), (0, 0));
        assert_eq!(image_delta(None, Some(4)), (0, 4));
        assert_eq!(image_delta(Some(5), Some(5)), (0, 0));
    }
}
