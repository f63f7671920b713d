//! core::registry
//!
//! The shared project registry: which projects exist, where their remotes
//! live, and which datasets they contain.
//!
//! # Format
//!
//! ```json
//! {
//!   "version": "1",
//!   "projects": [
//!     {
//!       "project_id": "vision",
//!       "name": "Vision",
//!       "description": "",
//!       "git_remote": "/mnt/projects/vision/repo.git",
//!       "dvc_remote": "/mnt/projects/vision/storage",
//!       "git_remote_sources": ["ssh://backup/vision.git"],
//!       "datasets": [
//!         { "dataset_id": "cam", "name": "Camera", "description": "", "source": "line 1" }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Missing keys are reported per project and per dataset so that a broken
//! registry entry can be located without reading the whole file.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use super::model::{DatasetConfig, ProjectConfig};
use super::types::{DatasetId, ProjectId};

const REGISTRY_REQUIRED_KEYS: &[&str] = &["version", "projects"];
const PROJECT_REQUIRED_KEYS: &[&str] = &[
    "project_id",
    "name",
    "description",
    "git_remote",
    "dvc_remote",
    "datasets",
];
const DATASET_REQUIRED_KEYS: &[&str] = &["dataset_id", "name", "description", "source"];

/// Errors from registry loading and project selection.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no registry source configured")]
    NoSources,

    #[error("registry not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read registry '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write registry '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid registry JSON in '{path}': {message}")]
    Json { path: PathBuf, message: String },

    #[error("registry missing keys: {0:?}")]
    MissingKeys(Vec<String>),

    #[error("project {project} missing keys: {keys:?}")]
    ProjectMissingKeys { project: String, keys: Vec<String> },

    #[error("dataset in project {project} missing keys: {keys:?}")]
    DatasetMissingKeys { project: String, keys: Vec<String> },

    #[error("invalid registry entry: {0}")]
    Invalid(String),

    #[error("no registry source could be loaded: {0}")]
    AllSourcesFailed(String),

    #[error("unknown project '{requested}' (available: {available})")]
    UnknownProject { requested: String, available: String },

    #[error("registry contains no projects")]
    NoProjects,

    #[error("several projects registered, choose one with --project: {0}")]
    Ambiguous(String),
}

/// A parsed registry file.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrySnapshot {
    pub version: String,
    pub projects: Vec<ProjectConfig>,
    /// File the snapshot was read from.
    pub source: PathBuf,
}

/// Loads the registry from the first readable source and caches it.
#[derive(Debug)]
pub struct RegistryLoader {
    sources: Vec<PathBuf>,
    cached: Option<RegistrySnapshot>,
}

impl RegistryLoader {
    pub fn new(sources: Vec<PathBuf>) -> Self {
        Self {
            sources,
            cached: None,
        }
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Projects from the cached snapshot, loading it on first use.
    pub fn load(&mut self) -> Result<Vec<ProjectConfig>, RegistryError> {
        if let Some(snapshot) = &self.cached {
            return Ok(snapshot.projects.clone());
        }
        self.reload()
    }

    /// Re-read the registry, bypassing the cache.
    ///
    /// Sources are tried in order; the first one that parses wins. When all
    /// fail, the error lists each source with its failure.
    pub fn reload(&mut self) -> Result<Vec<ProjectConfig>, RegistryError> {
        self.cached = None;
        if self.sources.is_empty() {
            return Err(RegistryError::NoSources);
        }

        let mut failures = Vec::new();
        for source in &self.sources {
            match read_registry(source) {
                Ok(snapshot) => {
                    debug!(source = %source.display(), projects = snapshot.projects.len(), "loaded registry");
                    let projects = snapshot.projects.clone();
                    self.cached = Some(snapshot);
                    return Ok(projects);
                }
                Err(e) => {
                    warn!(source = %source.display(), error = %e, "registry source unusable");
                    failures.push((source.clone(), e));
                }
            }
        }

        if failures.len() == 1 {
            if let Some((_, err)) = failures.pop() {
                return Err(err);
            }
        }
        let detail = failures
            .iter()
            .map(|(path, e)| format!("{}: {}", path.display(), e))
            .collect::<Vec<_>>()
            .join("; ");
        Err(RegistryError::AllSourcesFailed(detail))
    }

    /// The snapshot currently cached, if any.
    pub fn snapshot(&self) -> Option<&RegistrySnapshot> {
        self.cached.as_ref()
    }
}

/// Read and validate one registry file.
pub fn read_registry(path: &Path) -> Result<RegistrySnapshot, RegistryError> {
    if !path.exists() {
        return Err(RegistryError::NotFound(path.to_path_buf()));
    }
    let text = fs::read_to_string(path).map_err(|source| RegistryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: Value = serde_json::from_str(&text).map_err(|e| RegistryError::Json {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let mut snapshot = parse_registry(&raw)?;
    snapshot.source = path.to_path_buf();
    Ok(snapshot)
}

/// Validate and convert a parsed registry document.
pub fn parse_registry(raw: &Value) -> Result<RegistrySnapshot, RegistryError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| RegistryError::Invalid("registry must be a JSON object".into()))?;

    let missing = missing_keys(obj, REGISTRY_REQUIRED_KEYS);
    if !missing.is_empty() {
        return Err(RegistryError::MissingKeys(missing));
    }

    let projects = obj
        .get("projects")
        .and_then(Value::as_array)
        .ok_or_else(|| RegistryError::Invalid("'projects' must be a list".into()))?
        .iter()
        .map(parse_project)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RegistrySnapshot {
        version: text_of(obj.get("version")),
        projects,
        source: PathBuf::new(),
    })
}

fn parse_project(raw: &Value) -> Result<ProjectConfig, RegistryError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| RegistryError::Invalid("project entry must be an object".into()))?;
    let label = obj
        .get("project_id")
        .map(|v| text_of(Some(v)))
        .unwrap_or_else(|| "<unknown>".to_string());

    let missing = missing_keys(obj, PROJECT_REQUIRED_KEYS);
    if !missing.is_empty() {
        return Err(RegistryError::ProjectMissingKeys {
            project: label,
            keys: missing,
        });
    }

    let project_id = ProjectId::new(text_of(obj.get("project_id")))
        .map_err(|e| RegistryError::Invalid(e.to_string()))?;

    let datasets = obj
        .get("datasets")
        .and_then(Value::as_array)
        .ok_or_else(|| RegistryError::Invalid(format!("project {label} 'datasets' must be a list")))?
        .iter()
        .map(|ds| parse_dataset(&label, ds))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ProjectConfig {
        project_id,
        name: text_of(obj.get("name")),
        description: text_of(obj.get("description")),
        git_remote: text_of(obj.get("git_remote")),
        dvc_remote: text_of(obj.get("dvc_remote")),
        datasets,
        git_remote_sources: string_list(obj, "git_remote_sources", &label)?,
        dvc_remote_sources: string_list(obj, "dvc_remote_sources", &label)?,
    })
}

fn parse_dataset(project: &str, raw: &Value) -> Result<DatasetConfig, RegistryError> {
    let obj = raw.as_object().ok_or_else(|| {
        RegistryError::Invalid(format!("dataset in project {project} must be an object"))
    })?;

    let missing = missing_keys(obj, DATASET_REQUIRED_KEYS);
    if !missing.is_empty() {
        return Err(RegistryError::DatasetMissingKeys {
            project: project.to_string(),
            keys: missing,
        });
    }

    let dataset_id = DatasetId::new(text_of(obj.get("dataset_id")))
        .map_err(|e| RegistryError::Invalid(format!("project {project}: {e}")))?;

    Ok(DatasetConfig {
        dataset_id,
        name: text_of(obj.get("name")),
        description: text_of(obj.get("description")),
        source: text_of(obj.get("source")),
    })
}

fn missing_keys(obj: &Map<String, Value>, required: &[&str]) -> Vec<String> {
    let mut missing: Vec<String> = required
        .iter()
        .filter(|k| !obj.contains_key(**k))
        .map(|k| k.to_string())
        .collect();
    missing.sort();
    missing
}

/// Render a scalar the way it reads in the file; `null` becomes empty.
fn text_of(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn string_list(
    obj: &Map<String, Value>,
    key: &str,
    project: &str,
) -> Result<Vec<String>, RegistryError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items
            .iter()
            .map(|v| text_of(Some(v)))
            .filter(|s| !s.trim().is_empty())
            .collect()),
        Some(_) => Err(RegistryError::Invalid(format!(
            "project {project} field '{key}' must be a list"
        ))),
    }
}

/// Version written into a registry created from scratch.
pub const REGISTRY_VERSION: &str = "1";

/// A project as an administrator registers it.
#[derive(Debug, Clone)]
pub struct ProjectEntry {
    pub project_id: ProjectId,
    pub name: String,
    pub git_remote: String,
    pub dvc_remote: String,
    pub datasets: Vec<DatasetId>,
}

/// An empty registry document.
pub fn empty_registry() -> Value {
    serde_json::json!({ "version": REGISTRY_VERSION, "projects": [] })
}

/// Add or update `entry` in a registry document.
///
/// An existing project keeps its datasets and description; its name and
/// remotes are replaced and unknown datasets are appended. Returns the
/// ids of the datasets that were added.
pub fn upsert_project(registry: &mut Value, entry: &ProjectEntry) -> Result<Vec<DatasetId>, RegistryError> {
    let obj = registry
        .as_object_mut()
        .ok_or_else(|| RegistryError::Invalid("registry must be a JSON object".into()))?;
    obj.entry("version")
        .or_insert_with(|| Value::String(REGISTRY_VERSION.into()));
    let projects = obj
        .entry("projects")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| RegistryError::Invalid("'projects' must be a list".into()))?;

    let id = entry.project_id.as_str();
    let existing = projects
        .iter_mut()
        .filter_map(Value::as_object_mut)
        .find(|p| p.get("project_id").and_then(Value::as_str) == Some(id));

    let Some(project) = existing else {
        let datasets: Vec<Value> = entry
            .datasets
            .iter()
            .map(|ds| dataset_entry(&entry.project_id, ds))
            .collect();
        projects.push(serde_json::json!({
            "project_id": id,
            "name": entry.name,
            "description": format!("Project {}", entry.name),
            "git_remote": entry.git_remote,
            "dvc_remote": entry.dvc_remote,
            "datasets": datasets,
        }));
        return Ok(entry.datasets.clone());
    };

    project.insert("name".into(), Value::String(entry.name.clone()));
    project.insert("git_remote".into(), Value::String(entry.git_remote.clone()));
    project.insert("dvc_remote".into(), Value::String(entry.dvc_remote.clone()));
    project
        .entry("description")
        .or_insert_with(|| Value::String(String::new()));
    let datasets = project
        .entry("datasets")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| RegistryError::Invalid(format!("project {id} 'datasets' must be a list")))?;

    let mut added = Vec::new();
    for ds in &entry.datasets {
        let known = datasets
            .iter()
            .any(|d| d.get("dataset_id").and_then(Value::as_str) == Some(ds.as_str()));
        if !known {
            datasets.push(dataset_entry(&entry.project_id, ds));
            added.push(ds.clone());
        }
    }
    Ok(added)
}

/// `street_scenes` is registered as "Street Scenes".
fn dataset_entry(project: &ProjectId, dataset: &DatasetId) -> Value {
    let name = dataset
        .as_str()
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ");
    serde_json::json!({
        "dataset_id": dataset.as_str(),
        "name": name,
        "description": format!("Dataset {dataset} for {project}"),
        "source": "",
    })
}

/// Read a registry document for editing; a missing file is an empty one.
pub fn read_registry_document(path: &Path) -> Result<Value, RegistryError> {
    if !path.exists() {
        return Ok(empty_registry());
    }
    let text = fs::read_to_string(path).map_err(|source| RegistryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|e| RegistryError::Json {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Write a registry document atomically (temp file, then rename).
pub fn write_registry(path: &Path, registry: &Value) -> Result<(), RegistryError> {
    let write_err = |source| RegistryError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let text = serde_json::to_string_pretty(registry)
        .map_err(|e| RegistryError::Invalid(e.to_string()))?;
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, text).map_err(write_err)?;
    fs::rename(&temp_path, path).map_err(write_err)?;
    Ok(())
}

/// Pick the project to operate on.
///
/// An explicit id must exist. Without one, a registry with exactly one
/// project selects it; otherwise the available ids are listed.
pub fn select_project<'a>(
    projects: &'a [ProjectConfig],
    requested: Option<&str>,
) -> Result<&'a ProjectConfig, RegistryError> {
    let available = || {
        projects
            .iter()
            .map(|p| p.project_id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    if let Some(id) = requested {
        return projects
            .iter()
            .find(|p| p.project_id.as_str() == id)
            .ok_or_else(|| RegistryError::UnknownProject {
                requested: id.to_string(),
                available: available(),
            });
    }

    match projects {
        [] => Err(RegistryError::NoProjects),
        [only] => Ok(only),
        _ => Err(RegistryError::Ambiguous(available())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> Value {
        json!({
            "version": "1",
            "projects": [{
                "project_id": "vision",
                "name": "Vision",
                "description": "cameras",
                "git_remote": "/mnt/p/vision.git",
                "dvc_remote": "/mnt/p/storage",
                "git_remote_sources": ["ssh://backup/vision.git", " "],
                "datasets": [
                    {"dataset_id": "cam", "name": "Camera", "description": "", "source": "line 1"}
                ]
            }]
        })
    }

    #[test]
    fn parses_projects_and_datasets() {
        let snapshot = parse_registry(&sample()).unwrap();
        assert_eq!(snapshot.version, "1");
        let project = &snapshot.projects[0];
        assert_eq!(project.project_id.as_str(), "vision");
        assert_eq!(project.git_remote_sources, vec!["ssh://backup/vision.git"]);
        assert!(project.dvc_remote_sources.is_empty());
        assert_eq!(project.datasets[0].dataset_id.as_str(), "cam");
        assert_eq!(project.datasets[0].source, "line 1");
    }

    #[test]
    fn numeric_version_is_accepted() {
        let mut raw = sample();
        raw["version"] = json!(2);
        assert_eq!(parse_registry(&raw).unwrap().version, "2");
    }

    #[test]
    fn missing_registry_keys_reported() {
        let err = parse_registry(&json!({"projects": []})).unwrap_err();
        assert!(matches!(err, RegistryError::MissingKeys(ref k) if k == &vec!["version".to_string()]));
    }

    #[test]
    fn missing_project_keys_name_the_project() {
        let mut raw = sample();
        raw["projects"][0].as_object_mut().unwrap().remove("dvc_remote");
        let err = parse_registry(&raw).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("vision"));
        assert!(text.contains("dvc_remote"));
    }

    #[test]
    fn missing_dataset_keys_reported() {
        let mut raw = sample();
        raw["projects"][0]["datasets"][0]
            .as_object_mut()
            .unwrap()
            .remove("source");
        assert!(matches!(
            parse_registry(&raw),
            Err(RegistryError::DatasetMissingKeys { .. })
        ));
    }

    #[test]
    fn remote_sources_must_be_list() {
        let mut raw = sample();
        raw["projects"][0]["dvc_remote_sources"] = json!("not-a-list");
        assert!(matches!(parse_registry(&raw), Err(RegistryError::Invalid(_))));
    }

    #[test]
    fn loader_falls_back_to_next_source_and_caches() {
        let temp = TempDir::new().unwrap();
        let good = temp.path().join("registry.json");
        fs::write(&good, serde_json::to_string(&sample()).unwrap()).unwrap();

        let mut loader = RegistryLoader::new(vec![temp.path().join("missing.json"), good.clone()]);
        let projects = loader.load().unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(loader.snapshot().unwrap().source, good);

        // Cached: deleting the file does not affect load().
        fs::remove_file(&good).unwrap();
        assert_eq!(loader.load().unwrap().len(), 1);
        assert!(loader.reload().is_err());
    }

    #[test]
    fn all_sources_failing_lists_each() {
        let temp = TempDir::new().unwrap();
        let bad = temp.path().join("bad.json");
        fs::write(&bad, "{ nope").unwrap();

        let mut loader = RegistryLoader::new(vec![temp.path().join("missing.json"), bad]);
        let err = loader.load().unwrap_err();
        let text = err.to_string();
        assert!(text.contains("missing.json"));
        assert!(text.contains("bad.json"));
    }

    #[test]
    fn no_sources_is_an_error() {
        let mut loader = RegistryLoader::new(vec![]);
        assert!(matches!(loader.load(), Err(RegistryError::NoSources)));
    }

    mod selection {
        use super::*;

        fn projects(ids: &[&str]) -> Vec<ProjectConfig> {
            ids.iter()
                .map(|id| ProjectConfig {
                    project_id: ProjectId::new(*id).unwrap(),
                    name: id.to_string(),
                    description: String::new(),
                    git_remote: String::new(),
                    dvc_remote: String::new(),
                    datasets: vec![],
                    git_remote_sources: vec![],
                    dvc_remote_sources: vec![],
                })
                .collect()
        }

        #[test]
        fn single_project_auto_selected() {
            let list = projects(&["only"]);
            assert_eq!(select_project(&list, None).unwrap().project_id.as_str(), "only");
        }

        #[test]
        fn several_projects_require_choice() {
            let list = projects(&["a", "b"]);
            let err = select_project(&list, None).unwrap_err();
            assert!(err.to_string().contains("a, b"));
            assert_eq!(select_project(&list, Some("b")).unwrap().name, "b");
        }

        #[test]
        fn unknown_project_lists_available() {
            let list = projects(&["a"]);
            let err = select_project(&list, Some("zzz")).unwrap_err();
            assert!(matches!(err, RegistryError::UnknownProject { .. }));
            assert!(err.to_string().contains("zzz"));
        }

        #[test]
        fn empty_registry() {
            assert!(matches!(
                select_project(&[], None),
                Err(RegistryError::NoProjects)
            ));
        }
    }

    mod editing {
        use super::*;

        fn entry(name: &str, remote: &str, datasets: &[&str]) -> ProjectEntry {
            ProjectEntry {
                project_id: ProjectId::new("vision").unwrap(),
                name: name.into(),
                git_remote: remote.into(),
                dvc_remote: "/srv/share/dvc_remote/vision".into(),
                datasets: datasets.iter().map(|d| DatasetId::new(*d).unwrap()).collect(),
            }
        }

        #[test]
        fn new_project_is_appended() {
            let mut doc = empty_registry();
            let added = upsert_project(&mut doc, &entry("Vision", "/srv/a.git", &["street", "night_shots"]))
                .unwrap();
            assert_eq!(added.len(), 2);

            let snapshot = parse_registry(&doc).unwrap();
            assert_eq!(snapshot.version, "1");
            let project = &snapshot.projects[0];
            assert_eq!(project.description, "Project Vision");
            assert_eq!(project.datasets[1].name, "Night Shots");
            assert_eq!(project.datasets[1].description, "Dataset night_shots for vision");
        }

        #[test]
        fn existing_project_is_merged_without_duplicates() {
            let mut doc = empty_registry();
            upsert_project(&mut doc, &entry("Vision", "/srv/a.git", &["street"])).unwrap();
            doc["projects"][0]["datasets"][0]["description"] = json!("edited by hand");
            doc["projects"]
                .as_array_mut()
                .unwrap()
                .push(json!({ "project_id": "audio" }));

            let added =
                upsert_project(&mut doc, &entry("Vision 2", "/srv/b.git", &["street", "rain"])).unwrap();

            assert_eq!(added, vec![DatasetId::new("rain").unwrap()]);
            let projects = doc["projects"].as_array().unwrap();
            assert_eq!(projects.len(), 2);
            let vision = &projects[0];
            assert_eq!(vision["name"], "Vision 2");
            assert_eq!(vision["git_remote"], "/srv/b.git");
            let datasets = vision["datasets"].as_array().unwrap();
            assert_eq!(datasets.len(), 2);
            assert_eq!(datasets[0]["description"], "edited by hand");
            assert_eq!(datasets[1]["dataset_id"], "rain");
        }

        #[test]
        fn non_object_registry_is_rejected() {
            let mut doc = json!([]);
            assert!(matches!(
                upsert_project(&mut doc, &entry("Vision", "/srv/a.git", &[])),
                Err(RegistryError::Invalid(_))
            ));
        }

        #[test]
        fn written_registry_reads_back() {
            let temp = TempDir::new().unwrap();
            let path = temp.path().join("registry/registry.json");
            assert_eq!(read_registry_document(&path).unwrap(), empty_registry());

            let mut doc = read_registry_document(&path).unwrap();
            upsert_project(&mut doc, &entry("Vision", "/srv/a.git", &["street"])).unwrap();
            write_registry(&path, &doc).unwrap();

            let snapshot = read_registry(&path).unwrap();
            assert_eq!(snapshot.projects[0].datasets[0].dataset_id.as_str(), "street");
            assert!(!path.with_extension("json.tmp").exists());
        }
    }
}
