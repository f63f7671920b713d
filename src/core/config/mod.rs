//! core::config
//!
//! Configuration schema and loading.
//!
//! # Locations
//!
//! Searched in order, first existing file wins:
//! 1. An explicit path (the `--config` flag)
//! 2. `$DATAGEST_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/datagest/config.toml`
//! 4. `~/.datagest/config.toml` (canonical write location)
//!
//! A missing file is not an error; defaults are used.
//!
//! # Registry sources
//!
//! The primary `registry_path` and the extra `registry_sources` are merged
//! into one ordered list by [`normalize_registry_sources`]: entries naming a
//! `registry` directory are expanded to `registry/registry.json`, and
//! duplicates are dropped case-insensitively.
//!
//! # Example
//!
//! ```no_run
//! use datagest::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("Workspaces: {}", config.workspace_root().display());
//! println!("Lock TTL: {}h", config.lock_ttl_hours());
//! ```

pub mod schema;

pub use schema::AppConfig;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::ops::lock::DEFAULT_TTL_HOURS;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "DATAGEST_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Loaded configuration plus where it came from.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents
    pub app: AppConfig,
    /// Path of the file that was loaded, if any
    path: Option<PathBuf>,
}

impl Config {
    /// Wrap an in-memory config.
    pub fn from_app(app: AppConfig) -> Self {
        Self { app, path: None }
    }

    /// Load configuration.
    ///
    /// An explicit path must exist; the implicit locations are optional.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed,
    /// or validated, or if `explicit` does not exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Self::load_file(path);
        }

        match Self::discover() {
            Some(path) => Self::load_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// First existing file among the implicit locations.
    fn discover() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("datagest/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".datagest/config.toml"))
            .filter(|path| path.exists())
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let app: AppConfig = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        app.validate()?;

        Ok(Self {
            app,
            path: Some(path.to_path_buf()),
        })
    }

    /// Canonical config path: `~/.datagest/config.toml`.
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".datagest/config.toml"))
    }

    /// Write `app` to `path` atomically.
    ///
    /// Creates parent directories if needed. The file is written to a
    /// sibling temp file and renamed into place.
    pub fn write(path: &Path, app: &AppConfig) -> Result<(), ConfigError> {
        app.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(app).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    /// A starter config with every default spelled out.
    pub fn starter() -> AppConfig {
        let defaults = Self::default();
        AppConfig {
            workspace_root: Some(defaults.workspace_root().display().to_string()),
            registry_path: None,
            registry_sources: Some(Vec::new()),
            locks_path: None,
            log_level: Some(defaults.log_level().to_string()),
            lock_ttl_hours: Some(defaults.lock_ttl_hours()),
            admin_mode: Some(false),
            git_executable: Some(defaults.git_executable().to_string()),
            dvc_executable: Some(defaults.dvc_executable().to_string()),
            git_timeout_seconds: Some(300),
            dvc_timeout_seconds: Some(1800),
            git_global_config: None,
        }
    }

    // =========================================================================
    // Accessors with defaults
    // =========================================================================

    /// Path of the loaded file, if any.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Directory holding one mirror per project.
    ///
    /// Defaults to `~/.datagest/workspaces`.
    pub fn workspace_root(&self) -> PathBuf {
        match &self.app.workspace_root {
            Some(root) => PathBuf::from(root),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".datagest/workspaces"),
        }
    }

    /// Registry locations in the order they are tried.
    pub fn registry_sources(&self) -> Vec<PathBuf> {
        let primary = self.app.registry_path.as_deref().unwrap_or("");
        let extra = self.app.registry_sources.as_deref().unwrap_or(&[]);
        normalize_registry_sources(primary, extra)
            .into_iter()
            .map(PathBuf::from)
            .collect()
    }

    /// Shared locks directory. `None` disables dataset locking.
    pub fn locks_path(&self) -> Option<PathBuf> {
        self.app
            .locks_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    /// Default log level. Defaults to `info`.
    pub fn log_level(&self) -> &str {
        self.app.log_level.as_deref().unwrap_or("info")
    }

    /// Lock TTL in hours. Defaults to 4.
    pub fn lock_ttl_hours(&self) -> f64 {
        self.app.lock_ttl_hours.unwrap_or(DEFAULT_TTL_HOURS)
    }

    /// Administrative override for lock release. Defaults to `false`.
    pub fn admin_mode(&self) -> bool {
        self.app.admin_mode.unwrap_or(false)
    }

    /// Defaults to `git` on `PATH`.
    pub fn git_executable(&self) -> &str {
        self.app.git_executable.as_deref().unwrap_or("git")
    }

    /// Defaults to `dvc` on `PATH`.
    pub fn dvc_executable(&self) -> &str {
        self.app.dvc_executable.as_deref().unwrap_or("dvc")
    }

    /// Per-command git timeout. Defaults to 300s; `0` disables.
    pub fn git_timeout(&self) -> Option<Duration> {
        timeout(self.app.git_timeout_seconds.unwrap_or(300))
    }

    /// Per-command dvc timeout. Defaults to 1800s; `0` disables.
    pub fn dvc_timeout(&self) -> Option<Duration> {
        timeout(self.app.dvc_timeout_seconds.unwrap_or(1800))
    }

    /// App-private global gitconfig, if configured.
    pub fn git_global_config(&self) -> Option<PathBuf> {
        self.app.git_global_config.as_deref().map(PathBuf::from)
    }
}

fn timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Merge the primary registry path and extra sources into one ordered list.
///
/// - Blank entries are dropped; surrounding quotes are stripped
/// - An entry whose last component is `registry` becomes `registry/registry.json`
/// - An existing directory containing `registry/registry.json` or
///   `registry.json` resolves to that file
/// - Duplicates are dropped case-insensitively, keeping the first
pub fn normalize_registry_sources(primary: &str, sources: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    for item in std::iter::once(primary).chain(sources.iter().map(String::as_str)) {
        let Some(text) = normalize_registry_item(item) else {
            continue;
        };
        let key = text.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(text);
    }
    out
}

fn normalize_registry_item(value: &str) -> Option<String> {
    let text = value.trim().trim_matches('"').trim();
    if text.is_empty() {
        return None;
    }

    let path = Path::new(text);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if name == "registry.json" {
        return Some(text.to_string());
    }
    if name == "registry" {
        return Some(path.join("registry.json").display().to_string());
    }

    if path.is_dir() {
        let nested = path.join("registry").join("registry.json");
        if nested.exists() {
            return Some(nested.display().to_string());
        }
        let direct = path.join("registry.json");
        if direct.exists() {
            return Some(direct.display().to_string());
        }
    }

    let slashed = text.replace('\\', "/");
    if slashed.trim_end_matches('/').to_lowercase().ends_with("/registry") {
        return Some(path.join("registry.json").display().to_string());
    }

    Some(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_without_file() {
        let config = Config::default();
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.lock_ttl_hours(), 4.0);
        assert!(!config.admin_mode());
        assert_eq!(config.git_executable(), "git");
        assert_eq!(config.dvc_executable(), "dvc");
        assert_eq!(config.git_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.dvc_timeout(), Some(Duration::from_secs(1800)));
        assert!(config.locks_path().is_none());
        assert!(config.registry_sources().is_empty());
    }

    #[test]
    fn explicit_path_must_exist() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.toml");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn load_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"
            workspace_root = "/srv/ws"
            locks_path = "/mnt/locks"
            lock_ttl_hours = 1.5
            git_timeout_seconds = 0
            "#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.loaded_from(), Some(path.as_path()));
        assert_eq!(config.workspace_root(), PathBuf::from("/srv/ws"));
        assert_eq!(config.locks_path(), Some(PathBuf::from("/mnt/locks")));
        assert_eq!(config.lock_ttl_hours(), 1.5);
        assert_eq!(config.git_timeout(), None);
    }

    #[test]
    fn invalid_value_rejected_on_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "lock_ttl_hours = -1.0").unwrap();
        assert!(matches!(
            Config::load(Some(&path)),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn parse_error_names_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "workspace_root = [").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn write_is_atomic_and_reloadable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/config.toml");

        let app = AppConfig {
            locks_path: Some("/locks".to_string()),
            ..Config::starter()
        };
        Config::write(&path, &app).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("toml.tmp").exists());
        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.app, app);
    }

    #[test]
    fn blank_locks_path_disables_locking() {
        let config = Config::from_app(AppConfig {
            locks_path: Some("   ".to_string()),
            ..Default::default()
        });
        assert!(config.locks_path().is_none());
    }

    mod registry_sources {
        use super::*;

        #[test]
        fn registry_dir_is_expanded() {
            let out = normalize_registry_sources("/mnt/share/registry", &[]);
            assert_eq!(out.len(), 1);
            assert!(out[0].ends_with("registry.json"));
            assert!(out[0].contains("registry"));
        }

        #[test]
        fn trailing_slash_registry_dir_is_expanded() {
            let out = normalize_registry_sources("", &["/mnt/share/registry/".to_string()]);
            assert_eq!(out.len(), 1);
            assert!(out[0].ends_with("registry.json"));
        }

        #[test]
        fn duplicates_dropped_case_insensitively() {
            let out = normalize_registry_sources(
                "/mnt/A/registry.json",
                &[
                    "/mnt/a/REGISTRY.json".to_string(),
                    "\"/mnt/b/registry.json\"".to_string(),
                    "  ".to_string(),
                ],
            );
            assert_eq!(
                out,
                vec![
                    "/mnt/A/registry.json".to_string(),
                    "/mnt/b/registry.json".to_string()
                ]
            );
        }

        #[test]
        fn existing_directory_resolves_nested_file() {
            let temp = TempDir::new().unwrap();
            let nested = temp.path().join("registry");
            fs::create_dir_all(&nested).unwrap();
            fs::write(nested.join("registry.json"), "{}").unwrap();

            let out = normalize_registry_sources(&temp.path().display().to_string(), &[]);
            assert_eq!(out, vec![nested.join("registry.json").display().to_string()]);
        }

        #[test]
        fn config_accessor_uses_normalization() {
            let config = Config::from_app(AppConfig {
                registry_path: Some("/r/registry.json".to_string()),
                registry_sources: Some(vec!["/backup/registry".to_string()]),
                ..Default::default()
            });
            let sources = config.registry_sources();
            assert_eq!(sources.len(), 2);
            assert_eq!(sources[0], PathBuf::from("/r/registry.json"));
        }
    }
}
