//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Validation
//!
//! Values are validated after parsing: the lock TTL must be positive,
//! timeouts must not be negative, and the log level must be one that
//! `tracing` understands.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Log levels accepted in `log_level`.
pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Application configuration (user scope).
///
/// Every field is optional; accessors on [`super::Config`] supply defaults.
///
/// # Example
///
/// ```toml
/// workspace_root = "/data/datagest/workspaces"
/// registry_path = "/mnt/projects/registry/registry.json"
/// registry_sources = ["/mnt/backup/registry"]
/// locks_path = "/mnt/projects/locks"
/// log_level = "info"
/// lock_ttl_hours = 4.0
/// admin_mode = false
/// git_executable = "git"
/// dvc_executable = "dvc"
/// git_timeout_seconds = 300
/// dvc_timeout_seconds = 1800
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Directory holding one mirror per project
    pub workspace_root: Option<String>,

    /// Primary registry location (file, or a `registry` directory)
    pub registry_path: Option<String>,

    /// Extra registry locations tried after the primary
    pub registry_sources: Option<Vec<String>>,

    /// Shared directory holding dataset lock files
    pub locks_path: Option<String>,

    /// Default log level when `RUST_LOG` is unset
    pub log_level: Option<String>,

    /// Lock time-to-live in hours
    pub lock_ttl_hours: Option<f64>,

    /// Allow releasing locks held by other users
    pub admin_mode: Option<bool>,

    /// Metadata substrate binary
    pub git_executable: Option<String>,

    /// Content substrate binary
    pub dvc_executable: Option<String>,

    /// Per-command timeout for git (0 disables)
    pub git_timeout_seconds: Option<u64>,

    /// Per-command timeout for dvc (0 disables)
    pub dvc_timeout_seconds: Option<u64>,

    /// App-private global gitconfig used for trust entries
    pub git_global_config: Option<String>,
}

impl AppConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ttl) = self.lock_ttl_hours {
            if !ttl.is_finite() || ttl <= 0.0 {
                return Err(ConfigError::InvalidValue(format!(
                    "lock_ttl_hours must be a positive number, got {ttl}"
                )));
            }
        }

        if let Some(level) = &self.log_level {
            if !VALID_LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid log level '{}', must be one of: {}",
                    level,
                    VALID_LOG_LEVELS.join(", ")
                )));
            }
        }

        for (key, value) in [
            ("git_executable", &self.git_executable),
            ("dvc_executable", &self.dvc_executable),
            ("workspace_root", &self.workspace_root),
        ] {
            if let Some(v) = value {
                if v.trim().is_empty() {
                    return Err(ConfigError::InvalidValue(format!("{key} cannot be empty")));
                }
            }
        }

        Ok(())
    }
}
