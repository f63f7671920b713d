//! config command - Show or create the configuration file

use std::path::PathBuf;

use crate::core::config::{Config, ConfigError};
use crate::engine::Context;
use crate::ui::output::{self, Verbosity};
use anyhow::{bail, Context as _, Result};

/// Print the effective configuration, defaults included.
pub fn list(ctx: &Context) -> Result<()> {
    let config = Config::load(ctx.config.as_deref()).context("Failed to load config")?;
    output::result(render(&config));
    Ok(())
}

/// Print the loaded config file, or where one would be created.
pub fn path(ctx: &Context) -> Result<()> {
    let config = match Config::load(ctx.config.as_deref()) {
        Ok(config) => config,
        // `config path --config x` is meaningful before x exists.
        Err(ConfigError::NotFound(path)) => {
            output::result(path.display());
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to load config"),
    };
    match config.loaded_from() {
        Some(path) => output::result(path.display()),
        None => output::result(target_path(ctx)?.display()),
    }
    Ok(())
}

/// Write a starter config.
pub fn init(ctx: &Context, force: bool) -> Result<()> {
    let path = target_path(ctx)?;
    if path.exists() && !force {
        bail!(
            "Config file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }
    Config::write(&path, &Config::starter()).context("Failed to write config")?;
    output::print(
        format!("Wrote {}", path.display()),
        Verbosity::from_flags(ctx.quiet, ctx.debug),
    );
    Ok(())
}

fn target_path(ctx: &Context) -> Result<PathBuf> {
    match &ctx.config {
        Some(path) => Ok(path.clone()),
        None => Ok(Config::default_config_path()?),
    }
}

/// `key = value` lines for every setting.
pub fn render(config: &Config) -> String {
    let path_or_unset = |p: Option<PathBuf>| {
        p.map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not set)".to_string())
    };
    let secs = |d: Option<std::time::Duration>| {
        d.map(|d| d.as_secs().to_string())
            .unwrap_or_else(|| "0 (no timeout)".to_string())
    };
    let sources = config
        .registry_sources()
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>();

    let mut lines = vec![format!(
        "# {}",
        config
            .loaded_from()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "defaults (no config file)".to_string())
    )];
    lines.push(format!("workspace_root = {}", config.workspace_root().display()));
    lines.push(format!(
        "registry_sources = [{}]",
        sources.join(", ")
    ));
    lines.push(format!("locks_path = {}", path_or_unset(config.locks_path())));
    lines.push(format!("log_level = {}", config.log_level()));
    lines.push(format!("lock_ttl_hours = {}", config.lock_ttl_hours()));
    lines.push(format!("admin_mode = {}", config.admin_mode()));
    lines.push(format!("git_executable = {}", config.git_executable()));
    lines.push(format!("dvc_executable = {}", config.dvc_executable()));
    lines.push(format!("git_timeout_seconds = {}", secs(config.git_timeout())));
    lines.push(format!("dvc_timeout_seconds = {}", secs(config.dvc_timeout())));
    lines.push(format!(
        "git_global_config = {}",
        path_or_unset(config.git_global_config())
    ));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::schema::AppConfig;

    #[test]
    fn renders_defaults() {
        let text = render(&Config::default());
        assert!(text.starts_with("# defaults (no config file)"));
        assert!(text.contains("locks_path = (not set)"));
        assert!(text.contains("lock_ttl_hours = 4"));
        assert!(text.contains("git_timeout_seconds = 300"));
        assert!(text.contains("dvc_timeout_seconds = 1800"));
    }

    #[test]
    fn renders_overrides() {
        let app = AppConfig {
            locks_path: Some("/mnt/share/locks".into()),
            git_timeout_seconds: Some(0),
            ..AppConfig::default()
        };
        let text = render(&Config::from_app(app));
        assert!(text.contains("locks_path = /mnt/share/locks"));
        assert!(text.contains("git_timeout_seconds = 0 (no timeout)"));
    }
}
