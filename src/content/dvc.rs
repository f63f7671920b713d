//! content::dvc
//!
//! [`ContentClient`] backed by the `dvc` binary.
//!
//! # Environment
//!
//! - `DVC_NO_ANALYTICS=1`
//! - `safe.directory=<mirror>` injected through `GIT_CONFIG_COUNT` /
//!   `GIT_CONFIG_KEY_0` / `GIT_CONFIG_VALUE_0`, since DVC opens the Git
//!   repository itself and would otherwise trip the ownership check
//!
//! # State database repair
//!
//! DVC keeps sqlite state under `.dvc/tmp`. On shared drives those files
//! end up read-only for the next user, and every command then fails with
//! "attempt to write a readonly database". When that happens the files are
//! made writable, the databases are removed (DVC rebuilds them) and the
//! command is retried once.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};
use walkdir::WalkDir;

use super::traits::{ContentClient, ContentError, ProgressFn};
use crate::git::safe_directory_value;
use crate::process::{self, parse_percent, CommandSpec, ProcessOutput, Stream};

const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";
const DB_EXTENSIONS: &[&str] = &["db", "sqlite", "sqlite3"];

/// DVC CLI client bound to one mirror.
#[derive(Debug, Clone)]
pub struct Dvc {
    workdir: PathBuf,
    executable: String,
    timeout: Option<Duration>,
}

impl Dvc {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            executable: "dvc".to_string(),
            timeout: None,
        }
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn spec(&self, args: &[&str]) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.executable, &self.workdir)
            .args(args.iter().copied())
            .env("DVC_NO_ANALYTICS", "1")
            .timeout(self.timeout);
        if let Some(trusted) = safe_directory_value(&self.workdir) {
            spec = spec
                .env("GIT_CONFIG_COUNT", "1")
                .env("GIT_CONFIG_KEY_0", "safe.directory")
                .env("GIT_CONFIG_VALUE_0", trusted);
        }
        spec
    }

    fn run_once(
        &self,
        args: &[&str],
        label: &str,
        progress: &mut ProgressFn<'_>,
    ) -> Result<ProcessOutput, ContentError> {
        let spec = self.spec(args);
        let mut on_line = |_: Stream, line: &str| match parse_percent(line) {
            Some(percent) => progress(label, percent),
            None => true,
        };
        Ok(process::run_streaming(&spec, Some(&mut on_line))?)
    }

    /// Run a subcommand, repairing the state database once if needed.
    fn run(&self, args: &[&str], label: &str, progress: &mut ProgressFn<'_>) -> Result<String, ContentError> {
        let mut output = self.run_once(args, label, progress)?;
        if !output.success() && is_readonly_db(&output.error_text()) {
            match repair_state_db(&self.workdir) {
                Ok(true) => {
                    warn!(mirror = %self.workdir.display(), "repaired read-only DVC state database, retrying");
                    output = self.run_once(args, label, progress)?;
                }
                Ok(false) => {}
                Err(e) => warn!(error = %e, "could not repair DVC state database"),
            }
        }
        if output.success() {
            Ok(output.stdout)
        } else {
            let message = output.error_text();
            Err(ContentError::CommandFailed {
                code: output.code,
                message: if message.is_empty() {
                    "DVC command failed".to_string()
                } else {
                    message
                },
            })
        }
    }

    fn run_quiet(&self, args: &[&str]) -> Result<String, ContentError> {
        self.run(args, "", &mut |_, _| true)
    }
}

impl ContentClient for Dvc {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn set_workdir(&mut self, workdir: PathBuf) {
        self.workdir = workdir;
    }

    fn init(&self) -> Result<(), ContentError> {
        self.run_quiet(&["init"]).map(|_| ())
    }

    fn add(&self, paths: &[String], progress: &mut ProgressFn<'_>) -> Result<(), ContentError> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["add"];
        args.extend(paths.iter().map(String::as_str));
        self.run(&args, "Tracking content", progress).map(|_| ())
    }

    fn push(&self, progress: &mut ProgressFn<'_>) -> Result<(), ContentError> {
        self.run(&["push"], "Uploading content", progress).map(|_| ())
    }

    fn pull(&self, progress: &mut ProgressFn<'_>) -> Result<(), ContentError> {
        self.run(&["pull"], "Downloading content", progress).map(|_| ())
    }

    fn checkout(&self, progress: &mut ProgressFn<'_>) -> Result<(), ContentError> {
        self.run(&["checkout"], "Checking out content", progress)
            .map(|_| ())
    }

    fn status(&self) -> Result<String, ContentError> {
        self.run_quiet(&["status"])
    }

    fn set_default_remote(&self, name: &str, url: &str) -> Result<(), ContentError> {
        let listing = self.run_quiet(&["remote", "list"])?;
        if remote_names(&listing).any(|n| n == name) {
            self.run_quiet(&["remote", "modify", name, "url", url])?;
            self.run_quiet(&["remote", "default", name])?;
        } else {
            self.run_quiet(&["remote", "add", "-d", name, url])?;
        }
        debug!(remote = name, url, "content remote set");
        Ok(())
    }
}

/// Names from `dvc remote list` output (`name<ws>url` per line).
fn remote_names(listing: &str) -> impl Iterator<Item = &str> {
    listing.lines().filter_map(|l| l.split_whitespace().next())
}

fn is_readonly_db(message: &str) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("readonly database") || lowered.contains("read-only database")
}

fn is_state_db(path: &Path) -> bool {
    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| DB_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
    if by_extension {
        return true;
    }
    let mut header = [0u8; 16];
    fs::File::open(path)
        .and_then(|mut f| f.read_exact(&mut header))
        .map(|_| header == SQLITE_MAGIC)
        .unwrap_or(false)
}

/// Make `.dvc/tmp` writable and remove its sqlite files.
///
/// Returns whether any database was removed.
pub fn repair_state_db(mirror: &Path) -> std::io::Result<bool> {
    let tmp = mirror.join(".dvc").join("tmp");
    if !tmp.is_dir() {
        return Ok(false);
    }

    let mut removed = false;
    for entry in WalkDir::new(&tmp).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "skipping unreadable state entry");
                continue;
            }
        };
        make_writable(entry.path());
        if entry.file_type().is_file() && is_state_db(entry.path()) {
            fs::remove_file(entry.path())?;
            removed = true;
        }
    }
    Ok(removed)
}

#[cfg(unix)]
fn make_writable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = fs::metadata(path) {
        let mut perms = meta.permissions();
        perms.set_mode(perms.mode() | 0o200);
        let _ = fs::set_permissions(path, perms);
    }
}

#[cfg(not(unix))]
fn make_writable(path: &Path) {
    if let Ok(meta) = fs::metadata(path) {
        let mut perms = meta.permissions();
        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);
        let _ = fs::set_permissions(path, perms);
    }
}
