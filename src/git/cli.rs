//! git::cli
//!
//! [`MetadataClient`] backed by the `git` binary, with `git2` for history
//! reads.
//!
//! # Trust
//!
//! Mirrors often live on shared or external filesystems where ownership
//! metadata is unreliable, and Git refuses to work in them. Every command
//! run inside an existing mirror therefore carries
//! `-c safe.directory=<mirror>`, independent of whatever the global trust
//! list says. An optional app-private global config can be supplied via
//! `GIT_CONFIG_GLOBAL` so trust entries never touch the user's own config.
//!
//! # History reads
//!
//! `show_file` and `first_parent` are called once per commit when a
//! dataset history is loaded, so they go through `git2` instead of spawning
//! a process each time. When `git2` cannot open the mirror (for instance
//! because of its own ownership check) they fall back to the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use url::Url;

use super::interface::{CommitOutcome, GitError, GitStatus, MetadataClient};
use crate::core::model::CommitInfo;
use crate::process::{self, CommandSpec};

const LOG_FORMAT: &str = "%H%x1f%h%x1f%an%x1f%aI%x1f%s";
const FIELD_SEP: char = '\u{1f}';

/// Git CLI client bound to one mirror.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
    executable: String,
    timeout: Option<Duration>,
    global_config: Option<PathBuf>,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            executable: "git".to_string(),
            timeout: None,
            global_config: None,
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

    /// Use `path` as the global gitconfig for every command.
    pub fn with_global_config(mut self, path: Option<PathBuf>) -> Self {
        self.global_config = path;
        self
    }

    /// Directory commands run in: the mirror, or its nearest existing parent.
    fn effective_cwd(&self) -> PathBuf {
        self.workdir
            .ancestors()
            .find(|p| p.is_dir())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn spec(&self, cwd: &Path, args: &[&str]) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.executable, cwd).timeout(self.timeout);
        if let Some(global) = &self.global_config {
            spec = spec.env("GIT_CONFIG_GLOBAL", global.display().to_string());
        }
        if cwd.join(".git").exists() {
            if let Some(trusted) = safe_directory_value(cwd) {
                spec = spec.arg("-c").arg(format!("safe.directory={trusted}"));
            }
        }
        spec.args(args.iter().copied())
    }

    fn run_in(&self, cwd: &Path, args: &[&str], push: bool) -> Result<String, GitError> {
        let out = process::run(&self.spec(cwd, args))?;
        if out.success() {
            Ok(out.stdout.trim().to_string())
        } else {
            Err(GitError::from_failure(out.code, out.error_text(), push))
        }
    }

    fn run(&self, args: &[&str]) -> Result<String, GitError> {
        self.run_in(&self.effective_cwd(), args, false)
    }

    fn open_repo(&self) -> Option<git2::Repository> {
        git2::Repository::open(&self.workdir).ok()
    }

    fn show_file_git2(
        repo: &git2::Repository,
        rev: &str,
        path: &str,
    ) -> Result<Option<String>, git2::Error> {
        let commit = repo.revparse_single(rev)?.peel_to_commit()?;
        let entry = match commit.tree()?.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let object = entry.to_object(repo)?;
        Ok(object
            .as_blob()
            .map(|blob| String::from_utf8_lossy(blob.content()).into_owned()))
    }

    fn first_parent_git2(
        repo: &git2::Repository,
        rev: &str,
    ) -> Result<Option<String>, git2::Error> {
        let commit = repo.revparse_single(rev)?.peel_to_commit()?;
        Ok(commit.parent_ids().next().map(|id| id.to_string()))
    }
}

impl MetadataClient for Git {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn set_workdir(&mut self, workdir: PathBuf) {
        self.workdir = workdir;
    }

    fn clone_repo(&self, remote: &str, target: &Path) -> Result<(), GitError> {
        let parent = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| GitError::Internal {
            message: format!("failed to create {}: {e}", parent.display()),
        })?;
        let url = normalize_remote_url(remote);
        let target_text = target.display().to_string();
        self.run_in(parent, &["clone", &url, &target_text], false)
            .map(|_| ())
    }

    fn add(&self, paths: &[String]) -> Result<(), GitError> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["add"];
        args.extend(paths.iter().map(String::as_str));
        self.run(&args).map(|_| ())
    }

    fn commit(&self, message: &str) -> Result<CommitOutcome, GitError> {
        // Exit 0 means the index matches HEAD.
        match self.run(&["diff", "--cached", "--quiet"]) {
            Ok(_) => return Ok(CommitOutcome::NoChanges),
            Err(GitError::CommandFailed { code: 1, .. }) => {}
            Err(e) => return Err(e),
        }
        match self.run(&["commit", "-m", message]) {
            Ok(_) => Ok(CommitOutcome::Committed),
            Err(GitError::CommandFailed { message, .. })
                if message.to_lowercase().contains("nothing to commit") =>
            {
                Ok(CommitOutcome::NoChanges)
            }
            Err(e) => Err(e),
        }
    }

    fn push(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.run_in(&self.effective_cwd(), &["push", remote, branch], true)
            .map(|_| ())
    }

    fn pull(&self, rebase: bool) -> Result<(), GitError> {
        if rebase {
            self.run(&["pull", "--rebase"]).map(|_| ())
        } else {
            self.run(&["pull"]).map(|_| ())
        }
    }

    fn checkout(&self, reference: &str) -> Result<(), GitError> {
        self.run(&["checkout", reference]).map(|_| ())
    }

    fn current_branch(&self) -> Result<Option<String>, GitError> {
        let branch = self.run(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok((branch != "HEAD" && !branch.is_empty()).then_some(branch))
    }

    fn status(&self) -> Result<GitStatus, GitError> {
        let raw = self.run(&["status", "--porcelain", "--branch"])?;
        Ok(GitStatus::parse(&raw))
    }

    fn log(&self, path: Option<&str>, max_count: usize) -> Result<Vec<CommitInfo>, GitError> {
        let count = format!("-n{max_count}");
        let pretty = format!("--pretty=format:{LOG_FORMAT}");
        let mut args = vec!["log", count.as_str(), pretty.as_str(), "--name-only"];
        if let Some(p) = path {
            args.push("--");
            args.push(p);
        }
        let raw = self.run(&args)?;
        Ok(parse_log(&raw))
    }

    fn run_raw(&self, args: &[&str]) -> Result<String, GitError> {
        self.run(args)
    }

    fn show_file(&self, rev: &str, path: &str) -> Result<Option<String>, GitError> {
        if let Some(repo) = self.open_repo() {
            if let Ok(found) = Self::show_file_git2(&repo, rev, path) {
                return Ok(found);
            }
        }
        let spec = format!("{rev}:{path}");
        match self.run(&["show", &spec]) {
            Ok(text) => Ok(Some(text)),
            Err(GitError::CommandFailed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn first_parent(&self, rev: &str) -> Result<Option<String>, GitError> {
        if let Some(repo) = self.open_repo() {
            if let Ok(parent) = Self::first_parent_git2(&repo, rev) {
                return Ok(parent);
            }
        }
        let out = self.run(&["rev-list", "--parents", "-n", "1", rev])?;
        Ok(out.split_whitespace().nth(1).map(str::to_string))
    }
}

/// Parse `git log --pretty=format:<LOG_FORMAT> --name-only` output.
pub(crate) fn parse_log(raw: &str) -> Vec<CommitInfo> {
    let mut commits = Vec::new();
    let mut current: Option<CommitInfo> = None;

    for line in raw.lines() {
        let text = line.trim().replace('\u{1e}', "");
        if text.is_empty() {
            continue;
        }
        if text.contains(FIELD_SEP) {
            commits.extend(current.take());
            let parts: Vec<&str> = text.splitn(5, FIELD_SEP).collect();
            if let [id, short_id, author, date, message] = parts[..] {
                let timestamp = DateTime::parse_from_rfc3339(date)
                    .map(|d| d.with_timezone(&Utc))
                    .unwrap_or(DateTime::UNIX_EPOCH);
                current = Some(CommitInfo {
                    id: id.to_string(),
                    short_id: short_id.to_string(),
                    author: author.to_string(),
                    timestamp,
                    message: message.to_string(),
                    files_changed: 0,
                    images_added: 0,
                    images_removed: 0,
                });
            }
        } else if let Some(commit) = current.as_mut() {
            commit.files_changed += 1;
        }
    }
    commits.extend(current);
    commits
}

/// Canonical forward-slash form of `path` for `safe.directory`.
///
/// Returns `None` if the path cannot be resolved.
pub fn safe_directory_value(path: &Path) -> Option<String> {
    let resolved = std::fs::canonicalize(path).ok()?;
    let text = resolved.display().to_string();
    let text = text.strip_prefix(r"\\?\UNC\").map(|rest| format!(r"\\{rest}")).unwrap_or(text);
    let text = text.strip_prefix(r"\\?\").map(str::to_string).unwrap_or(text);
    Some(text.replace('\\', "/"))
}

/// Convert Windows drive paths to `file://` URLs; leave everything else.
///
/// Each path segment is percent-encoded, so `#`, `?` and `%` survive.
pub fn normalize_remote_url(remote: &str) -> String {
    let bytes = remote.as_bytes();
    let is_drive = bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/');
    if !is_drive {
        return remote.to_string();
    }
    let Ok(mut url) = Url::parse("file:///") else {
        return remote.to_string();
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.clear().extend(remote.split(['\\', '/']));
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    mod remote_url {
        use super::*;

        #[test]
        fn drive_paths_become_file_urls() {
            assert_eq!(
                normalize_remote_url(r"D:\Data Repos\vision.git"),
                "file:///D:/Data%20Repos/vision.git"
            );
            assert_eq!(normalize_remote_url("c:/x"), "file:///c:/x");
            assert_eq!(
                normalize_remote_url(r"E:\a?b#c\50%\x.git"),
                "file:///E:/a%3Fb%23c/50%25/x.git"
            );
        }

        #[test]
        fn other_remotes_untouched() {
            for remote in [
                r"\\server\share\repo.git",
                "/srv/git/repo.git",
                "ssh://host/repo.git",
                "git@host:repo.git",
            ] {
                assert_eq!(normalize_remote_url(remote), remote);
            }
        }
    }

    mod log_parsing {
        use super::*;

        #[test]
        fn commits_with_files() {
            let raw = format!(
                "aaa{s}a1{s}Alice{s}2024-05-01T10:00:00+02:00{s}Import: 3 images into Cam\n\
                 datasets/cam/data.dvc\n\
                 datasets/cam/dataset.yaml\n\
                 \n\
                 bbb{s}b1{s}Bob{s}2024-04-30T09:00:00+00:00{s}Initialize DataGest workspace\n\
                 .dvc/config\n",
                s = FIELD_SEP
            );
            let commits = parse_log(&raw);
            assert_eq!(commits.len(), 2);
            assert_eq!(commits[0].id, "aaa");
            assert_eq!(commits[0].short_id, "a1");
            assert_eq!(commits[0].files_changed, 2);
            assert_eq!(commits[0].timestamp.to_rfc3339(), "2024-05-01T08:00:00+00:00");
            assert_eq!(commits[1].author, "Bob");
            assert_eq!(commits[1].files_changed, 1);
        }

        #[test]
        fn subject_may_contain_separator_free_text() {
            let raw = format!("c{s}c{s}Eve{s}2024-01-01T00:00:00Z{s}fix: a | b", s = FIELD_SEP);
            let commits = parse_log(&raw);
            assert_eq!(commits[0].message, "fix: a | b");
            assert_eq!(commits[0].files_changed, 0);
        }

        #[test]
        fn malformed_header_skipped() {
            let raw = format!("only{s}two\nfile.txt\n", s = FIELD_SEP);
            assert!(parse_log(&raw).is_empty());
        }

        #[test]
        fn empty_log() {
            assert!(parse_log("").is_empty());
        }
    }

    #[test]
    fn safe_directory_uses_forward_slashes() {
        let temp = tempfile::TempDir::new().unwrap();
        let value = safe_directory_value(temp.path()).unwrap();
        assert!(!value.contains('\\'));
        assert!(!value.starts_with("//?/"));
        assert!(safe_directory_value(&temp.path().join("missing")).is_none());
    }
}
