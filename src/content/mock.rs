//! content::mock
//!
//! In-memory [`ContentClient`] for deterministic tests.
//!
//! Follows the same pattern as [`crate::git::mock`]: shared state, a call
//! log, and scripted failures reusing [`ScriptedFailure`]. `init` creates
//! `.dvc/`, and `add` writes a marker file with the real file count so
//! history and listing code can read it back.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use walkdir::WalkDir;

use super::traits::{ContentClient, ContentError, ProgressFn};
use crate::git::mock::ScriptedFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentOp {
    Init,
    Add,
    Push,
    Pull,
    Checkout,
    Status,
    SetDefaultRemote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentCall {
    Init,
    Add(Vec<String>),
    Push,
    Pull,
    Checkout,
    Status,
    SetDefaultRemote { name: String, url: String },
}

impl ScriptedFailure {
    pub fn to_content_error(&self) -> ContentError {
        match self {
            ScriptedFailure::Network(msg) => ContentError::CommandFailed {
                code: 255,
                message: msg.clone(),
            },
            ScriptedFailure::Timeout => ContentError::Timeout {
                command: "dvc (mock)".to_string(),
                seconds: 0,
            },
            ScriptedFailure::Rejected(_) | ScriptedFailure::DubiousOwnership => {
                ContentError::CommandFailed {
                    code: 255,
                    message: "ERROR: failed to push data to the cloud".to_string(),
                }
            }
            ScriptedFailure::Failed(msg) => ContentError::CommandFailed {
                code: 1,
                message: msg.clone(),
            },
        }
    }
}

#[derive(Debug, Default)]
struct MockContentInner {
    workdir: PathBuf,
    calls: Vec<ContentCall>,
    one_shot: HashMap<ContentOp, VecDeque<ScriptedFailure>>,
    sticky: HashMap<ContentOp, ScriptedFailure>,
    status: String,
}

/// Mock content client.
#[derive(Debug, Clone)]
pub struct MockContent {
    inner: Arc<Mutex<MockContentInner>>,
    workdir: PathBuf,
}

impl MockContent {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        let workdir = workdir.into();
        Self {
            workdir: workdir.clone(),
            inner: Arc::new(Mutex::new(MockContentInner {
                workdir,
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockContentInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fail_next(&self, op: ContentOp, failure: ScriptedFailure) {
        self.lock().one_shot.entry(op).or_default().push_back(failure);
    }

    pub fn fail_always(&self, op: ContentOp, failure: ScriptedFailure) {
        self.lock().sticky.insert(op, failure);
    }

    pub fn clear_failures(&self) {
        let mut inner = self.lock();
        inner.one_shot.clear();
        inner.sticky.clear();
    }

    /// Text returned by `status`.
    pub fn set_status(&self, text: &str) {
        self.lock().status = text.to_string();
    }

    pub fn calls(&self) -> Vec<ContentCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn count(&self, pred: impl Fn(&ContentCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn bound_workdir(&self) -> PathBuf {
        self.lock().workdir.clone()
    }

    fn begin(&self, call: ContentCall, op: ContentOp) -> Result<MutexGuard<'_, MockContentInner>, ContentError> {
        let mut inner = self.lock();
        inner.calls.push(call);
        if let Some(failure) = inner.one_shot.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(failure.to_content_error());
        }
        if let Some(failure) = inner.sticky.get(&op) {
            return Err(failure.to_content_error());
        }
        Ok(inner)
    }

    fn report(label: &str, progress: &mut ProgressFn<'_>) -> Result<(), ContentError> {
        if progress(label, 100) {
            Ok(())
        } else {
            Err(ContentError::Aborted)
        }
    }
}

fn io_error(e: std::io::Error) -> ContentError {
    ContentError::Io {
        message: e.to_string(),
    }
}

/// Write `<path>.dvc` and the sibling `.gitignore` for a tracked directory.
fn write_marker(mirror: &Path, rel: &str) -> Result<(), ContentError> {
    let target = mirror.join(rel);
    let nfiles = WalkDir::new(&target)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .count();
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let marker = format!(
        "outs:\n- md5: 00000000000000000000000000000000.dir\n  nfiles: {nfiles}\n  path: {name}\n"
    );
    fs::write(mirror.join(format!("{rel}.dvc")), marker).map_err(io_error)?;
    if let Some(parent) = target.parent() {
        fs::write(parent.join(".gitignore"), format!("/{name}\n")).map_err(io_error)?;
    }
    Ok(())
}

impl ContentClient for MockContent {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn set_workdir(&mut self, workdir: PathBuf) {
        self.lock().workdir = workdir.clone();
        self.workdir = workdir;
    }

    fn init(&self) -> Result<(), ContentError> {
        self.begin(ContentCall::Init, ContentOp::Init)?;
        let dvc = self.workdir.join(".dvc");
        fs::create_dir_all(&dvc).map_err(io_error)?;
        fs::write(dvc.join("config"), "").map_err(io_error)?;
        fs::write(dvc.join(".gitignore"), "/config.local\n/tmp\n/cache\n").map_err(io_error)?;
        Ok(())
    }

    fn add(&self, paths: &[String], progress: &mut ProgressFn<'_>) -> Result<(), ContentError> {
        self.begin(ContentCall::Add(paths.to_vec()), ContentOp::Add)?;
        for rel in paths {
            if self.workdir.join(rel).is_dir() {
                write_marker(&self.workdir, rel)?;
            }
        }
        Self::report("Tracking content", progress)
    }

    fn push(&self, progress: &mut ProgressFn<'_>) -> Result<(), ContentError> {
        self.begin(ContentCall::Push, ContentOp::Push)?;
        Self::report("Uploading content", progress)
    }

    fn pull(&self, progress: &mut ProgressFn<'_>) -> Result<(), ContentError> {
        self.begin(ContentCall::Pull, ContentOp::Pull)?;
        Self::report("Downloading content", progress)
    }

    fn checkout(&self, progress: &mut ProgressFn<'_>) -> Result<(), ContentError> {
        self.begin(ContentCall::Checkout, ContentOp::Checkout)?;
        Self::report("Checking out content", progress)
    }

    fn status(&self) -> Result<String, ContentError> {
        let inner = self.begin(ContentCall::Status, ContentOp::Status)?;
        Ok(inner.status.clone())
    }

    fn set_default_remote(&self, name: &str, url: &str) -> Result<(), ContentError> {
        self.begin(
            ContentCall::SetDefaultRemote {
                name: name.to_string(),
                url: url.to_string(),
            },
            ContentOp::SetDefaultRemote,
        )
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dataset::marker_nfiles;
    use tempfile::TempDir;

    #[test]
    fn add_writes_marker_with_file_count() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("datasets/cats/data");
        fs::create_dir_all(data.join("sub")).unwrap();
        fs::write(data.join("a.png"), b"a").unwrap();
        fs::write(data.join("sub/b.png"), b"b").unwrap();

        let content = MockContent::new(temp.path());
        content
            .add(&["datasets/cats/data".to_string()], &mut |_, _| true)
            .unwrap();

        let marker = fs::read_to_string(temp.path().join("datasets/cats/data.dvc")).unwrap();
        assert_eq!(marker_nfiles(&marker), Some(2));
        let ignore = fs::read_to_string(temp.path().join("datasets/cats/.gitignore")).unwrap();
        assert_eq!(ignore.trim(), "/data");
    }

    #[test]
    fn init_creates_dvc_dir() {
        let temp = TempDir::new().unwrap();
        MockContent::new(temp.path()).init().unwrap();
        assert!(temp.path().join(".dvc/config").is_file());
    }

    #[test]
    fn progress_can_abort() {
        let content = MockContent::new("/m");
        let result = content.pull(&mut |_, _| false);
        assert!(matches!(result, Err(ContentError::Aborted)));
    }

    #[test]
    fn scripted_failures() {
        let content = MockContent::new("/m");
        content.fail_next(ContentOp::Push, ScriptedFailure::Timeout);
        assert!(matches!(
            content.push(&mut |_, _| true),
            Err(ContentError::Timeout { .. })
        ));
        assert!(content.push(&mut |_, _| true).is_ok());
        assert_eq!(content.count(|c| *c == ContentCall::Push), 2);
    }
}
