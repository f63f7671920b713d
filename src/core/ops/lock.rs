//! core::ops::lock
//!
//! Advisory dataset lock on shared storage.
//!
//! # Architecture
//!
//! The lock serializes exclusive content mutations (imports) of one dataset
//! across every client that can see the shared locks directory. There is no
//! coordinating server: the only atomic primitive assumed is
//! create-if-absent file creation, which heterogeneous network filesystems
//! all provide. Staleness and reclaim are layered on top with plain reads
//! and writes.
//!
//! # Storage
//!
//! - `<locks_root>/<project_id>/<dataset_id>.lock` - JSON [`LockInfo`] record
//!
//! # Invariants
//!
//! - At most one lock file per (project, dataset); its presence is the lock
//! - A corrupt or unreadable lock file reads as "no lock" from [`LockManager::check`]
//! - A lock is reclaimed only when it is stale AND the bytes on disk are
//!   exactly the bytes that were judged stale
//! - At most one reclaim attempt per [`LockManager::acquire`] call
//!
//! # Known limitation
//!
//! Between the confirming re-read and the delete there is a narrow window in
//! which a third client could replace the file; that replacement would then
//! be deleted. The protocol is best effort, not provably exclusive.
//!
//! # Example
//!
//! ```ignore
//! use datagest::core::ops::lock::LockManager;
//!
//! let locks = LockManager::new(locks_root, identity, 4.0, "0.3.1");
//! if let Some(guard) = locks.acquire_guard(&project, &dataset)? {
//!     // ... mutate the dataset ...
//!     // lock released when `guard` is dropped
//! }
//! ```

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::core::identity::Identity;
use crate::core::paths;
use crate::core::types::{DatasetId, ProjectId};

/// Default lock time-to-live in hours.
pub const DEFAULT_TTL_HOURS: f64 = 4.0;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Failed to create the locks directory or the lock file.
    #[error("failed to create lock {path}: {source}")]
    CreateFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to delete the lock file.
    #[error("failed to release lock {path}: {source}")]
    ReleaseFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize the lock record.
    #[error("failed to encode lock record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A held advisory lock as recorded on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LockInfo {
    pub dataset_id: String,
    pub username: String,
    pub machine: String,
    /// ISO-8601 acquisition time.
    pub timestamp: String,
    pub app_version: String,
    pub ttl_hours: f64,
}

impl LockInfo {
    /// `user@machine` of the holder.
    pub fn holder(&self) -> String {
        format!("{}@{}", self.username, self.machine)
    }

    /// Parsed acquisition time, if the timestamp is readable.
    ///
    /// Timestamps without an offset are taken as UTC.
    pub fn acquired_at(&self) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(&self.timestamp) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Age of the lock at `now`, if the timestamp is readable.
    pub fn age_at(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.acquired_at().map(|ts| now - ts)
    }
}

/// `1.5h old`: lock age in hours with one decimal.
pub fn format_age(age: chrono::Duration) -> String {
    format!("{:.1}h old", age.num_minutes() as f64 / 60.0)
}

/// On-disk shape; optional fields fall back to manager defaults.
#[derive(Debug, Deserialize)]
struct RawLockInfo {
    dataset_id: String,
    username: String,
    machine: String,
    timestamp: String,
    #[serde(default)]
    app_version: Option<String>,
    #[serde(default)]
    ttl_hours: Option<f64>,
}

/// Filesystem-based mutual exclusion per (project, dataset).
#[derive(Debug, Clone)]
pub struct LockManager {
    locks_root: PathBuf,
    identity: Identity,
    ttl_hours: f64,
    app_version: String,
    admin_mode: bool,
}

impl LockManager {
    /// Create a manager rooted at the shared locks directory.
    pub fn new(
        locks_root: impl Into<PathBuf>,
        identity: Identity,
        ttl_hours: f64,
        app_version: impl Into<String>,
    ) -> Self {
        Self {
            locks_root: locks_root.into(),
            identity,
            ttl_hours,
            app_version: app_version.into(),
            admin_mode: false,
        }
    }

    /// Enable administrative override: `release` ignores the recorded holder.
    pub fn with_admin_mode(mut self, admin_mode: bool) -> Self {
        self.admin_mode = admin_mode;
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn is_admin(&self) -> bool {
        self.admin_mode
    }

    pub fn locks_root(&self) -> &Path {
        &self.locks_root
    }

    /// Path of the lock file for a dataset.
    pub fn lock_path(&self, project: &ProjectId, dataset: &DatasetId) -> PathBuf {
        paths::lock_file(&self.locks_root, project, dataset)
    }

    /// Read the current lock, if any.
    ///
    /// Missing, unreadable, and corrupt files all read as `None`.
    pub fn check(&self, project: &ProjectId, dataset: &DatasetId) -> Option<LockInfo> {
        self.read_observed(&self.lock_path(project, dataset))
            .map(|(_, info)| info)
    }

    /// Whether `lock` has outlived its TTL.
    ///
    /// An unparseable timestamp counts as stale so that a damaged record
    /// never blocks a dataset forever.
    pub fn is_stale(&self, lock: &LockInfo) -> bool {
        Self::is_stale_at(lock, Utc::now())
    }

    /// [`Self::is_stale`] against an explicit clock.
    pub fn is_stale_at(lock: &LockInfo, now: DateTime<Utc>) -> bool {
        let Some(age) = lock.age_at(now) else {
            return true;
        };
        if !lock.ttl_hours.is_finite() {
            return true;
        }
        let ttl_ms = (lock.ttl_hours * 3_600_000.0) as i64;
        age > chrono::Duration::milliseconds(ttl_ms)
    }

    /// Try to take the lock.
    ///
    /// Returns `Ok(false)` when another client holds a fresh lock, or when a
    /// stale lock could not be proven unchanged before reclaiming it.
    ///
    /// # Errors
    ///
    /// - [`LockError::CreateFailed`] if the lock file cannot be written for a
    ///   reason other than "already exists"
    pub fn acquire(&self, project: &ProjectId, dataset: &DatasetId) -> Result<bool, LockError> {
        let path = self.lock_path(project, dataset);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| LockError::CreateFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let record = self.new_record(dataset);
        let bytes = serde_json::to_vec_pretty(&record)?;

        let mut reclaimed = false;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let written = file.write_all(&bytes).and_then(|_| file.sync_all());
                    if let Err(source) = written {
                        // Never leave a half-written record behind.
                        let _ = fs::remove_file(&path);
                        return Err(LockError::CreateFailed { path, source });
                    }
                    return Ok(true);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if reclaimed {
                        return Ok(false);
                    }
                    let Some((raw, existing)) = self.read_observed(&path) else {
                        return Ok(false);
                    };
                    if !self.is_stale(&existing) {
                        return Ok(false);
                    }
                    if !Self::remove_if_unchanged(&path, &raw) {
                        return Ok(false);
                    }
                    info!(
                        path = %path.display(),
                        holder = %existing.holder(),
                        timestamp = %existing.timestamp,
                        "reclaimed stale dataset lock"
                    );
                    reclaimed = true;
                }
                Err(source) => return Err(LockError::CreateFailed { path, source }),
            }
        }
    }

    /// Take the lock and wrap it in a guard that releases on drop.
    ///
    /// Returns `Ok(None)` when the lock is held elsewhere.
    pub fn acquire_guard(
        &self,
        project: &ProjectId,
        dataset: &DatasetId,
    ) -> Result<Option<DatasetLock<'_>>, LockError> {
        if self.acquire(project, dataset)? {
            Ok(Some(DatasetLock {
                manager: self,
                project: project.clone(),
                dataset: dataset.clone(),
                held: true,
            }))
        } else {
            Ok(None)
        }
    }

    /// Release the lock if this identity holds it.
    ///
    /// Returns `Ok(true)` when the lock is gone afterwards (including when no
    /// lock existed), `Ok(false)` when another user or machine holds it and
    /// admin mode is off.
    pub fn release(&self, project: &ProjectId, dataset: &DatasetId) -> Result<bool, LockError> {
        let path = self.lock_path(project, dataset);
        if !path.exists() {
            return Ok(true);
        }

        if let Some((_, existing)) = self.read_observed(&path) {
            let ours = existing.username == self.identity.username
                && existing.machine == self.identity.machine;
            if !ours && !self.admin_mode {
                return Ok(false);
            }
        }

        Self::delete(&path)
    }

    /// Unconditionally delete the lock.
    pub fn force_unlock(
        &self,
        project: &ProjectId,
        dataset: &DatasetId,
    ) -> Result<bool, LockError> {
        let path = self.lock_path(project, dataset);
        warn!(path = %path.display(), "force-unlocking dataset");
        Self::delete(&path)
    }

    fn delete(path: &Path) -> Result<bool, LockError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
            Err(source) => Err(LockError::ReleaseFailed {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn new_record(&self, dataset: &DatasetId) -> LockInfo {
        LockInfo {
            dataset_id: dataset.to_string(),
            username: self.identity.username.clone(),
            machine: self.identity.machine.clone(),
            timestamp: Utc::now().to_rfc3339(),
            app_version: self.app_version.clone(),
            ttl_hours: self.ttl_hours,
        }
    }

    /// Read the raw bytes and the parsed record together.
    fn read_observed(&self, path: &Path) -> Option<(Vec<u8>, LockInfo)> {
        let raw = fs::read(path).ok()?;
        let info = self.parse(&raw)?;
        Some((raw, info))
    }

    fn parse(&self, raw: &[u8]) -> Option<LockInfo> {
        let parsed: RawLockInfo = serde_json::from_slice(raw).ok()?;
        Some(LockInfo {
            dataset_id: parsed.dataset_id,
            username: parsed.username,
            machine: parsed.machine,
            timestamp: parsed.timestamp,
            app_version: parsed.app_version.unwrap_or_else(|| "unknown".to_string()),
            ttl_hours: parsed.ttl_hours.unwrap_or(self.ttl_hours),
        })
    }

    /// Delete the lock only if its bytes still equal `expected`.
    fn remove_if_unchanged(path: &Path, expected: &[u8]) -> bool {
        match fs::read(path) {
            Ok(current) if current == expected => {}
            _ => return false,
        }
        match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "could not remove stale lock");
                }
                false
            }
        }
    }
}

/// A held dataset lock.
///
/// The lock is released when this guard is dropped, so every exit path of
/// the holder (including early returns and panics) gives it back.
#[derive(Debug)]
pub struct DatasetLock<'a> {
    manager: &'a LockManager,
    project: ProjectId,
    dataset: DatasetId,
    held: bool,
}

impl DatasetLock<'_> {
    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Release the lock explicitly.
    pub fn release(mut self) -> Result<bool, LockError> {
        self.held = false;
        self.manager.release(&self.project, &self.dataset)
    }
}

impl Drop for DatasetLock<'_> {
    fn drop(&mut self) {
        if !self.held {
            return;
        }
        self.held = false;
        match self.manager.release(&self.project, &self.dataset) {
            Ok(true) => {}
            Ok(false) => warn!(
                project = %self.project,
                dataset = %self.dataset,
                "dataset lock was taken over before release"
            ),
            Err(e) => warn!(error = %e, "failed to release dataset lock"),
        }
    }
}
