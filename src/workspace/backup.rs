//! workspace::backup
//!
//! Moving an unusable mirror aside before re-cloning.
//!
//! The mirror is renamed to `<name>_corrupt_<YYYYmmdd_HHMMSS>` next to
//! itself, with a `_NN` suffix when that name is taken. Nothing is deleted
//! and old backups are never pruned.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use super::WorkspaceError;

/// Attempts at a free backup name before giving up.
const MAX_BACKUP_NAMES: u32 = 100;

/// Rename `mirror` aside; returns the backup path.
pub fn backup_invalid_mirror(mirror: &Path, now: DateTime<Local>) -> Result<PathBuf, WorkspaceError> {
    let stamp = now.format("%Y%m%d_%H%M%S").to_string();
    let name = mirror
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workspace".to_string());

    for attempt in 0..MAX_BACKUP_NAMES {
        let suffix = if attempt == 0 {
            stamp.clone()
        } else {
            format!("{stamp}_{attempt:02}")
        };
        let backup = mirror.with_file_name(format!("{name}_corrupt_{suffix}"));
        if backup.exists() {
            continue;
        }
        return std::fs::rename(mirror, &backup)
            .map(|_| backup)
            .map_err(|source| WorkspaceError::Backup {
                path: mirror.to_path_buf(),
                source,
            });
    }
    Err(WorkspaceError::BackupNamesExhausted {
        path: mirror.to_path_buf(),
    })
}
