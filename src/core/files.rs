//! core::files
//!
//! File-tree helpers used by imports and dataset listings.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

/// Extensions accepted by an image import, lowercase and dotless.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

/// Errors from file-tree operations.
#[derive(Debug, Error)]
pub enum FilesError {
    #[error("selected folder does not exist: {0}")]
    MissingFolder(PathBuf),

    #[error("folder does not contain supported image files: {0}")]
    NoImages(PathBuf),

    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("failed to walk {path}: {message}")]
    Walk { path: PathBuf, message: String },

    #[error("file copy aborted")]
    Aborted,
}

/// Count and total size of the files in a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileTally {
    pub count: u64,
    pub bytes: u64,
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn files_under(folder: &Path) -> impl Iterator<Item = walkdir::DirEntry> {
    WalkDir::new(folder)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
}

/// Count files under `folder`, optionally only images.
///
/// A missing folder counts as empty.
pub fn count_files(folder: &Path, images_only: bool) -> FileTally {
    if !folder.is_dir() {
        return FileTally::default();
    }
    files_under(folder)
        .filter(|e| !images_only || is_image(e.path()))
        .fold(FileTally::default(), |mut tally, entry| {
            tally.count += 1;
            tally.bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
            tally
        })
}

/// Check that `folder` exists and holds at least one supported image.
pub fn validate_image_folder(folder: &Path) -> Result<FileTally, FilesError> {
    if !folder.is_dir() {
        return Err(FilesError::MissingFolder(folder.to_path_buf()));
    }
    let tally = count_files(folder, true);
    if tally.count == 0 {
        return Err(FilesError::NoImages(folder.to_path_buf()));
    }
    Ok(tally)
}

/// Copy every file under `src` into `dst`, keeping the relative layout.
///
/// `on_file` receives `("Copying <rel>", percent)` after each file and may
/// return `false` to stop the copy.
pub fn copy_files(
    src: &Path,
    dst: &Path,
    on_file: &mut dyn FnMut(&str, u8) -> bool,
) -> Result<FileTally, FilesError> {
    let files: Vec<PathBuf> = files_under(src).map(|e| e.into_path()).collect();
    let total = files.len();
    let mut tally = FileTally::default();

    for (index, from) in files.iter().enumerate() {
        let rel = from.strip_prefix(src).unwrap_or(from);
        let to = dst.join(rel);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|source| FilesError::Copy {
                from: from.clone(),
                to: to.clone(),
                source,
            })?;
        }
        let bytes = fs::copy(from, &to).map_err(|source| FilesError::Copy {
            from: from.clone(),
            to: to.clone(),
            source,
        })?;
        tally.count += 1;
        tally.bytes += bytes;

        let percent = ((index + 1) * 100 / total.max(1)) as u8;
        let label = format!("Copying {}", rel.display());
        if !on_file(&label, percent) {
            return Err(FilesError::Aborted);
        }
    }

    Ok(tally)
}

/// Remove every file under `folder`, then its now-empty subdirectories.
///
/// `folder` itself is kept. Returns the number of files removed.
pub fn clear_folder(folder: &Path) -> Result<u64, FilesError> {
    if !folder.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in files_under(folder) {
        match fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(FilesError::Walk {
                    path: entry.path().to_path_buf(),
                    message: e.to_string(),
                })
            }
        }
    }

    // Deepest first so parents are empty by the time they are visited.
    let mut dirs: Vec<PathBuf> = WalkDir::new(folder)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect();
    dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
    for dir in dirs {
        let _ = fs::remove_dir(dir);
    }

    Ok(removed)
}
