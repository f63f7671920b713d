//! workspace::remote
//!
//! Remote candidate selection.
//!
//! Remotes that name a filesystem location (`file://` URLs, drive paths,
//! UNC shares, absolute paths) can be checked for accessibility before use.
//! Anything else is a network endpoint and is assumed reachable.

use std::path::PathBuf;

use url::Url;

/// The local filesystem path a remote refers to, if it is one.
///
/// `file://` URLs with a host resolve to UNC paths on Windows; elsewhere
/// they cannot be checked and count as network remotes.
pub fn local_path_from_remote(remote: &str) -> Option<PathBuf> {
    let text = remote.trim();
    if text.starts_with("\\\\") || has_drive_prefix(text) || text.starts_with('/') {
        return Some(PathBuf::from(text));
    }
    match Url::parse(text) {
        Ok(url) if url.scheme() == "file" => file_url_path(&url),
        _ => None,
    }
}

fn file_url_path(url: &Url) -> Option<PathBuf> {
    let path = url.to_file_path().ok()?;
    // `file:///C:/x` off Windows decodes to `/C:/x`.
    match path.to_str() {
        Some(text) if has_drive_after_slash(text) => Some(PathBuf::from(&text[1..])),
        _ => Some(path),
    }
}

/// Whether `remote` can be used: network remotes always, paths if present.
pub fn remote_accessible(remote: &str) -> bool {
    match local_path_from_remote(remote) {
        Some(path) => path.exists(),
        None => true,
    }
}

/// First accessible candidate, else the first listed one.
pub fn select_remote(candidates: &[String]) -> Option<String> {
    candidates
        .iter()
        .find(|c| remote_accessible(c))
        .or_else(|| candidates.first())
        .cloned()
}

/// `C:\` or `C:/`.
fn has_drive_prefix(text: &str) -> bool {
    let b = text.as_bytes();
    b.len() >= 3 && b[0].is_ascii_alphabetic() && b[1] == b':' && (b[2] == b'\\' || b[2] == b'/')
}

/// `/C:` as produced by `file:///C:/...`.
fn has_drive_after_slash(text: &str) -> bool {
    let b = text.as_bytes();
    b.len() >= 3 && b[0] == b'/' && b[1].is_ascii_alphabetic() && b[2] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_urls_decode() {
        assert_eq!(
            local_path_from_remote("file:///C:/Shared%20Data/repo.git"),
            Some(PathBuf::from("C:/Shared Data/repo.git"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn file_urls_decode_unix_paths() {
        assert_eq!(
            local_path_from_remote("file:///srv/git/p.git"),
            Some(PathBuf::from("/srv/git/p.git"))
        );
        assert_eq!(
            local_path_from_remote("file:///srv/a%23b/p.git"),
            Some(PathBuf::from("/srv/a#b/p.git"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn file_url_query_and_fragment_are_not_path() {
        assert_eq!(
            local_path_from_remote("file:///tmp/store?ro=1"),
            Some(PathBuf::from("/tmp/store"))
        );
        assert_eq!(
            local_path_from_remote("file:///tmp/store#x"),
            Some(PathBuf::from("/tmp/store"))
        );

        let temp = TempDir::new().unwrap();
        let url = format!("file://{}?ro=1", temp.path().display());
        assert!(remote_accessible(&url));
    }

    #[cfg(unix)]
    #[test]
    fn file_url_with_host_is_not_checked() {
        assert_eq!(local_path_from_remote("file://nas/share/p.git"), None);
        assert!(remote_accessible("file://nas/share/p.git"));
    }

    #[cfg(windows)]
    #[test]
    fn file_url_with_host_is_unc() {
        assert_eq!(
            local_path_from_remote("file://nas/share/p.git"),
            Some(PathBuf::from(r"\\nas\share\p.git"))
        );
    }

    #[test]
    fn paths_are_local() {
        assert!(local_path_from_remote(r"\\nas\share\p.git").is_some());
        assert!(local_path_from_remote(r"D:\repos\p.git").is_some());
        assert!(local_path_from_remote("/mnt/share/p.git").is_some());
    }

    #[test]
    fn network_remotes_are_not_local() {
        assert_eq!(local_path_from_remote("ssh://git@host/p.git"), None);
        assert_eq!(local_path_from_remote("git@host:p.git"), None);
        assert_eq!(local_path_from_remote("s3://bucket/dvc"), None);
        assert!(remote_accessible("https://host/p.git"));
    }

    #[test]
    fn selection_prefers_reachable() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing").display().to_string();
        let present = temp.path().display().to_string();

        assert_eq!(
            select_remote(&[missing.clone(), present.clone()]),
            Some(present)
        );
        assert_eq!(select_remote(&[missing.clone()]), Some(missing));
        assert_eq!(select_remote(&[]), None);
    }
}
