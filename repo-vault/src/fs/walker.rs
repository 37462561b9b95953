//! Directory traversal for backup operations.
//!
//! Relative paths are computed against the *parent* of the walked root, so
//! the root directory's own name is the first path component. Backing up
//! `/data/photos` yields `photos/2024/a.jpg`, not `2024/a.jpg`.

use std::path::{Component, Path, PathBuf};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// Information about a file discovered during walking
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Full path to the file
    pub path: PathBuf,

    /// Path relative to the parent of the walked root
    pub relative_path: PathBuf,

    /// File size in bytes
    pub size: u64,
}

impl FileInfo {
    /// Create FileInfo from a DirEntry.
    /// For symlinks, resolves to the target to get the real file size.
    /// Returns None if the symlink target is a directory or cannot be resolved.
    fn from_entry(entry: &DirEntry, base: &Path) -> std::io::Result<Option<Self>> {
        let raw_metadata = entry.metadata()?;
        let path = entry.path().to_path_buf();
        let relative_path = path.strip_prefix(base).unwrap_or(&path).to_path_buf();

        let size = if raw_metadata.is_symlink() {
            match std::fs::metadata(&path) {
                Ok(resolved) if resolved.is_dir() => return Ok(None),
                Ok(resolved) => resolved.len(),
                // Broken symlink
                Err(_) => return Ok(None),
            }
        } else {
            raw_metadata.len()
        };

        Ok(Some(Self {
            path,
            relative_path,
            size,
        }))
    }

    /// Relative path with `/` separators, as used on the remote side.
    pub fn remote_relative_path(&self) -> String {
        to_remote_path(&self.relative_path)
    }
}

/// Walk a directory tree and collect all files, in file-name order per directory.
/// Symlinks are not followed into directories.
///
/// Only an unreadable `root` is an error. Entries below it that cannot be
/// read are logged and skipped, so every readable file is still returned.
///
/// # Example
/// ```no_run
/// use repo_vault::fs::walker::walk_directory;
/// use std::path::Path;
///
/// let files = walk_directory(Path::new("/data")).unwrap();
/// println!("Found {} files", files.len());
/// ```
pub fn walk_directory(root: &Path) -> std::io::Result<Vec<FileInfo>> {
    std::fs::read_dir(root)?;

    let base = relative_base(root);
    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }

        match FileInfo::from_entry(&entry, &base) {
            Ok(Some(file_info)) => files.push(file_info),
            Ok(None) => {}
            Err(e) => warn!("Skipping {}: {}", entry.path().display(), e),
        }
    }

    Ok(files)
}

/// Join path components with `/` regardless of the host separator.
pub fn to_remote_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Convert a `/`-separated remote relative path into a local path.
pub fn from_remote_path(remote: &str) -> PathBuf {
    remote
        .split('/')
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .collect()
}

/// The directory relative paths are computed against: the parent of `root`.
/// A root without a usable parent (`/`, `.`) is its own base.
fn relative_base(root: &Path) -> PathBuf {
    let has_name = root
        .components()
        .next_back()
        .is_some_and(|c| matches!(c, Component::Normal(_)));

    match root.parent() {
        Some(parent) if has_name => parent.to_path_buf(),
        _ => root.to_path_buf(),
    }
}
