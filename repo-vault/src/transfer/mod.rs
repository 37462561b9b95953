//! File transfer orchestrator.
//!
//! Wraps a [`RemoteStore`] bound to one container and exposes single-file
//! operations plus directory backup and restore. Everything runs one item at
//! a time; a failed item is recorded and the run moves on. Nothing is rolled
//! back, so a failed backup legitimately leaves a partial tree behind.

pub mod progress;
pub mod report;

use crate::fs::walker::{from_remote_path, walk_directory};
use crate::remote::{EntryKind, EntryListing, NewContainer, RemoteContainer, RemoteEntry, RemoteStore};
use crate::utils::errors::{CloudError, Result};
use progress::{ProgressCallback, TransferProgress};
use report::{BackupMetadata, TransferKind, TransferReport};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Largest file accepted for upload (100 MiB).
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Description given to containers created by [`FileTransfer::bind_container`].
pub const CONTAINER_DESCRIPTION: &str = "Cloud Backup System - GitHub Cloud Integration";

/// Summary file written next to each backup.
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadOutcome {
    Created,
    Updated,
}

impl UploadOutcome {
    pub fn describe(&self, remote_path: &str) -> String {
        match self {
            UploadOutcome::Created => format!("File uploaded: {}", remote_path),
            UploadOutcome::Updated => format!("File updated: {}", remote_path),
        }
    }
}

/// One row of a remote directory listing.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileSummary {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    pub size: u64,
}

impl From<RemoteEntry> for FileSummary {
    fn from(entry: RemoteEntry) -> Self {
        Self {
            name: entry.name,
            path: entry.path,
            kind: entry.kind,
            size: entry.size,
        }
    }
}

/// A backup directory found under the backup base.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BackupSummary {
    pub name: String,
    pub path: String,
}

/// Sequential file transfer over a remote store.
pub struct FileTransfer<S> {
    store: S,
    container: Option<RemoteContainer>,
    progress: Option<ProgressCallback>,
}

impl<S: RemoteStore> FileTransfer<S> {
    /// Create an unbound orchestrator
    pub fn new(store: S) -> Self {
        Self {
            store,
            container: None,
            progress: None,
        }
    }

    /// Install a callback receiving backup/restore progress snapshots
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The bound container, if any
    pub fn container_info(&self) -> Option<&RemoteContainer> {
        self.container.as_ref()
    }

    fn bound(&self) -> Result<&RemoteContainer> {
        self.container.as_ref().ok_or(CloudError::NotBound)
    }

    fn emit(&self, progress: &TransferProgress) {
        if let Some(callback) = &self.progress {
            callback(progress);
        }
    }

    /// Bind to the container `name` owned by the authenticated account,
    /// creating it (private, auto-initialised) when it does not exist.
    pub async fn bind_container(&mut self, name: &str) -> Result<&RemoteContainer> {
        let owner = self.store.current_owner().await?;

        let container = match self.store.get_container(&owner, name).await? {
            Some(container) => {
                info!("Repository '{}' found", container.full_name);
                container
            }
            None => {
                warn!("Repository '{}/{}' not found, creating it", owner, name);
                let container = self
                    .store
                    .create_container(&NewContainer {
                        name: name.to_string(),
                        description: CONTAINER_DESCRIPTION.to_string(),
                        private: true,
                        auto_init: true,
                    })
                    .await?;
                info!("Repository '{}' created", container.full_name);
                container
            }
        };

        Ok(self.container.insert(container))
    }

    /// Upload one local file, creating or updating the remote entry.
    pub async fn upload_file(
        &self,
        local_path: &Path,
        remote_path: &str,
        message: Option<&str>,
    ) -> Result<UploadOutcome> {
        let container = self.bound()?;

        let metadata = match tokio::fs::metadata(local_path).await {
            Ok(m) if m.is_file() => m,
            _ => return Err(CloudError::FileNotFound(local_path.display().to_string())),
        };
        if metadata.len() > MAX_FILE_SIZE {
            return Err(CloudError::FileTooLarge {
                path: local_path.display().to_string(),
                size: metadata.len(),
                limit: MAX_FILE_SIZE,
            });
        }

        let content = tokio::fs::read(local_path).await?;
        let message = match message {
            Some(m) => m.to_string(),
            None => format!("Upload: {}", display_name(local_path)),
        };

        let outcome = self.put_bytes(container, remote_path, &message, &content).await?;
        debug!("{} ({} bytes)", outcome.describe(remote_path), content.len());
        Ok(outcome)
    }

    /// Create-or-update keyed on the current version token of `remote_path`.
    async fn put_bytes(
        &self,
        container: &RemoteContainer,
        remote_path: &str,
        message: &str,
        content: &[u8],
    ) -> Result<UploadOutcome> {
        match self.store.get_entry(container, remote_path).await? {
            Some(EntryListing::File(existing)) => {
                self.store
                    .update_entry(container, remote_path, message, content, &existing.version)
                    .await?;
                Ok(UploadOutcome::Updated)
            }
            Some(EntryListing::Directory(_)) => Err(CloudError::Conflict(format!(
                "{}: a directory exists at this path",
                remote_path
            ))),
            None => {
                self.store.create_entry(container, remote_path, message, content).await?;
                Ok(UploadOutcome::Created)
            }
        }
    }

    /// Download one remote file, creating missing local parent directories.
    /// Returns the number of bytes written. The write is not atomic.
    pub async fn download_file(&self, remote_path: &str, local_path: &Path) -> Result<u64> {
        let container = self.bound()?;

        let entry = match self.store.get_entry(container, remote_path).await {
            Ok(Some(EntryListing::File(entry))) if entry.kind == EntryKind::File => entry,
            Ok(_) => return Err(CloudError::NotFound(remote_path.to_string())),
            Err(e) if e.is_not_found() => return Err(CloudError::NotFound(remote_path.to_string())),
            Err(e) => return Err(CloudError::Download(e.to_string())),
        };
        let content = entry.content.unwrap_or_default();

        if let Some(parent) = local_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local_path, &content).await?;

        debug!("Downloaded {} -> {} ({} bytes)", remote_path, local_path.display(), content.len());
        Ok(content.len() as u64)
    }

    /// Direct children of `remote_path` (the root when empty). Errors are
    /// logged and yield an empty list.
    pub async fn list_files(&self, remote_path: &str) -> Vec<FileSummary> {
        let Ok(container) = self.bound() else {
            return Vec::new();
        };

        match self.store.get_entry(container, remote_path).await {
            Ok(Some(listing)) => listing.into_entries().into_iter().map(FileSummary::from).collect(),
            Ok(None) => Vec::new(),
            Err(e) => {
                error!("Failed to list files at '{}': {}", remote_path, e);
                Vec::new()
            }
        }
    }

    /// Delete one remote file using the version token fetched just before.
    pub async fn delete_file(&self, remote_path: &str) -> Result<()> {
        let container = self.bound()?;

        let entry = match self.store.get_entry(container, remote_path).await? {
            Some(EntryListing::File(entry)) => entry,
            Some(EntryListing::Directory(_)) => {
                return Err(CloudError::Conflict(format!(
                    "{}: a directory exists at this path",
                    remote_path
                )))
            }
            None => return Err(CloudError::NotFound(remote_path.to_string())),
        };

        let message = format!("Delete: {}", entry.name);
        self.store
            .delete_entry(container, remote_path, &message, &entry.version)
            .await?;
        info!("File deleted: {}", remote_path);
        Ok(())
    }

    /// Backup directories directly under `base_dir`.
    pub async fn list_backups(&self, base_dir: &str) -> Vec<BackupSummary> {
        let Ok(container) = self.bound() else {
            return Vec::new();
        };

        match self.store.get_entry(container, base_dir).await {
            Ok(Some(listing)) => listing
                .into_entries()
                .into_iter()
                .filter(|entry| entry.kind == EntryKind::Dir)
                .map(|entry| BackupSummary {
                    name: entry.name,
                    path: entry.path,
                })
                .collect(),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to list backups under '{}': {}", base_dir, e);
                Vec::new()
            }
        }
    }

    /// Upload every file under `local_dir` to `remote_dir/<dir name>/...`.
    pub async fn backup_directory(&self, local_dir: &Path, remote_dir: &str) -> TransferReport {
        let report = TransferReport::new(TransferKind::Backup, local_dir.display().to_string(), remote_dir);

        if self.container.is_none() {
            return report.aborted(CloudError::NotBound.to_string());
        }
        if !local_dir.is_dir() {
            return report.aborted(CloudError::DirectoryNotFound(local_dir.display().to_string()).to_string());
        }

        info!("Starting backup: {} -> {}", local_dir.display(), remote_dir);

        // Directory walk is blocking I/O
        let root = local_dir.to_path_buf();
        let files = match tokio::task::spawn_blocking(move || walk_directory(&root)).await {
            Ok(Ok(files)) => files,
            Ok(Err(e)) => return report.aborted(format!("Failed to scan {}: {}", local_dir.display(), e)),
            Err(e) => return report.aborted(format!("Directory scan task failed: {}", e)),
        };

        if files.is_empty() {
            return report.aborted("No files to back up");
        }

        let remote_root = remote_dir.trim_matches('/');
        let total_bytes: u64 = files.iter().map(|f| f.size).sum();
        let mut progress = TransferProgress::new(total_bytes, files.len());
        let mut report = report;

        info!("Found {} files ({} bytes) to back up", files.len(), total_bytes);

        for file in &files {
            let relative = file.remote_relative_path();
            let remote_path = join_remote(remote_root, &relative);

            progress.set_current_file(relative.clone());
            self.emit(&progress);

            report.total_bytes += file.size;
            let message = format!("Backup: {}", relative);
            match self.upload_file(&file.path, &remote_path, Some(&message)).await {
                Ok(outcome) => {
                    debug!("{}", outcome.describe(&remote_path));
                    report.record_success(relative, file.size);
                }
                Err(e) => {
                    warn!("Failed to back up {}: {}", relative, e);
                    report.record_failure(relative, file.size, e.to_string());
                }
            }

            progress.finish_file(file.size);
            self.emit(&progress);
        }

        report.finish();
        info!("Backup finished: {}", report.message);

        self.save_backup_metadata(&report, remote_root).await;
        report
    }

    /// Write `metadata.json` for a finished backup. Failures are only logged.
    async fn save_backup_metadata(&self, report: &TransferReport, remote_root: &str) {
        let Ok(container) = self.bound() else { return };

        let metadata = BackupMetadata::from(report);
        let body = match serde_json::to_vec_pretty(&metadata) {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to serialize backup metadata: {}", e);
                return;
            }
        };

        let path = join_remote(remote_root, METADATA_FILE);
        if let Err(e) = self.put_bytes(container, &path, "Update backup metadata", &body).await {
            warn!("Failed to save backup metadata to {}: {}", path, e);
        }
    }

    /// Download every file under `remote_dir` into `local_root`, keeping the
    /// relative layout. Subdirectories whose listing fails are skipped.
    pub async fn restore_backup(&self, remote_dir: &str, local_root: &Path) -> TransferReport {
        let report = TransferReport::new(TransferKind::Restore, remote_dir, local_root.display().to_string());

        let Ok(container) = self.bound() else {
            return report.aborted(CloudError::NotBound.to_string());
        };

        info!("Starting restore: {} -> {}", remote_dir, local_root.display());

        let remote_root = remote_dir.trim_matches('/');
        let listing = match self.store.get_entry(container, remote_root).await {
            Ok(Some(listing)) => listing,
            Ok(None) => return report.aborted(format!("Directory not found in cloud: {}", remote_dir)),
            Err(e) if e.is_not_found() => {
                return report.aborted(format!("Directory not found in cloud: {}", remote_dir))
            }
            Err(e) => return report.aborted(format!("Restore failed: {}", e)),
        };

        let metadata_path = join_remote(remote_root, METADATA_FILE);
        let mut files = self.collect_files(container, listing.into_entries()).await;
        files.retain(|entry| entry.path != metadata_path);

        if files.is_empty() {
            return report.aborted("No files to restore");
        }

        if let Err(e) = tokio::fs::create_dir_all(local_root).await {
            return report.aborted(format!("Failed to create {}: {}", local_root.display(), e));
        }

        let total_bytes: u64 = files.iter().map(|f| f.size).sum();
        let mut progress = TransferProgress::new(total_bytes, files.len());
        let mut report = report;

        info!("Found {} files ({} bytes) to restore", files.len(), total_bytes);

        for entry in &files {
            let relative = relative_remote_path(entry, remote_root);
            let local_path = local_root.join(from_remote_path(&relative));

            progress.set_current_file(relative.clone());
            self.emit(&progress);

            match self.download_file(&entry.path, &local_path).await {
                Ok(bytes) => {
                    report.total_bytes += bytes;
                    report.record_success(relative, bytes);
                }
                Err(e) => {
                    warn!("Failed to restore {}: {}", relative, e);
                    report.record_failure(relative, entry.size, e.to_string());
                }
            }

            progress.finish_file(entry.size);
            self.emit(&progress);
        }

        report.finish();
        info!("Restore finished: {}", report.message);
        report
    }

    /// Depth-first expansion of directory entries into file entries, keeping
    /// listing order. A subdirectory that cannot be listed is dropped.
    async fn collect_files(&self, container: &RemoteContainer, entries: Vec<RemoteEntry>) -> Vec<RemoteEntry> {
        let mut files = Vec::new();
        let mut stack: Vec<RemoteEntry> = entries.into_iter().rev().collect();

        while let Some(entry) = stack.pop() {
            match entry.kind {
                EntryKind::File => files.push(entry),
                EntryKind::Dir => match self.store.get_entry(container, &entry.path).await {
                    Ok(Some(listing)) => stack.extend(listing.into_entries().into_iter().rev()),
                    Ok(None) => {}
                    Err(e) => warn!("Skipping {}: listing failed: {}", entry.path, e),
                },
                other => debug!("Skipping {} entry {}", other, entry.path),
            }
        }

        files
    }
}

fn join_remote(root: &str, relative: &str) -> String {
    if root.is_empty() {
        relative.to_string()
    } else {
        format!("{}/{}", root, relative)
    }
}

/// Path of `entry` below `remote_root`; an entry that is the root itself
/// (restoring a single file) keeps just its name.
fn relative_remote_path(entry: &RemoteEntry, remote_root: &str) -> String {
    if remote_root.is_empty() {
        return entry.path.clone();
    }
    entry
        .path
        .strip_prefix(remote_root)
        .and_then(|rest| rest.strip_prefix('/'))
        .map(str::to_string)
        .unwrap_or_else(|| entry.name.clone())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
