//! Outcome types for directory backup and restore.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Backup,
    Restore,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Success,
    Failed,
}

/// Outcome for one file of a backup or restore.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferItem {
    pub relative_path: String,
    pub status: ItemStatus,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a whole-tree transfer. `succeeded + failed` equals the number of
/// files found at scan time; `success` is `failed == 0` (and at least one file).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferReport {
    pub kind: TransferKind,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub destination: String,
    pub succeeded: usize,
    pub failed: usize,
    pub total_bytes: u64,
    pub items: Vec<TransferItem>,
    pub success: bool,
    pub message: String,
}

impl TransferReport {
    pub(crate) fn new(kind: TransferKind, source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            source: source.into(),
            destination: destination.into(),
            succeeded: 0,
            failed: 0,
            total_bytes: 0,
            items: Vec::new(),
            success: false,
            message: String::new(),
        }
    }

    /// A report that ended before any item was attempted.
    pub(crate) fn aborted(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.message = message.into();
        self
    }

    pub(crate) fn record_success(&mut self, relative_path: String, size: u64) {
        self.succeeded += 1;
        self.items.push(TransferItem {
            relative_path,
            status: ItemStatus::Success,
            size,
            error: None,
        });
    }

    pub(crate) fn record_failure(&mut self, relative_path: String, size: u64, error: String) {
        self.failed += 1;
        self.items.push(TransferItem {
            relative_path,
            status: ItemStatus::Failed,
            size,
            error: Some(error),
        });
    }

    /// Settle `success` and the summary message once every item was attempted.
    pub(crate) fn finish(&mut self) {
        self.success = self.failed == 0;
        let verb = match self.kind {
            TransferKind::Backup => "Uploaded",
            TransferKind::Restore => "Restored",
        };
        self.message = format!("{} {} files, errors: {}", verb, self.succeeded, self.failed);
    }

    pub fn failures(&self) -> impl Iterator<Item = &TransferItem> {
        self.items.iter().filter(|item| item.status == ItemStatus::Failed)
    }
}

/// Summary persisted next to a backup as `metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupMetadata {
    pub backup_dir: String,
    pub timestamp: DateTime<Utc>,
    pub files_count: usize,
    pub total_size: u64,
    pub status: String,
}

impl From<&TransferReport> for BackupMetadata {
    fn from(report: &TransferReport) -> Self {
        Self {
            backup_dir: report.destination.clone(),
            timestamp: report.timestamp,
            files_count: report.succeeded,
            total_size: report.total_bytes,
            status: if report.success { "success" } else { "partial" }.to_string(),
        }
    }
}
