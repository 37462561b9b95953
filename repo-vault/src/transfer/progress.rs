//! Progress tracking for backup and restore runs.
//!
//! The orchestrator publishes a [`TransferProgress`] snapshot before and after
//! every item; front ends render it however they like.

use std::sync::Arc;

/// Callback invoked with each progress snapshot
pub type ProgressCallback = Arc<dyn Fn(&TransferProgress) + Send + Sync>;

/// Progress information for a multi-file transfer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferProgress {
    /// Total bytes to transfer
    pub total_bytes: u64,

    /// Bytes of processed items so far (succeeded or failed)
    pub transferred_bytes: u64,

    /// Percentage complete by bytes (0-100)
    pub percent_complete: f64,

    /// Number of files processed
    pub files_processed: usize,

    /// Total number of files
    pub total_files: usize,

    /// Current file being processed
    pub current_file: Option<String>,
}

impl TransferProgress {
    pub fn new(total_bytes: u64, total_files: usize) -> Self {
        Self {
            total_bytes,
            transferred_bytes: 0,
            percent_complete: 0.0,
            files_processed: 0,
            total_files,
            current_file: None,
        }
    }

    /// Set current file being processed
    pub fn set_current_file(&mut self, file_path: String) {
        self.current_file = Some(file_path);
    }

    /// Mark the current file as processed
    pub fn finish_file(&mut self, size: u64) {
        self.files_processed += 1;
        self.transferred_bytes += size;
        self.current_file = None;
        self.percent_complete = if self.total_bytes > 0 {
            ((self.transferred_bytes as f64 / self.total_bytes as f64) * 100.0).min(100.0)
        } else if self.total_files > 0 {
            (self.files_processed as f64 / self.total_files as f64) * 100.0
        } else {
            100.0
        };
    }

    pub fn is_complete(&self) -> bool {
        self.files_processed >= self.total_files
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format duration as human-readable string
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
