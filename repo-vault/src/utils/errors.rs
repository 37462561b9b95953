//! Custom error types for repo-vault.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Repository not initialized")]
    NotBound,

    #[error("Local file not found: {0}")]
    FileNotFound(String),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("File too large ({size} bytes, limit {limit} bytes): {path}")]
    FileTooLarge { path: String, size: u64, limit: u64 },

    #[error("File not found in cloud: {0}")]
    NotFound(String),

    #[error("Version conflict: {0}")]
    Conflict(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Download failed: {0}")]
    Download(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Content decode error: {0}")]
    Decode(#[from] base64::DecodeError),
}

impl CloudError {
    /// True for errors meaning the remote path does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
