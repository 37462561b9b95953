//! repo-vault library
//!
//! Uses a GitHub repository's contents as a file store: single-file upload,
//! download, listing and deletion, plus directory backup and restore.

pub mod config;
pub mod fs;
pub mod remote;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use remote::github::GitHubStore;
pub use remote::RemoteStore;
pub use transfer::FileTransfer;
pub use utils::errors::CloudError;
pub type Result<T> = std::result::Result<T, CloudError>;
