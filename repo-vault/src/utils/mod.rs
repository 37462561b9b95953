//! Utility modules for repo-vault.

pub mod errors;
pub mod logger;
pub mod shutdown;

pub use errors::{CloudError, Result};
