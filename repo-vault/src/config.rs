//! Configuration management for repo-vault.
//!
//! Loads configuration from a TOML file with environment variable overrides.
//! A `.env` file in the working directory is honoured when present.

use crate::utils::errors::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_API_URL: &str = "GITHUB_API_URL";
pub const ENV_REPOSITORY: &str = "REPO_VAULT_REPOSITORY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Personal access token
    #[serde(default)]
    pub token: String,

    /// REST API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// User-Agent header sent with every request (required by GitHub)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Connect timeout, and the longest wait for the next chunk of a
    /// response, in seconds. A whole upload or download may take longer.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Repository used as the storage container
    #[serde(default = "default_repository")]
    pub repository: String,

    /// Base directory for backups inside the repository
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_user_agent() -> String {
    concat!("repo-vault/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_repository() -> String {
    "cloud-backup-demo".to_string()
}

fn default_backup_dir() -> String {
    "backups".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: default_api_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            repository: default_repository(),
            backup_dir: default_backup_dir(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CloudError::Config(e.to_string()))
    }

    /// Load the file (if any), then apply `.env` and process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };

        let _ = dotenvy::dotenv();
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.is_empty()) {
            self.github.token = token;
        }
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.github.api_url = url;
        }
        if let Some(repo) = lookup(ENV_REPOSITORY).filter(|v| !v.is_empty()) {
            self.storage.repository = repo;
        }
    }

    /// The access token, or a configuration error when none was supplied.
    pub fn require_token(&self) -> Result<&str> {
        if self.github.token.trim().is_empty() {
            return Err(CloudError::Config(format!(
                "GitHub token not found. Set the {} environment variable or github.token in the config file",
                ENV_TOKEN
            )));
        }
        Ok(&self.github.token)
    }
}
