//! Remote store abstraction.
//!
//! A remote store holds named containers (repositories) whose entries are
//! addressed by `/`-separated paths. Writes to an existing entry carry the
//! entry's version token; a stale token is rejected with
//! [`CloudError::Conflict`](crate::CloudError::Conflict).

pub mod github;
#[cfg(test)]
pub(crate) mod memory;

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named storage container (a GitHub repository).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteContainer {
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub url: String,
    pub description: Option<String>,
    pub private: bool,
    /// Size in kilobytes as reported by the store
    pub size: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub language: Option<String>,
}

/// Parameters for creating a container.
#[derive(Debug, Clone, Serialize)]
pub struct NewContainer {
    pub name: String,
    pub description: String,
    pub private: bool,
    pub auto_init: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Submodule,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntryKind::File => "file",
            EntryKind::Dir => "dir",
            EntryKind::Symlink => "symlink",
            EntryKind::Submodule => "submodule",
        };
        f.pad(s)
    }
}

/// A file or directory node inside a container.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    pub size: u64,
    /// Content hash, passed back on update/delete
    pub version: String,
    /// Raw bytes; only populated when a single file is fetched
    pub content: Option<Vec<u8>>,
}

/// What lives at a path: one file, or the direct children of a directory.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryListing {
    File(RemoteEntry),
    Directory(Vec<RemoteEntry>),
}

impl EntryListing {
    /// Flatten into a list of entries (a file becomes a one-element list).
    pub fn into_entries(self) -> Vec<RemoteEntry> {
        match self {
            EntryListing::File(entry) => vec![entry],
            EntryListing::Directory(entries) => entries,
        }
    }
}

/// Operations the transfer layer needs from a hosted repository backend.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Login of the authenticated account; containers are created under it.
    async fn current_owner(&self) -> Result<String>;

    async fn get_container(&self, owner: &str, name: &str) -> Result<Option<RemoteContainer>>;

    async fn create_container(&self, spec: &NewContainer) -> Result<RemoteContainer>;

    /// `None` when nothing exists at `path`. An empty path is the container root.
    async fn get_entry(&self, container: &RemoteContainer, path: &str) -> Result<Option<EntryListing>>;

    async fn create_entry(
        &self,
        container: &RemoteContainer,
        path: &str,
        message: &str,
        content: &[u8],
    ) -> Result<()>;

    async fn update_entry(
        &self,
        container: &RemoteContainer,
        path: &str,
        message: &str,
        content: &[u8],
        version: &str,
    ) -> Result<()>;

    async fn delete_entry(
        &self,
        container: &RemoteContainer,
        path: &str,
        message: &str,
        version: &str,
    ) -> Result<()>;
}
