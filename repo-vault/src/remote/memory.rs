//! In-process `RemoteStore` used by the test suite.
//!
//! Directories are implicit: a path is a directory when some stored file
//! lives beneath it. Version tokens are a per-write counter.

use super::{EntryKind, EntryListing, NewContainer, RemoteContainer, RemoteEntry, RemoteStore};
use crate::utils::errors::{CloudError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const OWNER: &str = "tester";

#[derive(Debug, Clone)]
struct StoredFile {
    content: Vec<u8>,
    version: String,
}

#[derive(Default)]
struct State {
    containers: HashMap<String, RemoteContainer>,
    files: HashMap<String, BTreeMap<String, StoredFile>>,
    next_version: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    calls: AtomicUsize,
    /// Paths whose create/update is rejected
    reject_writes: Mutex<HashSet<String>>,
    /// Directory paths whose listing fails
    reject_listings: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of trait calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reject_writes_to(&self, path: &str) {
        self.reject_writes.lock().unwrap().insert(path.to_string());
    }

    pub fn reject_listing_of(&self, path: &str) {
        self.reject_listings.lock().unwrap().insert(path.to_string());
    }

    /// Stored bytes at `path` in container `name`.
    pub fn file(&self, name: &str, path: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state.files.get(name)?.get(path).map(|f| f.content.clone())
    }

    /// All stored file paths in container `name`, sorted.
    pub fn paths(&self, name: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .files
            .get(name)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Seed a file directly, bypassing the call counter.
    pub fn insert(&self, name: &str, path: &str, content: &[u8]) {
        let mut state = self.state.lock().unwrap();
        let version = next_version(&mut state);
        state.files.entry(name.to_string()).or_default().insert(
            path.to_string(),
            StoredFile {
                content: content.to_vec(),
                version,
            },
        );
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn check_write(&self, path: &str) -> Result<()> {
        if self.reject_writes.lock().unwrap().contains(path) {
            return Err(CloudError::Api {
                status: 500,
                message: format!("write rejected: {}", path),
            });
        }
        Ok(())
    }
}

fn next_version(state: &mut State) -> String {
    state.next_version += 1;
    format!("v{}", state.next_version)
}

fn file_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn current_owner(&self) -> Result<String> {
        self.hit();
        Ok(OWNER.to_string())
    }

    async fn get_container(&self, owner: &str, name: &str) -> Result<Option<RemoteContainer>> {
        self.hit();
        let state = self.state.lock().unwrap();
        Ok(state.containers.get(name).filter(|c| c.owner == owner).cloned())
    }

    async fn create_container(&self, spec: &NewContainer) -> Result<RemoteContainer> {
        self.hit();
        let mut state = self.state.lock().unwrap();
        if state.containers.contains_key(&spec.name) {
            return Err(CloudError::Conflict(format!("{}: name already exists", spec.name)));
        }
        let container = RemoteContainer {
            owner: OWNER.to_string(),
            name: spec.name.clone(),
            full_name: format!("{}/{}", OWNER, spec.name),
            url: format!("memory://{}/{}", OWNER, spec.name),
            description: Some(spec.description.clone()),
            private: spec.private,
            size: 0,
            created_at: Some(chrono::Utc::now()),
            updated_at: Some(chrono::Utc::now()),
            language: None,
        };
        state.containers.insert(spec.name.clone(), container.clone());
        state.files.entry(spec.name.clone()).or_default();
        Ok(container)
    }

    async fn get_entry(&self, container: &RemoteContainer, path: &str) -> Result<Option<EntryListing>> {
        self.hit();
        let path = path.trim_matches('/');
        if self.reject_listings.lock().unwrap().contains(path) {
            return Err(CloudError::Api {
                status: 503,
                message: format!("listing failed: {}", path),
            });
        }

        let state = self.state.lock().unwrap();
        let Some(files) = state.files.get(&container.name) else {
            return Ok(None);
        };

        if let Some(file) = files.get(path) {
            return Ok(Some(EntryListing::File(RemoteEntry {
                name: file_name(path),
                path: path.to_string(),
                kind: EntryKind::File,
                size: file.content.len() as u64,
                version: file.version.clone(),
                content: Some(file.content.clone()),
            })));
        }

        let prefix = if path.is_empty() { String::new() } else { format!("{}/", path) };
        let mut children: BTreeMap<String, RemoteEntry> = BTreeMap::new();
        for (full, file) in files.range(prefix.clone()..) {
            let Some(rest) = full.strip_prefix(&prefix) else { break };
            let entry = match rest.split_once('/') {
                Some((dir, _)) => RemoteEntry {
                    name: dir.to_string(),
                    path: format!("{}{}", prefix, dir),
                    kind: EntryKind::Dir,
                    size: 0,
                    version: String::new(),
                    content: None,
                },
                None => RemoteEntry {
                    name: rest.to_string(),
                    path: full.clone(),
                    kind: EntryKind::File,
                    size: file.content.len() as u64,
                    version: file.version.clone(),
                    content: None,
                },
            };
            children.entry(entry.name.clone()).or_insert(entry);
        }

        if children.is_empty() {
            return Ok(None);
        }
        Ok(Some(EntryListing::Directory(children.into_values().collect())))
    }

    async fn create_entry(
        &self,
        container: &RemoteContainer,
        path: &str,
        _message: &str,
        content: &[u8],
    ) -> Result<()> {
        self.hit();
        self.check_write(path)?;
        let mut state = self.state.lock().unwrap();
        let version = next_version(&mut state);
        let files = state.files.entry(container.name.clone()).or_default();
        if files.contains_key(path) {
            return Err(CloudError::Conflict(format!("{}: sha wasn't supplied", path)));
        }
        files.insert(
            path.to_string(),
            StoredFile {
                content: content.to_vec(),
                version,
            },
        );
        Ok(())
    }

    async fn update_entry(
        &self,
        container: &RemoteContainer,
        path: &str,
        _message: &str,
        content: &[u8],
        version: &str,
    ) -> Result<()> {
        self.hit();
        self.check_write(path)?;
        let mut state = self.state.lock().unwrap();
        let new_version = next_version(&mut state);
        let file = state
            .files
            .get_mut(&container.name)
            .and_then(|files| files.get_mut(path))
            .ok_or_else(|| CloudError::NotFound(path.to_string()))?;
        if file.version != version {
            return Err(CloudError::Conflict(format!("{}: does not match {}", path, version)));
        }
        file.content = content.to_vec();
        file.version = new_version;
        Ok(())
    }

    async fn delete_entry(
        &self,
        container: &RemoteContainer,
        path: &str,
        _message: &str,
        version: &str,
    ) -> Result<()> {
        self.hit();
        let mut state = self.state.lock().unwrap();
        let files = state
            .files
            .get_mut(&container.name)
            .ok_or_else(|| CloudError::NotFound(path.to_string()))?;
        let current = files
            .get(path)
            .map(|f| f.version.clone())
            .ok_or_else(|| CloudError::NotFound(path.to_string()))?;
        if current != version {
            return Err(CloudError::Conflict(format!("{}: does not match {}", path, version)));
        }
        files.remove(path);
        Ok(())
    }
}
