//! GitHub REST v3 backend.
//!
//! Containers are repositories; entries are served by the "contents" API.
//! File bodies travel base64-encoded. Files above 1 MB come back without
//! inline content and are re-fetched with the raw media type.

use super::{EntryKind, EntryListing, NewContainer, RemoteContainer, RemoteEntry, RemoteStore};
use crate::config::Config;
use crate::utils::errors::{CloudError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, ClientBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const API_VERSION: &str = "2022-11-28";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw+json";

/// Authenticated GitHub API client.
#[derive(Clone)]
pub struct GitHubStore {
    client: Client,
    api_url: Url,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Debug, Deserialize)]
struct OwnerResponse {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    name: String,
    full_name: String,
    html_url: String,
    description: Option<String>,
    private: bool,
    #[serde(default)]
    size: u64,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    language: Option<String>,
    owner: OwnerResponse,
}

impl From<RepoResponse> for RemoteContainer {
    fn from(repo: RepoResponse) -> Self {
        RemoteContainer {
            owner: repo.owner.login,
            name: repo.name,
            full_name: repo.full_name,
            url: repo.html_url,
            description: repo.description,
            private: repo.private,
            size: repo.size,
            created_at: repo.created_at,
            updated_at: repo.updated_at,
            language: repo.language,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    name: String,
    path: String,
    sha: String,
    #[serde(default)]
    size: u64,
    #[serde(rename = "type")]
    kind: EntryKind,
    content: Option<String>,
    encoding: Option<String>,
}

impl ContentItem {
    fn into_entry(self, content: Option<Vec<u8>>) -> RemoteEntry {
        RemoteEntry {
            name: self.name,
            path: self.path,
            kind: self.kind,
            size: self.size,
            version: self.sha,
            content,
        }
    }
}

/// A path resolves to a single object or to a directory listing.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Listing(Vec<ContentItem>),
    Single(ContentItem),
}

#[derive(Debug, Serialize)]
struct PutContentRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct DeleteContentRequest<'a> {
    message: &'a str,
    sha: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl GitHubStore {
    /// Build a client from configuration. Fails when no token is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = client_builder(config)?.build()?;

        let api_url = Url::parse(&config.github.api_url)
            .map_err(|e| CloudError::Config(format!("Invalid API URL {}: {}", config.github.api_url, e)))?;

        Ok(Self { client, api_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        build_url(&self.api_url, segments)
    }

    fn contents_url(&self, container: &RemoteContainer, path: &str) -> Result<Url> {
        let mut segments = vec!["repos", container.owner.as_str(), container.name.as_str(), "contents"];
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if parts.is_empty() {
            // Root listing is `/contents/`
            segments.push("");
        } else {
            segments.extend(parts);
        }
        self.endpoint(&segments)
    }

    async fn fetch_raw(&self, url: Url) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .header(ACCEPT, RAW_MEDIA_TYPE)
            .send()
            .await?;
        let resp = check_status(resp, "raw content").await?;
        Ok(resp.bytes().await?.to_vec())
    }

    async fn put_content(
        &self,
        container: &RemoteContainer,
        path: &str,
        message: &str,
        content: &[u8],
        version: Option<&str>,
    ) -> Result<()> {
        let url = self.contents_url(container, path)?;
        let body = PutContentRequest {
            message,
            content: STANDARD.encode(content),
            sha: version,
        };

        debug!("PUT {} ({} bytes, update: {})", path, content.len(), version.is_some());
        let resp = self.client.put(url).json(&body).send().await?;
        check_status(resp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for GitHubStore {
    async fn current_owner(&self) -> Result<String> {
        let resp = self.client.get(self.endpoint(&["user"])?).send().await?;
        let user: UserResponse = check_status(resp, "user").await?.json().await?;
        Ok(user.login)
    }

    async fn get_container(&self, owner: &str, name: &str) -> Result<Option<RemoteContainer>> {
        let url = self.endpoint(&["repos", owner, name])?;
        let resp = self.client.get(url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let repo: RepoResponse = check_status(resp, name).await?.json().await?;
        Ok(Some(repo.into()))
    }

    async fn create_container(&self, spec: &NewContainer) -> Result<RemoteContainer> {
        let url = self.endpoint(&["user", "repos"])?;
        let resp = self.client.post(url).json(spec).send().await?;
        let repo: RepoResponse = check_status(resp, &spec.name).await?.json().await?;
        Ok(repo.into())
    }

    async fn get_entry(&self, container: &RemoteContainer, path: &str) -> Result<Option<EntryListing>> {
        let url = self.contents_url(container, path)?;
        let resp = self.client.get(url.clone()).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let contents: ContentsResponse = check_status(resp, path).await?.json().await?;
        let listing = match contents {
            ContentsResponse::Listing(items) => {
                EntryListing::Directory(items.into_iter().map(|item| item.into_entry(None)).collect())
            }
            ContentsResponse::Single(item) => {
                let content = match decode_inline_content(&item)? {
                    Some(bytes) => Some(bytes),
                    None if item.kind == EntryKind::File => Some(self.fetch_raw(url).await?),
                    None => None,
                };
                EntryListing::File(item.into_entry(content))
            }
        };
        Ok(Some(listing))
    }

    async fn create_entry(
        &self,
        container: &RemoteContainer,
        path: &str,
        message: &str,
        content: &[u8],
    ) -> Result<()> {
        self.put_content(container, path, message, content, None).await
    }

    async fn update_entry(
        &self,
        container: &RemoteContainer,
        path: &str,
        message: &str,
        content: &[u8],
        version: &str,
    ) -> Result<()> {
        self.put_content(container, path, message, content, Some(version)).await
    }

    async fn delete_entry(
        &self,
        container: &RemoteContainer,
        path: &str,
        message: &str,
        version: &str,
    ) -> Result<()> {
        let url = self.contents_url(container, path)?;
        let body = DeleteContentRequest { message, sha: version };
        let resp = self.client.delete(url).json(&body).send().await?;
        check_status(resp, path).await?;
        Ok(())
    }
}

/// Client with auth headers and per-phase timeouts. The read timeout resets
/// on every chunk received; there is no deadline for a whole request.
fn client_builder(config: &Config) -> Result<ClientBuilder> {
    let token = config.require_token()?;

    let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| CloudError::Config("GitHub token contains invalid characters".into()))?;
    auth.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);
    headers.insert(ACCEPT, HeaderValue::from_static(JSON_MEDIA_TYPE));
    headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));

    let timeout = Duration::from_secs(config.github.timeout_secs);
    Ok(Client::builder()
        .default_headers(headers)
        .user_agent(config.github.user_agent.clone())
        .connect_timeout(timeout)
        .read_timeout(timeout))
}

fn build_url(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| CloudError::Config(format!("Invalid API URL: {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Inline file content, if the response carried it. `None` means the body
/// was omitted (large file, or not a file) and must be fetched separately.
fn decode_inline_content(item: &ContentItem) -> Result<Option<Vec<u8>>> {
    if item.kind != EntryKind::File {
        return Ok(None);
    }
    match (item.encoding.as_deref(), item.content.as_deref()) {
        (Some("base64"), Some(encoded)) => {
            let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            if compact.is_empty() && item.size > 0 {
                return Ok(None);
            }
            Ok(Some(STANDARD.decode(compact)?))
        }
        _ if item.size == 0 => Ok(Some(Vec::new())),
        _ => Ok(None),
    }
}

async fn check_status(resp: Response, what: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&text)
        .map(|body| body.message)
        .unwrap_or(text);
    Err(error_for_status(status, what, message))
}

fn error_for_status(status: StatusCode, what: &str, message: String) -> CloudError {
    match status {
        StatusCode::NOT_FOUND => CloudError::NotFound(what.to_string()),
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            CloudError::Conflict(format!("{}: {}", what, message))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CloudError::Authentication(message),
        _ => CloudError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container() -> RemoteContainer {
        RemoteContainer {
            owner: "octo".into(),
            name: "vault".into(),
            full_name: "octo/vault".into(),
            url: "https://github.com/octo/vault".into(),
            description: None,
            private: true,
            size: 0,
            created_at: None,
            updated_at: None,
            language: None,
        }
    }

    fn store(api_url: &str) -> GitHubStore {
        let mut config = Config::default();
        config.github.token = "ghp_test".into();
        config.github.api_url = api_url.into();
        GitHubStore::from_config(&config).unwrap()
    }

    #[test]
    fn test_requires_token() {
        let result = GitHubStore::from_config(&Config::default());
        assert!(matches!(result, Err(CloudError::Config(_))));
    }

    #[test]
    fn test_contents_url_encodes_segments() {
        let store = store("https://api.github.com");
        let url = store.contents_url(&container(), "backups/my dir/a#b.txt").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/octo/vault/contents/backups/my%20dir/a%23b.txt"
        );
    }

    #[test]
    fn test_contents_url_root_and_enterprise_base() {
        let store = store("https://ghe.example.com/api/v3/");
        let url = store.contents_url(&container(), "").unwrap();
        assert_eq!(url.as_str(), "https://ghe.example.com/api/v3/repos/octo/vault/contents/");
    }

    #[test]
    fn test_decode_inline_base64_with_newlines() {
        let item: ContentItem = serde_json::from_value(serde_json::json!({
            "name": "a.txt",
            "path": "dir/a.txt",
            "sha": "abc123",
            "size": 11,
            "type": "file",
            "content": "aGVsbG8g\nd29ybGQ=\n",
            "encoding": "base64"
        }))
        .unwrap();

        assert_eq!(decode_inline_content(&item).unwrap(), Some(b"hello world".to_vec()));
        let entry = item.into_entry(None);
        assert_eq!(entry.version, "abc123");
        assert_eq!(entry.kind, EntryKind::File);
    }

    #[test]
    fn test_decode_large_file_needs_raw_fetch() {
        let item: ContentItem = serde_json::from_value(serde_json::json!({
            "name": "big.bin",
            "path": "big.bin",
            "sha": "def456",
            "size": 5_000_000,
            "type": "file",
            "content": "",
            "encoding": "none"
        }))
        .unwrap();

        assert_eq!(decode_inline_content(&item).unwrap(), None);
    }

    #[test]
    fn test_directory_listing_deserializes() {
        let body = serde_json::json!([
            {"name": "a.txt", "path": "b/a.txt", "sha": "1", "size": 3, "type": "file"},
            {"name": "sub", "path": "b/sub", "sha": "2", "size": 0, "type": "dir"}
        ]);
        match serde_json::from_value::<ContentsResponse>(body).unwrap() {
            ContentsResponse::Listing(items) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[1].kind, EntryKind::Dir);
            }
            ContentsResponse::Single(_) => panic!("expected listing"),
        }
    }

    #[test]
    fn test_repo_response_into_container() {
        let repo: RepoResponse = serde_json::from_value(serde_json::json!({
            "name": "vault",
            "full_name": "octo/vault",
            "html_url": "https://github.com/octo/vault",
            "description": "Cloud Backup System - GitHub Cloud Integration",
            "private": true,
            "size": 42,
            "created_at": "2024-01-02T03:04:05Z",
            "updated_at": "2024-01-03T03:04:05Z",
            "language": null,
            "owner": {"login": "octo"}
        }))
        .unwrap();

        let container: RemoteContainer = repo.into();
        assert_eq!(container.owner, "octo");
        assert!(container.private);
        assert_eq!(container.size, 42);
        assert!(container.created_at.is_some());
    }

    #[tokio::test]
    async fn test_slow_steady_response_outlives_timeout() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await.unwrap();

            let body = br#"{"login":"octo"}"#;
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            // 2.4s in total, never more than 600ms between chunks
            for chunk in body.chunks(4) {
                tokio::time::sleep(Duration::from_millis(600)).await;
                socket.write_all(chunk).await.unwrap();
                socket.flush().await.unwrap();
            }
        });

        let mut config = Config::default();
        config.github.token = "ghp_test".into();
        config.github.timeout_secs = 1;
        let store = GitHubStore {
            client: client_builder(&config).unwrap().no_proxy().build().unwrap(),
            api_url: Url::parse(&format!("http://{}/", addr)).unwrap(),
        };

        assert_eq!(store.current_owner().await.unwrap(), "octo");
        server.await.unwrap();
    }

    #[test]
    fn test_error_mapping() {
        assert!(error_for_status(StatusCode::NOT_FOUND, "x", String::new()).is_not_found());
        assert!(matches!(
            error_for_status(StatusCode::CONFLICT, "x", "sha mismatch".into()),
            CloudError::Conflict(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::UNPROCESSABLE_ENTITY, "x", "sha wasn't supplied".into()),
            CloudError::Conflict(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::UNAUTHORIZED, "x", "Bad credentials".into()),
            CloudError::Authentication(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::BAD_GATEWAY, "x", "oops".into()),
            CloudError::Api { status: 502, .. }
        ));
    }
}
