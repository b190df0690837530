//! HTTP artifact repository backend.
//!
//! Speaks the REST surface of Artifactory-style generic repositories:
//!
//! | Operation | Request                                              |
//! |-----------|------------------------------------------------------|
//! | put       | `PUT {server}/{repo}/{path}`                         |
//! | get       | `GET {server}/{repo}/{path}`                         |
//! | delete    | `DELETE {server}/{repo}/{path}`                      |
//! | info      | `GET {server}/api/storage/{repo}/{path}`             |
//! | search    | `POST {server}/api/search/aql`                       |
//! | relocate  | `POST {server}/api/{move,copy}/{repo}/{path}?to=...` |
//!
//! Folder-level move and copy are only available on paid tiers of the
//! store. The request is sent regardless and whatever the store answers is
//! surfaced.

use crate::backend::{ByteStream, Connector, Relocation, Session};
use crate::error::{ErrorKind, Result};
use crate::models::{ArtifactMetadata, ChildRef, ItemInfo, ItemKind};
use crate::path::join_url;
use artifs_config::{Credentials, RepositoryConfig};
use async_trait::async_trait;
use exn::ResultExt;
use futures::TryStreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use std::path::Path;
use time::OffsetDateTime;
use tokio_util::io::{ReaderStream, StreamReader};
use url::Url;

/// Longest error body kept for logging.
const MAX_LOGGED_BODY: usize = 512;

/// Connector for an HTTP artifact repository.
///
/// The underlying [`reqwest::Client`] (and its connection pool) is shared by
/// every session; only the credentials are per session.
///
/// # Examples
///
/// ```no_run
/// use artifs_config::RepositoryConfig;
/// use artifs_transfer::backend::HttpConnector;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = RepositoryConfig::new("https://artifacts.example.com/artifactory", "builds", "ci")?;
/// let connector = HttpConnector::new(&config)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpConnector {
    name: String,
    client: Client,
    base: Url,
    repository: String,
}

impl HttpConnector {
    /// Create a connector for the repository described by `config`.
    pub fn new(config: &RepositoryConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("artifs/", env!("CARGO_PKG_VERSION")))
            .build()
            .or_raise(|| ErrorKind::Configuration("unable to build HTTP client".to_string()))?;
        Ok(Self::with_client(config, client))
    }

    /// Create a connector that sends its requests through `client`.
    pub fn with_client(config: &RepositoryConfig, client: Client) -> Self {
        Self {
            name: format!("{}#{}", config.server_url(), config.repository()),
            client,
            base: config.server_url().clone(),
            repository: config.repository().to_string(),
        }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self, credentials: Credentials) -> Result<Box<dyn Session>> {
        tracing::trace!(backend = %self.name, username = credentials.username(), "Opening session");
        Ok(Box::new(HttpSession {
            client: self.client.clone(),
            base: self.base.clone(),
            repository: self.repository.clone(),
            credentials,
        }))
    }
}

struct HttpSession {
    client: Client,
    base: Url,
    repository: String,
    credentials: Credentials,
}

impl HttpSession {
    fn item_url(&self, path: &str) -> Url {
        join_url(&self.base, [self.repository.as_str(), path])
    }

    fn storage_url(&self, path: &str) -> Url {
        join_url(&self.base, ["api/storage", self.repository.as_str(), path])
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        tracing::debug!(%method, %url, "Sending repository request");
        self.client
            .request(method, url)
            .basic_auth(self.credentials.username(), Some(self.credentials.secret()))
    }

    /// Send `request` and turn anything but a 2xx into a classified error.
    async fn send(&self, request: RequestBuilder, path: &str) -> Result<Response> {
        let response = request.send().await.map_err(|err| ErrorKind::from_transport(&err, path))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_LOGGED_BODY {
            let mut end = MAX_LOGGED_BODY;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body.truncate(end);
        }
        tracing::debug!(%status, path, body = %body, "Repository request failed");
        exn::bail!(ErrorKind::from_status(status, path))
    }
}

#[async_trait]
impl Session for HttpSession {
    async fn put(&self, path: &str, local_file: &Path) -> Result<()> {
        let file = tokio::fs::File::open(local_file).await.map_err(ErrorKind::Io)?;
        let size = file.metadata().await.map_err(ErrorKind::Io)?.len();
        let request = self
            .request(Method::PUT, self.item_url(path))
            .header(CONTENT_LENGTH, size)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)));
        self.send(request, path).await?;
        tracing::trace!(path, bytes = size, source = %local_file.display(), "Uploaded");
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<ByteStream> {
        let response = self.send(self.request(Method::GET, self.item_url(path)), path).await?;
        let stream = response.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::pin(StreamReader::new(stream)))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, self.item_url(path)), path).await?;
        Ok(())
    }

    async fn relocate(&self, relocation: Relocation, from: &str, to: &str) -> Result<()> {
        let mut url = join_url(&self.base, ["api", relocation.as_str(), self.repository.as_str(), from]);
        url.query_pairs_mut().append_pair("to", &format!("/{}/{}", self.repository, to));
        self.send(self.request(Method::POST, url), from).await?;
        Ok(())
    }

    async fn info(&self, path: &str) -> Result<ItemInfo> {
        let response = self.send(self.request(Method::GET, self.storage_url(path)), path).await?;
        let item: StorageItem = response
            .json()
            .await
            .or_raise(|| ErrorKind::InvalidResponse(format!("storage info for `{path}`")))?;
        Ok(item.into_info(path))
    }

    async fn search(&self, prefix: &str) -> Result<Vec<ArtifactMetadata>> {
        let url = join_url(&self.base, ["api/search/aql"]);
        let request = self
            .request(Method::POST, url)
            .header(CONTENT_TYPE, "text/plain")
            .body(aql_query(&self.repository, prefix));
        let response = self.send(request, prefix).await?;
        let found: AqlResponse = response
            .json()
            .await
            .or_raise(|| ErrorKind::InvalidResponse(format!("search results for `{prefix}`")))?;
        Ok(found.results.into_iter().map(AqlItem::into_metadata).collect())
    }
}

/// Build the AQL query matching every item in the prefix directory and all
/// of its descendants.
fn aql_query(repository: &str, prefix: &str) -> String {
    let dir = prefix.trim_end_matches('/');
    let criteria = match dir.is_empty() {
        true => serde_json::json!({ "repo": repository }),
        false => serde_json::json!({
            "repo": repository,
            "$or": [
                { "path": dir },
                { "path": { "$match": format!("{dir}/*") } },
            ],
        }),
    };
    format!(r#"items.find({criteria}).include("repo","path","name","type","size","modified")"#)
}

/// Sizes come back as strings from the storage API and as numbers from
/// search; accept both.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SizeField {
    Number(u64),
    Text(String),
}
impl SizeField {
    fn bytes(&self) -> u64 {
        match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.parse().unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageItem {
    #[serde(default, with = "time::serde::rfc3339::option")]
    last_modified: Option<OffsetDateTime>,
    #[serde(default)]
    size: Option<SizeField>,
    /// Only present on folders.
    #[serde(default)]
    children: Option<Vec<StorageChild>>,
}
impl StorageItem {
    fn into_info(self, path: &str) -> ItemInfo {
        let modified = self.last_modified.unwrap_or(OffsetDateTime::UNIX_EPOCH);
        match self.children {
            Some(children) => ItemInfo {
                metadata: ArtifactMetadata::directory(path, modified),
                children: children.into_iter().filter_map(StorageChild::into_child).collect(),
            },
            None => {
                let size = self.size.as_ref().map(SizeField::bytes).unwrap_or(0);
                ItemInfo::file(ArtifactMetadata::file(path, size, modified))
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct StorageChild {
    uri: String,
    #[serde(default)]
    folder: bool,
}
impl StorageChild {
    fn into_child(self) -> Option<ChildRef> {
        let name = self.uri.trim_matches('/');
        if name.is_empty() {
            return None;
        }
        let kind = match self.folder {
            true => ItemKind::Directory,
            false => ItemKind::File,
        };
        Some(ChildRef { name: name.to_string(), kind })
    }
}

#[derive(Debug, Deserialize)]
struct AqlResponse {
    #[serde(default)]
    results: Vec<AqlItem>,
}

#[derive(Debug, Deserialize)]
struct AqlItem {
    #[serde(default)]
    path: String,
    name: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    size: Option<SizeField>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    modified: Option<OffsetDateTime>,
}
impl AqlItem {
    fn into_metadata(self) -> ArtifactMetadata {
        // Items at the repository root are reported with a path of ".".
        let path = match self.path.as_str() {
            "" | "." => self.name,
            dir => format!("{dir}/{}", self.name),
        };
        let modified = self.modified.unwrap_or(OffsetDateTime::UNIX_EPOCH);
        match self.kind.as_deref() {
            Some("folder") => ArtifactMetadata::directory(path, modified),
            _ => ArtifactMetadata::file(path, self.size.as_ref().map(SizeField::bytes).unwrap_or(0), modified),
        }
    }
}
