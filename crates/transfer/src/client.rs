//! The transfer client.
//!
//! Uploads are the only operation that retries. Deletes, moves, copies and
//! downloads make a single attempt and propagate whatever went wrong. The
//! read probes (`is_folder`, `is_file`, `size`, `last_modified` and `list`)
//! never fail: a lookup error is logged at debug level and answered as
//! "absent", which means a network blip during a probe is indistinguishable
//! from a missing path.

use crate::backend::{ByteStream, HttpConnector, Relocation, Session};
use crate::error::{ErrorKind, Result};
use crate::models::{ArtifactMetadata, ItemInfo, ItemKind};
use crate::path::{self, join_url, normalize};
use crate::retry::{SleeperHandle, TokioSleeper};
use crate::ConnectorHandle;
use artifs_config::{CredentialHandle, ListingStrategy, RepositoryConfig, RetrySettings};
use exn::ResultExt;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::instrument;
use url::Url;

/// Follow-up lookups a children listing keeps in flight at once.
const CHILD_LOOKUPS_IN_FLIGHT: usize = 8;

/// Outcome of a metadata probe before it collapses into a boolean or zero.
#[derive(Debug)]
enum Probe {
    Exists(ItemInfo),
    AbsentOrUnknown,
}
impl Probe {
    fn is(&self, kind: ItemKind) -> bool {
        matches!(self, Self::Exists(info) if info.metadata.kind() == kind)
    }

    fn file(&self) -> Option<&ArtifactMetadata> {
        match self {
            Self::Exists(info) if info.metadata.is_file() => Some(&info.metadata),
            _ => None,
        }
    }
}

/// Performs remote operations against one repository.
///
/// Holds no connection between calls: every operation resolves credentials,
/// opens a [`Session`], and drops both before returning. Each upload attempt
/// gets a session of its own.
///
/// # Examples
///
/// ```no_run
/// use artifs_config::{EnvCredentials, RepositoryConfig};
/// use artifs_transfer::TransferClient;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = RepositoryConfig::new("https://artifacts.example.com/artifactory", "builds", "ci")?;
/// let client = TransferClient::http(&config, Arc::new(EnvCredentials))?;
/// client.upload("target/app.tar.gz", "app/1.0.0/app.tar.gz").await?;
/// assert!(client.is_file("app/1.0.0/app.tar.gz").await);
/// # Ok(())
/// # }
/// ```
pub struct TransferClient {
    connector: ConnectorHandle,
    credentials: CredentialHandle,
    credential_id: String,
    server_url: Url,
    repository: String,
    retry: RetrySettings,
    listing: ListingStrategy,
    sleeper: SleeperHandle,
}

impl TransferClient {
    pub fn new(config: &RepositoryConfig, connector: ConnectorHandle, credentials: CredentialHandle) -> Self {
        Self {
            connector,
            credentials,
            credential_id: config.credential_id().to_string(),
            server_url: config.server_url().clone(),
            repository: config.repository().to_string(),
            retry: config.retry(),
            listing: config.listing(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Client talking to the repository over HTTP.
    pub fn http(config: &RepositoryConfig, credentials: CredentialHandle) -> Result<Self> {
        let connector = HttpConnector::new(config)?;
        Ok(Self::new(config, Arc::new(connector), credentials))
    }

    /// Replace what waits out the delay between upload attempts.
    pub fn with_sleeper(mut self, sleeper: SleeperHandle) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_listing(mut self, listing: ListingStrategy) -> Self {
        self.listing = listing;
        self
    }

    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry(&self) -> RetrySettings {
        self.retry
    }

    pub fn listing(&self) -> ListingStrategy {
        self.listing
    }

    /// Browser-facing URL of `path`. Pure string work; the object need not
    /// exist.
    pub fn external_url(&self, path: impl AsRef<str>) -> Url {
        join_url(&self.server_url, [self.repository.as_str(), &normalize(path)])
    }

    async fn session(&self) -> Result<Box<dyn Session>> {
        let credentials = self
            .credentials
            .resolve(&self.credential_id)
            .or_raise(|| ErrorKind::Configuration(format!("unable to resolve credentials {:?}", self.credential_id)))?;
        self.connector.connect(credentials).await
    }

    async fn attempt_upload(&self, local_file: &Path, path: &str) -> Result<()> {
        let session = self.session().await?;
        session.put(path, local_file).await
    }

    /// Upload `local_file` to `target`, retrying transient failures up to
    /// the configured number of extra attempts with a fixed delay between
    /// them.
    ///
    /// A permanent failure (rejected request, unreadable local file,
    /// unresolvable credentials) ends the loop early.
    #[instrument(skip(self, local_file, target), fields(backend = self.connector.name(), path = tracing::field::Empty))]
    pub async fn upload(&self, local_file: impl AsRef<Path>, target: impl AsRef<str>) -> Result<()> {
        let local_file = local_file.as_ref();
        let path = normalize(target);
        tracing::Span::current().record("path", path.as_str());
        let max_retries = self.retry.max_upload_retries();
        let max_attempts = max_retries.saturating_add(1);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let err = match self.attempt_upload(local_file, &path).await {
                Ok(()) => {
                    tracing::debug!(attempt, "Upload complete");
                    return Ok(());
                },
                Err(err) => err,
            };
            if max_retries == 0 {
                tracing::error!(error = ?err, "Upload failed on first attempt; no retries configured");
                return Err(err).or_raise(|| ErrorKind::UploadNoRetries { path });
            }
            if attempt >= max_attempts || !err.is_retryable() {
                tracing::error!(attempt, error = ?err, "Upload failed; giving up");
                return Err(err).or_raise(|| ErrorKind::UploadFailed { path, attempts: attempt });
            }
            tracing::warn!(
                attempt,
                max_attempts,
                delay_seconds = self.retry.retry_delay_seconds(),
                error = ?err,
                "Upload attempt failed; retrying"
            );
            self.sleeper.sleep(self.retry.retry_delay()).await;
        }
    }

    /// Delete the file or folder at `target`.
    pub async fn delete(&self, target: impl AsRef<str>) -> Result<()> {
        let path = normalize(target);
        self.session().await?.delete(&path).await?;
        tracing::info!(backend = self.connector.name(), path = %path, "Deleted");
        Ok(())
    }

    /// Move the file or folder at `source` to `target`.
    pub async fn rename(&self, source: impl AsRef<str>, target: impl AsRef<str>) -> Result<()> {
        self.relocate(Relocation::Move, source.as_ref(), target.as_ref()).await
    }

    /// Copy the file or folder at `source` to `target`.
    pub async fn copy(&self, source: impl AsRef<str>, target: impl AsRef<str>) -> Result<()> {
        self.relocate(Relocation::Copy, source.as_ref(), target.as_ref()).await
    }

    async fn relocate(&self, relocation: Relocation, source: &str, target: &str) -> Result<()> {
        let (source, target) = (normalize(source), normalize(target));
        self.session().await?.relocate(relocation, &source, &target).await?;
        tracing::info!(
            backend = self.connector.name(),
            operation = relocation.as_str(),
            from = %source,
            to = %target,
            "Relocated"
        );
        Ok(())
    }

    /// Open the remote object at `target` for reading. The caller owns the
    /// returned stream.
    pub async fn download(&self, target: impl AsRef<str>) -> Result<ByteStream> {
        let path = normalize(target);
        self.session().await?.get(&path).await
    }

    async fn probe(&self, path: &str) -> Probe {
        let lookup = async { self.session().await?.info(path).await };
        match lookup.await {
            Ok(info) => Probe::Exists(info),
            Err(err) => {
                let backend = self.connector.name();
                tracing::debug!(backend, path, error = ?err, "Metadata lookup failed; treating as absent");
                Probe::AbsentOrUnknown
            },
        }
    }

    /// Whether `target` is a folder. Lookup errors answer `false`.
    pub async fn is_folder(&self, target: impl AsRef<str>) -> bool {
        self.probe(&normalize(target)).await.is(ItemKind::Directory)
    }

    /// Whether `target` is a file. Lookup errors answer `false`.
    pub async fn is_file(&self, target: impl AsRef<str>) -> bool {
        self.probe(&normalize(target)).await.is(ItemKind::File)
    }

    /// Size in bytes of the file at `target`; `0` for folders and on error.
    pub async fn size(&self, target: impl AsRef<str>) -> u64 {
        self.probe(&normalize(target)).await.file().map_or(0, ArtifactMetadata::size)
    }

    /// Last modification of the file at `target` in milliseconds since the
    /// Unix epoch; `0` for folders and on error.
    pub async fn last_modified(&self, target: impl AsRef<str>) -> i64 {
        self.probe(&normalize(target)).await.file().map_or(0, ArtifactMetadata::modified_millis)
    }

    /// Every remote object below `prefix`, or nothing if `prefix` is not a
    /// folder or the listing fails.
    ///
    /// With [`ListingStrategy::Search`] this returns files at any depth; with
    /// [`ListingStrategy::Children`] it returns the direct children only,
    /// folders included.
    #[instrument(skip(self, prefix), fields(backend = self.connector.name(), prefix = tracing::field::Empty))]
    pub async fn list(&self, prefix: impl AsRef<str>) -> Vec<ArtifactMetadata> {
        let folder = normalize(prefix);
        let prefix = path::prefix(&folder);
        tracing::Span::current().record("prefix", prefix.as_str());
        if !self.is_folder(&folder).await {
            tracing::debug!("Not a folder; nothing to list");
            return Vec::new();
        }
        let listing = match self.listing {
            ListingStrategy::Search => self.list_by_search(&folder, &prefix).await,
            ListingStrategy::Children => self.list_by_children(&folder).await,
        };
        match listing {
            Ok(items) => items,
            Err(err) => {
                tracing::debug!(error = ?err, "Listing failed; treating as empty");
                Vec::new()
            },
        }
    }

    async fn list_by_search(&self, folder: &str, prefix: &str) -> Result<Vec<ArtifactMetadata>> {
        let found = self.session().await?.search(prefix).await?;
        Ok(found.into_iter().filter(|item| item.path() != folder && item.path().starts_with(prefix)).collect())
    }

    async fn list_by_children(&self, folder: &str) -> Result<Vec<ArtifactMetadata>> {
        let session = self.session().await?;
        let session = &*session;
        let info = session.info(folder).await?;
        let lookups = info.children.into_iter().map(|child| async move {
            let path = match folder.is_empty() {
                true => child.name,
                false => format!("{folder}/{}", child.name),
            };
            match session.info(&path).await {
                Ok(found) => found.metadata,
                Err(err) => {
                    tracing::debug!(path = %path, error = ?err, "Child lookup failed; using zero size and timestamp");
                    match child.kind {
                        ItemKind::File => ArtifactMetadata::file(&path, 0, OffsetDateTime::UNIX_EPOCH),
                        ItemKind::Directory => ArtifactMetadata::directory(&path, OffsetDateTime::UNIX_EPOCH),
                    }
                },
            }
        });
        Ok(stream::iter(lookups).buffered(CHILD_LOOKUPS_IN_FLIGHT).collect::<Vec<_>>().await)
    }
}

impl std::fmt::Debug for TransferClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferClient")
            .field("backend", &self.connector.name())
            .field("server_url", &self.server_url.as_str())
            .field("repository", &self.repository)
            .field("retry", &self.retry)
            .field("listing", &self.listing)
            .finish_non_exhaustive()
    }
}
