use crate::entry::VirtualEntry;
use crate::error::{ErrorKind, Result};
use crate::key;
use crate::listing::synthesize;
use artifs_transfer::ClientHandle;
use artifs_transfer::backend::ByteStream;
use exn::ResultExt;
use std::sync::Arc;
use url::Url;

/// A location in the virtual tree.
///
/// Nodes are cheap, immutable and never shared between lookups. A node that
/// came out of [`list`](Self::list) carries the [`VirtualEntry`] the listing
/// produced and answers every metadata question from it; any other node asks
/// the repository each time.
#[derive(Clone)]
pub struct VirtualNode {
    client: ClientHandle,
    key: String,
    entry: Option<VirtualEntry>,
}

impl VirtualNode {
    pub(crate) fn new(client: ClientHandle, key: impl AsRef<str>) -> Self {
        Self {
            client,
            key: artifs_transfer::normalize_path(key),
            entry: None,
        }
    }

    fn with_entry(client: ClientHandle, entry: VirtualEntry) -> Self {
        Self {
            client,
            key: entry.path().to_string(),
            entry: Some(entry),
        }
    }

    /// Normalized, repository-relative key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Last segment of the key; empty for the repository root.
    pub fn name(&self) -> &str {
        key::name(&self.key)
    }

    pub fn parent(&self) -> VirtualNode {
        Self::new(Arc::clone(&self.client), key::parent(&self.key))
    }

    pub fn child(&self, name: &str) -> VirtualNode {
        Self::new(Arc::clone(&self.client), key::child(&self.key, name))
    }

    /// What the listing that produced this node knew about it, if anything.
    pub fn entry(&self) -> Option<&VirtualEntry> {
        self.entry.as_ref()
    }

    pub fn can_read(&self) -> bool {
        true
    }

    /// Whether the key names the aggregate "browse all" view rather than a
    /// repository object.
    pub fn is_browse_all(&self) -> bool {
        key::is_browse_all(&self.key)
    }

    /// Browser-facing URL of the object behind this node.
    pub fn external_url(&self) -> Result<Url> {
        if self.is_browse_all() {
            exn::bail!(ErrorKind::Url(self.key.clone()));
        }
        Ok(self.client.external_url(&self.key))
    }

    pub async fn is_directory(&self) -> bool {
        if self.is_browse_all() {
            return false;
        }
        match &self.entry {
            Some(entry) => entry.is_directory(),
            None => self.client.is_folder(&self.key).await,
        }
    }

    pub async fn is_file(&self) -> bool {
        if self.is_browse_all() {
            return false;
        }
        match &self.entry {
            Some(entry) => entry.is_file(),
            None => self.client.is_file(&self.key).await,
        }
    }

    pub async fn exists(&self) -> bool {
        self.is_directory().await || self.is_file().await
    }

    /// Direct children of this node, with intermediate directories the
    /// repository never reports synthesized from deeper paths. Empty when
    /// the node is not a directory or the listing fails.
    pub async fn list(&self) -> Vec<VirtualNode> {
        if self.is_browse_all() || self.entry.as_ref().is_some_and(VirtualEntry::is_file) {
            return Vec::new();
        }
        let prefix = artifs_transfer::normalize_prefix(&self.key);
        let items = self.client.list(&prefix).await;
        let found = items.len();
        let children: Vec<_> = synthesize(&prefix, items)
            .into_iter()
            .map(|entry| Self::with_entry(Arc::clone(&self.client), entry))
            .collect();
        tracing::trace!(key = %self.key, found, children = children.len(), "Listed directory");
        children
    }

    /// Size in bytes; `0` for directories and when the lookup fails.
    pub async fn length(&self) -> u64 {
        match &self.entry {
            Some(entry) => entry.size(),
            None if self.is_browse_all() => 0,
            None => self.client.size(&self.key).await,
        }
    }

    /// Milliseconds since the Unix epoch. For synthesized directories this is
    /// the timestamp of the descendant that revealed them.
    pub async fn last_modified(&self) -> i64 {
        match &self.entry {
            Some(entry) => entry.modified_millis(),
            None if self.is_browse_all() => 0,
            None => self.client.last_modified(&self.key).await,
        }
    }

    /// Open the file behind this node for reading.
    pub async fn open(&self) -> Result<ByteStream> {
        if self.is_directory().await {
            exn::bail!(ErrorKind::NotDirectoryReadable(self.key.clone()));
        }
        if !self.is_file().await {
            exn::bail!(ErrorKind::NotFound(self.key.clone()));
        }
        self.client.download(&self.key).await.or_raise(|| ErrorKind::Download(self.key.clone()))
    }
}

impl std::fmt::Debug for VirtualNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualNode").field("key", &self.key).field("entry", &self.entry).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VirtualTree;
    use artifs_config::{ListingStrategy, RepositoryConfig, StaticCredentials};
    use artifs_transfer::TransferClient;
    use artifs_transfer::backend::MockConnector;
    use time::macros::datetime;
    use tokio::io::AsyncReadExt;

    fn tree(backend: &MockConnector, listing: ListingStrategy) -> VirtualTree {
        let config = RepositoryConfig::new("http://localhost:8081/artifactory", "generic-local", "ci")
            .unwrap()
            .with_listing(listing);
        let credentials = Arc::new(StaticCredentials::new().with("ci", "deployer", "hunter2"));
        VirtualTree::new(Arc::new(TransferClient::new(&config, Arc::new(backend.clone()), credentials)))
    }

    fn backend() -> MockConnector {
        let backend = MockConnector::default();
        backend.insert("a/x.txt", b"hello".to_vec(), datetime!(2024-03-17 13:20:19.836 UTC));
        backend.insert("a/y/z.txt", b"z".to_vec(), datetime!(2024-03-18 00:00 UTC));
        backend.insert("a/y/w.txt", b"w".to_vec(), datetime!(2024-03-19 00:00 UTC));
        backend
    }

    fn sorted(nodes: &[VirtualNode]) -> Vec<(String, bool)> {
        let mut keys: Vec<_> = nodes
            .iter()
            .map(|node| (node.key().to_string(), node.entry().is_some_and(VirtualEntry::is_directory)))
            .collect();
        keys.sort();
        keys
    }

    #[tokio::test]
    async fn test_list_synthesizes_directories() {
        let backend = backend();
        let tree = tree(&backend, ListingStrategy::Search);
        let children = tree.resolve("a").list().await;
        assert_eq!(sorted(&children), [("a/x.txt".to_string(), false), ("a/y".to_string(), true)]);
        let y = children.iter().find(|node| node.name() == "y").unwrap();
        assert!(y.entry().unwrap().is_synthetic());
        assert_eq!(y.length().await, 0);
        // The first descendant in the listing stamps the directory.
        assert_eq!(y.last_modified().await, datetime!(2024-03-19 00:00 UTC).unix_timestamp() * 1000);
    }

    #[tokio::test]
    async fn test_list_with_children_strategy() {
        let backend = backend();
        let tree = tree(&backend, ListingStrategy::Children);
        let children = tree.resolve("/a/").list().await;
        assert_eq!(sorted(&children), [("a/x.txt".to_string(), false), ("a/y".to_string(), true)]);
        assert!(children.iter().all(|node| !node.entry().unwrap().is_synthetic()));
    }

    #[tokio::test]
    async fn test_list_is_idempotent() {
        let backend = backend();
        let tree = tree(&backend, ListingStrategy::Search);
        let node = tree.resolve("a");
        assert_eq!(sorted(&node.list().await), sorted(&node.list().await));
    }

    #[tokio::test]
    async fn test_cached_metadata_avoids_lookups() {
        let backend = backend();
        let tree = tree(&backend, ListingStrategy::Search);
        let children = tree.resolve("a").list().await;
        let lookups = backend.requests("info");
        let x = children.iter().find(|node| node.name() == "x.txt").unwrap();
        assert!(x.is_file().await);
        assert!(!x.is_directory().await);
        assert_eq!(x.length().await, 5);
        assert_eq!(x.last_modified().await, 1_710_681_619_836);
        assert_eq!(backend.requests("info"), lookups);
    }

    #[tokio::test]
    async fn test_uncached_queries() {
        let backend = backend();
        let tree = tree(&backend, ListingStrategy::Search);
        let x = tree.resolve("a//x.txt");
        assert!(x.entry().is_none());
        assert!(x.exists().await);
        assert!(x.is_file().await);
        assert!(!x.is_directory().await);
        assert_eq!(x.length().await, 5);
        let y = tree.resolve("a/y");
        assert!(y.is_directory().await);
        assert!(!y.is_file().await);
        assert_eq!(y.length().await, 0);
        assert_eq!(y.last_modified().await, 0);
        let missing = tree.resolve("a/missing");
        assert!(!missing.exists().await);
        assert!(missing.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_browse_all_marker() {
        let backend = backend();
        backend.insert("a/*view*", b"stored".to_vec(), datetime!(2024-03-20 00:00 UTC));
        backend.insert("a/*view*/x.txt", b"nested".to_vec(), datetime!(2024-03-20 00:00 UTC));
        let tree = tree(&backend, ListingStrategy::Search);
        let view = tree.resolve("a").child(key::BROWSE_ALL_MARKER);
        assert!(!view.is_directory().await);
        assert!(!view.is_file().await);
        assert!(!view.exists().await);
        assert!(view.list().await.is_empty());
        assert_eq!(view.length().await, 0);
        assert!(matches!(&*view.external_url().unwrap_err(), ErrorKind::Url(_)));
        assert!(matches!(&*view.open().await.err().unwrap(), ErrorKind::NotFound(_)));
        assert_eq!(backend.requests("info") + backend.requests("search") + backend.requests("get"), 0);
    }

    #[tokio::test]
    async fn test_open() {
        let backend = backend();
        let tree = tree(&backend, ListingStrategy::Search);
        let mut contents = String::new();
        tree.resolve("a/x.txt").open().await.ok().unwrap().read_to_string(&mut contents).await.unwrap();
        assert_eq!(contents, "hello");

        let err = tree.resolve("a/y").open().await.err().unwrap();
        assert_eq!(*err, ErrorKind::NotDirectoryReadable("a/y".to_string()));
        let err = tree.resolve("a/missing").open().await.err().unwrap();
        assert_eq!(*err, ErrorKind::NotFound("a/missing".to_string()));
    }

    #[tokio::test]
    async fn test_open_relays_download_failure() {
        let backend = backend();
        let tree = tree(&backend, ListingStrategy::Search);
        let x = tree.resolve("a").list().await.into_iter().find(|node| node.name() == "x.txt").unwrap();
        backend.set_offline(true);
        let err = x.open().await.err().unwrap();
        assert_eq!(*err, ErrorKind::Download("a/x.txt".to_string()));
    }

    #[test]
    fn test_navigation_is_pure() {
        let backend = backend();
        let tree = tree(&backend, ListingStrategy::Search);
        let node = tree.resolve("a/y/z.txt");
        assert_eq!(node.name(), "z.txt");
        assert_eq!(node.parent().key(), "a/y");
        assert_eq!(node.parent().parent().parent().key(), "");
        assert_eq!(node.parent().child("w.txt").key(), "a/y/w.txt");
        assert!(node.can_read());
        assert_eq!(
            node.external_url().unwrap().as_str(),
            "http://localhost:8081/artifactory/generic-local/a/y/z.txt"
        );
        assert_eq!(backend.sessions_opened(), 0);
    }
}
