use crate::node::VirtualNode;
use artifs_transfer::{ClientHandle, normalize_path};

/// Directory-tree view of one repository.
///
/// Resolving a key never fails and never touches the network; whether the
/// key exists is a separate question asked of the returned node.
///
/// # Examples
///
/// ```no_run
/// use artifs_config::{EnvCredentials, RepositoryConfig};
/// use artifs_transfer::TransferClient;
/// use artifs_vfs::VirtualTree;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = RepositoryConfig::new("https://artifacts.example.com/artifactory", "builds", "ci")?
///     .with_path_prefix("jobs/nightly");
/// let client = Arc::new(TransferClient::http(&config, Arc::new(EnvCredentials))?);
/// let tree = VirtualTree::new(client).with_root(config.path_prefix());
/// for child in tree.root().list().await {
///     println!("{} {}", child.name(), child.length().await);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct VirtualTree {
    client: ClientHandle,
    root: String,
}

impl VirtualTree {
    pub fn new(client: ClientHandle) -> Self {
        Self { client, root: String::new() }
    }

    /// Anchor [`root`](Self::root) somewhere below the repository root.
    pub fn with_root(mut self, root: impl AsRef<str>) -> Self {
        self.root = normalize_path(root);
        self
    }

    pub fn client(&self) -> &ClientHandle {
        &self.client
    }

    pub fn root(&self) -> VirtualNode {
        self.resolve(&self.root)
    }

    /// Node for the repository-relative `key`, normalized so that equivalent
    /// spellings of a path resolve to equal keys.
    pub fn resolve(&self, key: impl AsRef<str>) -> VirtualNode {
        VirtualNode::new(self.client.clone(), key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artifs_config::{RepositoryConfig, StaticCredentials};
    use artifs_transfer::TransferClient;
    use artifs_transfer::backend::MockConnector;
    use rstest::rstest;
    use std::sync::Arc;

    fn tree() -> VirtualTree {
        let config = RepositoryConfig::new("http://localhost:8081/artifactory", "generic-local", "ci").unwrap();
        let connector = Arc::new(MockConnector::default());
        VirtualTree::new(Arc::new(TransferClient::new(&config, connector, Arc::new(StaticCredentials::new()))))
    }

    #[rstest]
    #[case("a/b/c")]
    #[case("/a/b/c")]
    #[case("a/b/c/")]
    #[case("//a//b/c//")]
    fn test_resolve_normalizes(#[case] key: &str) {
        assert_eq!(tree().resolve(key).key(), "a/b/c");
    }

    #[test]
    fn test_root() {
        assert_eq!(tree().root().key(), "");
        let tree = tree().with_root("/jobs/nightly/");
        assert_eq!(tree.root().key(), "jobs/nightly");
        assert_eq!(tree.root().name(), "nightly");
        assert_eq!(tree.root().child("1/report.html").key(), "jobs/nightly/1/report.html");
    }
}
