//! Remote store backends.
//!
//! A [`Connector`] knows how to reach one repository; every operation of the
//! [`TransferClient`](crate::TransferClient) asks it for a fresh
//! [`Session`] carrying that call's credentials, uses it, and drops it on
//! every exit path. Sessions are the only thing that ever touch the wire,
//! and they implement the bare primitives of the store without any retry
//! or error-swallowing policy of their own.

mod http;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::http::HttpConnector;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::{Failure, MockConnector};
use crate::error::Result;
use crate::models::{ArtifactMetadata, ItemInfo};
use artifs_config::Credentials;
use async_trait::async_trait;
use std::path::Path;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Readable byte stream positioned at the start of a remote object. The
/// caller owns it and closes it by dropping it.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send + 'static>>;

/// Server-side relocation of an item or folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relocation {
    Move,
    Copy,
}
impl Relocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Copy => "copy",
        }
    }
}

/// Opens per-call sessions against one repository.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Name of the backend (used for logging only).
    fn name(&self) -> &str;

    /// Open a session authenticated with `credentials`. The credentials
    /// live exactly as long as the returned session.
    async fn connect(&self, credentials: Credentials) -> Result<Box<dyn Session>>;
}

/// The primitives of the remote store, scoped to a single call.
///
/// All paths are normalized, repository-relative, and never percent-encoded
/// by the caller; encoding is the session's job.
#[async_trait]
pub trait Session: Send + Sync {
    /// Stream `local_file` to `path`, replacing whatever is there.
    async fn put(&self, path: &str, local_file: &Path) -> Result<()>;

    /// Open the object at `path` for reading. Returns
    /// [`NotFound`](crate::error::ErrorKind::NotFound) if it does not exist.
    async fn get(&self, path: &str) -> Result<ByteStream>;

    /// Delete the file or folder at `path`.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Move or copy the file or folder at `from` to `to`.
    async fn relocate(&self, relocation: Relocation, from: &str, to: &str) -> Result<()>;

    /// Metadata of a single path, with the direct children if it is a folder.
    async fn info(&self, path: &str) -> Result<ItemInfo>;

    /// Every object whose path lies below `prefix` (a normalized prefix
    /// ending in `/`, or `""` for the root), at any depth.
    async fn search(&self, prefix: &str) -> Result<Vec<ArtifactMetadata>>;
}
