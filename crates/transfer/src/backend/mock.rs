//! In-memory repository backend for testing.

use crate::backend::{ByteStream, Connector, Relocation, Session};
use crate::error::{ErrorKind, Result};
use crate::models::{ArtifactMetadata, ChildRef, ItemInfo, ItemKind};
use crate::path::{normalize, prefix as normalize_prefix};
use artifs_config::Credentials;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use time::OffsetDateTime;

/// Class of failure injected into an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Behaves like a 5xx response.
    Transient,
    /// Behaves like a 4xx response.
    Permanent,
}
impl Failure {
    fn kind(self, path: &str) -> ErrorKind {
        match self {
            Self::Transient => ErrorKind::Transient(format!("injected failure for {path}")),
            Self::Permanent => ErrorKind::Permanent { status: 400, path: path.to_string() },
        }
    }
}

#[derive(Default)]
struct State {
    items: RwLock<BTreeMap<String, (OffsetDateTime, Vec<u8>)>>,
    queued_upload_failures: Mutex<VecDeque<Failure>>,
    upload_failure: Mutex<Option<Failure>>,
    offline: AtomicBool,
    broken_info: Mutex<HashSet<String>>,
    requests: Mutex<HashMap<&'static str, usize>>,
    sessions_opened: AtomicUsize,
    sessions_closed: AtomicUsize,
}
impl State {
    fn count(&self, operation: &'static str) {
        *lock(&self.requests).entry(operation).or_default() += 1;
    }

    fn check_online(&self, path: &str) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Transient(format!("repository offline while accessing {path}")));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory repository backend for testing.
///
/// Files live in a shared map; folders exist implicitly wherever a file
/// path has a parent, exactly like in a real repository where folders are
/// never listed unless something is below them. Clones share state, so a
/// test can keep one handle for assertions and hand another to the client.
///
/// Besides storage it offers failure injection (queued or permanent upload
/// failures, an offline switch for every read, and per-path metadata
/// failures) plus counters for requests and sessions.
#[derive(Clone)]
pub struct MockConnector {
    name: String,
    state: Arc<State>,
}

impl MockConnector {
    /// Create a mock backend pre-populated with files, all stamped with the
    /// current time.
    pub fn with_files(files: impl IntoIterator<Item = (impl AsRef<str>, impl Into<Vec<u8>>)>) -> Self {
        let backend = Self::default();
        let now = OffsetDateTime::now_utc();
        for (path, data) in files {
            backend.insert(path, data, now);
        }
        backend
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Store a file with an explicit modification time.
    ///
    /// Panics on an empty path. If test setup is wrong, then test should not
    /// pass.
    pub fn insert(&self, path: impl AsRef<str>, data: impl Into<Vec<u8>>, modified: OffsetDateTime) {
        let path = normalize(path);
        assert!(!path.is_empty(), "MockConnector::insert: empty path");
        self.state.items.write().unwrap_or_else(PoisonError::into_inner).insert(path, (modified, data.into()));
    }

    /// Contents of the file at `path`, if any.
    pub fn contents(&self, path: impl AsRef<str>) -> Option<Vec<u8>> {
        let items = self.state.items.read().unwrap_or_else(PoisonError::into_inner);
        items.get(&normalize(path)).map(|(_, data)| data.clone())
    }

    /// Make the next `count` upload attempts fail with `failure`.
    pub fn fail_next_uploads(&self, count: usize, failure: Failure) {
        lock(&self.state.queued_upload_failures).extend(std::iter::repeat_n(failure, count));
    }

    /// Make every upload attempt fail with `failure` until cleared with `None`.
    pub fn fail_all_uploads(&self, failure: Option<Failure>) {
        *lock(&self.state.upload_failure) = failure;
    }

    /// While offline, every read primitive (info, search, get) fails with a
    /// transient error.
    pub fn set_offline(&self, offline: bool) {
        self.state.offline.store(offline, Ordering::SeqCst);
    }

    /// Make metadata lookups of one specific path fail with a transient error.
    pub fn break_info(&self, path: impl AsRef<str>) {
        lock(&self.state.broken_info).insert(normalize(path));
    }

    /// Number of primitive calls made for `operation` (`"put"`, `"get"`,
    /// `"delete"`, `"move"`, `"copy"`, `"info"` or `"search"`).
    pub fn requests(&self, operation: &str) -> usize {
        lock(&self.state.requests).get(operation).copied().unwrap_or(0)
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.state.sessions_closed.load(Ordering::SeqCst)
    }
}
impl Default for MockConnector {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            state: Arc::new(State::default()),
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self, _credentials: Credentials) -> Result<Box<dyn Session>> {
        self.state.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession { state: Arc::clone(&self.state) }))
    }
}

struct MockSession {
    state: Arc<State>,
}
impl Drop for MockSession {
    fn drop(&mut self) {
        self.state.sessions_closed.fetch_add(1, Ordering::SeqCst);
    }
}
impl MockSession {
    /// Every stored path equal to `path` or below it.
    fn matching(&self, path: &str) -> Vec<String> {
        let below = normalize_prefix(path);
        let items = self.state.items.read().unwrap_or_else(PoisonError::into_inner);
        items.keys().filter(|key| key.as_str() == path || key.starts_with(&below)).cloned().collect()
    }
}

#[async_trait]
impl Session for MockSession {
    async fn put(&self, path: &str, local_file: &Path) -> Result<()> {
        self.state.count("put");
        let injected = lock(&self.state.queued_upload_failures).pop_front().or(*lock(&self.state.upload_failure));
        if let Some(failure) = injected {
            exn::bail!(failure.kind(path));
        }
        let data = tokio::fs::read(local_file).await.map_err(ErrorKind::Io)?;
        let mut items = self.state.items.write().unwrap_or_else(PoisonError::into_inner);
        items.insert(normalize(path), (OffsetDateTime::now_utc(), data));
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<ByteStream> {
        self.state.count("get");
        self.state.check_online(path)?;
        let items = self.state.items.read().unwrap_or_else(PoisonError::into_inner);
        match items.get(path) {
            Some((_, data)) => Ok(Box::pin(std::io::Cursor::new(data.clone()))),
            None => exn::bail!(ErrorKind::NotFound(path.to_string())),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.state.count("delete");
        let doomed = self.matching(path);
        if doomed.is_empty() {
            exn::bail!(ErrorKind::NotFound(path.to_string()));
        }
        let mut items = self.state.items.write().unwrap_or_else(PoisonError::into_inner);
        for key in doomed {
            items.remove(&key);
        }
        Ok(())
    }

    async fn relocate(&self, relocation: Relocation, from: &str, to: &str) -> Result<()> {
        self.state.count(relocation.as_str());
        let sources = self.matching(from);
        if sources.is_empty() {
            exn::bail!(ErrorKind::NotFound(from.to_string()));
        }
        let mut items = self.state.items.write().unwrap_or_else(PoisonError::into_inner);
        for source in sources {
            let rebased = normalize(format!("{to}/{}", &source[from.len()..]));
            let entry = match relocation {
                Relocation::Move => items.remove(&source),
                Relocation::Copy => items.get(&source).cloned(),
            };
            if let Some(entry) = entry {
                items.insert(rebased, entry);
            }
        }
        Ok(())
    }

    async fn info(&self, path: &str) -> Result<ItemInfo> {
        self.state.count("info");
        self.state.check_online(path)?;
        if lock(&self.state.broken_info).contains(path) {
            exn::bail!(ErrorKind::Transient(format!("injected metadata failure for {path}")));
        }
        let items = self.state.items.read().unwrap_or_else(PoisonError::into_inner);
        if let Some((modified, data)) = items.get(path) {
            return Ok(ItemInfo::file(ArtifactMetadata::file(path, data.len() as u64, *modified)));
        }
        let below = normalize_prefix(path);
        let mut children: Vec<ChildRef> = Vec::new();
        let mut newest = OffsetDateTime::UNIX_EPOCH;
        for (key, (modified, _)) in items.iter().filter(|(key, _)| key.starts_with(&below)) {
            newest = newest.max(*modified);
            let (name, kind) = match key[below.len()..].split_once('/') {
                Some((dir, _)) => (dir, ItemKind::Directory),
                None => (&key[below.len()..], ItemKind::File),
            };
            if !children.iter().any(|child| child.name == name) {
                children.push(ChildRef { name: name.to_string(), kind });
            }
        }
        if children.is_empty() && !path.is_empty() {
            exn::bail!(ErrorKind::NotFound(path.to_string()));
        }
        Ok(ItemInfo {
            metadata: ArtifactMetadata::directory(path, newest),
            children,
        })
    }

    async fn search(&self, prefix: &str) -> Result<Vec<ArtifactMetadata>> {
        self.state.count("search");
        self.state.check_online(prefix)?;
        let items = self.state.items.read().unwrap_or_else(PoisonError::into_inner);
        Ok(items
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, (modified, data))| ArtifactMetadata::file(key, data.len() as u64, *modified))
            .collect())
    }
}
