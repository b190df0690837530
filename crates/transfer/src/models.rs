//! Remote object metadata.
//!
//! Metadata is never persisted: it is re-derived from the store on every
//! lookup and immutable once constructed.

use time::OffsetDateTime;

/// Whether a remote object is a file or a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    File,
    Directory,
}

/// Metadata of one remote object at a point in time.
///
/// Directories always report a size of `0`; the constructors make any
/// other combination unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMetadata {
    path: String,
    modified: OffsetDateTime,
    size: u64,
    kind: ItemKind,
}
impl ArtifactMetadata {
    /// Metadata for a file. `path` is normalized.
    pub fn file(path: impl AsRef<str>, size: u64, modified: OffsetDateTime) -> Self {
        Self {
            path: crate::path::normalize(path),
            modified,
            size,
            kind: ItemKind::File,
        }
    }

    /// Metadata for a directory. `path` is normalized.
    pub fn directory(path: impl AsRef<str>, modified: OffsetDateTime) -> Self {
        Self {
            path: crate::path::normalize(path),
            modified,
            size: 0,
            kind: ItemKind::Directory,
        }
    }

    /// Repository-relative, normalized path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn modified(&self) -> OffsetDateTime {
        self.modified
    }

    /// Last modification time as milliseconds since the Unix epoch.
    pub fn modified_millis(&self) -> i64 {
        epoch_millis(self.modified)
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn is_directory(&self) -> bool {
        self.kind == ItemKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == ItemKind::File
    }
}

/// A direct child reported by a folder lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRef {
    /// Single path segment, no slashes.
    pub name: String,
    pub kind: ItemKind,
}

/// Result of a metadata lookup on a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInfo {
    pub metadata: ArtifactMetadata,
    /// Direct children; always empty for files.
    pub children: Vec<ChildRef>,
}
impl ItemInfo {
    pub fn file(metadata: ArtifactMetadata) -> Self {
        Self { metadata, children: Vec::new() }
    }
}

/// Milliseconds since the Unix epoch, saturating at the `i64` range.
pub fn epoch_millis(timestamp: OffsetDateTime) -> i64 {
    let millis = timestamp.unix_timestamp_nanos() / 1_000_000;
    i64::try_from(millis).unwrap_or(if millis < 0 { i64::MIN } else { i64::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_directory_has_zero_size() {
        let dir = ArtifactMetadata::directory("a/y/", OffsetDateTime::UNIX_EPOCH);
        assert_eq!(dir.size(), 0);
        assert_eq!(dir.path(), "a/y");
        assert!(dir.is_directory());
        assert!(!dir.is_file());
    }

    #[test]
    fn test_file_path_is_normalized() {
        let file = ArtifactMetadata::file("//a/x.txt", 11, OffsetDateTime::UNIX_EPOCH);
        assert_eq!(file.path(), "a/x.txt");
        assert_eq!(file.size(), 11);
        assert_eq!(file.kind(), ItemKind::File);
    }

    #[test]
    fn test_epoch_millis() {
        assert_eq!(epoch_millis(OffsetDateTime::UNIX_EPOCH), 0);
        assert_eq!(epoch_millis(datetime!(2024-03-17 13:20:19.836 UTC)), 1_710_681_619_836);
    }
}
