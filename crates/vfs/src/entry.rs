use artifs_transfer::{ArtifactMetadata, ItemKind, epoch_millis};
use time::OffsetDateTime;

/// What a listing knows about one node of the tree.
///
/// Repositories have no directory objects of their own when searched, so
/// most directories in a listing are inferred from deeper paths. Those carry
/// the timestamp of whichever descendant revealed them, which is only an
/// approximation of when the directory last changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualEntry {
    RealFile(ArtifactMetadata),
    RealDirectory(ArtifactMetadata),
    SyntheticDirectory { path: String, approximate_modified: OffsetDateTime },
}

impl VirtualEntry {
    pub fn from_metadata(metadata: ArtifactMetadata) -> Self {
        match metadata.kind() {
            ItemKind::File => Self::RealFile(metadata),
            ItemKind::Directory => Self::RealDirectory(metadata),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::RealFile(metadata) | Self::RealDirectory(metadata) => metadata.path(),
            Self::SyntheticDirectory { path, .. } => path,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Self::RealFile(_) => ItemKind::File,
            Self::RealDirectory(_) | Self::SyntheticDirectory { .. } => ItemKind::Directory,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind() == ItemKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind() == ItemKind::File
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::SyntheticDirectory { .. })
    }

    /// Size in bytes; always `0` for directories.
    pub fn size(&self) -> u64 {
        match self {
            Self::RealFile(metadata) => metadata.size(),
            _ => 0,
        }
    }

    pub fn modified(&self) -> OffsetDateTime {
        match self {
            Self::RealFile(metadata) | Self::RealDirectory(metadata) => metadata.modified(),
            Self::SyntheticDirectory { approximate_modified, .. } => *approximate_modified,
        }
    }

    pub fn modified_millis(&self) -> i64 {
        epoch_millis(self.modified())
    }
}
