//! Turning a flat listing into one level of the tree.

use crate::entry::VirtualEntry;
use artifs_transfer::{ArtifactMetadata, normalize_prefix};
use std::collections::HashSet;

/// Collapse `items` (every object below `prefix`, at any depth) into the
/// direct children of `prefix`.
///
/// Each item contributes the first segment of its path relative to
/// `prefix`. The first item to contribute a segment decides what that child
/// is: the item itself if it sits directly below `prefix`, otherwise a
/// synthetic directory stamped with the item's modification time. Later
/// items contributing the same segment are dropped, as are items that do not
/// lie below `prefix` at all.
///
/// Output order follows first appearance but carries no meaning.
pub fn synthesize(prefix: &str, items: impl IntoIterator<Item = ArtifactMetadata>) -> Vec<VirtualEntry> {
    let prefix = normalize_prefix(prefix);
    let mut seen = HashSet::new();
    let mut children = Vec::new();
    for item in items {
        let Some(relative) = item.path().strip_prefix(prefix.as_str()) else {
            continue;
        };
        let (segment, nested) = match relative.split_once('/') {
            Some((segment, _)) => (segment, true),
            None => (relative, false),
        };
        if segment.is_empty() || !seen.insert(segment.to_string()) {
            continue;
        }
        let child = match nested {
            true => VirtualEntry::SyntheticDirectory {
                path: format!("{prefix}{segment}"),
                approximate_modified: item.modified(),
            },
            false => VirtualEntry::from_metadata(item),
        };
        children.push(child);
    }
    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use artifs_transfer::ItemKind;
    use time::macros::datetime;

    fn file(path: &str, size: u64) -> ArtifactMetadata {
        ArtifactMetadata::file(path, size, datetime!(2024-03-17 13:20:19.836 UTC))
    }

    #[test]
    fn test_nested_entries_become_one_directory() {
        let items = vec![
            file("a/x.txt", 11),
            ArtifactMetadata::file("a/y/z.txt", 5, datetime!(2024-03-18 00:00 UTC)),
            ArtifactMetadata::file("a/y/w.txt", 7, datetime!(2024-03-19 00:00 UTC)),
        ];
        let children = synthesize("a/", items);
        assert_eq!(children.len(), 2);
        assert_eq!(children[0], VirtualEntry::from_metadata(file("a/x.txt", 11)));
        assert_eq!(
            children[1],
            VirtualEntry::SyntheticDirectory {
                path: "a/y".to_string(),
                approximate_modified: datetime!(2024-03-18 00:00 UTC),
            }
        );
        assert_eq!(children[1].size(), 0);
        assert_eq!(children[1].kind(), ItemKind::Directory);
    }

    #[test]
    fn test_first_entry_for_a_segment_wins() {
        // A real directory reported before its contents keeps its own metadata.
        let dir = ArtifactMetadata::directory("a/y", datetime!(2020-01-01 00:00 UTC));
        let children = synthesize("a", vec![dir.clone(), file("a/y/z.txt", 1)]);
        assert_eq!(children, vec![VirtualEntry::RealDirectory(dir)]);
    }

    #[test]
    fn test_root_prefix() {
        let children = synthesize("", vec![file("top.txt", 1), file("a/x.txt", 2), file("a/y/z.txt", 3)]);
        let paths: Vec<_> = children.iter().map(VirtualEntry::path).collect();
        assert_eq!(paths, ["top.txt", "a"]);
    }

    #[test]
    fn test_unrelated_and_empty() {
        assert!(synthesize("a/", Vec::new()).is_empty());
        // Sibling with a shared textual prefix is not below "a/".
        assert!(synthesize("a/", vec![file("ab/x.txt", 1), file("a", 1)]).is_empty());
    }

    #[test]
    fn test_idempotent() {
        let items = vec![file("a/x.txt", 1), file("a/y/z.txt", 2), file("a/y/w.txt", 3)];
        assert_eq!(synthesize("a/", items.clone()), synthesize("a/", items));
    }
}
