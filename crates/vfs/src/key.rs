//! Pure string operations on tree keys. None of these touch the network, and
//! none of them check that the key exists.

use artifs_transfer::normalize_path;

/// Final key segment a host appends to ask for an aggregate "browse all"
/// view of a directory. Such keys are never files or directories.
pub const BROWSE_ALL_MARKER: &str = "*view*";

/// Key with its last segment removed. The root is its own parent.
pub fn parent(key: &str) -> String {
    match normalize_path(key).rsplit_once('/') {
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    }
}

/// Key of `name` inside `key`. `name` may itself span several segments.
pub fn child(key: &str, name: &str) -> String {
    normalize_path(format!("{key}/{name}"))
}

/// Last segment of `key`; empty for the root.
pub fn name(key: &str) -> &str {
    let key = key.trim_end_matches('/');
    key.rsplit_once('/').map_or(key, |(_, name)| name)
}

/// Whether `key` ends in the [`BROWSE_ALL_MARKER`] segment.
pub fn is_browse_all(key: &str) -> bool {
    name(key) == BROWSE_ALL_MARKER
}
