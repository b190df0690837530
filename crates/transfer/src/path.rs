//! Repository path utilities.
//!
//! Remote paths are plain `/`-separated strings relative to the repository
//! root. They are normalized before use so that `a//b/`, `/a/b` and `a/b`
//! all address the same object.

use url::Url;

/// Normalize a repository path: strip leading and trailing slashes and
/// collapse repeated ones. The repository root normalizes to `""`.
///
/// Idempotent, and never fails: `.` and `..` segments are kept verbatim
/// because the remote store treats them as ordinary names.
///
/// # Examples
///
/// ```
/// use artifs_transfer::normalize_path;
/// assert_eq!(normalize_path("/job//1/artifacts/"), "job/1/artifacts");
/// assert_eq!(normalize_path("///"), "");
/// assert_eq!(normalize_path(normalize_path("a//b/")), normalize_path("a//b/"));
/// ```
pub fn normalize(path: impl AsRef<str>) -> String {
    let mut normalized = String::with_capacity(path.as_ref().len());
    for segment in path.as_ref().split('/').filter(|s| !s.is_empty()) {
        if !normalized.is_empty() {
            normalized.push('/');
        }
        normalized.push_str(segment);
    }
    normalized
}

/// Normalize a listing prefix: the normalized path with exactly one trailing
/// slash, or `""` for the repository root.
pub fn prefix(path: impl AsRef<str>) -> String {
    match normalize(path) {
        root if root.is_empty() => root,
        path => path + "/",
    }
}

/// Append `segments` to `base` as percent-encoded path segments, splitting
/// each one on `/` first so that separators survive literally.
///
/// `base` must be able to act as a base URL (checked when the repository
/// configuration is validated); if it cannot, it is returned unchanged.
pub fn join_url<'a>(base: &Url, segments: impl IntoIterator<Item = &'a str>) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty();
        for segment in segments {
            path.extend(segment.split('/').filter(|s| !s.is_empty()));
        }
    }
    url
}
