//! Virtual Tree Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A virtual tree error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for virtual tree operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Directories have no content stream.
    #[display("cannot open directory `{_0}` for reading")]
    NotDirectoryReadable(#[error(not(source))] String),
    /// The key is neither a file nor a directory in the repository.
    #[display("no such file or directory `{_0}`")]
    NotFound(#[error(not(source))] String),
    /// The repository refused or failed to serve the file; the transfer
    /// error is attached as the cause.
    #[display("unable to download `{_0}`")]
    Download(#[error(not(source))] String),
    /// The key has no backing object to point a URL at.
    #[display("no external URL for `{_0}`")]
    Url(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Download(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(
            ErrorKind::NotDirectoryReadable("a/y".to_string()).to_string(),
            "cannot open directory `a/y` for reading"
        );
        assert_eq!(ErrorKind::NotFound("a/z".to_string()).to_string(), "no such file or directory `a/z`");
    }
}
