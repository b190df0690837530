//! Transfer Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Only uploads consult [`ErrorKind::is_retryable`]. Every other mutating
//! operation surfaces the first error it gets, and the read probes swallow
//! theirs into a `false`/`0`/empty answer.

use derive_more::{Display, Error};
use reqwest::StatusCode;
use std::io::Error as IoError;

/// A transfer error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for transfer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Connection reset, timeout, or a server-side (5xx) failure. Worth
    /// trying again.
    #[display("transient failure: {_0}")]
    Transient(#[error(not(source))] String),
    /// The store rejected the request (4xx other than not-found).
    #[display("request for {path} rejected with HTTP {status}")]
    Permanent { status: u16, path: String },
    /// The remote object does not exist.
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Missing or invalid repository configuration, or credentials that
    /// could not be resolved.
    #[display("configuration error: {_0}")]
    Configuration(#[error(not(source))] String),
    /// The local file being uploaded could not be read.
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// A successful response carried a body that could not be decoded.
    #[display("invalid response: {_0}")]
    InvalidResponse(#[error(not(source))] String),
    /// Every permitted upload attempt failed.
    #[display("failed to upload {path} after {attempts} attempt(s)")]
    UploadFailed { path: String, attempts: u32 },
    /// The only upload attempt failed and retrying is switched off.
    #[display("failed to upload {path} on first attempt, no retries configured")]
    UploadNoRetries { path: String },
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classify a non-success HTTP status returned for `path`.
    pub fn from_status(status: StatusCode, path: &str) -> Self {
        match status {
            StatusCode::NOT_FOUND => Self::NotFound(path.to_string()),
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
                Self::Transient(format!("HTTP {status} for {path}"))
            },
            s if s.is_server_error() => Self::Transient(format!("HTTP {status} for {path}")),
            s => Self::Permanent { status: s.as_u16(), path: path.to_string() },
        }
    }

    /// Classify a transport-level failure. Anything that got as far as the
    /// network is treated as transient; a request that could not even be
    /// built will never succeed.
    pub fn from_transport(err: &reqwest::Error, path: &str) -> Self {
        match err.is_builder() {
            true => Self::Configuration(format!("unable to build request for {path}: {err}")),
            false => Self::Transient(format!("{path}: {err}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(StatusCode::INTERNAL_SERVER_ERROR, true)]
    #[case(StatusCode::BAD_GATEWAY, true)]
    #[case(StatusCode::SERVICE_UNAVAILABLE, true)]
    #[case(StatusCode::GATEWAY_TIMEOUT, true)]
    #[case(StatusCode::REQUEST_TIMEOUT, true)]
    #[case(StatusCode::TOO_MANY_REQUESTS, true)]
    #[case(StatusCode::BAD_REQUEST, false)]
    #[case(StatusCode::UNAUTHORIZED, false)]
    #[case(StatusCode::FORBIDDEN, false)]
    #[case(StatusCode::NOT_FOUND, false)]
    #[case(StatusCode::CONFLICT, false)]
    fn test_status_classification(#[case] status: StatusCode, #[case] retryable: bool) {
        assert_eq!(ErrorKind::from_status(status, "a/b.txt").is_retryable(), retryable);
    }

    #[test]
    fn test_not_found_classification() {
        assert!(matches!(
            ErrorKind::from_status(StatusCode::NOT_FOUND, "a/b.txt"),
            ErrorKind::NotFound(p) if p == "a/b.txt"
        ));
        assert!(matches!(
            ErrorKind::from_status(StatusCode::FORBIDDEN, "a/b.txt"),
            ErrorKind::Permanent { status: 403, .. }
        ));
    }

    #[test]
    fn test_upload_messages_differ() {
        let exhausted = ErrorKind::UploadFailed { path: "job/1/artifact.txt".to_string(), attempts: 4 };
        let single = ErrorKind::UploadNoRetries { path: "job/1/artifact.txt".to_string() };
        assert_eq!(exhausted.to_string(), "failed to upload job/1/artifact.txt after 4 attempt(s)");
        assert_eq!(single.to_string(), "failed to upload job/1/artifact.txt on first attempt, no retries configured");
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(ErrorKind::Transient("reset".to_string()).is_retryable());
        assert!(!ErrorKind::NotFound("x".to_string()).is_retryable());
        assert!(!ErrorKind::Configuration("x".to_string()).is_retryable());
        assert!(!ErrorKind::Io(IoError::other("x")).is_retryable());
        assert!(!ErrorKind::InvalidResponse("x".to_string()).is_retryable());
        assert!(!ErrorKind::UploadFailed { path: "x".to_string(), attempts: 1 }.is_retryable());
    }
}
