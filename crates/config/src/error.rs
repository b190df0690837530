//! Configuration Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// None of these are worth retrying: a configuration that failed to load or
/// validate once will fail the same way again until somebody edits it.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The layered configuration sources could not be merged or extracted.
    #[display("unable to load configuration")]
    Load,
    /// A required value is missing or malformed.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
    /// The credential resolver could not produce a username/secret pair.
    #[display("unable to resolve credentials `{_0}`")]
    Credentials(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
