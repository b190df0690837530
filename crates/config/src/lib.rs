pub mod credentials;
pub mod error;
mod repository;

pub use crate::credentials::{CredentialHandle, CredentialResolver, Credentials, EnvCredentials, StaticCredentials};
pub use crate::repository::{
    DEFAULT_MAX_UPLOAD_RETRIES, DEFAULT_RETRY_DELAY_SECONDS, ListingStrategy, MIN_RETRY_DELAY_SECONDS,
    MIN_UPLOAD_RETRIES, RepositoryConfig, RetrySettings, default_path, figment, load,
};
