//! Repository configuration.
//!
//! Values are layered with [`figment`]: built-in defaults, then an optional
//! file (TOML, YAML or JSON depending on its extension), then `ARTIFS_*`
//! environment variables. The merged result is validated and the retry
//! tuning is clamped before a [`RepositoryConfig`] is handed out, so nothing
//! downstream ever sees a negative retry count or delay.

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_MAX_UPLOAD_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECONDS: u64 = 15;
/// Lowest retry count a configuration can end up with after clamping.
pub const MIN_UPLOAD_RETRIES: u32 = 0;
/// Lowest inter-attempt delay a configuration can end up with after clamping.
pub const MIN_RETRY_DELAY_SECONDS: u64 = 0;

const ENV_PREFIX: &str = "ARTIFS_";

/// How a prefix listing is obtained from the remote store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStrategy {
    /// A single search query returning every object below the prefix.
    #[default]
    Search,
    /// A folder lookup for the direct children, then one metadata lookup
    /// per child.
    Children,
}

/// Upload retry tuning, clamped at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    max_upload_retries: u32,
    retry_delay_seconds: u64,
}
impl RetrySettings {
    /// Build retry settings from raw (possibly negative) values. Anything
    /// below the minimum is clamped up to it rather than rejected.
    pub fn new(max_upload_retries: i64, retry_delay_seconds: i64) -> Self {
        let retries = max_upload_retries.max(i64::from(MIN_UPLOAD_RETRIES));
        let delay = retry_delay_seconds.max(MIN_RETRY_DELAY_SECONDS as i64);
        Self {
            max_upload_retries: u32::try_from(retries).unwrap_or(u32::MAX),
            retry_delay_seconds: u64::try_from(delay).unwrap_or(MIN_RETRY_DELAY_SECONDS),
        }
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    /// Additional attempts made after the first failed upload attempt.
    pub fn max_upload_retries(&self) -> u32 {
        self.max_upload_retries
    }

    pub fn retry_delay_seconds(&self) -> u64 {
        self.retry_delay_seconds
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }
}
impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_upload_retries: DEFAULT_MAX_UPLOAD_RETRIES,
            retry_delay_seconds: DEFAULT_RETRY_DELAY_SECONDS,
        }
    }
}

/// Shape of the configuration as it comes out of figment, before
/// validation. Retry values are signed on purpose so that negative input
/// can be clamped instead of failing deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct RawConfig {
    #[serde(deserialize_with = "scalar_string")]
    server_url: String,
    #[serde(deserialize_with = "scalar_string")]
    repository: String,
    #[serde(deserialize_with = "scalar_string")]
    credential_id: String,
    #[serde(deserialize_with = "scalar_string")]
    path_prefix: String,
    max_upload_retries: i64,
    retry_delay_seconds: i64,
    listing: ListingStrategy,
}
impl Default for RawConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            repository: String::new(),
            credential_id: String::new(),
            path_prefix: String::new(),
            max_upload_retries: i64::from(DEFAULT_MAX_UPLOAD_RETRIES),
            retry_delay_seconds: DEFAULT_RETRY_DELAY_SECONDS as i64,
            listing: ListingStrategy::default(),
        }
    }
}

/// Accept any scalar where a string is expected. Environment values are
/// parsed by figment, so `ARTIFS_PATH_PREFIX=2024` arrives as a number.
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Flag(bool),
    }
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(text) => text,
        Scalar::Unsigned(value) => value.to_string(),
        Scalar::Signed(value) => value.to_string(),
        Scalar::Float(value) => value.to_string(),
        Scalar::Flag(value) => value.to_string(),
    })
}

/// Identifies the target repository and how to talk to it.
///
/// Holds the *identifier* of the credentials, never the secret itself; the
/// secret is resolved per call through a
/// [`CredentialResolver`](crate::CredentialResolver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    server_url: Url,
    repository: String,
    credential_id: String,
    path_prefix: String,
    retry: RetrySettings,
    listing: ListingStrategy,
}
impl RepositoryConfig {
    /// Create a configuration with default retry tuning and listing.
    ///
    /// Returns [`Invalid`](ErrorKind::Invalid) if the server URL does not
    /// parse as a base URL or if the repository name is empty.
    pub fn new(server_url: &str, repository: &str, credential_id: impl Into<String>) -> Result<Self> {
        let server_url = server_url.trim();
        if server_url.is_empty() {
            exn::bail!(ErrorKind::Invalid("server URL must not be empty".to_string()));
        }
        let parsed =
            Url::parse(server_url).or_raise(|| ErrorKind::Invalid(format!("unparseable server URL `{server_url}`")))?;
        if parsed.cannot_be_a_base() {
            exn::bail!(ErrorKind::Invalid(format!("server URL `{server_url}` cannot be used as a base")));
        }
        let repository = repository.trim().trim_matches('/');
        if repository.is_empty() {
            exn::bail!(ErrorKind::Invalid("repository must not be empty".to_string()));
        }
        if repository.contains('/') {
            exn::bail!(ErrorKind::Invalid(format!("repository `{repository}` must be a single name")));
        }
        Ok(Self {
            server_url: parsed,
            repository: repository.to_string(),
            credential_id: credential_id.into(),
            path_prefix: String::new(),
            retry: RetrySettings::default(),
            listing: ListingStrategy::default(),
        })
    }

    pub fn with_path_prefix(mut self, path_prefix: impl Into<String>) -> Self {
        self.path_prefix = path_prefix.into();
        self
    }

    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_listing(mut self, listing: ListingStrategy) -> Self {
        self.listing = listing;
        self
    }

    pub fn server_url(&self) -> &Url {
        &self.server_url
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn credential_id(&self) -> &str {
        &self.credential_id
    }

    /// Repository-relative prefix under which the host keeps its tree. May
    /// be empty.
    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    pub fn retry(&self) -> RetrySettings {
        self.retry
    }

    pub fn listing(&self) -> ListingStrategy {
        self.listing
    }

    /// Extract and validate a configuration from an already-built figment.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let raw: RawConfig = figment.extract().or_raise(|| ErrorKind::Load)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        if raw.max_upload_retries < i64::from(MIN_UPLOAD_RETRIES) {
            tracing::warn!(value = raw.max_upload_retries, min = MIN_UPLOAD_RETRIES, "Clamping max_upload_retries");
        }
        if raw.retry_delay_seconds < MIN_RETRY_DELAY_SECONDS as i64 {
            tracing::warn!(
                value = raw.retry_delay_seconds,
                min = MIN_RETRY_DELAY_SECONDS,
                "Clamping retry_delay_seconds"
            );
        }
        Ok(Self::new(&raw.server_url, &raw.repository, raw.credential_id)?
            .with_path_prefix(raw.path_prefix)
            .with_retry(RetrySettings::new(raw.max_upload_retries, raw.retry_delay_seconds))
            .with_listing(raw.listing))
    }
}

/// Default configuration file location (`<config_dir>/artifs/config.toml`),
/// if the platform has a notion of one.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "artifs").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Build the layered figment: defaults, then `path` (or the default
/// location), then `ARTIFS_*` environment variables. Missing files are
/// skipped silently.
pub fn figment(path: Option<&Path>) -> Figment {
    let figment = Figment::from(Serialized::defaults(RawConfig::default()));
    let figment = match path.map(Path::to_path_buf).or_else(default_path) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Layering configuration file");
            match path.extension().and_then(|ext| ext.to_str()) {
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => figment.merge(Toml::file(path)),
            }
        },
        None => figment,
    };
    figment.merge(Env::prefixed(ENV_PREFIX))
}

/// Load and validate the repository configuration.
pub fn load(path: Option<&Path>) -> Result<RepositoryConfig> {
    RepositoryConfig::from_figment(&figment(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    fn write_config(extension: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(extension).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    /// Load `file` while holding the figment jail, so environment variables
    /// set by other tests never leak into it.
    fn load_file(file: &tempfile::NamedTempFile) -> Result<RepositoryConfig> {
        let mut loaded = None;
        figment::Jail::expect_with(|_| {
            loaded = Some(load(Some(file.path())));
            Ok(())
        });
        loaded.unwrap()
    }

    #[test]
    fn test_default_retry_values() {
        let retry = RetrySettings::default();
        assert_eq!(retry.max_upload_retries(), 3);
        assert_eq!(retry.retry_delay_seconds(), 15);
        assert_eq!(retry.retry_delay(), Duration::from_secs(15));
    }

    #[rstest]
    #[case(5, 30, 5, 30)]
    #[case(0, 0, 0, 0)]
    #[case(-1, -1, 0, 0)]
    #[case(i64::MIN, i64::MIN, 0, 0)]
    #[case(i64::MAX, 1, u32::MAX, 1)]
    fn test_retry_clamping(
        #[case] retries: i64,
        #[case] delay: i64,
        #[case] expected_retries: u32,
        #[case] expected_delay: u64,
    ) {
        let retry = RetrySettings::new(retries, delay);
        assert_eq!(retry.max_upload_retries(), expected_retries);
        assert_eq!(retry.retry_delay_seconds(), expected_delay);
    }

    #[test]
    fn test_new_with_defaults() {
        let config = RepositoryConfig::new("http://localhost:8081", "my-generic-repo", "deploy").unwrap();
        assert_eq!(config.server_url().as_str(), "http://localhost:8081/");
        assert_eq!(config.repository(), "my-generic-repo");
        assert_eq!(config.credential_id(), "deploy");
        assert_eq!(config.path_prefix(), "");
        assert_eq!(config.retry(), RetrySettings::default());
        assert_eq!(config.listing(), ListingStrategy::Search);
    }

    #[rstest]
    #[case("", "repo")]
    #[case("   ", "repo")]
    #[case("not a url", "repo")]
    #[case("mailto:someone@example.com", "repo")]
    #[case("http://localhost:8081", "")]
    #[case("http://localhost:8081", "/")]
    #[case("http://localhost:8081", "nested/repo")]
    fn test_new_rejects_invalid(#[case] server_url: &str, #[case] repository: &str) {
        let err = RepositoryConfig::new(server_url, repository, "id").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_load_toml_file() {
        let file = write_config(
            ".toml",
            r#"
                server_url = "https://artifacts.example.com/artifactory"
                repository = "builds"
                credential_id = "ci"
                path_prefix = "jobs/"
                max_upload_retries = 5
                retry_delay_seconds = 30
                listing = "children"
            "#,
        );
        let config = load_file(&file).unwrap();
        assert_eq!(config.server_url().as_str(), "https://artifacts.example.com/artifactory");
        assert_eq!(config.repository(), "builds");
        assert_eq!(config.credential_id(), "ci");
        assert_eq!(config.path_prefix(), "jobs/");
        assert_eq!(config.retry().max_upload_retries(), 5);
        assert_eq!(config.retry().retry_delay_seconds(), 30);
        assert_eq!(config.listing(), ListingStrategy::Children);
    }

    #[test]
    fn test_load_yaml_file_clamps_negative_values() {
        let file = write_config(
            ".yaml",
            "server_url: http://localhost:8081\nrepository: repo\nmax_upload_retries: -4\nretry_delay_seconds: -10\n",
        );
        let config = load_file(&file).unwrap();
        assert_eq!(config.retry().max_upload_retries(), 0);
        assert_eq!(config.retry().retry_delay_seconds(), 0);
    }

    #[test]
    fn test_load_json_file_uses_defaults() {
        let file = write_config(".json", r#"{"server_url": "http://localhost:8081", "repository": "repo"}"#);
        let config = load_file(&file).unwrap();
        assert_eq!(config.retry(), RetrySettings::default());
        assert_eq!(config.listing(), ListingStrategy::Search);
    }

    #[test]
    fn test_load_missing_repository_is_invalid() {
        let file = write_config(".toml", r#"server_url = "http://localhost:8081""#);
        let err = load_file(&file).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_load_wrong_type_fails_extraction() {
        let contents = "server_url = 'http://localhost'\nrepository = 'r'\nmax_upload_retries = 'lots'\n";
        let file = write_config(".toml", contents);
        let err = load_file(&file).unwrap_err();
        assert_eq!(*err, ErrorKind::Load);
    }

    #[rstest]
    #[case("ARTIFS_CREDENTIAL_ID", "1234", RepositoryConfig::credential_id)]
    #[case("ARTIFS_PATH_PREFIX", "2024", RepositoryConfig::path_prefix)]
    #[case("ARTIFS_REPOSITORY", "42", RepositoryConfig::repository)]
    fn test_load_numeric_env_values(
        #[case] variable: &str,
        #[case] value: &str,
        #[case] field: fn(&RepositoryConfig) -> &str,
    ) {
        figment::Jail::expect_with(|jail| {
            jail.set_env("ARTIFS_SERVER_URL", "http://localhost:8081");
            jail.set_env("ARTIFS_REPOSITORY", "repo");
            jail.set_env(variable, value);
            let config = load(Some(Path::new("absent.toml"))).unwrap();
            assert_eq!(field(&config), value);
            Ok(())
        });
    }

    #[test]
    fn test_load_numeric_file_values() {
        let file = write_config(".toml", "server_url = 'http://localhost'\nrepository = 'r'\npath_prefix = 2024\n");
        let config = load_file(&file).unwrap();
        assert_eq!(config.path_prefix(), "2024");
    }
}
