//! Credential resolution.
//!
//! The repository configuration only names a credential; the username and
//! secret are looked up on demand and dropped (and wiped) as soon as the
//! call that needed them is over.

use crate::error::{ErrorKind, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

pub type CredentialHandle = Arc<dyn CredentialResolver>;

/// A username/secret pair. The secret is zeroed on drop and never printed.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    secret: Zeroizing<String>,
}
impl Credentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: Zeroizing::new(secret.into()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Turns a credential identifier into a username/secret pair.
pub trait CredentialResolver: Send + Sync {
    /// Returns [`Credentials`](ErrorKind::Credentials) if nothing is known
    /// about `credential_id`.
    fn resolve(&self, credential_id: &str) -> Result<Credentials>;
}

/// Reads `ARTIFS_CREDENTIAL_<ID>_USERNAME` and `ARTIFS_CREDENTIAL_<ID>_SECRET`
/// from the process environment, where `<ID>` is the credential identifier
/// upper-cased with every non-alphanumeric character replaced by `_`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentials;
impl EnvCredentials {
    fn variable(credential_id: &str, field: &str) -> String {
        let id: String = credential_id
            .chars()
            .map(|c| match c.is_ascii_alphanumeric() {
                true => c.to_ascii_uppercase(),
                false => '_',
            })
            .collect();
        format!("ARTIFS_CREDENTIAL_{id}_{field}")
    }
}
impl CredentialResolver for EnvCredentials {
    fn resolve(&self, credential_id: &str) -> Result<Credentials> {
        let username = std::env::var(Self::variable(credential_id, "USERNAME"));
        let secret = std::env::var(Self::variable(credential_id, "SECRET"));
        match (username, secret) {
            (Ok(username), Ok(secret)) => Ok(Credentials::new(username, secret)),
            _ => exn::bail!(ErrorKind::Credentials(credential_id.to_string())),
        }
    }
}

/// Fixed in-memory set of credentials.
#[derive(Debug, Default, Clone)]
pub struct StaticCredentials {
    entries: HashMap<String, Credentials>,
}
impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        credential_id: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.entries.insert(credential_id.into(), Credentials::new(username, secret));
        self
    }
}
impl CredentialResolver for StaticCredentials {
    fn resolve(&self, credential_id: &str) -> Result<Credentials> {
        match self.entries.get(credential_id) {
            Some(credentials) => Ok(credentials.clone()),
            None => exn::bail!(ErrorKind::Credentials(credential_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_debug_redacts_secret() {
        let credentials = Credentials::new("sample", "hunter2");
        let printed = format!("{credentials:?}");
        assert!(printed.contains("sample"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_static_resolver() {
        let resolver = StaticCredentials::new().with("the-credentials-id", "sample", "secret");
        let credentials = resolver.resolve("the-credentials-id").unwrap();
        assert_eq!(credentials.username(), "sample");
        assert_eq!(credentials.secret(), "secret");
        let err = resolver.resolve("unknown").unwrap_err();
        assert_eq!(*err, ErrorKind::Credentials("unknown".to_string()));
    }

    #[rstest]
    #[case("deploy", "ARTIFS_CREDENTIAL_DEPLOY_USERNAME")]
    #[case("the-credentials-id", "ARTIFS_CREDENTIAL_THE_CREDENTIALS_ID_USERNAME")]
    #[case("ci.bot", "ARTIFS_CREDENTIAL_CI_BOT_USERNAME")]
    fn test_env_variable_names(#[case] id: &str, #[case] expected: &str) {
        assert_eq!(EnvCredentials::variable(id, "USERNAME"), expected);
    }

    #[test]
    fn test_env_resolver_missing() {
        let err = EnvCredentials.resolve("surely-nobody-defines-this-one").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Credentials(_)));
    }
}
