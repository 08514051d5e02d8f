use base64::{engine::general_purpose::STANDARD, Engine};
use documented::{Documented, DocumentedFields};
use fdsync_utils::hash::normalize_fingerprint;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, Result};

/// A repository to add to the database on startup when its address is not
/// known yet.
#[derive(Clone, Debug, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct RepositoryConfig {
    /// Display name of the repository.
    pub name: String,

    /// Base address the index files are fetched from, without the
    /// trailing index file name.
    pub address: String,

    /// SHA-256 fingerprint of the repository signing certificate.
    /// Left empty, the certificate seen on the first sync is trusted.
    pub fingerprint: Option<String>,

    /// Whether the repository is synced.
    /// Default: true
    pub enabled: Option<bool>,

    /// Username for HTTP basic authentication.
    pub username: Option<String>,

    /// Password for HTTP basic authentication.
    pub password: Option<String>,
}

impl RepositoryConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Normalized fingerprint, empty when none was configured.
    pub fn fingerprint(&self) -> String {
        self.fingerprint
            .as_deref()
            .map(normalize_fingerprint)
            .unwrap_or_default()
    }

    /// `Authorization` header value for the configured credentials, empty
    /// without a username.
    pub fn authentication(&self) -> String {
        basic_authentication(
            self.username.as_deref().unwrap_or_default(),
            self.password.as_deref().unwrap_or_default(),
        )
    }

    pub fn validate(&self) -> Result<()> {
        let valid_address = Url::parse(&self.address)
            .ok()
            .is_some_and(|url| matches!(url.scheme(), "http" | "https") && url.has_host());
        if !valid_address {
            return Err(ConfigError::InvalidRepositoryAddress {
                name: self.name.clone(),
                address: self.address.clone(),
            });
        }

        let declared = self.fingerprint.as_deref().is_some_and(|f| !f.trim().is_empty());
        if declared && self.fingerprint().len() != 64 {
            return Err(ConfigError::InvalidFingerprint {
                name: self.name.clone(),
                fingerprint: self.fingerprint.clone().unwrap_or_default(),
            });
        }

        let has_username = self.username.as_deref().is_some_and(|u| !u.is_empty());
        let has_password = self.password.as_deref().is_some_and(|p| !p.is_empty());
        if has_password && !has_username {
            return Err(ConfigError::MissingUsername(self.name.clone()));
        }

        Ok(())
    }
}

/// Builds a `Basic` authorization value, or an empty string when `username`
/// is empty.
pub fn basic_authentication(username: &str, password: &str) -> String {
    if username.is_empty() {
        return String::new();
    }
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}
