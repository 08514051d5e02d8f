use fdsync_utils::time::now_millis;
use serde::{Deserialize, Serialize};
use url::Url;

/// Sync configuration and cached state of one repository.
///
/// All mutating operations return a new value; storage persists whatever the
/// caller ends up with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub address: String,
    pub mirrors: Vec<String>,
    pub name: String,
    pub description: String,
    pub version: i32,
    pub enabled: bool,
    /// Uppercase hex SHA-256 of the signing certificate, empty until the
    /// first successful sync.
    pub fingerprint: String,
    pub last_modified: String,
    pub entity_tag: String,
    /// Wall clock (ms) of the last successful parse.
    pub updated: i64,
    /// Timestamp (ms) embedded in the last committed index.
    pub timestamp: i64,
    /// `Authorization` header value, empty for public repositories.
    pub authentication: String,
}

impl Repository {
    /// A fresh, enabled repository that has never been synced. The name is
    /// derived from the address.
    pub fn new(address: &str, fingerprint: &str, authentication: &str) -> Self {
        let name = Url::parse(address)
            .ok()
            .and_then(|url| url.host_str().map(|host| format!("{host}{}", url.path())))
            .unwrap_or_else(|| address.to_string());
        Self::blank(address, &name, "", 0, true, fingerprint, authentication)
    }

    fn blank(
        address: &str,
        name: &str,
        description: &str,
        version: i32,
        enabled: bool,
        fingerprint: &str,
        authentication: &str,
    ) -> Self {
        Self {
            id: -1,
            address: address.to_string(),
            mirrors: Vec::new(),
            name: name.to_string(),
            description: description.to_string(),
            version,
            enabled,
            fingerprint: fingerprint.to_string(),
            last_modified: String::new(),
            entity_tag: String::new(),
            updated: 0,
            timestamp: 0,
            authentication: authentication.to_string(),
        }
    }

    /// Changes where and how the repository is fetched. A new address or
    /// fingerprint invalidates the HTTP cache tokens.
    pub fn edit(&self, address: &str, fingerprint: &str, authentication: &str) -> Self {
        let changed = self.address != address || self.fingerprint != fingerprint;
        Self {
            address: address.to_string(),
            fingerprint: fingerprint.to_string(),
            authentication: authentication.to_string(),
            last_modified: if changed {
                String::new()
            } else {
                self.last_modified.clone()
            },
            entity_tag: if changed {
                String::new()
            } else {
                self.entity_tag.clone()
            },
            ..self.clone()
        }
    }

    /// Applies freshly parsed index metadata. A negative `version` keeps the
    /// current one.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &self,
        mirrors: Vec<String>,
        name: String,
        description: String,
        version: i32,
        last_modified: String,
        entity_tag: String,
        timestamp: i64,
    ) -> Self {
        Self {
            mirrors,
            name,
            description,
            version: if version >= 0 { version } else { self.version },
            last_modified,
            entity_tag,
            updated: now_millis(),
            timestamp,
            ..self.clone()
        }
    }

    /// Toggles syncing. Either way the next sync downloads unconditionally.
    pub fn enable(&self, enabled: bool) -> Self {
        Self {
            enabled,
            last_modified: String::new(),
            entity_tag: String::new(),
            ..self.clone()
        }
    }

    /// URL of `file_name` below the repository address.
    pub fn file_url(&self, file_name: &str) -> Result<String, url::ParseError> {
        let mut url = Url::parse(&self.address)?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithoutBase)?
            .pop_if_empty()
            .push(file_name);
        Ok(url.to_string())
    }

    /// Repositories known out of the box. Only F-Droid itself is enabled.
    pub fn defaults() -> Vec<Repository> {
        const FDROID: &str = "43238D512C1E5EB2D6569F4A3AFBF5523418B82E0A3ED1552770ABB9A9C9CCAB";
        const GUARDIAN: &str = "B7C2EEFD8DAC7806AF67DFCD92EB18126BC08312A7F2D6F3862E46013C7A6135";

        vec![
            Self::blank(
                "https://f-droid.org/repo",
                "F-Droid",
                "The official F-Droid Free Software repository. Everything in this repository \
                 is always built from the source code.",
                21,
                true,
                FDROID,
                "",
            ),
            Self::blank(
                "https://f-droid.org/archive",
                "F-Droid Archive",
                "The archive of the official F-Droid Free Software repository. Apps here are \
                 old and can contain known vulnerabilities and security issues!",
                21,
                false,
                FDROID,
                "",
            ),
            Self::blank(
                "https://guardianproject.info/fdroid/repo",
                "Guardian Project Official Releases",
                "The official repository of The Guardian Project apps for use with the F-Droid \
                 client. Applications in this repository are official binaries built by the \
                 original application developers and signed by the same key as the APKs that \
                 are released in the Google Play Store.",
                21,
                false,
                GUARDIAN,
                "",
            ),
            Self::blank(
                "https://guardianproject.info/fdroid/archive",
                "Guardian Project Archive",
                "The official repository of The Guardian Project apps for use with the F-Droid \
                 client. This contains older versions of applications from the main repository.",
                21,
                false,
                GUARDIAN,
                "",
            ),
        ]
    }
}
