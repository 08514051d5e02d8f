use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a release cannot be installed on the current device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "feature")]
pub enum Incompatibility {
    MinSdk,
    MaxSdk,
    Platform,
    Feature(String),
}

impl fmt::Display for Incompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Incompatibility::MinSdk => write!(f, "device API level too low"),
            Incompatibility::MaxSdk => write!(f, "device API level too high"),
            Incompatibility::Platform => write!(f, "unsupported native platform"),
            Incompatibility::Feature(name) => write!(f, "missing feature {name}"),
        }
    }
}

/// Expansion file shipped next to an APK.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObbFile {
    pub file: String,
    pub sha256: String,
}

/// One installable build of a product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Release {
    pub selected: bool,
    pub version: String,
    pub version_code: i64,
    pub added: i64,
    pub size: i64,
    pub min_sdk_version: i32,
    pub target_sdk_version: i32,
    pub max_sdk_version: i32,
    pub source: String,
    pub release: String,
    pub hash: String,
    pub hash_type: String,
    pub signature: String,
    pub obb_main: Option<ObbFile>,
    pub obb_patch: Option<ObbFile>,
    pub permissions: Vec<String>,
    pub features: Vec<String>,
    pub platforms: Vec<String>,
    pub incompatibilities: Vec<Incompatibility>,
}

impl Release {
    /// Key used to collapse duplicate releases of a product.
    pub fn identifier(&self) -> String {
        format!("{}.{}", self.version_code, self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        let release = Release {
            version_code: 42,
            hash: "abcd".into(),
            ..Default::default()
        };
        assert_eq!(release.identifier(), "42.abcd");
        assert_eq!(Release::default().identifier(), "0.");
    }

    #[test]
    fn test_incompatibility_serde() {
        let json = serde_json::to_string(&Incompatibility::Feature("android.hardware.nfc".into()))
            .unwrap();
        assert_eq!(json, r#"{"kind":"Feature","feature":"android.hardware.nfc"}"#);

        let back: Incompatibility = serde_json::from_str(r#"{"kind":"MinSdk"}"#).unwrap();
        assert_eq!(back, Incompatibility::MinSdk);
    }

    #[test]
    fn test_release_deserialize_partial() {
        let release: Release =
            serde_json::from_str(r#"{"version":"1.0","version_code":3}"#).unwrap();
        assert_eq!(release.version_code, 3);
        assert!(release.permissions.is_empty());
        assert!(!release.selected);
    }
}
