use serde::{Deserialize, Serialize};

use super::release::Release;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Author {
    pub name: String,
    pub email: String,
    pub web: String,
}

impl Author {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.email.is_empty() && self.web.is_empty()
    }
}

/// A way to fund the developers of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Donate {
    Regular(String),
    Bitcoin(String),
    Litecoin(String),
    Flattr(String),
    Liberapay(String),
    OpenCollective(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScreenshotKind {
    Phone,
    SmallTablet,
    LargeTablet,
}

impl ScreenshotKind {
    /// Directory name of this kind below a localized asset folder.
    pub fn directory(self) -> &'static str {
        match self {
            ScreenshotKind::Phone => "phoneScreenshots",
            ScreenshotKind::SmallTablet => "sevenInchScreenshots",
            ScreenshotKind::LargeTablet => "tenInchScreenshots",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    pub locale: String,
    pub kind: ScreenshotKind,
    pub path: String,
}

/// An application as published by one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    pub repository_id: i64,
    pub package_name: String,
    pub name: String,
    pub summary: String,
    pub description: String,
    pub whats_new: String,
    pub icon: String,
    pub author: Author,
    pub source: String,
    pub web: String,
    pub tracker: String,
    pub changelog: String,
    pub licenses: Vec<String>,
    pub categories: Vec<String>,
    pub anti_features: Vec<String>,
    pub donates: Vec<Donate>,
    pub screenshots: Vec<Screenshot>,
    pub added: i64,
    pub updated: i64,
    pub suggested_version_code: i64,
    /// Newest first once transformed.
    pub releases: Vec<Release>,
}

impl Product {
    pub fn new(repository_id: i64, package_name: impl Into<String>) -> Self {
        Self {
            repository_id,
            package_name: package_name.into(),
            ..Default::default()
        }
    }

    pub fn selected_release(&self) -> Option<&Release> {
        self.releases.iter().find(|release| release.selected)
    }

    /// Whether the selected release installs on the device it was
    /// transformed for.
    pub fn compatible(&self) -> bool {
        self.selected_release()
            .is_some_and(|release| release.incompatibilities.is_empty())
    }

    pub fn version(&self) -> &str {
        self.selected_release()
            .map(|release| release.version.as_str())
            .unwrap_or_default()
    }
}
