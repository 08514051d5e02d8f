//! Streaming decoder for the JSON `index-v1.json` format.
//!
//! The document is walked with a [`DeserializeSeed`] so that each app and
//! each package list is handed to the callback as soon as it is decoded;
//! the whole index is never held in memory.

use std::{
    collections::BTreeMap,
    fmt,
    io::{BufReader, Read},
};

use serde::{
    de::{self, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor},
    Deserialize, Deserializer,
};
use serde_json::Value;

use super::{
    de::{empty_is_none, number_or_zero, small_number_or_zero, string_list},
    IndexCallback, IndexParser, RepositoryMeta,
};
use crate::{
    error::{ParseError, Result, UpdateError},
    model::{Author, Donate, ObbFile, Product, Release, Screenshot, ScreenshotKind},
};

const PREFERRED_LOCALES: [&str; 2] = ["en-US", "en"];

/// Decodes `index-v1.json`. The top level `repo`, `apps` and `packages`
/// members are delivered in document order; anything else is skipped.
#[derive(Debug, Clone, Copy)]
pub struct CurrentParser {
    repository_id: i64,
}

impl CurrentParser {
    pub fn new(repository_id: i64) -> Self {
        Self { repository_id }
    }
}

impl IndexParser for CurrentParser {
    fn parse(&self, reader: &mut dyn Read, callback: &mut dyn IndexCallback) -> Result<()> {
        let mut sink = Sink {
            repository_id: self.repository_id,
            callback,
            aborted: None,
        };

        let mut de = serde_json::Deserializer::from_reader(BufReader::new(reader));
        let result = IndexSeed(&mut sink)
            .deserialize(&mut de)
            .and_then(|()| de.end());

        match (result, sink.aborted) {
            (_, Some(err)) => Err(err),
            (Ok(()), None) => Ok(()),
            (Err(err), None) => Err(ParseError::Json(err).into()),
        }
    }
}

/// Routes decoded records to the callback. A callback error is parked here
/// and serde is unwound with a placeholder error.
struct Sink<'a> {
    repository_id: i64,
    callback: &'a mut dyn IndexCallback,
    aborted: Option<UpdateError>,
}

impl Sink<'_> {
    fn deliver<E: de::Error>(&mut self, result: Result<()>) -> std::result::Result<(), E> {
        result.map_err(|err| {
            self.aborted = Some(err);
            E::custom("index callback aborted")
        })
    }
}

struct IndexSeed<'s, 'a>(&'s mut Sink<'a>);

impl<'de> DeserializeSeed<'de> for IndexSeed<'_, '_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for IndexSeed<'_, '_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an index object")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        let sink = self.0;
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "repo" => {
                    let repo: RawRepo = map.next_value()?;
                    let result = sink.callback.on_repository(repo.into_meta());
                    sink.deliver::<A::Error>(result)?;
                }
                "apps" => map.next_value_seed(AppsSeed(&mut *sink))?,
                "packages" => map.next_value_seed(PackagesSeed(&mut *sink))?,
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(())
    }
}

struct AppsSeed<'s, 'a>(&'s mut Sink<'a>);

impl<'de> DeserializeSeed<'de> for AppsSeed<'_, '_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for AppsSeed<'_, '_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a list of apps")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        let sink = self.0;
        while let Some(app) = seq.next_element::<RawApp>()? {
            let product = app.into_product(sink.repository_id);
            let result = sink.callback.on_product(product);
            sink.deliver::<A::Error>(result)?;
        }
        Ok(())
    }
}

struct PackagesSeed<'s, 'a>(&'s mut Sink<'a>);

impl<'de> DeserializeSeed<'de> for PackagesSeed<'_, '_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for PackagesSeed<'_, '_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of package names to releases")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        let sink = self.0;
        while let Some(package_name) = map.next_key::<String>()? {
            let packages: Vec<RawPackage> = map.next_value()?;
            let releases = packages.into_iter().map(RawPackage::into_release).collect();
            let result = sink.callback.on_releases(package_name, releases);
            sink.deliver::<A::Error>(result)?;
        }
        Ok(())
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawRepo {
    #[serde(deserialize_with = "number_or_zero")]
    timestamp: i64,
    #[serde(deserialize_with = "small_number_or_zero")]
    version: i32,
    #[serde(deserialize_with = "empty_is_none")]
    name: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    description: Option<String>,
    #[serde(deserialize_with = "string_list")]
    mirrors: Vec<String>,
}

impl RawRepo {
    fn into_meta(self) -> RepositoryMeta {
        RepositoryMeta {
            mirrors: self.mirrors,
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            version: self.version,
            timestamp: self.timestamp,
            certificate: None,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawLocalized {
    #[serde(deserialize_with = "empty_is_none")]
    name: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    summary: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    description: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    whats_new: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    icon: Option<String>,
    #[serde(deserialize_with = "string_list")]
    phone_screenshots: Vec<String>,
    #[serde(deserialize_with = "string_list")]
    seven_inch_screenshots: Vec<String>,
    #[serde(deserialize_with = "string_list")]
    ten_inch_screenshots: Vec<String>,
}

impl RawLocalized {
    fn screenshots(&self) -> [(ScreenshotKind, &Vec<String>); 3] {
        [
            (ScreenshotKind::Phone, &self.phone_screenshots),
            (ScreenshotKind::SmallTablet, &self.seven_inch_screenshots),
            (ScreenshotKind::LargeTablet, &self.ten_inch_screenshots),
        ]
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawApp {
    package_name: String,
    #[serde(deserialize_with = "empty_is_none")]
    name: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    summary: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    description: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    icon: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    author_name: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    author_email: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    author_web_site: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    web_site: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    source_code: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    issue_tracker: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    changelog: Option<String>,
    #[serde(deserialize_with = "string_list")]
    license: Vec<String>,
    #[serde(deserialize_with = "string_list")]
    categories: Vec<String>,
    #[serde(deserialize_with = "string_list")]
    anti_features: Vec<String>,
    #[serde(deserialize_with = "empty_is_none")]
    donate: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    bitcoin: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    litecoin: Option<String>,
    #[serde(rename = "flattrID", deserialize_with = "empty_is_none")]
    flattr_id: Option<String>,
    #[serde(alias = "liberapayID", deserialize_with = "empty_is_none")]
    liberapay: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    open_collective: Option<String>,
    #[serde(deserialize_with = "number_or_zero")]
    added: i64,
    #[serde(deserialize_with = "number_or_zero")]
    last_updated: i64,
    #[serde(deserialize_with = "number_or_zero")]
    suggested_version_code: i64,
    localized: BTreeMap<String, RawLocalized>,
}

impl RawApp {
    /// First locale, in preference order, for which `pick` yields a value.
    fn localized<'a, T>(
        &'a self,
        pick: impl Fn(&'a RawLocalized) -> Option<T>,
    ) -> Option<(&'a str, T)> {
        PREFERRED_LOCALES
            .iter()
            .filter_map(|locale| self.localized.get_key_value(*locale))
            .chain(self.localized.iter())
            .find_map(|(locale, entry)| pick(entry).map(|value| (locale.as_str(), value)))
    }

    fn localized_text(
        &self,
        pick: impl Fn(&RawLocalized) -> Option<&String>,
        fallback: &Option<String>,
    ) -> String {
        self.localized(|entry| pick(entry))
            .map(|(_, value)| value.clone())
            .or_else(|| fallback.clone())
            .unwrap_or_default()
    }

    fn into_product(self, repository_id: i64) -> Product {
        let name = self.localized_text(|l| l.name.as_ref(), &self.name);
        let summary = self.localized_text(|l| l.summary.as_ref(), &self.summary);
        let description = self.localized_text(|l| l.description.as_ref(), &self.description);
        let whats_new = self.localized_text(|l| l.whats_new.as_ref(), &None);

        let icon = match &self.icon {
            Some(icon) => icon.clone(),
            None => {
                self.localized(|l| l.icon.as_ref())
                    .map(|(locale, icon)| format!("{}/{locale}/{icon}", self.package_name))
                    .unwrap_or_default()
            }
        };

        let screenshots: Vec<Screenshot> = self
            .localized(|l| {
                l.screenshots()
                    .iter()
                    .any(|(_, files)| !files.is_empty())
                    .then_some(l)
            })
            .map(|(locale, entry)| {
                entry
                    .screenshots()
                    .into_iter()
                    .flat_map(|(kind, files)| {
                        files.iter().map(move |path| {
                            Screenshot {
                                locale: locale.to_string(),
                                kind,
                                path: path.clone(),
                            }
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let donates = [
            self.donate.map(Donate::Regular),
            self.bitcoin.map(Donate::Bitcoin),
            self.litecoin.map(Donate::Litecoin),
            self.flattr_id.map(Donate::Flattr),
            self.liberapay.map(Donate::Liberapay),
            self.open_collective.map(Donate::OpenCollective),
        ]
        .into_iter()
        .flatten()
        .collect();

        Product {
            repository_id,
            package_name: self.package_name,
            name,
            summary,
            description,
            whats_new,
            icon,
            author: Author {
                name: self.author_name.unwrap_or_default(),
                email: self.author_email.unwrap_or_default(),
                web: self.author_web_site.unwrap_or_default(),
            },
            source: self.source_code.unwrap_or_default(),
            web: self.web_site.unwrap_or_default(),
            tracker: self.issue_tracker.unwrap_or_default(),
            changelog: self.changelog.unwrap_or_default(),
            licenses: self.license,
            categories: self.categories,
            anti_features: self.anti_features,
            donates,
            screenshots,
            added: self.added,
            updated: self.last_updated,
            suggested_version_code: self.suggested_version_code,
            releases: Vec::new(),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawPackage {
    #[serde(deserialize_with = "number_or_zero")]
    version_code: i64,
    #[serde(deserialize_with = "empty_is_none")]
    version_name: Option<String>,
    #[serde(deserialize_with = "number_or_zero")]
    added: i64,
    #[serde(deserialize_with = "number_or_zero")]
    size: i64,
    #[serde(deserialize_with = "small_number_or_zero")]
    min_sdk_version: i32,
    #[serde(deserialize_with = "small_number_or_zero")]
    target_sdk_version: i32,
    #[serde(deserialize_with = "small_number_or_zero")]
    max_sdk_version: i32,
    #[serde(deserialize_with = "empty_is_none")]
    srcname: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    apk_name: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    hash: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    hash_type: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    sig: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    obb_main_file: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    obb_main_file_sha256: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    obb_patch_file: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    obb_patch_file_sha256: Option<String>,
    #[serde(rename = "uses-permission")]
    uses_permission: Vec<Value>,
    #[serde(rename = "uses-permission-sdk-23")]
    uses_permission_sdk_23: Vec<Value>,
    #[serde(deserialize_with = "string_list")]
    features: Vec<String>,
    #[serde(deserialize_with = "string_list")]
    nativecode: Vec<String>,
}

/// Entries are `[name, maxSdk]` pairs; bare strings are accepted too.
fn permission_name(value: &Value) -> Option<&str> {
    let name = match value {
        Value::String(name) => Some(name.as_str()),
        Value::Array(items) => items.first().and_then(Value::as_str),
        _ => None,
    };
    name.filter(|name| !name.is_empty())
}

fn obb(file: Option<String>, sha256: Option<String>) -> Option<ObbFile> {
    file.map(|file| {
        ObbFile {
            file,
            sha256: sha256.unwrap_or_default(),
        }
    })
}

impl RawPackage {
    fn into_release(self) -> Release {
        let mut permissions: Vec<String> = Vec::new();
        for name in self
            .uses_permission
            .iter()
            .chain(&self.uses_permission_sdk_23)
            .filter_map(permission_name)
        {
            if !permissions.iter().any(|p| p == name) {
                permissions.push(name.to_string());
            }
        }

        Release {
            selected: false,
            version: self.version_name.unwrap_or_default(),
            version_code: self.version_code,
            added: self.added,
            size: self.size,
            min_sdk_version: self.min_sdk_version,
            target_sdk_version: self.target_sdk_version,
            max_sdk_version: self.max_sdk_version,
            source: self.srcname.unwrap_or_default(),
            release: self.apk_name.unwrap_or_default(),
            hash: self.hash.unwrap_or_default(),
            hash_type: self.hash_type.unwrap_or_default(),
            signature: self.sig.unwrap_or_default(),
            obb_main: obb(self.obb_main_file, self.obb_main_file_sha256),
            obb_patch: obb(self.obb_patch_file, self.obb_patch_file_sha256),
            permissions,
            features: self.features,
            platforms: self.nativecode,
            incompatibilities: Vec::new(),
        }
    }
}
