//! Streaming decoder for the XML `index.xml` format.

use std::io::{BufReader, Read};

use fdsync_utils::time::parse_date_millis;
use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};

use super::{de::split_list, IndexCallback, IndexParser, RepositoryMeta};
use crate::{
    error::{ParseError, Result},
    model::{Donate, ObbFile, Product, Release},
};

const PERMISSION_PREFIX: &str = "android.permission.";

/// Decodes `index.xml`. Releases arrive inline with their product, so
/// [`IndexCallback::on_releases`] is never called.
#[derive(Debug, Clone, Copy)]
pub struct LegacyParser {
    repository_id: i64,
}

impl LegacyParser {
    pub fn new(repository_id: i64) -> Self {
        Self { repository_id }
    }
}

impl IndexParser for LegacyParser {
    fn parse(&self, reader: &mut dyn Read, callback: &mut dyn IndexCallback) -> Result<()> {
        let mut xml = Reader::from_reader(BufReader::new(reader));
        xml.trim_text(true);

        let mut state = State::new(self.repository_id);
        let mut buf = Vec::new();
        let mut depth = 0usize;
        loop {
            match xml.read_event_into(&mut buf).map_err(ParseError::from)? {
                Event::Start(e) => {
                    depth += 1;
                    state.start(&e)?;
                }
                Event::Empty(e) => {
                    state.start(&e)?;
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    state.end(&name, callback)?;
                }
                Event::End(e) => {
                    depth = depth.saturating_sub(1);
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    state.end(&name, callback)?;
                }
                Event::Text(e) => state.text.push_str(&e.unescape().map_err(ParseError::from)?),
                Event::CData(e) => state.text.push_str(&String::from_utf8_lossy(&e)),
                Event::Eof if depth > 0 => {
                    return Err(ParseError::Malformed(format!(
                        "index.xml ended with {depth} unclosed element(s)"
                    ))
                    .into());
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(())
    }
}

struct State {
    repository_id: i64,
    text: String,
    repo: Option<RepositoryMeta>,
    product: Option<Product>,
    release: Option<Release>,
}

impl State {
    fn new(repository_id: i64) -> Self {
        Self {
            repository_id,
            text: String::new(),
            repo: None,
            product: None,
            release: None,
        }
    }

    fn start(&mut self, e: &BytesStart) -> std::result::Result<(), ParseError> {
        match e.local_name().as_ref() {
            b"repo" => {
                let mut meta = RepositoryMeta::default();
                for attr in e.attributes() {
                    let attr = attr?;
                    let value = attr.unescape_value()?;
                    match attr.key.local_name().as_ref() {
                        b"name" => meta.name = value.into_owned(),
                        b"pubkey" => meta.certificate = Some(value.to_lowercase()),
                        b"timestamp" => meta.timestamp = number(&value).saturating_mul(1000),
                        b"version" => meta.version = small_number(&value),
                        _ => {}
                    }
                }
                self.repo = Some(meta);
            }
            b"application" if self.repo.is_none() => {
                let id = attribute(e, b"id")?.unwrap_or_default();
                self.product = Some(Product::new(self.repository_id, id));
            }
            b"package" if self.product.is_some() => self.release = Some(Release::default()),
            b"hash" => {
                if let Some(release) = self.release.as_mut() {
                    release.hash_type = attribute(e, b"type")?.unwrap_or_default();
                }
            }
            _ => {}
        }
        self.text.clear();
        Ok(())
    }

    fn end(&mut self, name: &str, callback: &mut dyn IndexCallback) -> Result<()> {
        let text = std::mem::take(&mut self.text);

        if name == "package" {
            if let Some(release) = self.release.take() {
                if let Some(product) = self.product.as_mut() {
                    product.releases.push(release);
                }
                return Ok(());
            }
        }
        if let Some(release) = self.release.as_mut() {
            release_field(release, name, text);
            return Ok(());
        }

        if name == "application" {
            if let Some(product) = self.product.take() {
                return callback.on_product(product);
            }
        }
        if let Some(product) = self.product.as_mut() {
            product_field(product, name, text);
            return Ok(());
        }

        if name == "repo" {
            if let Some(meta) = self.repo.take() {
                return callback.on_repository(meta);
            }
        }
        if let Some(meta) = self.repo.as_mut() {
            match name {
                "description" => meta.description = text,
                "mirror" if !text.is_empty() => meta.mirrors.push(text),
                _ => {}
            }
        }
        Ok(())
    }
}

fn attribute(e: &BytesStart, key: &[u8]) -> std::result::Result<Option<String>, ParseError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn number(text: &str) -> i64 {
    text.trim().parse().unwrap_or(0)
}

/// SDK levels and protocol versions; anything outside `i32` reads as zero.
fn small_number(text: &str) -> i32 {
    i32::try_from(number(text)).unwrap_or(0)
}

fn product_field(product: &mut Product, name: &str, text: String) {
    match name {
        "id" if product.package_name.is_empty() => product.package_name = text,
        "name" => product.name = text,
        "summary" => product.summary = text,
        "desc" => product.description = text,
        "icon" => product.icon = text,
        "license" => product.licenses = split_list(&text),
        "categories" => {
            for category in split_list(&text) {
                if !product.categories.contains(&category) {
                    product.categories.push(category);
                }
            }
        }
        "category" => {
            if !text.is_empty() && !product.categories.contains(&text) {
                product.categories.push(text);
            }
        }
        "antifeatures" => product.anti_features = split_list(&text),
        "web" => product.web = text,
        "source" => product.source = text,
        "tracker" => product.tracker = text,
        "changelog" => product.changelog = text,
        "author" => product.author.name = text,
        "email" => product.author.email = text,
        "donate" if !text.is_empty() => product.donates.push(Donate::Regular(text)),
        "bitcoin" if !text.is_empty() => product.donates.push(Donate::Bitcoin(text)),
        "litecoin" if !text.is_empty() => product.donates.push(Donate::Litecoin(text)),
        "flattr" if !text.is_empty() => product.donates.push(Donate::Flattr(text)),
        "liberapay" if !text.is_empty() => product.donates.push(Donate::Liberapay(text)),
        "openCollective" if !text.is_empty() => {
            product.donates.push(Donate::OpenCollective(text))
        }
        "added" => product.added = parse_date_millis(&text).unwrap_or(0),
        "lastupdated" => product.updated = parse_date_millis(&text).unwrap_or(0),
        "marketvercode" => product.suggested_version_code = number(&text),
        _ => {}
    }
}

fn release_field(release: &mut Release, name: &str, text: String) {
    match name {
        "version" => release.version = text,
        "versioncode" => release.version_code = number(&text),
        "added" => release.added = parse_date_millis(&text).unwrap_or(0),
        "size" => release.size = number(&text),
        "sdkver" => release.min_sdk_version = small_number(&text),
        "targetSdkVersion" => release.target_sdk_version = small_number(&text),
        "maxsdkver" => release.max_sdk_version = small_number(&text),
        "srcname" => release.source = text,
        "apkname" => release.release = text,
        "hash" => release.hash = text,
        "sig" => release.signature = text,
        "obbMainFile" => release.obb_main.get_or_insert_with(ObbFile::default).file = text,
        "obbMainFileSha256" => {
            release.obb_main.get_or_insert_with(ObbFile::default).sha256 = text
        }
        "obbPatchFile" => release.obb_patch.get_or_insert_with(ObbFile::default).file = text,
        "obbPatchFileSha256" => {
            release.obb_patch.get_or_insert_with(ObbFile::default).sha256 = text
        }
        "permissions" => {
            release.permissions = split_list(&text)
                .into_iter()
                .map(|permission| {
                    if permission.contains('.') {
                        permission
                    } else {
                        format!("{PERMISSION_PREFIX}{permission}")
                    }
                })
                .collect()
        }
        "features" => release.features = split_list(&text),
        "nativecode" => release.platforms = split_list(&text),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::{
        error::UpdateError,
        parser::test_support::Collected,
    };

    const INDEX: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<fdroid>
  <repo icon="fdroid-icon.png" name="Example Repo" pubkey="3082ABCD" timestamp="1700000000" url="https://example.org/repo" version="21">
    <description>An example &amp; test repository.</description>
    <mirror>https://mirror.example.org/repo</mirror>
  </repo>
  <application id="org.example.app">
    <id>org.example.app</id>
    <added>2020-01-02</added>
    <lastupdated>2023-06-01</lastupdated>
    <name>Example</name>
    <summary>Does things</summary>
    <desc><![CDATA[<p>Long <b>description</b></p>]]></desc>
    <license>GPL-3.0-only,MIT</license>
    <categories>Development,System</categories>
    <category>Development</category>
    <antifeatures>Ads</antifeatures>
    <author>Jane Dev</author>
    <email>jane@example.org</email>
    <donate>https://example.org/donate</donate>
    <liberapay>example</liberapay>
    <marketvercode>3</marketvercode>
    <package>
      <version>1.1</version>
      <versioncode>3</versioncode>
      <apkname>org.example.app_3.apk</apkname>
      <hash type="sha256">aaaa</hash>
      <size>1024</size>
      <sdkver>21</sdkver>
      <targetSdkVersion>30</targetSdkVersion>
      <added>2023-06-01</added>
      <permissions>INTERNET,com.example.permission.CUSTOM</permissions>
      <nativecode>arm64-v8a,x86_64</nativecode>
      <features>android.hardware.camera</features>
      <obbMainFile>main.3.org.example.app.obb</obbMainFile>
      <obbMainFileSha256>bbbb</obbMainFileSha256>
    </package>
    <package>
      <version>1.0</version>
      <versioncode>2</versioncode>
      <hash type="sha256">cccc</hash>
      <maxsdkver>28</maxsdkver>
    </package>
  </application>
  <application id="org.example.other">
    <name>Other</name>
  </application>
</fdroid>"#;

    fn parse(xml: &str, collected: &mut Collected) -> Result<()> {
        LegacyParser::new(7).parse(&mut Cursor::new(xml.as_bytes().to_vec()), collected)
    }

    #[test]
    fn test_parse_repository() {
        let mut collected = Collected::default();
        parse(INDEX, &mut collected).unwrap();

        let meta = collected.repository.unwrap();
        assert_eq!(meta.name, "Example Repo");
        assert_eq!(meta.description, "An example & test repository.");
        assert_eq!(meta.mirrors, vec!["https://mirror.example.org/repo"]);
        assert_eq!(meta.version, 21);
        assert_eq!(meta.timestamp, 1_700_000_000_000);
        assert_eq!(meta.certificate.as_deref(), Some("3082abcd"));
    }

    #[test]
    fn test_parse_products() {
        let mut collected = Collected::default();
        parse(INDEX, &mut collected).unwrap();

        assert_eq!(collected.products.len(), 2);
        assert!(collected.releases.is_empty());

        let product = &collected.products[0];
        assert_eq!(product.repository_id, 7);
        assert_eq!(product.package_name, "org.example.app");
        assert_eq!(product.name, "Example");
        assert_eq!(product.description, "<p>Long <b>description</b></p>");
        assert_eq!(product.licenses, vec!["GPL-3.0-only", "MIT"]);
        assert_eq!(product.categories, vec!["Development", "System"]);
        assert_eq!(product.anti_features, vec!["Ads"]);
        assert_eq!(product.author.name, "Jane Dev");
        assert_eq!(product.author.email, "jane@example.org");
        assert_eq!(
            product.donates,
            vec![
                Donate::Regular("https://example.org/donate".into()),
                Donate::Liberapay("example".into()),
            ]
        );
        assert_eq!(product.suggested_version_code, 3);
        assert_eq!(product.added, 1_577_923_200_000);
        assert!(product.updated > product.added);

        assert_eq!(product.releases.len(), 2);
        let release = &product.releases[0];
        assert_eq!(release.version, "1.1");
        assert_eq!(release.version_code, 3);
        assert_eq!(release.release, "org.example.app_3.apk");
        assert_eq!(release.hash, "aaaa");
        assert_eq!(release.hash_type, "sha256");
        assert_eq!(release.size, 1024);
        assert_eq!(release.min_sdk_version, 21);
        assert_eq!(release.target_sdk_version, 30);
        assert_eq!(
            release.permissions,
            vec!["android.permission.INTERNET", "com.example.permission.CUSTOM"]
        );
        assert_eq!(release.platforms, vec!["arm64-v8a", "x86_64"]);
        assert_eq!(release.features, vec!["android.hardware.camera"]);
        assert_eq!(
            release.obb_main,
            Some(ObbFile {
                file: "main.3.org.example.app.obb".into(),
                sha256: "bbbb".into(),
            })
        );
        assert_eq!(product.releases[1].max_sdk_version, 28);

        assert_eq!(collected.products[1].package_name, "org.example.other");
        assert!(collected.products[1].releases.is_empty());
    }

    #[test]
    fn test_callback_error_stops_parsing() {
        let mut collected = Collected {
            fail_on_product: Some(1),
            ..Default::default()
        };
        let err = parse(INDEX, &mut collected).unwrap_err();
        assert!(matches!(err, UpdateError::Cancelled));
        assert_eq!(collected.products.len(), 1);
    }

    #[test]
    fn test_malformed_xml() {
        let mut collected = Collected::default();
        let err = parse("<fdroid><repo name=\"x\"></fdroid>", &mut collected).unwrap_err();
        assert!(matches!(err, UpdateError::Parsing(ParseError::Xml(_))));
    }

    #[test]
    fn test_truncated_at_element_boundary() {
        let truncated = r#"<fdroid><repo name="x"></repo><application id="a"><name>A</name></application><application id="b"><name>B</name>"#;
        let mut collected = Collected::default();
        let err = parse(truncated, &mut collected).unwrap_err();
        assert!(matches!(err, UpdateError::Parsing(ParseError::Malformed(_))));
        assert_eq!(collected.products.len(), 1);
    }

    #[test]
    fn test_out_of_range_numbers() {
        assert_eq!(small_number("21"), 21);
        assert_eq!(small_number("4294967296"), 0);
        assert_eq!(small_number("junk"), 0);

        let xml = r#"<fdroid><repo name="x" version="99999999999"></repo><application id="a"><package><versioncode>5</versioncode><sdkver>3000000000</sdkver></package></application></fdroid>"#;
        let mut collected = Collected::default();
        parse(xml, &mut collected).unwrap();
        assert_eq!(collected.repository.unwrap().version, 0);
        let release = &collected.products[0].releases[0];
        assert_eq!(release.version_code, 5);
        assert_eq!(release.min_sdk_version, 0);
    }
}
