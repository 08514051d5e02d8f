//! `MANIFEST.MF` and `.SF` parsing.
//!
//! Both files share the manifest grammar: `Key: Value` lines, continuation
//! lines starting with a single space, sections separated by blank lines.
//! Each section keeps the byte range it was read from because signature
//! files digest the raw section bytes.

use std::{collections::HashMap, ops::Range};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

#[derive(Debug, Clone, Default)]
pub struct Section {
    attributes: Vec<(String, String)>,
    range: Range<usize>,
}

impl Section {
    /// Attribute lookup; keys compare case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// `(algorithm, base64 digest)` pairs for attributes named
    /// `<ALG><suffix>`, e.g. `SHA-256-Digest`.
    pub fn digests<'a>(
        &'a self,
        suffix: &'a str,
    ) -> impl Iterator<Item = (DigestAlgorithm, &'a str)> + 'a {
        self.attributes.iter().filter_map(move |(key, value)| {
            let upper = key.to_ascii_uppercase();
            let algorithm = upper.strip_suffix(&suffix.to_ascii_uppercase())?;
            DigestAlgorithm::from_name(algorithm).map(|alg| (alg, value.as_str()))
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Manifest {
    raw: Vec<u8>,
    main: Section,
    entries: HashMap<String, Section>,
}

impl Manifest {
    pub fn parse(raw: Vec<u8>) -> Self {
        let mut sections = split_sections(&raw)
            .into_iter()
            .map(|range| {
                Section {
                    attributes: parse_attributes(&raw[range.clone()]),
                    range,
                }
            });

        let main = sections.next().unwrap_or_default();
        let entries = sections
            .filter_map(|section| {
                let name = section.get("Name")?.to_string();
                Some((name, section))
            })
            .collect();

        Self { raw, main, entries }
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn main(&self) -> &Section {
        &self.main
    }

    pub fn entry(&self, name: &str) -> Option<&Section> {
        self.entries.get(name)
    }

    /// Raw bytes of `section`, terminating blank line included.
    pub fn section_bytes(&self, section: &Section) -> &[u8] {
        &self.raw[section.range.clone()]
    }
}

/// Digest algorithms jar signers use in manifests and signature files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "SHA1" | "SHA-1" => Some(DigestAlgorithm::Sha1),
            "SHA-256" | "SHA256" => Some(DigestAlgorithm::Sha256),
            "SHA-512" | "SHA512" => Some(DigestAlgorithm::Sha512),
            _ => None,
        }
    }

    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
            DigestAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            DigestAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    pub fn hasher(self) -> Hasher {
        match self {
            DigestAlgorithm::Sha1 => Hasher::Sha1(Sha1::new()),
            DigestAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            DigestAlgorithm::Sha512 => Hasher::Sha512(Sha512::new()),
        }
    }

    /// Whether `encoded` is the base64 digest of `data`.
    pub fn matches(self, data: &[u8], encoded: &str) -> bool {
        encoded_digest_matches(&self.digest(data), encoded)
    }
}

/// Whether `encoded` is the base64 form of `digest`.
pub fn encoded_digest_matches(digest: &[u8], encoded: &str) -> bool {
    STANDARD
        .decode(encoded.trim())
        .is_ok_and(|expected| expected == digest)
}

/// Incremental form of [`DigestAlgorithm::digest`].
pub enum Hasher {
    Sha1(Sha1),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Hasher {
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha1(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        match self {
            Hasher::Sha1(h) => h.finalize().to_vec(),
            Hasher::Sha256(h) => h.finalize().to_vec(),
            Hasher::Sha512(h) => h.finalize().to_vec(),
        }
    }
}

/// Line ranges of `raw`, each including its terminator.
fn lines(raw: &[u8]) -> Vec<Range<usize>> {
    let mut lines = Vec::new();
    let mut start = 0;
    while start < raw.len() {
        let end = raw[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(raw.len(), |i| start + i + 1);
        lines.push(start..end);
        start = end;
    }
    lines
}

fn content(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Splits `raw` at blank lines. A section spans from its first line through
/// the blank line that ends it.
fn split_sections(raw: &[u8]) -> Vec<Range<usize>> {
    let mut sections = Vec::new();
    let mut current: Option<usize> = None;

    for line in lines(raw) {
        let blank = content(&raw[line.clone()]).is_empty();
        match (current, blank) {
            (None, false) => current = Some(line.start),
            (Some(start), true) => {
                sections.push(start..line.end);
                current = None;
            }
            _ => {}
        }
    }
    if let Some(start) = current {
        sections.push(start..raw.len());
    }
    sections
}

fn parse_attributes(section: &[u8]) -> Vec<(String, String)> {
    let mut attributes: Vec<(String, String)> = Vec::new();
    for line in lines(section) {
        let text = String::from_utf8_lossy(content(&section[line]));
        if text.is_empty() {
            continue;
        }
        if let Some(continued) = text.strip_prefix(' ') {
            if let Some((_, value)) = attributes.last_mut() {
                value.push_str(continued);
            }
        } else if let Some((key, value)) = text.split_once(':') {
            let value = value.strip_prefix(' ').unwrap_or(value);
            attributes.push((key.trim().to_string(), value.to_string()));
        }
    }
    attributes
}
