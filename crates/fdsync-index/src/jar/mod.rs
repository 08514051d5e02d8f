//! Signed jar reading.
//!
//! An entry counts as signed by a signature block when the block verifies
//! over its `.SF` file, the `.SF` file covers the manifest section of the
//! entry, and the entry bytes match that manifest section.

mod manifest;
mod signature;

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use tracing::{debug, trace};
use zip::ZipArchive;

use manifest::{encoded_digest_matches, DigestAlgorithm, Manifest, Section};
use signature::SignatureBlock;

use crate::{certificate::CodeSigner, error::JarError};

const MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";
const BLOCK_EXTENSIONS: [&str; 3] = ["RSA", "DSA", "EC"];

pub struct JarFile {
    archive: ZipArchive<BufReader<File>>,
}

impl JarFile {
    pub fn open(path: &Path) -> Result<Self, JarError> {
        let file = File::open(path).map_err(|source| {
            JarError::Io {
                action: format!("opening {}", path.display()),
                source,
            }
        })?;
        Ok(Self {
            archive: ZipArchive::new(BufReader::new(file))?,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.archive.index_for_name(name).is_some()
    }

    /// Uncompressed size of `name`.
    pub fn entry_size(&mut self, name: &str) -> Result<u64, JarError> {
        Ok(self.archive.by_name(name)?.size())
    }

    /// Decompressing reader over `name`.
    pub fn entry(&mut self, name: &str) -> Result<impl Read + '_, JarError> {
        Ok(self.archive.by_name(name)?)
    }

    fn read_all(&mut self, name: &str) -> Result<Vec<u8>, JarError> {
        let mut entry = self.archive.by_name(name)?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes).map_err(|source| {
            JarError::Io {
                action: format!("reading {name}"),
                source,
            }
        })?;
        Ok(bytes)
    }

    fn hash_entry(&mut self, name: &str, algorithm: DigestAlgorithm) -> Result<Vec<u8>, JarError> {
        let mut entry = self.archive.by_name(name)?;
        let mut hasher = algorithm.hasher();
        let mut buffer = [0u8; 8192];
        loop {
            let n = entry.read(&mut buffer).map_err(|source| {
                JarError::Io {
                    action: format!("reading {name}"),
                    source,
                }
            })?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        Ok(hasher.finalize())
    }

    fn signature_files(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .archive
            .file_names()
            .filter(|name| {
                name.strip_prefix("META-INF/").is_some_and(|rest| {
                    !rest.contains('/') && rest.to_ascii_uppercase().ends_with(".SF")
                })
            })
            .map(String::from)
            .collect();
        names.sort();
        names
    }

    /// Signers of `name`. An entry the manifest does not list is unsigned
    /// and has none; a digest or signature that does not verify is an error.
    pub fn code_signers(&mut self, name: &str) -> Result<Vec<CodeSigner>, JarError> {
        if !self.contains(MANIFEST_NAME) {
            debug!("{MANIFEST_NAME} is missing, {name} is unsigned");
            return Ok(Vec::new());
        }
        let manifest = Manifest::parse(self.read_all(MANIFEST_NAME)?);
        let Some(section) = manifest.entry(name) else {
            debug!("{name} is not listed in the manifest");
            return Ok(Vec::new());
        };

        let digests: Vec<(DigestAlgorithm, String)> = section
            .digests("-Digest")
            .map(|(algorithm, digest)| (algorithm, digest.to_string()))
            .collect();
        if digests.is_empty() {
            return Ok(Vec::new());
        }
        for (algorithm, expected) in &digests {
            let actual = self.hash_entry(name, *algorithm)?;
            if !encoded_digest_matches(&actual, expected) {
                return Err(JarError::Tampered(format!(
                    "{name} digest does not match the manifest"
                )));
            }
        }

        let mut signers = Vec::new();
        for sf_name in self.signature_files() {
            let base = &sf_name[..sf_name.len() - 3];
            let Some(block_name) = BLOCK_EXTENSIONS
                .iter()
                .map(|ext| format!("{base}.{ext}"))
                .find(|candidate| self.contains(candidate))
            else {
                trace!("{sf_name} has no signature block");
                continue;
            };

            let sf_bytes = self.read_all(&sf_name)?;
            let block = SignatureBlock::parse(&block_name, &self.read_all(&block_name)?)?;
            let verified = block.verify(&sf_bytes)?;

            let signature_file = Manifest::parse(sf_bytes);
            if covers(&signature_file, &manifest, name, section, &sf_name)? {
                trace!("{name} signed by {block_name}");
                signers.extend(verified);
            }
        }

        Ok(signers)
    }
}

/// Whether the signature file vouches for the manifest section of `name`,
/// either through a whole-manifest digest or a per-entry digest.
fn covers(
    signature_file: &Manifest,
    manifest: &Manifest,
    name: &str,
    section: &Section,
    sf_name: &str,
) -> Result<bool, JarError> {
    let mut whole = signature_file
        .main()
        .digests("-Digest-Manifest")
        .peekable();
    if whole.peek().is_some() && whole.all(|(alg, digest)| alg.matches(manifest.raw(), digest)) {
        return Ok(true);
    }

    let Some(entry) = signature_file.entry(name) else {
        return Ok(false);
    };
    let bytes = manifest.section_bytes(section);
    let mut digests = entry.digests("-Digest").peekable();
    if digests.peek().is_none() {
        return Ok(false);
    }
    if digests.all(|(alg, digest)| alg.matches(bytes, digest)) {
        Ok(true)
    } else {
        Err(JarError::Tampered(format!(
            "{sf_name} does not match the manifest section of {name}"
        )))
    }
}
