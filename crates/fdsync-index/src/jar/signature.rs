//! PKCS#7 signature blocks (`META-INF/*.RSA`).

use cms::{
    cert::CertificateChoices,
    content_info::ContentInfo,
    signed_data::{SignedData, SignerIdentifier, SignerInfo},
};
use rsa::{pkcs8::DecodePublicKey, Pkcs1v15Sign, RsaPublicKey};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use x509_cert::{
    der::{oid::ObjectIdentifier, Decode, Encode},
    Certificate,
};

use super::manifest::DigestAlgorithm;
use crate::{certificate::CodeSigner, error::JarError};

const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
const ID_MESSAGE_DIGEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
const ID_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.14.3.2.26");
const ID_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
const ID_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3");

fn digest_algorithm(oid: &ObjectIdentifier) -> Option<DigestAlgorithm> {
    [
        (ID_SHA1, DigestAlgorithm::Sha1),
        (ID_SHA256, DigestAlgorithm::Sha256),
        (ID_SHA512, DigestAlgorithm::Sha512),
    ]
    .into_iter()
    .find_map(|(id, algorithm)| (id == *oid).then_some(algorithm))
}

fn padding(algorithm: DigestAlgorithm) -> Pkcs1v15Sign {
    match algorithm {
        DigestAlgorithm::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
        DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
    }
}

/// Decoded `SignedData` of one signature block.
pub struct SignatureBlock {
    name: String,
    certificates: Vec<Certificate>,
    signer_infos: Vec<SignerInfo>,
}

impl SignatureBlock {
    pub fn parse(name: &str, der: &[u8]) -> Result<Self, JarError> {
        let malformed = |reason: String| {
            JarError::SignatureBlock {
                name: name.to_string(),
                reason,
            }
        };

        let info = ContentInfo::from_der(der).map_err(|e| malformed(e.to_string()))?;
        if info.content_type != ID_SIGNED_DATA {
            return Err(malformed(format!(
                "unexpected content type {}",
                info.content_type
            )));
        }
        let content = info.content.to_der().map_err(|e| malformed(e.to_string()))?;
        let signed_data = SignedData::from_der(&content).map_err(|e| malformed(e.to_string()))?;

        let certificates = signed_data
            .certificates
            .map(|set| {
                set.0
                    .iter()
                    .filter_map(|choice| {
                        match choice {
                            CertificateChoices::Certificate(cert) => Some(cert.clone()),
                            _ => None,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            name: name.to_string(),
            certificates,
            signer_infos: signed_data.signer_infos.0.iter().cloned().collect(),
        })
    }

    /// Verifies every signer info over `signed` (the `.SF` bytes) and
    /// returns one [`CodeSigner`] per signer.
    pub fn verify(&self, signed: &[u8]) -> Result<Vec<CodeSigner>, JarError> {
        self.signer_infos
            .iter()
            .map(|signer| {
                let certificate = self.verify_signer(signer, signed)?;
                self.code_signer(certificate)
            })
            .collect()
    }

    fn malformed(&self, reason: impl Into<String>) -> JarError {
        JarError::SignatureBlock {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn verify_signer(&self, signer: &SignerInfo, signed: &[u8]) -> Result<&Certificate, JarError> {
        let certificate = self
            .signer_certificate(signer)
            .ok_or_else(|| self.malformed("signer certificate not found"))?;
        let algorithm = digest_algorithm(&signer.digest_alg.oid).ok_or_else(|| {
            self.malformed(format!(
                "unsupported digest algorithm {}",
                signer.digest_alg.oid
            ))
        })?;

        let message = match &signer.signed_attrs {
            Some(attributes) => {
                let expected = attributes
                    .iter()
                    .find(|attr| attr.oid == ID_MESSAGE_DIGEST)
                    .and_then(|attr| attr.values.iter().next())
                    .ok_or_else(|| self.malformed("signed attributes lack a message digest"))?;
                if expected.value() != algorithm.digest(signed).as_slice() {
                    return Err(JarError::Tampered(format!(
                        "{} message digest does not match its signature file",
                        self.name
                    )));
                }
                attributes.to_der().map_err(|e| self.malformed(e.to_string()))?
            }
            None => signed.to_vec(),
        };

        let spki = certificate
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| self.malformed(e.to_string()))?;
        let key = RsaPublicKey::from_public_key_der(&spki)
            .map_err(|e| self.malformed(format!("unsupported public key: {e}")))?;

        key.verify(
            padding(algorithm),
            &algorithm.digest(&message),
            signer.signature.as_bytes(),
        )
        .map_err(|_| JarError::Tampered(format!("{} signature is invalid", self.name)))?;

        Ok(certificate)
    }

    fn signer_certificate(&self, signer: &SignerInfo) -> Option<&Certificate> {
        match &signer.sid {
            SignerIdentifier::IssuerAndSerialNumber(id) => {
                self.certificates.iter().find(|cert| {
                    cert.tbs_certificate.issuer == id.issuer
                        && cert.tbs_certificate.serial_number == id.serial_number
                })
            }
            SignerIdentifier::SubjectKeyIdentifier(_) => None,
        }
    }

    /// Signer certificate followed by its issuers found in the block.
    fn code_signer(&self, leaf: &Certificate) -> Result<CodeSigner, JarError> {
        let mut chain = vec![leaf];
        let mut current = leaf;
        while current.tbs_certificate.issuer != current.tbs_certificate.subject {
            let next = self.certificates.iter().find(|cert| {
                cert.tbs_certificate.subject == current.tbs_certificate.issuer
                    && !chain.iter().any(|seen| std::ptr::eq(*seen, *cert))
            });
            match next {
                Some(next) => {
                    chain.push(next);
                    current = next;
                }
                None => break,
            }
        }

        let certificates = chain
            .into_iter()
            .map(|cert| cert.to_der().map_err(|e| self.malformed(e.to_string())))
            .collect::<Result<_, _>>()?;
        Ok(CodeSigner { certificates })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_garbage() {
        let err = SignatureBlock::parse("META-INF/CERT.RSA", b"not der").err().unwrap();
        assert!(matches!(err, JarError::SignatureBlock { ref name, .. } if name == "META-INF/CERT.RSA"));
    }

    #[test]
    fn test_digest_algorithm_oids() {
        assert_eq!(digest_algorithm(&ID_SHA256), Some(DigestAlgorithm::Sha256));
        assert_eq!(digest_algorithm(&ID_SHA1), Some(DigestAlgorithm::Sha1));
        assert_eq!(digest_algorithm(&ID_SIGNED_DATA), None);
    }
}
