//! Signing certificate checks for downloaded indexes.

use fdsync_utils::hash::{calculate_fingerprint, fingerprint_hex, normalize_fingerprint};

use crate::{
    error::{Result, UpdateError},
    model::Repository,
};

/// One signer of a jar entry: its certificate path, DER encoded, signer
/// first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSigner {
    pub certificates: Vec<Vec<u8>>,
}

/// Fingerprint of the single certificate that signed the index entry.
pub fn verify(signers: &[CodeSigner]) -> Result<String> {
    let [signer] = signers else {
        return Err(UpdateError::Validation(
            "index.jar must be signed by a single code signer".into(),
        ));
    };
    let [certificate] = signer.certificates.as_slice() else {
        return Err(UpdateError::Validation(
            "index.jar code signer should have only one certificate".into(),
        ));
    };
    Ok(calculate_fingerprint(certificate))
}

/// Checks the hex certificate a legacy index declares against the jar
/// signer and returns the declared fingerprint.
pub fn verify_declared(jar_fingerprint: &str, declared: Option<&str>) -> Result<String> {
    let invalid = || UpdateError::Validation("index.xml contains invalid public key".into());
    let declared = declared.ok_or_else(invalid)?;
    let fingerprint = fingerprint_hex(declared).map_err(|_| invalid())?;
    if fingerprint.is_empty() || fingerprint != jar_fingerprint {
        return Err(invalid());
    }
    Ok(fingerprint)
}

/// Trust on first use: a repository without a fingerprint adopts the one
/// the index was signed with; otherwise both must agree. An empty signer
/// fingerprint (short key) never matches.
pub fn trust(repository: &Repository, fingerprint: &str) -> Result<Repository> {
    if fingerprint.is_empty() {
        Err(mismatch())
    } else if normalize_fingerprint(&repository.fingerprint) == fingerprint {
        Ok(repository.clone())
    } else if repository.fingerprint.is_empty() {
        Ok(Repository {
            fingerprint: fingerprint.to_string(),
            ..repository.clone()
        })
    } else {
        Err(mismatch())
    }
}

fn mismatch() -> UpdateError {
    UpdateError::Validation("Certificate fingerprints do not match".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn der(len: usize, fill: u8) -> Vec<u8> {
        vec![fill; len]
    }

    fn signer(certificates: Vec<Vec<u8>>) -> CodeSigner {
        CodeSigner { certificates }
    }

    #[test]
    fn test_verify_requires_single_signer() {
        let err = verify(&[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "index.jar must be signed by a single code signer"
        );

        let two = [signer(vec![der(300, 1)]), signer(vec![der(300, 2)])];
        assert!(verify(&two).is_err());
    }

    #[test]
    fn test_verify_requires_single_certificate() {
        let err = verify(&[signer(vec![der(300, 1), der(300, 2)])]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "index.jar code signer should have only one certificate"
        );
    }

    #[test]
    fn test_verify_fingerprint() {
        let fingerprint = verify(&[signer(vec![der(256, 0)])]).unwrap();
        assert_eq!(
            fingerprint,
            "5341E6B2646979A70E57653007A1F310169421EC9BDD9F1A5648F75ADE005AF1"
        );
        assert_eq!(verify(&[signer(vec![der(255, 0)])]).unwrap(), "");
    }

    #[test]
    fn test_verify_declared() {
        let jar = calculate_fingerprint(&der(256, 0));
        let declared = "00".repeat(256);
        assert_eq!(verify_declared(&jar, Some(&declared)).unwrap(), jar);

        for bad in [None, Some("zz"), Some("0102")] {
            let err = verify_declared(&jar, bad).unwrap_err();
            assert_eq!(err.to_string(), "index.xml contains invalid public key");
        }
    }

    #[test]
    fn test_trust_on_first_use() {
        let repo = Repository::new("https://example.org/repo", "", "");
        let adopted = trust(&repo, "AB12").unwrap();
        assert_eq!(adopted.fingerprint, "AB12");

        let same = trust(&adopted, "AB12").unwrap();
        assert_eq!(same, adopted);

        let lowercase = Repository::new("https://example.org/repo", "ab:12", "");
        assert!(trust(&lowercase, "AB12").is_ok());

        let err = trust(&adopted, "CD34").unwrap_err();
        assert_eq!(err.to_string(), "Certificate fingerprints do not match");
    }

    #[test]
    fn test_short_key_never_matches() {
        let short = verify(&[signer(vec![der(100, 7)])]).unwrap();
        assert_eq!(short, "");

        let err = verify_declared(&short, Some(&"07".repeat(100))).unwrap_err();
        assert_eq!(err.to_string(), "index.xml contains invalid public key");

        let fresh = Repository::new("https://example.org/repo", "", "");
        let err = trust(&fresh, &short).unwrap_err();
        assert_eq!(err.to_string(), "Certificate fingerprints do not match");

        let pinned = Repository::new("https://example.org/repo", "AB12", "");
        assert!(trust(&pinned, &short).is_err());
    }
}
