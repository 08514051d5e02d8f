use sha2::{Digest, Sha256};

use crate::error::{HashError, HashResult};

/// Inputs shorter than this produce an empty fingerprint.
pub const MIN_FINGERPRINT_INPUT: usize = 256;

/// Computes the repository fingerprint of an encoded certificate: the
/// uppercase hex SHA-256 of its bytes.
///
/// Returns an empty string for inputs shorter than [`MIN_FINGERPRINT_INPUT`],
/// which never matches a stored fingerprint.
///
/// # Example
///
/// ```
/// use fdsync_utils::hash::calculate_fingerprint;
///
/// assert_eq!(calculate_fingerprint(&[0u8; 16]), "");
/// assert_eq!(calculate_fingerprint(&[0u8; 256]).len(), 64);
/// ```
pub fn calculate_fingerprint(encoded: &[u8]) -> String {
    if encoded.len() < MIN_FINGERPRINT_INPUT {
        return String::new();
    }
    hex::encode_upper(Sha256::digest(encoded))
}

/// Decodes a hex-encoded certificate (either case) and fingerprints it.
pub fn fingerprint_hex(encoded_hex: &str) -> HashResult<String> {
    let bytes = hex::decode(encoded_hex.trim().to_ascii_lowercase()).map_err(|err| {
        HashError::InvalidHex {
            input: encoded_hex.to_string(),
            reason: err.to_string(),
        }
    })?;
    Ok(calculate_fingerprint(&bytes))
}

/// Normalizes a user-supplied fingerprint: separators and whitespace are
/// dropped and letters uppercased, so `ab:cd ef` becomes `ABCDEF`.
pub fn normalize_fingerprint(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
