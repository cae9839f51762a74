//! Key derivation: PBKDF2-HMAC-SHA256 password → 256-bit file key

use pbkdf2::pbkdf2_hmac;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::{FileKey, Salt};
use crate::record::FormatVersion;
use crate::{KDF_ITERATIONS, KEY_SIZE};

/// Derive the file key for a record from a password and the record's salt text.
///
/// The salt must be 32 hex chars. Legacy (v1) records feed the salt's hex
/// *text* to PBKDF2, matching records written by the mobile client; v2 records
/// feed the 16 decoded bytes.
pub fn derive_file_key(
    password: &SecretString,
    salt: &str,
    version: FormatVersion,
) -> CryptoResult<FileKey> {
    let password = password.expose_secret();
    if password.is_empty() {
        return Err(CryptoError::EmptyPassword);
    }

    let parsed: Salt = salt.parse()?;
    let salt_input: &[u8] = match version {
        FormatVersion::Legacy => salt.as_bytes(),
        FormatVersion::Authenticated => parsed.as_bytes(),
    };

    let derived = pbkdf2_sha256(password.as_bytes(), salt_input);
    Ok(FileKey::from_bytes(*derived))
}

/// One PBKDF2-HMAC-SHA256 run with the fixed iteration count.
pub(crate) fn pbkdf2_sha256(password: &[u8], salt: &[u8]) -> Zeroizing<[u8; KEY_SIZE]> {
    let mut out = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2_hmac::<Sha256>(password, salt, KDF_ITERATIONS, &mut out[..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALT_A: &str = "000102030405060708090a0b0c0d0e0f";
    const SALT_B: &str = "f0e0d0c0b0a090807060504030201000";

    #[test]
    fn test_kdf_deterministic() {
        let password = SecretString::from("test-passphrase-123");

        let key1 = derive_file_key(&password, SALT_A, FormatVersion::Authenticated).unwrap();
        let key2 = derive_file_key(&password, SALT_A, FormatVersion::Authenticated).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes(), "KDF must be deterministic");
    }

    #[test]
    fn test_kdf_different_salts() {
        let password = SecretString::from("same-passphrase");

        let key1 = derive_file_key(&password, SALT_A, FormatVersion::Authenticated).unwrap();
        let key2 = derive_file_key(&password, SALT_B, FormatVersion::Authenticated).unwrap();

        assert_ne!(
            key1.as_bytes(),
            key2.as_bytes(),
            "different salts must produce different keys"
        );
    }

    #[test]
    fn test_kdf_different_passwords() {
        let key1 =
            derive_file_key(&SecretString::from("a"), SALT_A, FormatVersion::Authenticated).unwrap();
        let key2 =
            derive_file_key(&SecretString::from("b"), SALT_A, FormatVersion::Authenticated).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_legacy_uses_salt_text() {
        let password = SecretString::from("pw");

        let legacy = derive_file_key(&password, SALT_A, FormatVersion::Legacy).unwrap();
        let expected = pbkdf2_sha256(b"pw", SALT_A.as_bytes());
        assert_eq!(legacy.as_bytes(), &*expected);

        let current = derive_file_key(&password, SALT_A, FormatVersion::Authenticated).unwrap();
        assert_ne!(legacy.as_bytes(), current.as_bytes());
    }

    #[test]
    fn test_rfc7914_pbkdf2_vector() {
        // RFC 7914 §11: PBKDF2-HMAC-SHA256("passwd", "salt", c=1, dkLen=64), first 32 bytes.
        let mut out = [0u8; 32];
        pbkdf2_hmac::<Sha256>(b"passwd", b"salt", 1, &mut out);
        assert_eq!(
            crate::encoding::encode_hex(&out),
            "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc"
        );
    }

    #[test]
    fn test_empty_password_rejected() {
        let err =
            derive_file_key(&SecretString::from(""), SALT_A, FormatVersion::Authenticated)
                .unwrap_err();
        assert!(matches!(err, CryptoError::EmptyPassword));
    }

    #[test]
    fn test_malformed_salt_rejected() {
        let err = derive_file_key(&SecretString::from("pw"), "abc", FormatVersion::Legacy)
            .unwrap_err();
        assert!(matches!(err, CryptoError::InvalidInput { field: "salt", .. }));
    }
}
