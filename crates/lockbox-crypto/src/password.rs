//! Password hashing for account verification
//!
//! Same PBKDF2 parameters as file keys, in a separate derivation call. The
//! salt is opaque text and its UTF-8 bytes are the PBKDF2 salt, so hashes
//! stored by the mobile client verify unchanged. Fresh salts are 16 random
//! bytes as lowercase hex.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::encoding::{decode_hex_array, encode_hex};
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::pbkdf2_sha256;
use crate::keys::Salt;
use crate::KEY_SIZE;

/// Stored form of a hashed password: `hash` is lowercase hex, `salt` is the
/// salt text exactly as it was fed to PBKDF2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHash {
    pub hash: String,
    pub salt: String,
}

/// Hash `password` with the given salt text or a fresh random one.
pub fn hash_password(password: &SecretString, salt: Option<&str>) -> CryptoResult<PasswordHash> {
    let password = password.expose_secret();
    if password.is_empty() {
        return Err(CryptoError::EmptyPassword);
    }

    let salt = match salt {
        Some(text) => checked_salt(text)?.to_string(),
        None => Salt::random()?.to_string(),
    };
    let derived = pbkdf2_sha256(password.as_bytes(), salt.as_bytes());

    Ok(PasswordHash {
        hash: encode_hex(&*derived),
        salt,
    })
}

/// Recompute the hash for `password` and compare it with `hash` in constant
/// time. Malformed `hash` or an empty `salt` is an input error, not a
/// mismatch.
pub fn verify_password(password: &SecretString, hash: &str, salt: &str) -> CryptoResult<bool> {
    let mut expected =
        decode_hex_array::<KEY_SIZE>(hash).map_err(|e| CryptoError::invalid("hash", e))?;
    let salt = checked_salt(salt)?;

    let password = password.expose_secret();
    if password.is_empty() {
        expected.zeroize();
        return Ok(false);
    }

    let derived = pbkdf2_sha256(password.as_bytes(), salt.as_bytes());
    let matches: bool = derived[..].ct_eq(&expected[..]).into();
    expected.zeroize();
    Ok(matches)
}

fn checked_salt(salt: &str) -> CryptoResult<&str> {
    if salt.is_empty() {
        return Err(CryptoError::invalid("salt", "must not be empty"));
    }
    Ok(salt)
}
