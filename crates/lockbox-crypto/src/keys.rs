//! Key material: the derived file key, per-record salt and IV, random keys

use std::fmt;
use std::str::FromStr;

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use crate::encoding::{decode_hex_array, encode_hex};
use crate::error::{CryptoError, CryptoResult};
use crate::{IV_SIZE, KEY_SIZE, SALT_SIZE};

/// A 256-bit file encryption key derived from a password. Zeroized on drop.
#[derive(Clone)]
pub struct FileKey {
    bytes: [u8; KEY_SIZE],
}

impl FileKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for FileKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Fill `buf` from the operating system's secure random source.
pub(crate) fn fill_random(buf: &mut [u8]) -> CryptoResult<()> {
    OsRng.try_fill_bytes(buf).map_err(|e| {
        tracing::debug!(error = %e, "OS random source failed");
        CryptoError::Rng
    })
}

macro_rules! record_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Fresh value from the OS random source.
            pub fn random() -> CryptoResult<Self> {
                let mut bytes = [0u8; $len];
                fill_random(&mut bytes)?;
                Ok(Self(bytes))
            }

            pub fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&encode_hex(&self.0))
            }
        }

        impl FromStr for $name {
            type Err = CryptoError;

            fn from_str(s: &str) -> CryptoResult<Self> {
                decode_hex_array::<{ $len }>(s)
                    .map(Self)
                    .map_err(|e| CryptoError::invalid($field, e))
            }
        }
    };
}

record_bytes!(
    /// Per-record KDF salt (16 bytes, hex in records)
    Salt,
    SALT_SIZE,
    "salt"
);

record_bytes!(
    /// Per-record initialization vector (16 bytes, hex in records), shared by
    /// every chunk of the record
    Iv,
    IV_SIZE,
    "iv"
);

/// Generate 32 random bytes, hex-encoded (64 chars), for callers that need a
/// raw secret outside the password flow.
pub fn generate_key() -> CryptoResult<String> {
    let mut bytes = [0u8; KEY_SIZE];
    fill_random(&mut bytes)?;
    let encoded = encode_hex(&bytes);
    bytes.zeroize();
    Ok(encoded)
}
