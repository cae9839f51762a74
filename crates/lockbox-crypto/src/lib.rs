//! lockbox-crypto: client-side file encryption for the lockbox vault
//!
//! Architecture: password → PBKDF2 file key → single-pass or chunked cipher → JSON record
//!
//! ```text
//! password + salt (16 bytes)
//!   └── PBKDF2-HMAC-SHA256, 1000 iterations → 256-bit file key
//!         ├── v2 (default): AES-256-GCM per chunk
//!         │     nonce = iv[..12] ^ chunk_index, AAD = version||mode||chunk_index||final
//!         └── v1 (legacy):  AES-256-CBC + PKCS#7, same iv for every chunk
//! ```
//!
//! Payloads up to [`CHUNK_SIZE`] are sealed in one cipher operation. Larger
//! payloads are split into [`CHUNK_SIZE`] slices, each sealed independently
//! and joined with [`CHUNK_DELIMITER`] inside the record's `ciphertext`.
//!
//! Every operation is a free function over its arguments; nothing is cached
//! between calls.

pub mod cbc;
pub mod chunk;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod migrate;
pub mod password;
pub mod record;

pub use engine::{
    decrypt, decrypt_with_progress, encrypt, encrypt_with, encrypt_with_progress, EncryptOptions,
    ProgressFn,
};
pub use error::{CryptoError, CryptoResult};
pub use kdf::derive_file_key;
pub use keys::{generate_key, FileKey, Iv, Salt};
pub use migrate::{reencrypt, upgrade};
pub use password::{hash_password, verify_password, PasswordHash};
pub use record::{EncryptedRecord, FormatVersion, Mode};

/// Size of a derived file key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// PBKDF2 iteration count for file keys and password hashes
pub const KDF_ITERATIONS: u32 = 1000;

/// Size of a record salt in bytes
pub const SALT_SIZE: usize = 16;

/// Size of a record IV in bytes
pub const IV_SIZE: usize = 16;

/// Chunk threshold and chunk size (1 MiB). Payloads at or below this size
/// are sealed in a single pass.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Separator between base64 segments of a chunked ciphertext. `|` is outside
/// the base64 alphabet, so it never appears inside a segment.
pub const CHUNK_DELIMITER: &str = "|CHUNK|";

/// Size of an AES-GCM authentication tag
pub const TAG_SIZE: usize = 16;
