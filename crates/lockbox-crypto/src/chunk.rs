//! Per-chunk AES-256-GCM encryption/decryption (record format v2)
//!
//! Sealed chunk format (binary, base64'd into the record):
//! ```text
//! [N bytes: ciphertext][16 bytes: GCM tag]
//! nonce = iv[0..12] with iv[8..12] ^= chunk_index (u32, big-endian)
//! AAD   = version (1) || mode (1) || chunk_index (8, BE) || is_final (1)
//! ```
//!
//! The AAD binds each chunk to its position, to the record's mode, and marks
//! the last chunk, so reordered, dropped, duplicated, or truncated chunks fail
//! authentication instead of decrypting to shuffled plaintext.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::error::{CryptoError, CryptoResult};
use crate::keys::{FileKey, Iv};
use crate::record::{FormatVersion, Mode};
use crate::TAG_SIZE;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

const AAD_SIZE: usize = 1 + 1 + 8 + 1;

/// One cipher output per chunk. Implemented by the v2 GCM codec and the
/// legacy CBC codec; the engine drives either through this trait.
pub trait SegmentCipher {
    /// Seal chunk `index` of a record. `is_final` is set on the last chunk
    /// (and on the only chunk of a single-pass record).
    fn seal(&self, index: u64, is_final: bool, plaintext: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Reverse of [`SegmentCipher::seal`] with the same position arguments.
    fn open(&self, index: u64, is_final: bool, sealed: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Bytes added to a plaintext of `plaintext_len` bytes by `seal`.
    fn overhead(&self, plaintext_len: usize) -> usize;
}

/// AES-256-GCM segment cipher for v2 records.
pub struct GcmChunks {
    cipher: Aes256Gcm,
    iv: Iv,
    mode: Mode,
}

impl GcmChunks {
    pub fn new(key: &FileKey, iv: &Iv, mode: Mode) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.as_bytes().into()),
            iv: *iv,
            mode,
        }
    }

    fn nonce(&self, index: u64) -> Option<[u8; NONCE_SIZE]> {
        let index = u32::try_from(index).ok()?;
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&self.iv.as_bytes()[..NONCE_SIZE]);
        for (byte, mask) in nonce[8..].iter_mut().zip(index.to_be_bytes()) {
            *byte ^= mask;
        }
        Some(nonce)
    }

    fn aad(&self, index: u64, is_final: bool) -> [u8; AAD_SIZE] {
        let mut aad = [0u8; AAD_SIZE];
        aad[0] = FormatVersion::Authenticated.as_u32() as u8;
        aad[1] = match self.mode {
            Mode::Single => 0,
            Mode::Chunked => 1,
        };
        aad[2..10].copy_from_slice(&index.to_be_bytes());
        aad[10] = u8::from(is_final);
        aad
    }
}

impl SegmentCipher for GcmChunks {
    fn seal(&self, index: u64, is_final: bool, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let nonce = self.nonce(index).ok_or_else(|| {
            tracing::debug!(index, "chunk index exceeds nonce space");
            CryptoError::EncryptionFailed
        })?;
        let aad = self.aad(index, is_final);

        self.cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: &aad,
                },
            )
            .map_err(|e| {
                tracing::debug!(index, error = %e, "chunk encryption failed");
                CryptoError::EncryptionFailed
            })
    }

    fn open(&self, index: u64, is_final: bool, sealed: &[u8]) -> CryptoResult<Vec<u8>> {
        if sealed.len() < TAG_SIZE {
            tracing::debug!(index, len = sealed.len(), "sealed chunk shorter than tag");
            return Err(CryptoError::DecryptionFailed);
        }
        let nonce = self.nonce(index).ok_or(CryptoError::DecryptionFailed)?;
        let aad = self.aad(index, is_final);

        self.cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: sealed,
                    aad: &aad,
                },
            )
            .map_err(|_| {
                tracing::debug!(index, "chunk authentication failed");
                CryptoError::DecryptionFailed
            })
    }

    fn overhead(&self, _plaintext_len: usize) -> usize {
        TAG_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KEY_SIZE;

    fn codec(mode: Mode) -> GcmChunks {
        GcmChunks::new(
            &FileKey::from_bytes([42u8; KEY_SIZE]),
            &Iv::from_bytes([0x5a; 16]),
            mode,
        )
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let gcm = codec(Mode::Chunked);
        let plaintext = b"hello, encrypted world!";

        let sealed = gcm.seal(3, false, plaintext).unwrap();
        let opened = gcm.open(3, false, &sealed).unwrap();

        assert_eq!(&opened, plaintext);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let gcm = codec(Mode::Single);

        let sealed = gcm.seal(0, true, b"").unwrap();
        assert_eq!(sealed.len(), TAG_SIZE);
        assert_eq!(gcm.open(0, true, &sealed).unwrap(), b"");
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let gcm = codec(Mode::Single);
        let other = GcmChunks::new(
            &FileKey::from_bytes([43u8; KEY_SIZE]),
            &Iv::from_bytes([0x5a; 16]),
            Mode::Single,
        );

        let sealed = gcm.seal(0, true, b"secret data").unwrap();
        assert!(matches!(
            other.open(0, true, &sealed),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_decrypt_wrong_chunk_index() {
        let gcm = codec(Mode::Chunked);

        let sealed = gcm.seal(0, false, b"secret data").unwrap();
        assert!(
            gcm.open(1, false, &sealed).is_err(),
            "wrong chunk_index must fail (nonce and AAD mismatch)"
        );
    }

    #[test]
    fn test_decrypt_final_flag_mismatch() {
        let gcm = codec(Mode::Chunked);

        let sealed = gcm.seal(2, false, b"middle chunk").unwrap();
        assert!(
            gcm.open(2, true, &sealed).is_err(),
            "a middle chunk must not verify as the last one"
        );
    }

    #[test]
    fn test_decrypt_mode_mismatch() {
        let sealed = codec(Mode::Single).seal(0, true, b"data").unwrap();
        assert!(codec(Mode::Chunked).open(0, true, &sealed).is_err());
    }

    #[test]
    fn test_tampered_ciphertext() {
        let gcm = codec(Mode::Single);

        let mut sealed = gcm.seal(0, true, b"secret data").unwrap();
        sealed[1] ^= 0xFF;

        assert!(gcm.open(0, true, &sealed).is_err(), "tampered ciphertext must fail");
    }

    #[test]
    fn test_truncated_below_tag() {
        let gcm = codec(Mode::Single);
        assert!(gcm.open(0, true, &[0u8; TAG_SIZE - 1]).is_err());
    }

    #[test]
    fn test_sealed_size() {
        let gcm = codec(Mode::Chunked);
        let sealed = gcm.seal(0, false, &[0u8; 1000]).unwrap();

        // plaintext (1000) + tag (16)
        assert_eq!(sealed.len(), 1000 + TAG_SIZE);
        assert_eq!(gcm.overhead(1000), TAG_SIZE);
    }

    #[test]
    fn test_nonce_distinct_per_chunk() {
        let gcm = codec(Mode::Chunked);
        let n0 = gcm.nonce(0).unwrap();
        let n1 = gcm.nonce(1).unwrap();

        assert_eq!(n0, [0x5a; NONCE_SIZE]);
        assert_ne!(n0, n1);
        assert_eq!(n0[..8], n1[..8]);
        assert!(gcm.nonce(u64::from(u32::MAX) + 1).is_none());
    }
}
