//! Legacy (v1) AES-256-CBC with PKCS#7 padding
//!
//! Records written by the mobile client seal every chunk with the
//! same key and the same record IV. There is no authentication tag: a wrong
//! password is normally caught by the padding check, but some corruptions
//! decrypt to wrong bytes without an error. New records use [`crate::chunk`].

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, InnerIvInit, KeyInit};

use crate::chunk::SegmentCipher;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{FileKey, Iv};

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

type CbcEnc = cbc::Encryptor<Aes256>;
type CbcDec = cbc::Decryptor<Aes256>;

/// CBC segment cipher for v1 records. The chunk index is not mixed into
/// anything: every segment restarts the chain from the record IV.
pub struct LegacyCbc {
    cipher: Aes256,
    iv: [u8; BLOCK_SIZE],
}

impl LegacyCbc {
    pub fn new(key: &FileKey, iv: &Iv) -> Self {
        Self {
            cipher: Aes256::new(key.as_bytes().into()),
            iv: *iv.as_bytes(),
        }
    }
}

impl SegmentCipher for LegacyCbc {
    fn seal(&self, _index: u64, _is_final: bool, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(encrypt_cbc(&self.cipher, &self.iv, plaintext))
    }

    fn open(&self, _index: u64, _is_final: bool, sealed: &[u8]) -> CryptoResult<Vec<u8>> {
        decrypt_cbc(&self.cipher, &self.iv, sealed)
    }

    fn overhead(&self, plaintext_len: usize) -> usize {
        BLOCK_SIZE - plaintext_len % BLOCK_SIZE
    }
}

/// CBC-encrypt `plaintext` with PKCS#7 padding. Output is always a non-empty
/// multiple of the block size (an empty input yields one full padding block).
pub fn encrypt_cbc(cipher: &Aes256, iv: &[u8; BLOCK_SIZE], plaintext: &[u8]) -> Vec<u8> {
    CbcEnc::inner_iv_init(cipher.clone(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// CBC-decrypt and strip PKCS#7 padding.
pub fn decrypt_cbc(
    cipher: &Aes256,
    iv: &[u8; BLOCK_SIZE],
    ciphertext: &[u8],
) -> CryptoResult<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        tracing::debug!(len = ciphertext.len(), "CBC ciphertext is not whole blocks");
        return Err(CryptoError::DecryptionFailed);
    }

    CbcDec::inner_iv_init(cipher.clone(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| {
            tracing::debug!("invalid PKCS#7 padding");
            CryptoError::DecryptionFailed
        })
}
