//! Encrypt/decrypt entry points
//!
//!   - `encrypt`: salt → file key → fresh iv → single-pass or chunked seal → record
//!   - `decrypt`: record → file key → open every segment in order → plaintext
//!
//! Both directions process chunks strictly in index order. Each chunk's
//! intermediate buffers are released before the next chunk, so peak memory is
//! the input, the output, and one chunk.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use zeroize::Zeroizing;

use crate::cbc::LegacyCbc;
use crate::chunk::{GcmChunks, SegmentCipher};
use crate::encoding::{base64_len, decode_base64, encode_base64_into};
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::derive_file_key;
use crate::keys::{FileKey, Iv, Salt};
use crate::record::{EncryptedRecord, FormatVersion, Mode};
use crate::{CHUNK_DELIMITER, CHUNK_SIZE};

/// Progress callback type (chunks_done, chunks_total)
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Options for [`encrypt_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptOptions {
    /// Record format to write
    pub version: FormatVersion,
    /// Caller-supplied salt (32 hex chars). A fresh random salt is used when
    /// `None`. The IV is always fresh.
    pub salt: Option<String>,
}

impl EncryptOptions {
    /// Options for writing a v1 record readable by older clients.
    pub fn legacy() -> Self {
        Self {
            version: FormatVersion::Legacy,
            salt: None,
        }
    }

    pub fn with_version(mut self, version: FormatVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }
}

/// Encrypt `data` into a v2 record with a fresh salt.
pub fn encrypt<D: AsRef<[u8]>>(data: D, password: &SecretString) -> CryptoResult<EncryptedRecord> {
    encrypt_with_progress(data, password, &EncryptOptions::default(), None)
}

/// Encrypt `data` with explicit options.
pub fn encrypt_with<D: AsRef<[u8]>>(
    data: D,
    password: &SecretString,
    options: &EncryptOptions,
) -> CryptoResult<EncryptedRecord> {
    encrypt_with_progress(data, password, options, None)
}

/// Encrypt `data`, reporting after each sealed chunk.
///
/// Input errors (`EmptyPassword`, `InvalidInput`) surface as-is. Any cipher or
/// random-source fault surfaces as `EncryptionFailed`; no partial record is
/// ever returned.
pub fn encrypt_with_progress<D: AsRef<[u8]>>(
    data: D,
    password: &SecretString,
    options: &EncryptOptions,
    progress: Option<&ProgressFn>,
) -> CryptoResult<EncryptedRecord> {
    let data = data.as_ref();
    let version = options.version;

    if password.expose_secret().is_empty() {
        return Err(CryptoError::EmptyPassword);
    }

    let salt = match &options.salt {
        // v1 feeds the salt text itself to the KDF, so keep it byte-for-byte.
        Some(text) => {
            let parsed: Salt = text.parse()?;
            match version {
                FormatVersion::Legacy => text.clone(),
                FormatVersion::Authenticated => parsed.to_string(),
            }
        }
        None => Salt::random().map_err(into_encryption_failed)?.to_string(),
    };

    let key = derive_file_key(password, &salt, version)?;
    let iv = Iv::random().map_err(into_encryption_failed)?;

    let mode = if data.len() > CHUNK_SIZE {
        Mode::Chunked
    } else {
        Mode::Single
    };

    debug!(
        bytes = data.len(),
        %version,
        %mode,
        "encrypting payload"
    );

    let cipher = segment_cipher(&key, &iv, version, mode);
    let ciphertext = seal_segments(cipher.as_ref(), data, mode, progress)
        .map_err(into_encryption_failed)?;

    Ok(EncryptedRecord {
        version: version.as_u32(),
        mode: match version {
            FormatVersion::Legacy => None,
            FormatVersion::Authenticated => Some(mode),
        },
        ciphertext,
        iv: iv.to_string(),
        salt,
    })
}

/// Decrypt a record back to the original bytes.
pub fn decrypt(record: &EncryptedRecord, password: &SecretString) -> CryptoResult<Vec<u8>> {
    decrypt_with_progress(record, password, None)
}

/// Decrypt a record, reporting after each opened chunk.
///
/// Wrong password, tampering, and every malformed field (iv, salt, base64,
/// padding, tag, empty segment, missing v2 mode tag) fail with the same
/// `DecryptionFailed`. Partial plaintext is wiped before the error returns.
pub fn decrypt_with_progress(
    record: &EncryptedRecord,
    password: &SecretString,
    progress: Option<&ProgressFn>,
) -> CryptoResult<Vec<u8>> {
    let version = record.format_version()?;

    if password.expose_secret().is_empty() {
        return Err(CryptoError::EmptyPassword);
    }

    let mode = record.mode().ok_or_else(|| {
        debug!(%version, "record carries no mode tag");
        CryptoError::DecryptionFailed
    })?;

    let key = derive_file_key(password, &record.salt, version).map_err(|e| {
        debug!(error = %e, "record salt rejected");
        CryptoError::DecryptionFailed
    })?;
    let iv: Iv = record.iv.parse().map_err(|e: CryptoError| {
        debug!(error = %e, "record iv rejected");
        CryptoError::DecryptionFailed
    })?;

    debug!(
        segments = record.segment_count(),
        %version,
        %mode,
        "decrypting record"
    );

    let cipher = segment_cipher(&key, &iv, version, mode);
    open_segments(cipher.as_ref(), record, mode, progress)
}

fn segment_cipher(
    key: &FileKey,
    iv: &Iv,
    version: FormatVersion,
    mode: Mode,
) -> Box<dyn SegmentCipher + Send + Sync> {
    match version {
        FormatVersion::Legacy => Box::new(LegacyCbc::new(key, iv)),
        FormatVersion::Authenticated => Box::new(GcmChunks::new(key, iv, mode)),
    }
}

fn seal_segments(
    cipher: &dyn SegmentCipher,
    data: &[u8],
    mode: Mode,
    progress: Option<&ProgressFn>,
) -> CryptoResult<String> {
    let chunks: Vec<&[u8]> = match mode {
        Mode::Single => vec![data],
        Mode::Chunked => data.chunks(CHUNK_SIZE).collect(),
    };
    let total = chunks.len();

    let capacity = chunks
        .iter()
        .map(|c| base64_len(c.len() + cipher.overhead(c.len())))
        .sum::<usize>()
        + CHUNK_DELIMITER.len() * (total - 1);
    let mut out = String::with_capacity(capacity);

    for (i, chunk) in chunks.iter().enumerate() {
        let is_final = i + 1 == total;
        let sealed = cipher.seal(i as u64, is_final, chunk)?;

        if i > 0 {
            out.push_str(CHUNK_DELIMITER);
        }
        encode_base64_into(&sealed, &mut out);

        if let Some(cb) = progress {
            cb((i + 1) as u64, total as u64);
        }
    }

    Ok(out)
}

fn open_segments(
    cipher: &dyn SegmentCipher,
    record: &EncryptedRecord,
    mode: Mode,
    progress: Option<&ProgressFn>,
) -> CryptoResult<Vec<u8>> {
    let total = record.segment_count();
    if mode == Mode::Single && total != 1 {
        debug!(segments = total, "single-pass record holds several segments");
        return Err(CryptoError::DecryptionFailed);
    }

    let mut out = Zeroizing::new(Vec::with_capacity(record.ciphertext.len() / 4 * 3));

    for (i, segment) in record.segments().enumerate() {
        if segment.is_empty() {
            debug!(index = i, "empty segment");
            return Err(CryptoError::DecryptionFailed);
        }
        let sealed = decode_base64(segment).map_err(|e| {
            debug!(index = i, error = %e, "segment is not valid base64");
            CryptoError::DecryptionFailed
        })?;

        let is_final = i + 1 == total;
        let opened = Zeroizing::new(cipher.open(i as u64, is_final, &sealed)?);
        out.extend_from_slice(&opened);

        if let Some(cb) = progress {
            cb((i + 1) as u64, total as u64);
        }
    }

    Ok(std::mem::take(&mut *out))
}

fn into_encryption_failed(err: CryptoError) -> CryptoError {
    debug!(error = %err, "encryption aborted");
    CryptoError::EncryptionFailed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn pw(s: &str) -> SecretString {
        SecretString::from(s)
    }

    #[test]
    fn test_small_text_roundtrip() {
        let record = encrypt("abc", &pw("pw")).unwrap();

        assert_eq!(record.version, 2);
        assert_eq!(record.mode, Some(Mode::Single));
        assert_eq!(record.iv.len(), 32);
        assert_eq!(record.salt.len(), 32);
        assert_eq!(decrypt(&record, &pw("pw")).unwrap(), b"abc");
    }

    #[test]
    fn test_empty_payload_single_segment() {
        for options in [EncryptOptions::default(), EncryptOptions::legacy()] {
            let record = encrypt_with(b"", &pw("pw"), &options).unwrap();
            assert_eq!(record.segment_count(), 1);
            assert!(!record.ciphertext.is_empty());
            assert_eq!(decrypt(&record, &pw("pw")).unwrap(), b"");
        }
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(matches!(
            encrypt(b"data", &pw("")),
            Err(CryptoError::EmptyPassword)
        ));

        let record = encrypt(b"data", &pw("pw")).unwrap();
        assert!(matches!(
            decrypt(&record, &pw("")),
            Err(CryptoError::EmptyPassword)
        ));
    }

    #[test]
    fn test_supplied_salt_kept_iv_fresh() {
        let salt = "00112233445566778899aabbccddeeff";
        let options = EncryptOptions::default().with_salt(salt);

        let a = encrypt_with(b"same", &pw("pw"), &options).unwrap();
        let b = encrypt_with(b"same", &pw("pw"), &options).unwrap();

        assert_eq!(a.salt, salt);
        assert_eq!(b.salt, salt);
        assert_ne!(a.iv, b.iv, "iv must be fresh even with a supplied salt");
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_supplied_salt_normalized_for_v2_verbatim_for_v1() {
        let upper = "00112233445566778899AABBCCDDEEFF";

        let v2 = encrypt_with(b"x", &pw("pw"), &EncryptOptions::default().with_salt(upper)).unwrap();
        assert_eq!(v2.salt, upper.to_lowercase());

        let v1 = encrypt_with(b"x", &pw("pw"), &EncryptOptions::legacy().with_salt(upper)).unwrap();
        assert_eq!(v1.salt, upper);
        assert_eq!(decrypt(&v1, &pw("pw")).unwrap(), b"x");
    }

    #[test]
    fn test_malformed_salt_rejected() {
        let err = encrypt_with(b"x", &pw("pw"), &EncryptOptions::default().with_salt("nothex"))
            .unwrap_err();
        assert!(matches!(err, CryptoError::InvalidInput { field: "salt", .. }));
    }

    #[test]
    fn test_legacy_record_shape() {
        let record = encrypt_with(b"legacy", &pw("pw"), &EncryptOptions::legacy()).unwrap();

        assert_eq!(record.version, 1);
        assert_eq!(record.mode, None);
        assert_eq!(record.mode(), Some(Mode::Single));
        assert_eq!(decrypt(&record, &pw("pw")).unwrap(), b"legacy");
    }

    #[test]
    fn test_v2_without_mode_tag_fails() {
        let mut record = encrypt(b"data", &pw("pw")).unwrap();
        record.mode = None;

        assert!(matches!(
            decrypt(&record, &pw("pw")),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_bad_iv_and_salt_are_decryption_failures() {
        let record = encrypt(b"data", &pw("pw")).unwrap();

        let mut bad_iv = record.clone();
        bad_iv.iv = "zz".into();
        assert!(matches!(
            decrypt(&bad_iv, &pw("pw")),
            Err(CryptoError::DecryptionFailed)
        ));

        let mut bad_salt = record;
        bad_salt.salt.truncate(10);
        assert!(matches!(
            decrypt(&bad_salt, &pw("pw")),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_bad_base64_and_empty_segment() {
        let record = encrypt(b"data", &pw("pw")).unwrap();

        let mut garbled = record.clone();
        garbled.ciphertext = "!!!!".into();
        assert!(decrypt(&garbled, &pw("pw")).is_err());

        let mut empty = record;
        empty.ciphertext.clear();
        assert!(matches!(
            decrypt(&empty, &pw("pw")),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_unknown_version() {
        let mut record = encrypt(b"data", &pw("pw")).unwrap();
        record.version = 3;

        assert!(matches!(
            decrypt(&record, &pw("pw")),
            Err(CryptoError::UnsupportedVersion(3))
        ));
    }

    #[test]
    fn test_single_tag_with_several_segments_fails() {
        let mut record = encrypt(b"data", &pw("pw")).unwrap();
        let segment = record.ciphertext.clone();
        record.ciphertext = format!("{segment}{CHUNK_DELIMITER}{segment}");

        assert!(decrypt(&record, &pw("pw")).is_err());
    }

    #[test]
    fn test_progress_reports_every_chunk() {
        let data = vec![1u8; CHUNK_SIZE * 2 + 10];
        let calls = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&calls);
        let cb: ProgressFn = Box::new(move |done, total| {
            assert_eq!(total, 3);
            assert_eq!(done, seen.fetch_add(1, Ordering::SeqCst) + 1);
        });

        let record =
            encrypt_with_progress(&data, &pw("pw"), &EncryptOptions::default(), Some(&cb)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        calls.store(0, Ordering::SeqCst);
        let plain = decrypt_with_progress(&record, &pw("pw"), Some(&cb)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(plain, data);
    }

    #[test]
    fn test_segment_lengths() {
        use crate::TAG_SIZE;

        let record = encrypt(vec![0u8; CHUNK_SIZE + 1], &pw("pw")).unwrap();
        let lens: Vec<usize> = record.segments().map(str::len).collect();
        assert_eq!(
            lens,
            vec![base64_len(CHUNK_SIZE + TAG_SIZE), base64_len(1 + TAG_SIZE)]
        );

        // 17 bytes of CBC plaintext pad out to two blocks
        let legacy = encrypt_with(vec![0u8; 17], &pw("pw"), &EncryptOptions::legacy()).unwrap();
        assert_eq!(legacy.ciphertext.len(), base64_len(32));
    }
}
