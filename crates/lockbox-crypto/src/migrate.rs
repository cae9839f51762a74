//! Record migration: change password and/or format version

use secrecy::SecretString;
use zeroize::Zeroizing;

use crate::engine::{decrypt, encrypt_with, EncryptOptions};
use crate::error::CryptoResult;
use crate::record::{EncryptedRecord, FormatVersion};

/// Decrypt `record` with `old_password` and encrypt the plaintext again with
/// `new_password` into the format `options` asks for. The intermediate
/// plaintext is wiped before returning.
pub fn reencrypt(
    record: &EncryptedRecord,
    old_password: &SecretString,
    new_password: &SecretString,
    options: &EncryptOptions,
) -> CryptoResult<EncryptedRecord> {
    let plaintext = Zeroizing::new(decrypt(record, old_password)?);
    let migrated = encrypt_with(plaintext.as_slice(), new_password, options)?;

    tracing::debug!(
        from = record.version,
        to = migrated.version,
        bytes = plaintext.len(),
        "record re-encrypted"
    );
    Ok(migrated)
}

/// Rewrite a legacy record as v2 under the same password. Records that are
/// already v2 are returned unchanged after checking that they decrypt.
pub fn upgrade(record: &EncryptedRecord, password: &SecretString) -> CryptoResult<EncryptedRecord> {
    if record.format_version()? == FormatVersion::Authenticated {
        drop(Zeroizing::new(decrypt(record, password)?));
        return Ok(record.clone());
    }
    reencrypt(record, password, password, &EncryptOptions::default())
}
