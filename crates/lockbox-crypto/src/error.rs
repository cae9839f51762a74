use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Failures surfaced by the encryption engine.
///
/// Cipher-level detail is never carried in the error itself; it is emitted at
/// `debug` level through `tracing` before the generic variant is returned.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("password must not be empty")]
    EmptyPassword,

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed: wrong password or corrupted record")]
    DecryptionFailed,

    #[error("unsupported record version: {0}")]
    UnsupportedVersion(u32),

    #[error("secure random source unavailable")]
    Rng,

    #[error("record serialization: {0}")]
    Json(#[from] serde_json::Error),
}

impl CryptoError {
    pub(crate) fn invalid(field: &'static str, reason: impl ToString) -> Self {
        CryptoError::InvalidInput {
            field,
            reason: reason.to_string(),
        }
    }
}
