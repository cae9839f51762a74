use thiserror::Error;

pub type LockboxResult<T> = Result<T, LockboxError>;

#[derive(Debug, Error)]
pub enum LockboxError {
    #[error("crypto error: {0}")]
    Crypto(#[from] lockbox_crypto::CryptoError),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
