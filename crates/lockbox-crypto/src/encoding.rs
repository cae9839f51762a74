//! Text encodings used by records: lowercase hex for iv/salt/keys, standard
//! base64 for cipher segments.
//!
//! Fixed-size parsing (`decode_hex_array`) decodes straight into the returned
//! array without a heap buffer.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hex::FromHexError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexError {
    #[error("odd-length hex string ({0} chars)")]
    OddLength(usize),

    #[error("invalid hex digit at offset {0}")]
    InvalidDigit(usize),

    #[error("expected {expected} bytes, got {got}")]
    WrongLength { expected: usize, got: usize },
}

impl HexError {
    fn from_hex(err: FromHexError, digits: usize, expected: usize) -> Self {
        match err {
            FromHexError::InvalidHexCharacter { index, .. } => HexError::InvalidDigit(index),
            FromHexError::OddLength => HexError::OddLength(digits),
            _ => HexError::WrongLength {
                expected,
                got: digits / 2,
            },
        }
    }
}

/// Encode bytes as lowercase hex.
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Append the lowercase hex encoding of `bytes` to `out`.
pub fn encode_hex_into(bytes: &[u8], out: &mut String) {
    out.reserve(bytes.len() * 2);
    out.push_str(&hex::encode(bytes));
}

/// Decode a hex string (either case) into a byte vector.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, HexError> {
    hex::decode(s).map_err(|e| HexError::from_hex(e, s.len(), s.len() / 2))
}

/// Decode a hex string into a fixed-size array; the string must encode
/// exactly `N` bytes.
pub fn decode_hex_array<const N: usize>(s: &str) -> Result<[u8; N], HexError> {
    if s.len() % 2 != 0 {
        return Err(HexError::OddLength(s.len()));
    }
    if s.len() / 2 != N {
        return Err(HexError::WrongLength {
            expected: N,
            got: s.len() / 2,
        });
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(s, &mut out).map_err(|e| HexError::from_hex(e, s.len(), N))?;
    Ok(out)
}

/// Append the standard base64 encoding of one cipher segment to `out`.
pub fn encode_base64_into(bytes: &[u8], out: &mut String) {
    STANDARD.encode_string(bytes, out);
}

/// Decode one standard base64 cipher segment.
pub fn decode_base64(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(segment)
}

/// Length of the padded base64 encoding of `len` bytes.
pub(crate) fn base64_len(len: usize) -> usize {
    len.div_ceil(3) * 4
}
