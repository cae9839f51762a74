//! EncryptedRecord: the JSON value produced by one encryption call
//!
//! ```json
//! {
//!   "version": 2,
//!   "mode": "chunked",
//!   "ciphertext": "<base64>|CHUNK|<base64>|CHUNK|<base64>",
//!   "iv": "<32 hex chars>",
//!   "salt": "<32 hex chars>"
//! }
//! ```
//!
//! Records written by the mobile client carry neither `version` nor `mode`,
//! and name the ciphertext field `encryptedData`. Both shapes parse.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};
use crate::CHUNK_DELIMITER;

/// Record format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FormatVersion {
    /// v1: AES-256-CBC, KDF over the salt's hex text, no authentication
    Legacy,
    /// v2: AES-256-GCM per chunk with position-binding associated data
    #[default]
    Authenticated,
}

impl FormatVersion {
    /// Version written by default.
    pub const CURRENT: FormatVersion = FormatVersion::Authenticated;

    pub fn as_u32(self) -> u32 {
        match self {
            FormatVersion::Legacy => 1,
            FormatVersion::Authenticated => 2,
        }
    }
}

impl TryFrom<u32> for FormatVersion {
    type Error = CryptoError;

    fn try_from(value: u32) -> CryptoResult<Self> {
        match value {
            1 => Ok(FormatVersion::Legacy),
            2 => Ok(FormatVersion::Authenticated),
            other => Err(CryptoError::UnsupportedVersion(other)),
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_u32())
    }
}

/// How the payload was split before encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One cipher operation over the whole payload
    Single,
    /// One cipher operation per `CHUNK_SIZE` slice
    Chunked,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Single => "single",
            Mode::Chunked => "chunked",
        })
    }
}

fn legacy_version() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedRecord {
    /// Format version; absent in mobile-client records, meaning v1
    #[serde(default = "legacy_version")]
    pub version: u32,

    /// Explicit strategy tag; always present on v2 records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,

    /// Base64 segments joined by [`CHUNK_DELIMITER`]
    #[serde(alias = "encryptedData")]
    pub ciphertext: String,

    /// 16-byte IV, lowercase hex
    pub iv: String,

    /// 16-byte KDF salt, hex
    pub salt: String,
}

impl EncryptedRecord {
    /// Parsed format version, or `UnsupportedVersion` for anything unknown.
    pub fn format_version(&self) -> CryptoResult<FormatVersion> {
        FormatVersion::try_from(self.version)
    }

    pub fn is_legacy(&self) -> bool {
        self.version == FormatVersion::Legacy.as_u32()
    }

    /// Split strategy: the explicit tag when present, otherwise inferred from
    /// the delimiter for legacy records. `None` for an untagged non-legacy
    /// record.
    pub fn mode(&self) -> Option<Mode> {
        match self.mode {
            Some(mode) => Some(mode),
            None if self.is_legacy() => Some(if self.ciphertext.contains(CHUNK_DELIMITER) {
                Mode::Chunked
            } else {
                Mode::Single
            }),
            None => None,
        }
    }

    /// Base64 segments in chunk order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.ciphertext.split(CHUNK_DELIMITER)
    }

    pub fn segment_count(&self) -> usize {
        self.ciphertext.matches(CHUNK_DELIMITER).count() + 1
    }

    pub fn to_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> CryptoResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
