use lockbox_crypto::FormatVersion;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{LockboxError, LockboxResult};

/// Top-level configuration (loaded from lockbox.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LockboxConfig {
    pub crypto: CryptoConfig,
    pub password: PasswordConfig,
    pub logging: LoggingConfig,
}

/// Record format settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Record version written by `encrypt`: 1 (legacy) or 2 (default)
    pub format_version: u32,
    /// Rewrite v1 records as v2 after a successful decrypt
    pub upgrade_legacy: bool,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            format_version: FormatVersion::CURRENT.as_u32(),
            upgrade_legacy: false,
        }
    }
}

/// Where passwords come from when not typed at the prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Environment variable consulted before prompting ("" disables)
    pub env: String,
    /// Password file; the first line is the password
    pub file: Option<PathBuf>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            env: "LOCKBOX_PASSWORD".into(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl LockboxConfig {
    /// Parse and validate a lockbox.toml document.
    pub fn from_toml_str(content: &str) -> LockboxResult<Self> {
        let config: LockboxConfig =
            toml::from_str(content).map_err(|e| LockboxError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LockboxResult<()> {
        self.format_version()?;
        match self.logging.format.as_str() {
            "json" | "text" => Ok(()),
            other => Err(LockboxError::Config(format!(
                "logging.format must be \"json\" or \"text\", got {other:?}"
            ))),
        }
    }

    /// The record version `encrypt` should write.
    pub fn format_version(&self) -> LockboxResult<FormatVersion> {
        FormatVersion::try_from(self.crypto.format_version).map_err(|_| {
            LockboxError::Config(format!(
                "crypto.format_version must be 1 or 2, got {}",
                self.crypto.format_version
            ))
        })
    }

    pub fn to_toml_string(&self) -> LockboxResult<String> {
        toml::to_string_pretty(self).map_err(|e| LockboxError::Config(e.to_string()))
    }
}
