//! Password sources for the CLI
//!
//! Lookup order: `--password-file` flag, configured env var, configured
//! password file, interactive prompt. The engine only ever sees the resulting
//! `SecretString`.

use lockbox_core::config::PasswordConfig;
use lockbox_core::{LockboxError, LockboxResult};
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};

/// Something that may be able to produce a password.
pub trait PasswordSource {
    /// Human-readable name for logs (never the password itself).
    fn describe(&self) -> String;

    /// `Ok(None)` when this source has nothing to offer and the next one
    /// should be tried.
    fn fetch(&self) -> LockboxResult<Option<SecretString>>;
}

/// Password from an environment variable.
pub struct EnvSource {
    pub var: String,
}

impl PasswordSource for EnvSource {
    fn describe(&self) -> String {
        format!("env ${}", self.var)
    }

    fn fetch(&self) -> LockboxResult<Option<SecretString>> {
        if self.var.is_empty() {
            return Ok(None);
        }
        match std::env::var(&self.var) {
            Ok(value) if !value.is_empty() => Ok(Some(SecretString::from(value))),
            _ => Ok(None),
        }
    }
}

/// Password from the first line of a file.
pub struct FileSource {
    pub path: PathBuf,
}

impl PasswordSource for FileSource {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn fetch(&self) -> LockboxResult<Option<SecretString>> {
        let content = SecretString::from(std::fs::read_to_string(&self.path)?);
        let line = content
            .expose_secret()
            .lines()
            .next()
            .unwrap_or_default()
            .to_string();
        if line.is_empty() {
            return Err(LockboxError::Config(format!(
                "password file is empty: {}",
                self.path.display()
            )));
        }
        Ok(Some(SecretString::from(line)))
    }
}

/// Interactive prompt on the terminal, optionally asking twice.
pub struct PromptSource {
    pub prompt: String,
    pub confirm: bool,
}

impl PasswordSource for PromptSource {
    fn describe(&self) -> String {
        "interactive prompt".into()
    }

    fn fetch(&self) -> LockboxResult<Option<SecretString>> {
        let first = SecretString::from(rpassword::prompt_password(&self.prompt)?);
        if self.confirm {
            let second = SecretString::from(rpassword::prompt_password("Confirm password: ")?);
            if first.expose_secret() != second.expose_secret() {
                return Err(LockboxError::Config("passwords do not match".into()));
            }
        }
        Ok(Some(first))
    }
}

/// Build the source chain for one command.
pub fn sources(
    config: &PasswordConfig,
    file_override: Option<&Path>,
    prompt: &str,
    confirm: bool,
) -> Vec<Box<dyn PasswordSource>> {
    let mut chain: Vec<Box<dyn PasswordSource>> = Vec::new();
    if let Some(path) = file_override {
        chain.push(Box::new(FileSource {
            path: path.to_path_buf(),
        }));
    }
    chain.push(Box::new(EnvSource {
        var: config.env.clone(),
    }));
    if let Some(path) = &config.file {
        chain.push(Box::new(FileSource {
            path: crate::expand_tilde(path),
        }));
    }
    chain.push(Box::new(PromptSource {
        prompt: prompt.to_string(),
        confirm,
    }));
    chain
}

/// First password any source in `chain` produces.
pub fn resolve(chain: &[Box<dyn PasswordSource>]) -> LockboxResult<SecretString> {
    for source in chain {
        if let Some(password) = source.fetch()? {
            tracing::debug!(source = %source.describe(), "password obtained");
            return Ok(password);
        }
    }
    Err(LockboxError::Config("no password available".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct Fixed(Option<&'static str>);

    impl PasswordSource for Fixed {
        fn describe(&self) -> String {
            "fixed".into()
        }

        fn fetch(&self) -> LockboxResult<Option<SecretString>> {
            Ok(self.0.map(SecretString::from))
        }
    }

    #[test]
    fn test_file_source_reads_first_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "s3cret").unwrap();
        writeln!(file, "ignored").unwrap();

        let source = FileSource {
            path: file.path().to_path_buf(),
        };
        assert_eq!(source.fetch().unwrap().unwrap().expose_secret(), "s3cret");
    }

    #[test]
    fn test_file_source_empty_is_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let source = FileSource {
            path: file.path().to_path_buf(),
        };
        assert!(matches!(source.fetch(), Err(LockboxError::Config(_))));
    }

    #[test]
    fn test_file_source_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource {
            path: dir.path().join("absent"),
        };
        assert!(matches!(source.fetch(), Err(LockboxError::Io(_))));
    }

    #[test]
    fn test_env_source_disabled_and_unset() {
        assert!(EnvSource { var: String::new() }.fetch().unwrap().is_none());
        let unset = EnvSource {
            var: "LOCKBOX_TEST_SURELY_UNSET_VAR".into(),
        };
        assert!(unset.fetch().unwrap().is_none());
    }

    #[test]
    fn test_resolve_skips_empty_sources() {
        let chain: Vec<Box<dyn PasswordSource>> =
            vec![Box::new(Fixed(None)), Box::new(Fixed(Some("second")))];
        assert_eq!(resolve(&chain).unwrap().expose_secret(), "second");
    }

    #[test]
    fn test_resolve_nothing_available() {
        let chain: Vec<Box<dyn PasswordSource>> = vec![Box::new(Fixed(None))];
        assert!(resolve(&chain).is_err());
    }

    #[test]
    fn test_sources_order() {
        let config = PasswordConfig {
            env: "LOCKBOX_PASSWORD".into(),
            file: Some(PathBuf::from("/etc/lockbox/pass")),
        };
        let chain = sources(&config, Some(Path::new("/tmp/flag-pass")), "Password: ", false);
        let names: Vec<String> = chain.iter().map(|s| s.describe()).collect();

        assert_eq!(
            names,
            vec![
                "file /tmp/flag-pass".to_string(),
                "env $LOCKBOX_PASSWORD".to_string(),
                "file /etc/lockbox/pass".to_string(),
                "interactive prompt".to_string(),
            ]
        );
    }
}
