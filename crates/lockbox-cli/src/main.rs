//! lockbox: encrypt and decrypt vault files from the command line
//!
//! Commands:
//!   encrypt <file>            - seal a file into a JSON record (<file>.lockbox.json)
//!   decrypt <record>          - recover the original bytes from a record
//!   inspect <record>          - show record metadata (no password needed)
//!   upgrade <record>          - rewrite a legacy v1 record as v2
//!   keygen                    - print a random 256-bit key (hex)
//!   hash-password             - hash a password for storage
//!   verify-password           - check a password against a stored hash
//!   config show               - display current configuration

mod password;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use zeroize::Zeroizing;

use lockbox_core::config::LockboxConfig;
use lockbox_core::LockboxResult;
use lockbox_crypto::{
    EncryptOptions, EncryptedRecord, FormatVersion, ProgressFn, CHUNK_SIZE,
};

const RECORD_SUFFIX: &str = ".lockbox.json";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "lockbox",
    version,
    about = "lockbox vault file encryption",
    long_about = "lockbox: password-based encryption of vault files into portable JSON records"
)]
struct Cli {
    /// Path to lockbox.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "LOCKBOX_CONFIG",
        default_value = "~/.config/lockbox/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "LOCKBOX_LOG")]
    log: Option<String>,

    /// Log format (json, text); overrides the config file
    #[arg(long, env = "LOCKBOX_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Read the password from this file instead of the env var or prompt
    #[arg(long, global = true, env = "LOCKBOX_PASSWORD_FILE")]
    password_file: Option<PathBuf>,

    /// Overwrite an existing output file
    #[arg(long, short = 'f', global = true)]
    force: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a file into a JSON record
    Encrypt {
        /// File to encrypt
        input: PathBuf,
        /// Output record path (default: <input>.lockbox.json)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Write a legacy v1 record (AES-CBC, readable by older clients)
        #[arg(long)]
        legacy: bool,
        /// Use this KDF salt (32 hex chars) instead of a random one
        #[arg(long)]
        salt: Option<String>,
    },

    /// Decrypt a JSON record back to the original file
    Decrypt {
        /// Record to decrypt
        record: PathBuf,
        /// Output path (default: record path without .lockbox.json)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Show record metadata without decrypting
    Inspect {
        /// Record to inspect
        record: PathBuf,
    },

    /// Rewrite a legacy v1 record as an authenticated v2 record
    Upgrade {
        /// Record to upgrade
        record: PathBuf,
        /// Output path (default: overwrite the record in place)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Print a random 256-bit key as hex
    Keygen,

    /// Hash a password for storage (prints JSON {hash, salt})
    #[command(name = "hash-password")]
    HashPassword {
        /// Use this salt text instead of a random one
        #[arg(long)]
        salt: Option<String>,
    },

    /// Check a password against a stored hash
    #[command(name = "verify-password")]
    VerifyPassword {
        /// Stored hash (64 hex chars)
        #[arg(long)]
        hash: String,
        /// Stored salt text
        #[arg(long)]
        salt: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = load_config(&config_path).await?;

    // flag/env > config file > default
    let level = cli.log.as_deref().unwrap_or(&config.logging.level);
    let format = match &cli.log_format {
        Some(format) => format.clone(),
        None => LogFormat::from_str(&config.logging.format, true)
            .map_err(|e| anyhow::anyhow!("logging.format: {e}"))?,
    };
    init_logging(level, &format);

    debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "lockbox starting"
    );

    let password_file = cli.password_file.as_deref();
    let force = cli.force;

    match cli.command {
        Commands::Encrypt {
            input,
            output,
            legacy,
            salt,
        } => {
            let out = output.unwrap_or_else(|| default_record_path(&input));
            cmd_encrypt(&config, &input, &out, legacy, salt, password_file, force).await
        }
        Commands::Decrypt { record, output } => {
            cmd_decrypt(&config, &record, output.as_deref(), password_file, force).await
        }
        Commands::Inspect { record } => cmd_inspect(&record).await,
        Commands::Upgrade { record, output } => {
            cmd_upgrade(&config, &record, output.as_deref(), password_file, force).await
        }
        Commands::Keygen => cmd_keygen(),
        Commands::HashPassword { salt } => cmd_hash_password(&config, salt.as_deref(), password_file),
        Commands::VerifyPassword { hash, salt } => {
            cmd_verify_password(&config, &hash, &salt, password_file)
        }
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

async fn load_config(path: &Path) -> Result<LockboxConfig> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        LockboxConfig::from_toml_str(&content)
            .with_context(|| format!("parsing config: {}", path.display()))
    } else {
        Ok(LockboxConfig::default())
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output; logs go to stderr
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(format!("{home}/{rest}"))
    } else {
        path.to_path_buf()
    }
}

fn obtain_password(
    config: &LockboxConfig,
    file_override: Option<&Path>,
    confirm: bool,
) -> LockboxResult<SecretString> {
    let chain = password::sources(&config.password, file_override, "Password: ", confirm);
    password::resolve(&chain)
}

// ── File helpers ──────────────────────────────────────────────────────────────

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// `report.pdf` → `report.pdf.lockbox.json`
fn default_record_path(input: &Path) -> PathBuf {
    with_suffix(input, RECORD_SUFFIX)
}

/// `report.pdf.lockbox.json` → `report.pdf`; anything else gets `.decrypted`
fn default_plain_path(record: &Path) -> PathBuf {
    match record.to_str().and_then(|s| s.strip_suffix(RECORD_SUFFIX)) {
        Some(stem) if !stem.is_empty() => PathBuf::from(stem),
        _ => with_suffix(record, ".decrypted"),
    }
}

/// Refuse to replace an existing file unless `--force` was given.
async fn check_output(path: &Path, force: bool) -> Result<()> {
    if !force && tokio::fs::try_exists(path).await.unwrap_or(false) {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    Ok(())
}

/// Write via a sibling temp file and rename, so a failed write never leaves a
/// truncated record or plaintext behind. The file is owner-only on unix.
async fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = with_suffix(path, ".tmp");
    let _ = tokio::fs::remove_file(&tmp).await;
    if let Err(e) = write_private(&tmp, contents).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e).with_context(|| format!("writing {}", tmp.display()));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e).with_context(|| format!("renaming into {}", path.display()));
    }
    Ok(())
}

async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}

async fn read_record(path: &Path) -> Result<EncryptedRecord> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading record: {}", path.display()))?;
    parse_record(&json).with_context(|| format!("parsing record: {}", path.display()))
}

fn parse_record(json: &str) -> LockboxResult<EncryptedRecord> {
    Ok(EncryptedRecord::from_json(json)?)
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn make_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} chunks")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// A progress bar plus the engine callback that drives it, for payloads large
/// enough to be chunked.
fn chunk_progress(chunks: u64, prefix: &str) -> (Option<ProgressBar>, Option<ProgressFn>) {
    if chunks <= 1 {
        return (None, None);
    }
    let pb = make_progress_bar(chunks, prefix);
    let handle = pb.clone();
    let cb: ProgressFn = Box::new(move |done, _total| handle.set_position(done));
    (Some(pb), Some(cb))
}

// ── `lockbox encrypt` ─────────────────────────────────────────────────────────

async fn cmd_encrypt(
    config: &LockboxConfig,
    input: &Path,
    out: &Path,
    legacy: bool,
    salt: Option<String>,
    password_file: Option<&Path>,
    force: bool,
) -> Result<()> {
    check_output(out, force).await?;
    let version = if legacy {
        FormatVersion::Legacy
    } else {
        config.format_version()?
    };
    let mut options = EncryptOptions::default().with_version(version);
    if let Some(salt) = salt {
        options = options.with_salt(salt);
    }

    let data = Zeroizing::new(
        tokio::fs::read(input)
            .await
            .with_context(|| format!("reading {}", input.display()))?,
    );
    let size = data.len() as u64;
    let password = obtain_password(config, password_file, true)?;

    let chunks = data.len().div_ceil(CHUNK_SIZE).max(1) as u64;
    let (pb, progress) = chunk_progress(chunks, "encrypt");

    let record = tokio::task::spawn_blocking(move || {
        lockbox_crypto::encrypt_with_progress(
            data.as_slice(),
            &password,
            &options,
            progress.as_ref(),
        )
    })
    .await
    .context("encryption task failed")?
    .context("file was not saved")?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let json = record.to_json_pretty()?;
    atomic_write(out, json.as_bytes()).await?;

    info!(
        input = %input.display(),
        output = %out.display(),
        bytes = size,
        segments = record.segment_count(),
        version = record.version,
        "file encrypted"
    );
    println!("Encrypted: {} → {}", input.display(), out.display());
    println!("  size:     {}", fmt_bytes(size));
    println!("  format:   v{} ({} segment(s))", record.version, record.segment_count());

    Ok(())
}

// ── `lockbox decrypt` ─────────────────────────────────────────────────────────

async fn cmd_decrypt(
    config: &LockboxConfig,
    record_path: &Path,
    output: Option<&Path>,
    password_file: Option<&Path>,
    force: bool,
) -> Result<()> {
    let out = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_plain_path(record_path));
    check_output(&out, force).await?;

    let record = read_record(record_path).await?;
    let password = obtain_password(config, password_file, false)?;

    let (pb, progress) = chunk_progress(record.segment_count() as u64, "decrypt");

    let legacy = record.is_legacy();
    let (plaintext, password) = tokio::task::spawn_blocking(move || {
        let result = lockbox_crypto::decrypt_with_progress(&record, &password, progress.as_ref())
            .map(Zeroizing::new);
        (result, password)
    })
    .await
    .context("decryption task failed")?;
    let plaintext = plaintext.context("file cannot be opened")?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    atomic_write(&out, &plaintext).await?;

    info!(
        record = %record_path.display(),
        output = %out.display(),
        bytes = plaintext.len(),
        "file decrypted"
    );
    println!("Decrypted: {} → {}", record_path.display(), out.display());
    println!("  size: {}", fmt_bytes(plaintext.len() as u64));

    if config.crypto.upgrade_legacy && legacy {
        let upgraded = tokio::task::spawn_blocking(move || {
            lockbox_crypto::encrypt_with(plaintext.as_slice(), &password, &EncryptOptions::default())
        })
        .await
        .context("upgrade task failed")?
        .context("legacy record was not upgraded")?;

        atomic_write(record_path, upgraded.to_json_pretty()?.as_bytes()).await?;
        info!(record = %record_path.display(), "legacy record upgraded to v2");
        println!("  upgraded: {} is now v2", record_path.display());
    }

    Ok(())
}

// ── `lockbox inspect` ─────────────────────────────────────────────────────────

async fn cmd_inspect(record_path: &Path) -> Result<()> {
    let record = read_record(record_path).await?;

    let version = match record.format_version() {
        Ok(v) => v.to_string(),
        Err(_) => format!("v{} (unsupported)", record.version),
    };
    let mode = match (record.mode, record.mode()) {
        (Some(tag), _) => tag.to_string(),
        (None, Some(sniffed)) => format!("{sniffed} (inferred)"),
        (None, None) => "missing".to_string(),
    };

    println!("Record:     {}", record_path.display());
    println!("  version:  {version}");
    println!("  mode:     {mode}");
    println!("  segments: {}", record.segment_count());
    println!("  iv:       {}", record.iv);
    println!("  salt:     {}", record.salt);
    println!("  ciphertext: {}", fmt_bytes(record.ciphertext.len() as u64));
    if record.is_legacy() {
        println!("  note: legacy record, not authenticated (run `lockbox upgrade`)");
    }
    Ok(())
}

// ── `lockbox upgrade` ─────────────────────────────────────────────────────────

async fn cmd_upgrade(
    config: &LockboxConfig,
    record_path: &Path,
    output: Option<&Path>,
    password_file: Option<&Path>,
    force: bool,
) -> Result<()> {
    let record = read_record(record_path).await?;
    let out = output.unwrap_or(record_path);
    if out != record_path {
        check_output(out, force).await?;
    }

    if !record.is_legacy() {
        println!("{} is already v{}", record_path.display(), record.version);
        return Ok(());
    }

    let password = obtain_password(config, password_file, false)?;
    let upgraded = tokio::task::spawn_blocking(move || lockbox_crypto::upgrade(&record, &password))
        .await
        .context("upgrade task failed")?
        .context("file cannot be opened")?;

    atomic_write(out, upgraded.to_json_pretty()?.as_bytes()).await?;
    info!(record = %record_path.display(), output = %out.display(), "record upgraded");
    println!("Upgraded: {} → {} (v2)", record_path.display(), out.display());
    Ok(())
}

// ── `lockbox keygen` / passwords ──────────────────────────────────────────────

fn cmd_keygen() -> Result<()> {
    println!("{}", lockbox_crypto::generate_key()?);
    Ok(())
}

fn cmd_hash_password(
    config: &LockboxConfig,
    salt: Option<&str>,
    password_file: Option<&Path>,
) -> Result<()> {
    let password = obtain_password(config, password_file, true)?;
    let stored = lockbox_crypto::hash_password(&password, salt)?;
    println!("{}", serde_json::to_string_pretty(&stored)?);
    Ok(())
}

fn cmd_verify_password(
    config: &LockboxConfig,
    hash: &str,
    salt: &str,
    password_file: Option<&Path>,
) -> Result<()> {
    let password = obtain_password(config, password_file, false)?;
    if lockbox_crypto::verify_password(&password, hash, salt)? {
        println!("password matches");
        Ok(())
    } else {
        anyhow::bail!("password does not match")
    }
}

// ── `lockbox config show` ─────────────────────────────────────────────────────

fn cmd_config_show(config: &LockboxConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = config.to_toml_string().context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
