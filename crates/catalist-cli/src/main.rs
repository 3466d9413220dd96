//! catalist: passphrase-encrypted shared notes
//!
//! Commands:
//!   config show                  - display effective configuration
//!   encrypt <TEXT>               - print an envelope for TEXT
//!   decrypt <ENVELOPE_JSON>      - print the plaintext of an envelope
//!   canary init | verify         - write or check the passphrase canary
//!   notes list | add | edit | delete
//!   documents decrypt <FILE>     - decrypt an exported document listing
//!
//! The passphrase is read from CATALIST_PASSPHRASE, or prompted for.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;

use catalist_core::config::CatalistConfig;
use catalist_core::documents::{decrypt_documents, parse_export};
use catalist_core::NoteStore;
use catalist_crypto::{Envelope, Session};

const PASSPHRASE_ENV: &str = "CATALIST_PASSPHRASE";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "catalist",
    version,
    about = "Passphrase-encrypted shared notes",
    long_about = "catalist: encrypt, decrypt, and manage notes shared under one workspace passphrase"
)]
struct Cli {
    /// Path to catalist.toml configuration file
    #[arg(long, short = 'c', env = "CATALIST_CONFIG", default_value = "catalist.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "CATALIST_LOG")]
    log: Option<String>,

    /// Log format (json, text); overrides the config file
    #[arg(long, env = "CATALIST_LOG_FORMAT")]
    log_format: Option<LogFormat>,

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
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Encrypt TEXT and print the envelope as JSON
    Encrypt { text: String },

    /// Decrypt an envelope given as JSON
    Decrypt {
        /// e.g. '{"cipher":"...","iv":[...]}'
        envelope: String,
    },

    /// Passphrase canary
    Canary {
        #[command(subcommand)]
        action: CanaryAction,
    },

    /// Notes stored in the local notes file
    Notes {
        #[command(subcommand)]
        action: NotesAction,
    },

    /// Encrypted document exports
    Documents {
        #[command(subcommand)]
        action: DocumentsAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
}

#[derive(Subcommand, Debug)]
enum CanaryAction {
    /// Write a new canary for the current passphrase
    Init {
        /// Overwrite an existing canary
        #[arg(long)]
        force: bool,
    },
    /// Check the passphrase against the canary
    Verify,
}

#[derive(Subcommand, Debug)]
enum NotesAction {
    /// Decrypt and print every readable note
    List,
    /// Encrypt and append a note
    Add { text: String },
    /// Replace the note at INDEX
    Edit { index: usize, text: String },
    /// Delete the note at INDEX
    Delete { index: usize },
}

#[derive(Subcommand, Debug)]
enum DocumentsAction {
    /// Decrypt a JSON array of stored documents and print the plaintext view
    Decrypt { file: PathBuf },
}

// ── Entry point ────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = read_config(&cli.config).await?;
    let found = loaded.is_some();
    let config = loaded.unwrap_or_default();

    let level = cli.log.as_deref().unwrap_or(&config.logging.log_level);
    let format = match &cli.log_format {
        Some(format) => format.clone(),
        None => LogFormat::from_str(&config.logging.log_format, true)
            .map_err(|e| anyhow::anyhow!("logging.log_format: {e}"))?,
    };
    init_logging(level, &format);

    if !found {
        tracing::warn!(
            "config file not found: {}  (using defaults)",
            cli.config.display()
        );
    }
    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "catalist starting"
    );

    let mut out = std::io::stdout();
    match cli.command {
        Commands::Config { action: ConfigAction::Show } => {
            cmd_config_show(&config, &cli.config, &mut out)
        }
        Commands::Encrypt { text } => {
            cmd_encrypt(&config, read_passphrase()?, &text, &mut out).await
        }
        Commands::Decrypt { envelope } => {
            cmd_decrypt(&config, read_passphrase()?, &envelope, &mut out).await
        }
        Commands::Canary { action: CanaryAction::Init { force } } => {
            ensure_canary_writable(&config, force)?;
            cmd_canary_init(&config, read_passphrase()?, force, &mut out).await
        }
        Commands::Canary { action: CanaryAction::Verify } => {
            cmd_canary_verify(&config, read_passphrase()?, &mut out).await
        }
        Commands::Notes { action } => {
            cmd_notes(&config, read_passphrase()?, action, &mut out).await
        }
        Commands::Documents { action: DocumentsAction::Decrypt { file } } => {
            cmd_documents_decrypt(&config, read_passphrase()?, &file, &mut out).await
        }
    }
}

async fn read_config(path: &Path) -> Result<Option<CatalistConfig>> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("parsing config: {}", path.display()))?;
        Ok(Some(config))
    } else {
        Ok(None)
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output; logs go to stderr.
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

// ── Session bootstrap ──────────────────────────────────────────────────────────

fn read_passphrase() -> Result<SecretString> {
    let passphrase = match std::env::var(PASSPHRASE_ENV) {
        Ok(value) => value,
        Err(_) => rpassword::prompt_password("Workspace passphrase: ")
            .context("reading passphrase")?,
    };
    if passphrase.is_empty() {
        anyhow::bail!("passphrase must not be empty");
    }
    Ok(SecretString::from(passphrase))
}

/// Derive the session key and, unless `skip_canary`, check the passphrase
/// against the workspace canary when one exists.
async fn open_session(
    config: &CatalistConfig,
    passphrase: SecretString,
    skip_canary: bool,
) -> Result<Session> {
    let params = config.crypto.kdf_params()?;
    let session = Session::open(passphrase, params)
        .await
        .context("session bootstrap failed")?;

    let canary_path = &config.store.canary_file;
    if !skip_canary && config.crypto.verify_canary && canary_path.exists() {
        let canary = read_canary(canary_path).await?;
        if !session.verify_canary(&canary).await? {
            anyhow::bail!(
                "passphrase does not match this workspace (canary {} did not open)",
                canary_path.display()
            );
        }
        tracing::debug!(canary = %canary_path.display(), "canary verified");
    }

    Ok(session)
}

async fn read_canary(path: &Path) -> Result<Envelope> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading canary: {}", path.display()))?;
    Envelope::from_bytes(&bytes).with_context(|| format!("parsing canary: {}", path.display()))
}

// ── Commands ───────────────────────────────────────────────────────────────────

fn cmd_config_show(config: &CatalistConfig, path: &Path, out: &mut impl Write) -> Result<()> {
    writeln!(out, "# config: {}", path.display())?;
    write!(out, "{}", toml::to_string_pretty(config).context("serializing config")?)?;
    Ok(())
}

async fn cmd_encrypt(
    config: &CatalistConfig,
    passphrase: SecretString,
    text: &str,
    out: &mut impl Write,
) -> Result<()> {
    let session = open_session(config, passphrase, false).await?;
    let envelope = session.encrypt(text).await?;
    writeln!(out, "{}", serde_json::to_string(&envelope)?)?;
    Ok(())
}

async fn cmd_decrypt(
    config: &CatalistConfig,
    passphrase: SecretString,
    envelope: &str,
    out: &mut impl Write,
) -> Result<()> {
    let envelope = Envelope::from_bytes(envelope.as_bytes())?;
    let session = open_session(config, passphrase, false).await?;
    let plaintext = session.decrypt(&envelope).await?;
    writeln!(out, "{plaintext}")?;
    Ok(())
}

/// Refuse to overwrite a canary before asking for a passphrase.
fn ensure_canary_writable(config: &CatalistConfig, force: bool) -> Result<()> {
    let path = &config.store.canary_file;
    if path.exists() && !force {
        anyhow::bail!(
            "canary already exists: {} (use --force to replace it)",
            path.display()
        );
    }
    Ok(())
}

async fn cmd_canary_init(
    config: &CatalistConfig,
    passphrase: SecretString,
    force: bool,
    out: &mut impl Write,
) -> Result<()> {
    ensure_canary_writable(config, force)?;
    let path = &config.store.canary_file;

    let session = open_session(config, passphrase, true).await?;
    let canary = session.create_canary().await?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating canary dir: {}", parent.display()))?;
    }
    tokio::fs::write(path, canary.to_bytes()?)
        .await
        .with_context(|| format!("writing canary: {}", path.display()))?;

    writeln!(out, "canary written: {}", path.display())?;
    Ok(())
}

async fn cmd_canary_verify(
    config: &CatalistConfig,
    passphrase: SecretString,
    out: &mut impl Write,
) -> Result<()> {
    let path = &config.store.canary_file;
    if !path.exists() {
        anyhow::bail!(
            "no canary at {} (run `catalist canary init`)",
            path.display()
        );
    }

    let canary = read_canary(path).await?;
    let session = open_session(config, passphrase, true).await?;
    if session.verify_canary(&canary).await? {
        writeln!(out, "passphrase OK")?;
        Ok(())
    } else {
        anyhow::bail!("passphrase does not match canary {}", path.display())
    }
}

async fn cmd_notes(
    config: &CatalistConfig,
    passphrase: SecretString,
    action: NotesAction,
    out: &mut impl Write,
) -> Result<()> {
    let session = open_session(config, passphrase, false).await?;
    let mut store = NoteStore::open(&config.store.notes_file)?;

    match action {
        NotesAction::List => {
            let items: Vec<(usize, Envelope)> =
                store.list().map(|(i, e)| (i, e.clone())).collect();
            let batch = session.decrypt_batch(items).await?;
            let unreadable = batch.skipped.len() + store.malformed().len();

            for record in &batch.records {
                writeln!(out, "[{}] {}", record.id, record.plaintext)?;
            }
            if store.is_empty() {
                writeln!(out, "no notes in {}", store.path().display())?;
            }
            if unreadable > 0 {
                writeln!(
                    out,
                    "({unreadable} of {} notes could not be decrypted with this passphrase)",
                    store.len()
                )?;
            }
        }
        NotesAction::Add { text } => {
            let envelope = session.encrypt(&text).await?;
            let index = store.add(envelope)?;
            store.flush()?;
            writeln!(out, "added note {index}")?;
        }
        NotesAction::Edit { index, text } => {
            let envelope = session.encrypt(&text).await?;
            store.replace(index, envelope)?;
            store.flush()?;
            writeln!(out, "updated note {index}")?;
        }
        NotesAction::Delete { index } => {
            store.remove(index)?;
            store.flush()?;
            writeln!(out, "deleted note {index}")?;
        }
    }

    Ok(())
}

async fn cmd_documents_decrypt(
    config: &CatalistConfig,
    passphrase: SecretString,
    file: &Path,
    out: &mut impl Write,
) -> Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading export: {}", file.display()))?;
    let export: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("parsing export: {}", file.display()))?;
    let (docs, mut skipped) = parse_export(&export)?;

    let session = open_session(config, passphrase, false).await?;
    let worker = session.clone();
    let listing = tokio::task::spawn_blocking(move || decrypt_documents(worker.cipher(), docs))
        .await
        .context("decrypt worker")??;
    skipped.extend(listing.skipped);

    let plain: Vec<serde_json::Value> = listing.documents.iter().map(|d| d.to_json()).collect();
    writeln!(out, "{}", serde_json::to_string_pretty(&plain)?)?;

    if !skipped.is_empty() {
        eprintln!("{} document(s) skipped:", skipped.len());
        for record in &skipped {
            eprintln!("  {}: {}", record.id, record.reason);
        }
    }
    Ok(())
}
