//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use prospector_shared::{AppConfig, init_config, load_config};
use prospector_storage::{RecordStatus, Store};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Prospector: enrich company records from their web presence.
#[derive(Parser)]
#[command(
    name = "prospector",
    version,
    about = "Manage Prospector configuration and the resumable batch store.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Inspect and maintain the resumable batch store.
    Store {
        /// Store subcommand.
        #[command(subcommand)]
        action: StoreAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

/// Store subcommands.
#[derive(Subcommand)]
pub(crate) enum StoreAction {
    /// List all stored run outcomes.
    List {
        /// Store database path (defaults to the configured store_path).
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Show the stored outcome for one company URL.
    Show {
        /// Company URL the run was keyed by.
        url: String,

        /// Store database path (defaults to the configured store_path).
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Delete the stored outcome for one company URL, forcing a re-run.
    Delete {
        /// Company URL the run was keyed by.
        url: String,

        /// Store database path (defaults to the configured store_path).
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Delete all stored outcomes.
    Clear {
        /// Store database path (defaults to the configured store_path).
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "prospector=info",
        1 => "prospector=debug",
        _ => "prospector=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
        Command::Store { action } => match action {
            StoreAction::List { db } => cmd_store_list(db).await,
            StoreAction::Show { url, db } => cmd_store_show(&url, db).await,
            StoreAction::Delete { url, db } => cmd_store_delete(&url, db).await,
            StoreAction::Clear { db } => cmd_store_clear(db).await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

/// Resolve the store path: explicit flag, else the configured `store_path`
/// with a leading `~/` expanded.
fn resolve_store_path(db: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = db {
        return Ok(path);
    }
    let config = load_config()?;
    let raw = config.defaults.store_path;
    if let Some(rest) = raw.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| eyre!("cannot determine home directory"))?;
        return Ok(home.join(rest));
    }
    Ok(PathBuf::from(raw))
}

async fn open_store(db: Option<PathBuf>) -> Result<Store> {
    let path = resolve_store_path(db)?;
    Ok(Store::open(&path).await?)
}

async fn cmd_store_list(db: Option<PathBuf>) -> Result<()> {
    let store = open_store(db).await?;
    let records = store.list().await?;

    if records.is_empty() {
        println!("Store is empty.");
        return Ok(());
    }

    for record in &records {
        println!(
            "  {:7}  {}  {}",
            record.status.as_str(),
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.url
        );
    }
    println!();
    println!("  {} record(s)", records.len());
    Ok(())
}

async fn cmd_store_show(url: &str, db: Option<PathBuf>) -> Result<()> {
    let store = open_store(db).await?;
    let record = store
        .get(url)
        .await?
        .ok_or_else(|| eyre!("no stored outcome for '{url}'"))?;

    println!("URL:     {}", record.url);
    println!("Status:  {}", record.status.as_str());
    println!("Stored:  {}", record.created_at.to_rfc3339());

    match record.status {
        RecordStatus::Success => {
            if let Some(result) = record.result()? {
                println!();
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
        }
        RecordStatus::Error => {
            println!(
                "Error:   {}",
                record.error_message.as_deref().unwrap_or("(none recorded)")
            );
        }
    }
    Ok(())
}

async fn cmd_store_delete(url: &str, db: Option<PathBuf>) -> Result<()> {
    let store = open_store(db).await?;
    info!(url, "deleting stored outcome");
    if store.delete(url).await? {
        println!("Deleted stored outcome for '{url}'.");
    } else {
        println!("No stored outcome for '{url}'.");
    }
    Ok(())
}

async fn cmd_store_clear(db: Option<PathBuf>) -> Result<()> {
    let store = open_store(db).await?;
    info!("clearing resume store");
    let removed = store.clear().await?;
    println!("Cleared {removed} record(s).");
    Ok(())
}
