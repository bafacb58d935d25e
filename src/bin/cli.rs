//! Bulletin Officiel API
//!
//! Serves the HTTP API by default; `refresh`, `status` and `validate` operate
//! on the local cache and configuration without starting the server.

use std::path::PathBuf;

use bulletin::{
    error::Result,
    models::{Config, LoggingConfig},
    pipeline,
    server,
    services::GazetteClient,
    storage::{BulletinStore, LocalStorage},
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Bulletin Officiel API - French and Arabic gazette listings as JSON
#[derive(Parser, Debug)]
#[command(name = "bulletin", version, about)]
struct Cli {
    /// Path to an optional TOML configuration file
    #[arg(short, long, default_value = "bulletin.toml")]
    config: PathBuf,

    /// Override the cache directory
    #[arg(long, env = "BO_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Override the listening port
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,

    /// Re-fetch both locales from upstream and replace the cache
    Refresh,

    /// Show cached record counts and refresh times
    Status,

    /// Validate configuration and run the cache self-check
    Validate,
}

/// Initialize tracing; `log` records from the library are bridged in.
fn init_logging(config: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };

    let mut config = config.apply_env();
    if let Some(dir) = &cli.cache_dir {
        config.cache.dir = dir.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    Ok(config)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config.logging, cli.verbose);

    log::info!("Bulletin Officiel API starting...");
    config.validate()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => server::start_server(&config).await?,
        Command::Refresh => {
            let source = GazetteClient::from_config(&config)?;
            let store = LocalStorage::new(&config.cache.dir);
            let outcome = pipeline::run_refresh(&source, &store).await;

            for (locale, refreshed) in &outcome.refreshed {
                log::info!("{}: {} records cached", locale, refreshed.count);
            }
            if let Some((locale, reason)) = outcome.failed.iter().next() {
                return Err(bulletin::error::AppError::upstream(
                    format!("refresh {locale}"),
                    reason,
                ));
            }
        }
        Command::Status => {
            let store = LocalStorage::new(&config.cache.dir);
            let status = store.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Validate => {
            log::info!("Configuration OK");
            let store = LocalStorage::new(&config.cache.dir);
            let report = store.check().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.ok {
                return Err(bulletin::error::AppError::validation(
                    "cache self-check reported problems",
                ));
            }
        }
    }

    Ok(())
}
