mod cache;
mod commands;
mod config;
mod forms;
mod woo;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cache::{CatalogCache, DirStore};
use crate::forms::FormMetadata;
use crate::woo::client::WooClient;

#[derive(Parser, Debug)]
#[command(name = "stockpile")]
#[command(about = "Offline-first inventory client for WooCommerce stores")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/stockpile/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = init_logging(&config)?;

  let forms = FormMetadata::load(&config.forms)?;
  let client = WooClient::new(&config)?;
  let store = DirStore::new(config.cache_dir()?);
  tracing::debug!(dir = %store.dir().display(), "using product cache");

  let mut catalog = CatalogCache::new(store, client).with_recovery(config.cache.recovery);
  commands::run(args.command, &mut catalog, &forms).await?;

  Ok(())
}

/// Send logs to a daily file so stdout stays reserved for command output.
///
/// The level comes from STOCKPILE_LOG (default: info).
fn init_logging(config: &config::Config) -> Result<WorkerGuard> {
  let log_dir = config.log_dir()?;
  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(&log_dir, "stockpile.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_env("STOCKPILE_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
    .with(
      tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false),
    )
    .init();

  Ok(guard)
}
