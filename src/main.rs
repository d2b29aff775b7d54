mod commands;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing::warn;

use tasksync::config::Config;
use tasksync::{logging, HttpGateway, SyncCache};

#[derive(Parser, Debug)]
#[command(name = "tasksync")]
#[command(about = "Work with a remote task list through a synchronized local cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/tasksync/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// API root URL, overrides the config file and TASKSYNC_API_URL
  #[arg(short, long, global = true)]
  url: Option<String>,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref(), args.url.as_deref())?;
  let _log_guard = logging::init(&config.log)?;

  let gateway = HttpGateway::new(&config.api.url, &config.api.resource)?;
  let cache = SyncCache::connect(gateway);

  let is_write = args.command.is_write();
  commands::run(&cache, args.command).await?;

  // Let the reconciling refresh finish before exiting
  cache.wait_idle().await;
  if is_write {
    if let Some(e) = cache.last_refresh_error() {
      warn!("Local copy may be out of date: {}", e);
    }
  }

  Ok(())
}
