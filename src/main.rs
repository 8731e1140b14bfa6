mod app;
mod cache;
mod client;
mod config;
mod net;
mod queue;
mod status;
mod store;
mod submission;
mod upload;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use cache::{AssetCache, AssetClient, InstallState, ServeSource, SqliteAssets};
use client::ExamClient;
use submission::RawForm;

#[derive(Parser, Debug)]
#[command(name = "mcqsync")]
#[command(about = "Offline-first submission agent for MCQ exam pages")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/mcqsync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Exam server URL override
  #[arg(short, long)]
  server: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Capture a submission; buffers locally when offline
  Submit {
    /// Selected answer for question 1
    #[arg(long)]
    q1: Option<String>,
    /// Selected answer for question 2
    #[arg(long)]
    q2: Option<String>,
  },
  /// Deliver every buffered submission now
  Sync,
  /// Watch connectivity and sync on each reconnect
  Watch,
  /// Prefetch the asset manifest into the local cache
  Install,
  /// Fetch an asset network-first, falling back to the cache
  Serve { path: String },
  /// Show buffered submissions and asset cache state
  Status,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  // Override server if specified on command line
  let config = if let Some(url) = args.server {
    config::Config {
      server: config::ServerConfig { url },
      ..config
    }
  } else {
    config
  };

  let _guard = init_logging(&config)?;

  match args.command {
    Command::Submit { q1, q2 } => {
      let client = ExamClient::new(&config)?;
      client
        .submit(RawForm {
          question1: q1,
          question2: q2,
        })
        .await?;
    }

    Command::Sync => {
      let client = ExamClient::new(&config)?;
      let report = client.sync_pending().await?;
      println!(
        "Delivered {} of {} buffered submissions ({} retained)",
        report.delivered, report.attempted, report.retained
      );
    }

    Command::Watch => {
      let mut app = app::App::new(&config)?;
      app.run().await?;
    }

    Command::Install => {
      let cache = open_asset_cache(&config)?;
      let fetcher = AssetClient::new(&config.server.url)?;

      let stored = cache
        .install(&config.assets.manifest, |path: String| {
          let fetcher = fetcher.clone();
          async move { fetcher.get(&path).await }
        })
        .await?;

      println!("Cached {stored} assets");
    }

    Command::Serve { path } => {
      let cache = open_asset_cache(&config)?;
      let fetcher = AssetClient::new(&config.server.url)?;

      let served = cache
        .serve(&path, |p: String| {
          let fetcher = fetcher.clone();
          async move { fetcher.get(&p).await }
        })
        .await?;

      if served.source == ServeSource::Cache {
        tracing::info!(path, "network unavailable, served from cache");
      }
      std::io::stdout().write_all(&served.body)?;
    }

    Command::Status => {
      let client = ExamClient::new(&config)?;
      println!("Buffered submissions: {}", client.pending_count()?);

      let cache = open_asset_cache(&config)?;
      match cache.state()? {
        InstallState::Installed => println!(
          "Asset cache '{}': installed ({} assets)",
          config.assets.cache_name,
          cache.cached_paths()?.len()
        ),
        _ => println!("Asset cache '{}': not installed", config.assets.cache_name),
      }
    }
  }

  Ok(())
}

fn open_asset_cache(config: &config::Config) -> Result<AssetCache<SqliteAssets>> {
  let storage = SqliteAssets::open_at(&config.database_path()?)?;
  Ok(AssetCache::new(storage, config.assets.cache_name.clone()))
}

/// Log to a rolling file next to the database, leaving stdout for the
/// status line and command output.
fn init_logging(
  config: &config::Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
  let log_dir = config
    .database_path()?
    .parent()
    .map(|p| p.join("logs"))
    .unwrap_or_else(|| PathBuf::from("logs"));

  let appender = tracing_appender::rolling::daily(log_dir, "mcqsync.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}
