//! ehi-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) and `EHI_*`
//! environment variables, opens the SQLite store, seeds the site registry,
//! starts the automatic triggers and serves the JSON API over HTTP.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use ehi_core::scoring::Weights;
use ehi_pipeline::Pipeline;
use ehi_server::{
  ServerConfig,
  connect::{self, RetryPolicy},
  scheduler, seed,
};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Ecosystem health index pipeline server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Serve the API without the startup and daily runs.
  #[arg(long)]
  no_scheduler: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("EHI"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store, retrying while it is unavailable.
  let policy = RetryPolicy {
    attempts:   server_cfg.connect_attempts,
    base_delay: Duration::from_millis(server_cfg.connect_retry_delay_ms),
  };
  let store = connect::open_store(&store_path, policy)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  seed::seed_sites(&store, &server_cfg.sites)
    .await
    .context("failed to seed site registry")?;

  let pipeline = Arc::new(
    Pipeline::new(Arc::new(store), Weights::DEFAULT).context("invalid default weights")?,
  );

  // Automatic triggers. The scheduler handle must outlive the server.
  let _daily = if server_cfg.scheduler_enabled && !cli.no_scheduler {
    scheduler::spawn_startup_run(
      pipeline.clone(),
      Duration::from_secs(server_cfg.startup_delay_secs),
    );
    Some(
      scheduler::start_daily(pipeline.clone(), &server_cfg.daily_schedule)
        .await
        .with_context(|| format!("invalid daily schedule {:?}", server_cfg.daily_schedule))?,
    )
  } else {
    tracing::info!("automatic pipeline runs disabled");
    None
  };

  let app = ehi_server::router(pipeline);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
