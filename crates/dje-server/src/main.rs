//! `dje-server`: serves the publication tracker API over HTTP.
//!
//! ```text
//! dje-server --config /etc/dje/config.toml
//! dje-server --hash-password 's3cret'      # print a PHC string and exit
//! echo 's3cret' | dje-server --hash-password
//! ```

use std::{io::BufRead as _, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use dje_api::ApiState;
use dje_core::clock::SystemClock;
use dje_server::{AppState, ServerConfig, auth};
use dje_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "DJE publication tracker server")]
struct Cli {
  /// TOML configuration file; `DJE_*` environment variables override it.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash of PASSWORD (or of the first stdin line) and exit.
  #[arg(long, value_name = "PASSWORD", num_args = 0..=1)]
  hash_password: Option<Option<String>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();

  if let Some(password) = cli.hash_password {
    let password = match password {
      Some(password) => password,
      None => std::io::stdin()
        .lock()
        .lines()
        .next()
        .transpose()?
        .context("expected a password on stdin")?,
    };
    let hash = auth::hash_password(&password).map_err(|e| anyhow::anyhow!("argon2: {e}"))?;
    println!("{hash}");
    return Ok(());
  }

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("invalid configuration ({})", cli.config.display()))?;
  let store_path = cfg.resolve_store_path().context("cannot prepare store directory")?;
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("cannot open store {}", store_path.display()))?;

  let app = dje_server::router(AppState {
    api:  Arc::new(ApiState::new(
      Arc::new(store),
      Arc::new(SystemClock),
      cfg.execution_policy(),
      cfg.kanban_page_size,
    )),
    auth: Arc::new(cfg.auth()),
  });

  let address = cfg.address();
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("cannot bind {address}"))?;
  tracing::info!(
    %address,
    store = %store_path.display(),
    retention_days = cfg.retention_days,
    "serving"
  );

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;
  tracing::info!("shut down");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "cannot listen for ctrl-c");
    std::future::pending::<()>().await;
  }
}
