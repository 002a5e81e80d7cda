//! HTTP server composition for the DJE publication tracker.
//!
//! Mounts the [`dje_api`] router under `/api` behind HTTP Basic auth and
//! exposes an unauthenticated `GET /health`.

pub mod auth;
pub mod error;

pub use error::Error;

use std::{
  io,
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::{Json, Router, middleware, routing::get};
use config::{Config, ConfigBuilder, ConfigError, builder::DefaultState};
use dje_api::ApiState;
use dje_core::{
  engine::{DEFAULT_RETENTION_DAYS, ExecutionPolicy},
  query::DEFAULT_PAGE_LIMIT,
  store::{ExecutionStore, PublicationStore},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use auth::AuthConfig;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration: an optional TOML file overlaid by `DJE_*`
/// environment variables (e.g. `DJE_AUTH_PASSWORD_HASH`).
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  /// SQLite database file; a leading `~/` is the user's home.
  pub store_path:         PathBuf,
  pub auth_username:      String,
  /// Argon2 PHC string, see `dje-server --hash-password`.
  pub auth_password_hash: String,
  /// How many days back a scraper execution may still be opened.
  #[serde(default = "default_retention_days")]
  pub retention_days:     u32,
  /// Cards per kanban column.
  #[serde(default = "default_kanban_page_size")]
  pub kanban_page_size:   u32,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 3000 }
fn default_retention_days() -> u32 { DEFAULT_RETENTION_DAYS }
fn default_kanban_page_size() -> u32 { DEFAULT_PAGE_LIMIT }

impl ServerConfig {
  /// Read `path` if it exists, then apply the environment.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    Self::from_builder(Config::builder().add_source(config::File::from(path).required(false)))
  }

  fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
    builder
      .add_source(config::Environment::with_prefix("DJE"))
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn execution_policy(&self) -> ExecutionPolicy {
    ExecutionPolicy { retention_days: self.retention_days }
  }

  pub fn auth(&self) -> AuthConfig {
    AuthConfig {
      username:      self.auth_username.clone(),
      password_hash: self.auth_password_hash.clone(),
    }
  }

  /// The database path with `~/` expanded and its directory created.
  pub fn resolve_store_path(&self) -> io::Result<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let path = expand_home(&self.store_path, home.as_deref());
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
      std::fs::create_dir_all(dir)?;
    }
    Ok(path)
  }
}

fn expand_home(path: &Path, home: Option<&Path>) -> PathBuf {
  match (path.strip_prefix("~"), home) {
    (Ok(rest), Some(home)) => home.join(rest),
    _ => path.to_path_buf(),
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Everything the router is built from.
pub struct AppState<S> {
  pub api:  Arc<ApiState<S>>,
  pub auth: Arc<AuthConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self { Self { api: self.api.clone(), auth: self.auth.clone() } }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the complete axum [`Router`] for the server.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: PublicationStore + ExecutionStore + 'static,
{
  let api = dje_api::api_router(state.api)
    .layer(middleware::from_fn_with_state(state.auth, auth::require_auth));

  Router::new()
    .route("/health", get(health))
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }
