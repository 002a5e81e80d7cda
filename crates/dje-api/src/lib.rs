//! JSON REST API for the DJE publication tracker.
//!
//! Exposes an axum [`Router`] backed by any store implementing both
//! [`PublicationStore`] and [`ExecutionStore`]. Auth, TLS, and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", dje_api::api_router(state.clone()))
//! ```

pub mod error;
pub mod executions;
pub mod extract;
pub mod publications;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, patch, post},
};
use dje_core::{
  clock::Clock,
  engine::{ExecutionPolicy, IngestionEngine, LifecycleEngine},
  store::{ExecutionStore, PublicationStore},
};

pub use error::ApiError;

/// The engines every handler shares.
pub struct ApiState<S> {
  pub lifecycle:        LifecycleEngine<S>,
  pub ingest:           IngestionEngine<S, S>,
  /// Cards per column on the kanban board.
  pub kanban_page_size: u32,
}

impl<S: PublicationStore + ExecutionStore> ApiState<S> {
  pub fn new(
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    policy: ExecutionPolicy,
    kanban_page_size: u32,
  ) -> Self {
    Self {
      lifecycle: LifecycleEngine::new(store.clone(), clock.clone()),
      ingest: IngestionEngine::new(store.clone(), store, clock, policy),
      kanban_page_size,
    }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: Arc<ApiState<S>>) -> Router<()>
where
  S: PublicationStore + ExecutionStore + 'static,
{
  Router::new()
    // Publications
    .route(
      "/publications",
      get(publications::list::<S>).post(publications::create::<S>),
    )
    .route("/publications/stats", get(publications::stats::<S>))
    .route("/publications/search", get(publications::search::<S>))
    .route("/publications/kanban", get(publications::kanban::<S>))
    .route("/publications/status/{status}", get(publications::by_status::<S>))
    .route("/publications/{id}", get(publications::get_one::<S>))
    .route("/publications/{id}/status", patch(publications::update_status::<S>))
    .route("/publications/{id}/content", patch(publications::update_content::<S>))
    // Scraper executions
    .route(
      "/scraper/executions",
      get(executions::list::<S>).post(executions::create::<S>),
    )
    .route(
      "/scraper/executions/{id}",
      get(executions::get_one::<S>).patch(executions::update::<S>),
    )
    .route("/scraper/executions/{id}/complete", post(executions::complete::<S>))
    .route("/scraper/executions/{id}/fail", post(executions::fail::<S>))
    .route("/scraper/executions/{id}/cancel", post(executions::cancel::<S>))
    .route("/scraper/executions/{id}/publications", post(executions::ingest::<S>))
    .route("/scraper/today", get(executions::today::<S>))
    .route("/scraper/by-date", get(executions::by_date::<S>))
    .route("/scraper/running", get(executions::running::<S>))
    .route("/scraper/stats", get(executions::stats::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
