//! Persistence ports consumed by the engines.
//!
//! Implemented by storage backends (e.g. `dje-store-sqlite`). The engines are
//! generic over these traits and never see a concrete backend.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
  execution::{ExecutionDraft, ExecutionStatus, ScraperExecution},
  publication::{Publication, PublicationDraft, PublicationStatus},
  query::{ExecutionStats, Page, PageRequest, PublicationFilter, StatusCounts},
};

// ─── Publications ────────────────────────────────────────────────────────────

/// Storage for [`Publication`] records.
///
/// All methods return `Send` futures so the trait can be used from a
/// multi-threaded runtime (e.g. tokio behind `axum`).
pub trait PublicationStore: Send + Sync {
  /// Backend error. Constraint violations must convert into the matching
  /// domain kind (`AlreadyExists`); anything else becomes `Storage`.
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  fn find_by_id(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Publication>, Self::Error>> + Send + '_;

  fn find_by_process_number(
    &self,
    process_number: String,
  ) -> impl Future<Output = Result<Option<Publication>, Self::Error>> + Send + '_;

  fn exists_by_process_number(
    &self,
    process_number: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Persist a draft and return it with its assigned ID. Fails if the process
  /// number is already taken, even when a concurrent caller won the race after
  /// the engine's existence check.
  fn create(
    &self,
    draft: PublicationDraft,
  ) -> impl Future<Output = Result<Publication, Self::Error>> + Send + '_;

  /// Compare-and-set the status: writes `target` and `at` only while the row
  /// is still in `expected`. Returns `None` when the row is missing or its
  /// status has moved on.
  fn update_status(
    &self,
    id: i64,
    expected: PublicationStatus,
    target: PublicationStatus,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Publication>, Self::Error>> + Send + '_;

  /// Replace the full content and its fingerprint. Returns `None` when the row
  /// is missing.
  fn update_content(
    &self,
    id: i64,
    content: String,
    content_hash: String,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Publication>, Self::Error>> + Send + '_;

  /// One page of publications matching `filter`, newest first (`created_at`
  /// descending, then ID descending).
  fn find_all(
    &self,
    filter: PublicationFilter,
    page: PageRequest,
  ) -> impl Future<Output = Result<Page<Publication>, Self::Error>> + Send + '_;

  /// Number of publications per status.
  fn status_counts(
    &self,
  ) -> impl Future<Output = Result<StatusCounts, Self::Error>> + Send + '_;
}

// ─── Scraper executions ──────────────────────────────────────────────────────

/// Storage for [`ScraperExecution`] records.
pub trait ExecutionStore: Send + Sync {
  /// Backend error. A lost creation race must convert into
  /// `ExecutionConflict`; anything else becomes `Storage`.
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  fn find_by_id(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<ScraperExecution>, Self::Error>> + Send + '_;

  fn find_by_date(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<ScraperExecution>, Self::Error>> + Send + '_;

  fn exists_by_date(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// The execution currently in `running`, if any.
  fn find_running(
    &self,
  ) -> impl Future<Output = Result<Option<ScraperExecution>, Self::Error>> + Send + '_;

  /// Insert a new `running` execution.
  ///
  /// The date check, the running check and the insert must be atomic with
  /// respect to concurrent callers: of N racing calls at most one succeeds and
  /// the rest fail with a conflict.
  fn create(
    &self,
    draft: ExecutionDraft,
  ) -> impl Future<Output = Result<ScraperExecution, Self::Error>> + Send + '_;

  /// Compare-and-set write of a whole snapshot: succeeds only while the stored
  /// row is still in `expected`. Returns `None` when the row is missing or its
  /// status has moved on.
  fn update(
    &self,
    expected: ExecutionStatus,
    next: ScraperExecution,
  ) -> impl Future<Output = Result<Option<ScraperExecution>, Self::Error>> + Send + '_;

  /// One page of executions, newest `execution_date` first.
  fn find_all(
    &self,
    page: PageRequest,
  ) -> impl Future<Output = Result<Page<ScraperExecution>, Self::Error>> + Send + '_;

  /// Aggregates over every execution; `recent` holds those dated on or after
  /// `since`.
  fn stats(
    &self,
    since: NaiveDate,
  ) -> impl Future<Output = Result<ExecutionStats, Self::Error>> + Send + '_;
}
