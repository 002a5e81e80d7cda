//! Error type for `dje-store-sqlite`.

use chrono::NaiveDate;
use dje_core::error::Conflict;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// A stored column could not be decoded into its domain type.
  #[error("decode error: {0}")]
  Decode(String),

  #[error("process number {0} is already taken")]
  DuplicateProcessNumber(String),

  #[error("an execution already exists for {0}")]
  ExecutionDateTaken(NaiveDate),

  #[error("execution {0} is already running")]
  ExecutionRunning(i64),

  /// The one-running index fired but the winner had already finished.
  #[error("another execution was started concurrently")]
  ExecutionStartedConcurrently,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Constraint violations become the matching domain kind; everything else is
/// an opaque storage failure.
impl From<Error> for dje_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::DuplicateProcessNumber(process_number) => Self::AlreadyExists { process_number },
      Error::ExecutionDateTaken(date) => Self::ExecutionConflict(Conflict::DateTaken(date)),
      Error::ExecutionRunning(execution_id) => {
        Self::ExecutionConflict(Conflict::AlreadyRunning { execution_id })
      }
      Error::ExecutionStartedConcurrently => {
        Self::ExecutionConflict(Conflict::StartedConcurrently)
      }
      other => Self::storage(other),
    }
  }
}

/// The message of a SQLite constraint violation, if `err` is one.
pub(crate) fn constraint_violation(err: &tokio_rusqlite::Error) -> Option<&str> {
  match err {
    tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, message))
      if e.code == rusqlite::ErrorCode::ConstraintViolation =>
    {
      Some(message.as_deref().unwrap_or_default())
    }
    _ => None,
  }
}
