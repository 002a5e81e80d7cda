//! Error types for `dje-core`.
//!
//! Every failure an engine reports is one variant of [`Error`]. Callers
//! dispatch on [`Error::kind`]; the `Display` impl is the human-readable
//! message and [`Error::details`] the optional structured payload.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::publication::PublicationStatus;

/// The entity a [`Error::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
  Publication,
  ScraperExecution,
}

impl std::fmt::Display for Entity {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Publication => f.write_str("publication"),
      Self::ScraperExecution => f.write_str("scraper execution"),
    }
  }
}

/// Why a scraper execution could not be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
  /// An execution already exists for this calendar day.
  DateTaken(NaiveDate),
  /// Another execution is still `running`.
  AlreadyRunning { execution_id: i64 },
  /// A concurrent start won the race and is no longer visible as running.
  StartedConcurrently,
}

impl std::fmt::Display for Conflict {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::DateTaken(date) => {
        write!(f, "an execution already exists for {date}")
      }
      Self::AlreadyRunning { execution_id } => {
        write!(f, "execution {execution_id} is already running")
      }
      Self::StartedConcurrently => {
        f.write_str("another execution was started concurrently")
      }
    }
  }
}

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed or missing input.
  #[error("{0}")]
  Validation(String),

  #[error("{entity} {id} not found")]
  NotFound { entity: Entity, id: i64 },

  #[error("a publication already exists with process number {process_number}")]
  AlreadyExists { process_number: String },

  #[error("transition from '{from}' to '{to}' is not allowed")]
  InvalidTransition {
    from: PublicationStatus,
    to:   PublicationStatus,
  },

  /// A domain invariant beyond plain input validation.
  #[error("{0}")]
  BusinessRule(String),

  #[error("execution conflict: {0}")]
  ExecutionConflict(Conflict),

  /// The persistence layer failed. The message is deliberately opaque; the
  /// backend error is only reachable through `source()`.
  #[error("storage failure")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn validation(message: impl Into<String>) -> Self {
    Self::Validation(message.into())
  }

  pub fn business_rule(message: impl Into<String>) -> Self {
    Self::BusinessRule(message.into())
  }

  pub fn storage(source: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Storage(Box::new(source))
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Validation(_) => ErrorKind::Validation,
      Self::NotFound { .. } => ErrorKind::NotFound,
      Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
      Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
      Self::BusinessRule(_) => ErrorKind::BusinessRule,
      Self::ExecutionConflict(_) => ErrorKind::ExecutionConflict,
      Self::Storage(_) => ErrorKind::Storage,
    }
  }

  /// Structured payload for the variants that carry one.
  pub fn details(&self) -> Option<Value> {
    match self {
      Self::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
      Self::AlreadyExists { process_number } => {
        Some(json!({ "processNumber": process_number }))
      }
      Self::InvalidTransition { from, to } => {
        Some(json!({ "from": from, "to": to }))
      }
      Self::ExecutionConflict(Conflict::DateTaken(date)) => {
        Some(json!({ "executionDate": date }))
      }
      Self::ExecutionConflict(Conflict::AlreadyRunning { execution_id }) => {
        Some(json!({ "runningExecutionId": execution_id }))
      }
      Self::ExecutionConflict(Conflict::StartedConcurrently)
      | Self::Validation(_)
      | Self::BusinessRule(_)
      | Self::Storage(_) => None,
    }
  }
}

/// The discriminant of [`Error`], with a stable machine-readable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  Validation,
  NotFound,
  AlreadyExists,
  InvalidTransition,
  BusinessRule,
  ExecutionConflict,
  Storage,
}

impl ErrorKind {
  pub fn code(self) -> &'static str {
    match self {
      Self::Validation => "VALIDATION_ERROR",
      Self::NotFound => "NOT_FOUND",
      Self::AlreadyExists => "ALREADY_EXISTS",
      Self::InvalidTransition => "INVALID_TRANSITION",
      Self::BusinessRule => "BUSINESS_RULE_VIOLATION",
      Self::ExecutionConflict => "EXECUTION_CONFLICT",
      Self::Storage => "STORAGE_ERROR",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn invalid_transition_carries_wire_values() {
    let err = Error::InvalidTransition {
      from: PublicationStatus::New,
      to:   PublicationStatus::SentToLawyer,
    };
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    assert_eq!(err.to_string(), "transition from 'nova' to 'enviada_adv' is not allowed");
    assert_eq!(
      err.details(),
      Some(json!({ "from": "nova", "to": "enviada_adv" }))
    );
  }

  #[test]
  fn storage_message_is_opaque() {
    let inner = std::io::Error::other("UNIQUE constraint failed: publications.process_number");
    let err = Error::storage(inner);
    assert_eq!(err.to_string(), "storage failure");
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(err.kind().code(), "STORAGE_ERROR");
  }

  #[test]
  fn conflict_details_name_the_running_execution() {
    let err = Error::ExecutionConflict(Conflict::AlreadyRunning { execution_id: 7 });
    assert_eq!(err.details(), Some(json!({ "runningExecutionId": 7 })));
    assert!(err.to_string().contains("execution 7"));
  }
}
