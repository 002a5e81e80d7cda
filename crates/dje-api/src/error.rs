//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every failure, including extractor rejections, is rendered as
//! `{"error": {"code", "message", "details"?}}`.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use dje_core::ErrorKind;
use serde_json::{Value, json};
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] dje_core::Error),

  /// A lookup without a numeric ID found nothing (e.g. today's execution).
  #[error("{0}")]
  NotFound(String),

  /// The request could not be decoded.
  #[error("{0}")]
  BadRequest(String),
}

/// HTTP status for each error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
  match kind {
    ErrorKind::Validation => StatusCode::BAD_REQUEST,
    ErrorKind::NotFound => StatusCode::NOT_FOUND,
    ErrorKind::AlreadyExists | ErrorKind::ExecutionConflict => StatusCode::CONFLICT,
    ErrorKind::InvalidTransition | ErrorKind::BusinessRule => StatusCode::UNPROCESSABLE_ENTITY,
    ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, code, message, details) = match &self {
      ApiError::Core(e) => {
        let kind = e.kind();
        if kind == ErrorKind::Storage {
          let source = std::error::Error::source(e).map(ToString::to_string);
          tracing::error!(source = ?source, "storage failure");
        }
        (status_for(kind), kind.code(), e.to_string(), e.details())
      }
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, ErrorKind::NotFound.code(), m.clone(), None),
      ApiError::BadRequest(m) => {
        (StatusCode::BAD_REQUEST, ErrorKind::Validation.code(), m.clone(), None)
      }
    };

    let mut error = json!({ "code": code, "message": message });
    if let (Some(details), Value::Object(map)) = (details, &mut error) {
      map.insert("details".into(), details);
    }
    (status, Json(json!({ "error": error }))).into_response()
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl From<PathRejection> for ApiError {
  fn from(rejection: PathRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}
