//! Handlers for `/publications` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/publications` | `?page&limit&status&dateFrom&dateTo&query` |
//! | `POST`  | `/publications` | Body: a new publication; 201 |
//! | `GET`   | `/publications/stats` | Count per status |
//! | `GET`   | `/publications/search` | `?q=<term>` plus the list filters |
//! | `GET`   | `/publications/kanban` | One capped column per status |
//! | `GET`   | `/publications/status/{status}` | Wire status value |
//! | `GET`   | `/publications/{id}` | 404 if not found |
//! | `PATCH` | `/publications/{id}/status` | Body: `{"status":"lida"}` |
//! | `PATCH` | `/publications/{id}/content` | Body: `{"content":"..."}` |

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::NaiveDate;
use dje_core::{
  publication::{NewPublication, Publication, PublicationStatus},
  query::{DEFAULT_PAGE_LIMIT, KanbanBoard, Page, PageRequest, PublicationFilter, StatusCounts},
  store::{ExecutionStore, PublicationStore},
};
use serde::Deserialize;

use crate::{
  ApiState,
  error::ApiError,
  extract::{ApiJson, ApiPath, ApiQuery},
};

type ApiResult<T> = Result<Json<T>, ApiError>;

// ─── Query parameters ─────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
  pub page:      Option<i64>,
  pub limit:     Option<i64>,
  pub status:    Option<PublicationStatus>,
  pub date_from: Option<NaiveDate>,
  pub date_to:   Option<NaiveDate>,
  #[serde(alias = "q")]
  pub query:     Option<String>,
}

impl ListParams {
  fn into_parts(self) -> Result<(PublicationFilter, PageRequest), ApiError> {
    let page = PageRequest::or_default(self.page, self.limit, DEFAULT_PAGE_LIMIT)?;
    let filter = PublicationFilter {
      query:     self.query,
      status:    self.status,
      date_from: self.date_from,
      date_to:   self.date_to,
    };
    Ok((filter, page))
  }
}

// ─── Reads ────────────────────────────────────────────────────────────────────

/// `GET /publications`
pub async fn list<S>(
  State(state): State<Arc<ApiState<S>>>,
  ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Page<Publication>>
where
  S: PublicationStore + ExecutionStore,
{
  let (filter, page) = params.into_parts()?;
  Ok(Json(state.lifecycle.list(filter, page).await?))
}

/// `GET /publications/search?q=<term>`
pub async fn search<S>(
  State(state): State<Arc<ApiState<S>>>,
  ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Page<Publication>>
where
  S: PublicationStore + ExecutionStore,
{
  let (mut filter, page) = params.into_parts()?;
  let term = filter.query.take().unwrap_or_default();
  Ok(Json(state.lifecycle.search(&term, filter, page).await?))
}

/// `GET /publications/status/{status}`
pub async fn by_status<S>(
  State(state): State<Arc<ApiState<S>>>,
  ApiPath(status): ApiPath<String>,
  ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Page<Publication>>
where
  S: PublicationStore + ExecutionStore,
{
  let status = PublicationStatus::parse(&status)?;
  let (filter, page) = params.into_parts()?;
  Ok(Json(state.lifecycle.list_by_status(status, filter, page).await?))
}

/// `GET /publications/kanban`; pagination parameters are ignored.
pub async fn kanban<S>(
  State(state): State<Arc<ApiState<S>>>,
  ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<KanbanBoard>
where
  S: PublicationStore + ExecutionStore,
{
  let filter = PublicationFilter {
    query:     params.query,
    status:    None,
    date_from: params.date_from,
    date_to:   params.date_to,
  };
  Ok(Json(state.lifecycle.kanban(filter, state.kanban_page_size).await?))
}

/// `GET /publications/stats`
pub async fn stats<S>(State(state): State<Arc<ApiState<S>>>) -> ApiResult<StatusCounts>
where
  S: PublicationStore + ExecutionStore,
{
  Ok(Json(state.lifecycle.stats().await?))
}

/// `GET /publications/{id}`
pub async fn get_one<S>(
  State(state): State<Arc<ApiState<S>>>,
  ApiPath(id): ApiPath<i64>,
) -> ApiResult<Publication>
where
  S: PublicationStore + ExecutionStore,
{
  Ok(Json(state.lifecycle.get(id).await?))
}

// ─── Writes ───────────────────────────────────────────────────────────────────

/// `POST /publications`
pub async fn create<S>(
  State(state): State<Arc<ApiState<S>>>,
  ApiJson(body): ApiJson<NewPublication>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PublicationStore + ExecutionStore,
{
  let publication = state.ingest.create_publication(body).await?;
  Ok((StatusCode::CREATED, Json(publication)))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: String,
}

/// `PATCH /publications/{id}/status` — body: `{"status":"lida"}`
pub async fn update_status<S>(
  State(state): State<Arc<ApiState<S>>>,
  ApiPath(id): ApiPath<i64>,
  ApiJson(body): ApiJson<StatusBody>,
) -> ApiResult<Publication>
where
  S: PublicationStore + ExecutionStore,
{
  let target = PublicationStatus::parse(&body.status)?;
  Ok(Json(state.lifecycle.apply_status(id, target).await?))
}

#[derive(Debug, Deserialize)]
pub struct ContentBody {
  pub content: String,
}

/// `PATCH /publications/{id}/content`
pub async fn update_content<S>(
  State(state): State<Arc<ApiState<S>>>,
  ApiPath(id): ApiPath<i64>,
  ApiJson(body): ApiJson<ContentBody>,
) -> ApiResult<Publication>
where
  S: PublicationStore + ExecutionStore,
{
  Ok(Json(state.lifecycle.update_content(id, body.content).await?))
}
