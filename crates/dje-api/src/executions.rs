//! Handlers for `/scraper` endpoints.
//!
//! Lookups by day and the running lookup answer 404 when nothing matches.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::NaiveDate;
use dje_core::{
  engine::BatchOutcome,
  execution::{ExecutionPatch, NewExecution, ScraperExecution},
  publication::NewPublication,
  query::{DEFAULT_EXECUTION_PAGE_LIMIT, ExecutionStats, Page, PageRequest},
  store::{ExecutionStore, PublicationStore},
};
use serde::Deserialize;

use crate::{
  ApiState,
  error::ApiError,
  extract::{ApiJson, ApiPath, ApiQuery},
};

type ApiResult<T> = Result<Json<T>, ApiError>;

// ─── Reads ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
  pub page:  Option<i64>,
  pub limit: Option<i64>,
}

/// `GET /scraper/executions`
pub async fn list<S>(
  State(state): State<Arc<ApiState<S>>>,
  ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Page<ScraperExecution>>
where
  S: PublicationStore + ExecutionStore,
{
  let page = PageRequest::or_default(params.page, params.limit, DEFAULT_EXECUTION_PAGE_LIMIT)?;
  Ok(Json(state.ingest.executions(page).await?))
}

/// `GET /scraper/executions/{id}`
pub async fn get_one<S>(
  State(state): State<Arc<ApiState<S>>>,
  ApiPath(id): ApiPath<i64>,
) -> ApiResult<ScraperExecution>
where
  S: PublicationStore + ExecutionStore,
{
  Ok(Json(state.ingest.execution(id).await?))
}

/// `GET /scraper/today`
pub async fn today<S>(State(state): State<Arc<ApiState<S>>>) -> ApiResult<ScraperExecution>
where
  S: PublicationStore + ExecutionStore,
{
  state
    .ingest
    .today_execution()
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound("no execution for today".into()))
}

#[derive(Debug, Deserialize)]
pub struct DateParams {
  pub date: NaiveDate,
}

/// `GET /scraper/by-date?date=YYYY-MM-DD`
pub async fn by_date<S>(
  State(state): State<Arc<ApiState<S>>>,
  ApiQuery(params): ApiQuery<DateParams>,
) -> ApiResult<ScraperExecution>
where
  S: PublicationStore + ExecutionStore,
{
  state
    .ingest
    .execution_by_date(params.date)
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("no execution for {}", params.date)))
}

/// `GET /scraper/running`
pub async fn running<S>(State(state): State<Arc<ApiState<S>>>) -> ApiResult<ScraperExecution>
where
  S: PublicationStore + ExecutionStore,
{
  state
    .ingest
    .running_execution()
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound("no execution is running".into()))
}

/// `GET /scraper/stats`
pub async fn stats<S>(State(state): State<Arc<ApiState<S>>>) -> ApiResult<ExecutionStats>
where
  S: PublicationStore + ExecutionStore,
{
  Ok(Json(state.ingest.stats().await?))
}

// ─── Writes ───────────────────────────────────────────────────────────────────

/// `POST /scraper/executions`
pub async fn create<S>(
  State(state): State<Arc<ApiState<S>>>,
  ApiJson(body): ApiJson<NewExecution>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PublicationStore + ExecutionStore,
{
  let execution = state.ingest.create_execution(body).await?;
  Ok((StatusCode::CREATED, Json(execution)))
}

/// `PATCH /scraper/executions/{id}`
pub async fn update<S>(
  State(state): State<Arc<ApiState<S>>>,
  ApiPath(id): ApiPath<i64>,
  ApiJson(patch): ApiJson<ExecutionPatch>,
) -> ApiResult<ScraperExecution>
where
  S: PublicationStore + ExecutionStore,
{
  Ok(Json(state.ingest.update(id, patch).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteBody {
  pub publications_found: i64,
  pub publications_new:   i64,
}

/// `POST /scraper/executions/{id}/complete`
pub async fn complete<S>(
  State(state): State<Arc<ApiState<S>>>,
  ApiPath(id): ApiPath<i64>,
  ApiJson(body): ApiJson<CompleteBody>,
) -> ApiResult<ScraperExecution>
where
  S: PublicationStore + ExecutionStore,
{
  let execution = state
    .ingest
    .complete(id, body.publications_found, body.publications_new)
    .await?;
  Ok(Json(execution))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailBody {
  pub error_message: String,
}

/// `POST /scraper/executions/{id}/fail`
pub async fn fail<S>(
  State(state): State<Arc<ApiState<S>>>,
  ApiPath(id): ApiPath<i64>,
  ApiJson(body): ApiJson<FailBody>,
) -> ApiResult<ScraperExecution>
where
  S: PublicationStore + ExecutionStore,
{
  Ok(Json(state.ingest.fail(id, &body.error_message).await?))
}

#[derive(Debug, Deserialize)]
pub struct CancelBody {
  pub reason: String,
}

/// `POST /scraper/executions/{id}/cancel`
pub async fn cancel<S>(
  State(state): State<Arc<ApiState<S>>>,
  ApiPath(id): ApiPath<i64>,
  ApiJson(body): ApiJson<CancelBody>,
) -> ApiResult<ScraperExecution>
where
  S: PublicationStore + ExecutionStore,
{
  Ok(Json(state.ingest.cancel(id, &body.reason).await?))
}

#[derive(Debug, Deserialize)]
pub struct BatchBody {
  pub publications: Vec<NewPublication>,
}

/// `POST /scraper/executions/{id}/publications` — body: `{"publications":[..]}`
pub async fn ingest<S>(
  State(state): State<Arc<ApiState<S>>>,
  ApiPath(id): ApiPath<i64>,
  ApiJson(body): ApiJson<BatchBody>,
) -> ApiResult<BatchOutcome>
where
  S: PublicationStore + ExecutionStore,
{
  Ok(Json(state.ingest.ingest_batch(id, body.publications).await?))
}
