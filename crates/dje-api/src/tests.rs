//! Router tests against an in-memory SQLite store.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Method, Request, StatusCode},
};
use chrono::{Duration, TimeZone, Utc};
use dje_core::{clock::FixedClock, engine::ExecutionPolicy};
use dje_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::{ApiState, api_router};

async fn app() -> (Router, Arc<FixedClock>) {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()));
  let state = ApiState::new(store, clock.clone(), ExecutionPolicy::default(), 2);
  (api_router(Arc::new(state)), clock)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
  let builder = Request::builder().method(method).uri(uri);
  let req = match body {
    Some(body) => builder
      .header("content-type", "application/json")
      .body(Body::from(body.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };
  let resp = app.clone().oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
  (status, json)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) { send(app, Method::GET, uri, None).await }

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
  send(app, Method::POST, uri, Some(body)).await
}

async fn patch(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
  send(app, Method::PATCH, uri, Some(body)).await
}

fn publication(number: &str) -> Value {
  json!({
    "processNumber": number,
    "authors": ["Maria Aparecida"],
    "lawyers": ["Dr. Pereira"],
    "publicationDate": "2024-01-10",
    "mainValue": "1500.50",
    "fullContent": format!("Requisição de pagamento no processo {number}"),
  })
}

// ─── Publications ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_then_fetch_publication() {
  let (app, _) = app().await;
  let (status, created) = post(&app, "/publications", publication("0001-2024")).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(created["status"], "nova");
  assert_eq!(created["defendant"], "Instituto Nacional do Seguro Social - INSS");
  assert_eq!(created["contentHash"].as_str().map(str::len), Some(32));

  let id = created["id"].as_i64().unwrap();
  let (status, fetched) = get(&app, &format!("/publications/{id}")).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(fetched, created);
}

#[tokio::test]
async fn duplicate_process_number_is_conflict() {
  let (app, _) = app().await;
  post(&app, "/publications", publication("0001-2024")).await;
  let (status, body) = post(&app, "/publications", publication("0001-2024")).await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["error"]["code"], "ALREADY_EXISTS");
  assert_eq!(body["error"]["details"]["processNumber"], "0001-2024");
}

#[tokio::test]
async fn invalid_body_is_validation_error() {
  let (app, _) = app().await;
  let (status, body) = post(&app, "/publications", json!({ "processNumber": "  " })).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

  let (status, body) = post(&app, "/publications", json!([1, 2])).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn missing_publication_is_not_found() {
  let (app, _) = app().await;
  let (status, body) = get(&app, "/publications/99").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["error"]["details"], json!({ "entity": "publication", "id": 99 }));

  let (status, _) = get(&app, "/publications/0").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  let (status, _) = get(&app, "/publications/abc").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_walks_the_board() {
  let (app, _) = app().await;
  let (_, created) = post(&app, "/publications", publication("0001-2024")).await;
  let uri = format!("/publications/{}/status", created["id"]);

  let (status, body) = patch(&app, &uri, json!({ "status": "concluida" })).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

  let (status, body) = patch(&app, &uri, json!({ "status": "arquivada" })).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

  for next in ["lida", "enviada_adv", "concluida"] {
    let (status, body) = patch(&app, &uri, json!({ "status": next })).await;
    assert_eq!(status, StatusCode::OK, "{next}: {body}");
    assert_eq!(body["status"], next);
  }

  let (status, _) = patch(&app, &uri, json!({ "status": "nova" })).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn content_update_rehashes() {
  let (app, _) = app().await;
  let (_, created) = post(&app, "/publications", publication("0001-2024")).await;
  let uri = format!("/publications/{}/content", created["id"]);

  let (status, updated) = patch(&app, &uri, json!({ "content": "Texto revisado" })).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(updated["fullContent"], "Texto revisado");
  assert_ne!(updated["contentHash"], created["contentHash"]);

  let (status, _) = patch(&app, &uri, json!({ "content": "   " })).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn listing_search_and_kanban() {
  let (app, _) = app().await;
  for n in ["0001-2024", "0002-2024", "0003-2024"] {
    post(&app, "/publications", publication(n)).await;
  }
  let (_, first) = get(&app, "/publications?limit=1").await;
  let id = first["data"][0]["id"].clone();
  patch(&app, &format!("/publications/{id}/status"), json!({ "status": "lida" })).await;

  let (status, page) = get(&app, "/publications?page=2&limit=2").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(page["total"], 3);
  assert_eq!(page["pages"], 2);
  assert_eq!(page["data"].as_array().unwrap().len(), 1);

  let (status, _) = get(&app, "/publications?limit=101").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  let (status, _) = get(&app, "/publications?dateFrom=2024-02-01&dateTo=2024-01-01").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (_, found) = get(&app, "/publications/search?q=0002").await;
  assert_eq!(found["total"], 1);
  assert_eq!(found["data"][0]["processNumber"], "0002-2024");
  let (status, _) = get(&app, "/publications/search?q=x").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (_, read) = get(&app, "/publications/status/lida").await;
  assert_eq!(read["total"], 1);
  let (status, _) = get(&app, "/publications/status/arquivada").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (_, board) = get(&app, "/publications/kanban").await;
  assert_eq!(board["kanbanMeta"]["nova"], json!({ "total": 2, "hasMore": false, "currentPage": 1 }));
  assert_eq!(board["kanbanMeta"]["lida"]["total"], 1);
  assert_eq!(board["kanbanData"]["concluida"], json!([]));

  let (_, counts) = get(&app, "/publications/stats").await;
  assert_eq!(counts, json!({ "nova": 2, "lida": 1, "enviada_adv": 0, "concluida": 0 }));
}

// ─── Scraper executions ───────────────────────────────────────────────────────

#[tokio::test]
async fn execution_lifecycle_over_http() {
  let (app, _) = app().await;
  let (status, _) = get(&app, "/scraper/today").await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, execution) =
    post(&app, "/scraper/executions", json!({ "executionDate": "2024-01-15" })).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(execution["status"], "running");
  let id = execution["id"].as_i64().unwrap();

  let (_, running) = get(&app, "/scraper/running").await;
  assert_eq!(running["id"], id);
  let (_, today) = get(&app, "/scraper/today").await;
  assert_eq!(today["id"], id);

  let (status, body) =
    post(&app, "/scraper/executions", json!({ "executionDate": "2024-01-14" })).await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["error"]["details"]["runningExecutionId"], id);

  let batch = json!({ "publications": [publication("0001-2024"), publication("0001-2024"), { "processNumber": "" }] });
  let (status, outcome) = post(&app, &format!("/scraper/executions/{id}/publications"), batch).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(outcome["found"], 3);
  assert_eq!(outcome["created"], 1);
  assert_eq!(outcome["duplicated"], 1);
  assert_eq!(outcome["rejected"][0]["index"], 2);

  let (status, done) = post(
    &app,
    &format!("/scraper/executions/{id}/complete"),
    json!({ "publicationsFound": 3, "publicationsNew": 1 }),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(done["status"], "completed");
  assert_eq!(done["publicationsDuplicated"], 2);

  let (status, body) = post(
    &app,
    &format!("/scraper/executions/{id}/fail"),
    json!({ "errorMessage": "timeout" }),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["error"]["code"], "BUSINESS_RULE_VIOLATION");

  let (status, _) = get(&app, "/scraper/running").await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (_, stats) = get(&app, "/scraper/stats").await;
  assert_eq!(stats["totalExecutions"], 1);
  assert_eq!(stats["byStatus"]["completed"], 1);
  assert_eq!(stats["recent"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn execution_date_rules() {
  let (app, clock) = app().await;
  let (status, body) =
    post(&app, "/scraper/executions", json!({ "executionDate": "2024-01-16" })).await;
  assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

  let (_, first) = post(&app, "/scraper/executions", json!({ "executionDate": "2024-01-10" })).await;
  let id = first["id"].as_i64().unwrap();
  let (status, cancelled) =
    post(&app, &format!("/scraper/executions/{id}/cancel"), json!({ "reason": "manual stop" })).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(cancelled["status"], "failed");
  assert_eq!(cancelled["errorMessage"], "Cancelled: manual stop");

  clock.advance(Duration::days(1));
  let (status, body) =
    post(&app, "/scraper/executions", json!({ "executionDate": "2024-01-10" })).await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["error"]["details"]["executionDate"], "2024-01-10");

  let (_, by_date) = get(&app, "/scraper/by-date?date=2024-01-10").await;
  assert_eq!(by_date["id"], id);
  let (status, _) = get(&app, "/scraper/by-date?date=2024-01-11").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let (status, _) = get(&app, "/scraper/by-date?date=yesterday").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generic_update_and_listing() {
  let (app, _) = app().await;
  let (_, created) = post(&app, "/scraper/executions", json!({ "executionDate": "2024-01-15", "hostName": "worker-1" })).await;
  let id = created["id"].as_i64().unwrap();

  let (status, body) =
    patch(&app, &format!("/scraper/executions/{id}"), json!({ "publicationsFound": -1 })).await;
  assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

  let (status, failed) = patch(
    &app,
    &format!("/scraper/executions/{id}"),
    json!({ "status": "failed", "errorMessage": "portal offline" }),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(failed["status"], "failed");
  assert!(failed["endTime"].is_string());

  let (status, page) = get(&app, "/scraper/executions").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(page["limit"], 20);
  assert_eq!(page["data"][0]["hostName"], "worker-1");

  let (status, _) = get(&app, "/scraper/executions/42").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}
