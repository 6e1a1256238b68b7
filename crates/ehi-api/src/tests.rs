//! Router tests against an in-memory store.

use std::sync::Arc;

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use ehi_core::{scoring::Weights, site::NewSite, store::SiteStore};
use ehi_pipeline::Pipeline;
use ehi_store_sqlite::SqliteStore;
use serde_json::Value;
use tower::ServiceExt as _;

use crate::api_router;

async fn make_pipeline() -> Arc<Pipeline<SqliteStore>> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  for site in [
    NewSite::new("Yellowstone NP", -110.5, 44.6).protected(),
    NewSite::new("Phoenix Urban", -112.07, 33.45),
  ] {
    store.add_site(site).await.unwrap();
  }
  Arc::new(Pipeline::new(Arc::new(store), Weights::DEFAULT).unwrap())
}

async fn call(
  pipeline: &Arc<Pipeline<SqliteStore>>,
  method:   &str,
  uri:      &str,
  body:     Option<&str>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  if body.is_some() {
    builder = builder.header(header::CONTENT_TYPE, "application/json");
  }
  let req = builder.body(Body::from(body.unwrap_or_default().to_owned())).unwrap();

  let resp = api_router(pipeline.clone()).oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

// ── Runs ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_succeeds_and_is_reported_in_status() {
  let p = make_pipeline().await;

  let (status, body) = call(&p, "POST", "/pipeline/run", None).await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["success"], true);
  assert!(body["message"].as_str().unwrap().contains("2 sites scored"));

  let (status, body) = call(&p, "GET", "/status", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["counts"]["sites"], 2);
  assert_eq!(body["counts"]["climate"], 2);
  assert_eq!(body["pipeline"]["state"], "idle");
  assert_eq!(body["last_run"]["outcome"], "completed");
  assert_eq!(body["last_run"]["trigger"], "manual");
  let avg = body["avg_composite_ehi"].as_f64().unwrap();
  assert!((0.0..=1.0).contains(&avg));
}

#[tokio::test]
async fn recompute_scores_without_ingesting() {
  let p = make_pipeline().await;

  let (status, body) = call(&p, "POST", "/pipeline/recompute", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["report"]["sites_scored"], 2);

  // No sources ingested: every sub-score is neutral.
  let (_, sites) = call(&p, "GET", "/sites", None).await;
  for site in sites.as_array().unwrap() {
    let composite = site["scores"]["composite_ehi"].as_f64().unwrap();
    assert!((composite - 0.5).abs() < 1e-9);
  }
}

#[tokio::test]
async fn ingest_known_source_reports_rows() {
  let p = make_pipeline().await;

  let (status, body) = call(&p, "POST", "/ingest/footprint", None).await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["success"], true);
  assert_eq!(body["source"], "footprint");
  assert_eq!(body["rows"], 2);
  assert_eq!(body["sites_scored"], 2);
}

#[tokio::test]
async fn ingest_unknown_source_is_bad_request() {
  let p = make_pipeline().await;

  let (status, body) = call(&p, "POST", "/ingest/ebird", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["success"], false);
  assert_eq!(body["error"], "Bad Request");
  assert!(body["message"].as_str().unwrap().contains("ebird"));
}

// ── Calculate ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn calculate_with_empty_body_uses_defaults() {
  let p = make_pipeline().await;
  call(&p, "POST", "/pipeline/run", None).await;

  let (status, body) = call(&p, "POST", "/calculate-ehi", None).await;
  assert_eq!(status, StatusCode::OK, "{body}");

  let results = body.as_array().unwrap();
  assert_eq!(results.len(), 2);
  let scores: Vec<f64> = results.iter().map(|r| r["ehi_score"].as_f64().unwrap()).collect();
  assert!(scores[0] >= scores[1]);
  assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
  assert!(results[0]["breakdown"]["human_pressure"].is_number());
}

#[tokio::test]
async fn calculate_accepts_partial_weights() {
  let p = make_pipeline().await;

  let (status, body) = call(
    &p,
    "POST",
    "/calculate-ehi",
    Some(r#"{"weights":{"biodiversity":0.35,"vegetation":0.15}}"#),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn calculate_rejects_weights_not_summing_to_one() {
  let p = make_pipeline().await;

  let (status, body) = call(
    &p,
    "POST",
    "/calculate-ehi",
    Some(r#"{"weights":{"biodiversity":0.2,"climate":0.2,"humanPressure":0.2,"vegetation":0.2}}"#),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["success"], false);
  assert!(body["message"].as_str().unwrap().contains("sum to 1.0"));
}

#[tokio::test]
async fn calculate_rejects_malformed_json() {
  let p = make_pipeline().await;
  let (status, _) = call(&p, "POST", "/calculate-ehi", Some("{weights:")).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}
